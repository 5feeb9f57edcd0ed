//! SQL compiler that renders a query descriptor and its translated filter as a
//! PostgreSQL `SELECT` using sea-query.

use crate::backend::{BackendFilter, BooleanOp, ComparisonOp, FilterValue};
use crate::config::QueryConfig;
use crate::orderby::SortDirection;
use crate::query::QueryDescriptor;
use crate::translator::{translate, TranslateError};
use sea_query::{
    Asterisk, Expr, Func, Iden, LikeExpr, Order, PostgresQueryBuilder, SelectStatement,
    SimpleExpr, Value,
};
use std::collections::HashMap;
use thiserror::Error;

/// Configuration for SQL optimization
#[derive(Debug, Clone)]
pub struct OptimizationConfig {
    /// Minimum number of OR'ed equality checks on one field before converting to IN
    pub max_or_conditions_for_in: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            max_or_conditions_for_in: 5,
        }
    }
}

/// Table identifier wrapper
#[derive(Debug, Clone)]
pub struct TableName(pub String);

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Translate(#[from] TranslateError),
}

/// Represents an optimization applied during compilation
#[derive(Debug, Clone, PartialEq)]
pub enum Optimization {
    OrToIn { field: String, value_count: usize },
}

/// Result of SQL compilation with optimization information
#[derive(Debug)]
pub struct CompileResult {
    pub sql: String,
    pub optimizations: Vec<Optimization>,
}

/// SQL Compiler that converts descriptors to SQL queries
#[derive(Debug, Clone, Default)]
pub struct SqlCompiler {
    config: OptimizationConfig,
    /// Maps entity names to table names for schema resolution
    table_mapping: HashMap<String, String>,
}

impl SqlCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OptimizationConfig) -> Self {
        Self {
            config,
            table_mapping: HashMap::new(),
        }
    }

    pub fn from_config(config: &QueryConfig) -> Self {
        Self {
            config: OptimizationConfig::default(),
            table_mapping: config.table_mapping.clone(),
        }
    }

    /// Set table mapping for entity names
    pub fn set_table_mapping(&mut self, mapping: HashMap<String, String>) {
        self.table_mapping = mapping;
    }

    /// Get the actual table name for an entity
    fn get_table_name(&self, entity: &str) -> String {
        self.table_mapping
            .get(entity)
            .cloned()
            .unwrap_or_else(|| entity.to_lowercase())
    }

    /// Compile a query descriptor against the table backing `entity`
    pub fn compile(&self, descriptor: &QueryDescriptor, entity: &str) -> Result<CompileResult, CompileError> {
        let mut optimizations = Vec::new();

        let mut select = SelectStatement::new();
        select.from(TableName(self.get_table_name(entity)));

        match &descriptor.select {
            Some(fields) if !fields.is_empty() => {
                select.columns(fields.iter().map(|f| ColumnName(f.clone())));
            }
            _ => {
                select.column(Asterisk);
            }
        }

        if let Some(root) = &descriptor.filter {
            let filter = translate(root)?;
            let (condition, mut filter_opts) = self.compile_filter(&filter)?;
            optimizations.append(&mut filter_opts);
            select.and_where(condition);
        }

        for item in descriptor.orderby.iter().flatten() {
            let order = match item.direction {
                SortDirection::Asc => Order::Asc,
                SortDirection::Desc => Order::Desc,
            };
            select.order_by(ColumnName(item.field.clone()), order);
        }

        if let Some(top) = descriptor.top {
            select.limit(top);
        }
        if let Some(skip) = descriptor.skip {
            select.offset(skip);
        }

        Ok(CompileResult {
            sql: select.to_string(PostgresQueryBuilder),
            optimizations,
        })
    }

    /// Compile a backend filter into a WHERE condition
    pub fn compile_filter(&self, filter: &BackendFilter) -> Result<(SimpleExpr, Vec<Optimization>), CompileError> {
        let mut optimizations = Vec::new();

        let expr = match filter {
            BackendFilter::Comparison { field, op, literal } => self.compile_comparison(field, *op, literal),
            BackendFilter::BooleanCombine { op: BooleanOp::And, left, right } => {
                let (left_expr, mut left_opts) = self.compile_filter(left)?;
                let (right_expr, mut right_opts) = self.compile_filter(right)?;
                optimizations.append(&mut left_opts);
                optimizations.append(&mut right_opts);
                left_expr.and(right_expr)
            }
            BackendFilter::BooleanCombine { op: BooleanOp::Or, left, right } => {
                if let Some((in_expr, opt)) = self.try_optimize_or_to_in(filter) {
                    optimizations.push(opt);
                    in_expr
                } else {
                    let (left_expr, mut left_opts) = self.compile_filter(left)?;
                    let (right_expr, mut right_opts) = self.compile_filter(right)?;
                    optimizations.append(&mut left_opts);
                    optimizations.append(&mut right_opts);
                    left_expr.or(right_expr)
                }
            }
            BackendFilter::Regex { field, pattern, flags } => self.compile_regex(field, pattern, flags),
        };

        Ok((expr, optimizations))
    }

    /// Try to optimize OR'ed equality checks on a single field to an IN clause
    fn try_optimize_or_to_in(&self, filter: &BackendFilter) -> Option<(SimpleExpr, Optimization)> {
        let mut values = Vec::new();
        let mut field = None;
        if !collect_equality_values(filter, &mut field, &mut values) {
            return None;
        }
        let field = field?;
        if values.len() < self.config.max_or_conditions_for_in {
            return None;
        }

        let in_values: Vec<Value> = values.iter().map(|v| literal_to_value(v)).collect();
        let in_expr = Expr::col(ColumnName(field.to_string())).is_in(in_values);
        let optimization = Optimization::OrToIn {
            field: field.to_string(),
            value_count: values.len(),
        };
        Some((in_expr, optimization))
    }

    /// Compile a comparison operation
    fn compile_comparison(&self, field: &str, op: ComparisonOp, literal: &FilterValue) -> SimpleExpr {
        let col = Expr::col(ColumnName(field.to_string()));
        let val = literal_to_value(literal);

        match op {
            ComparisonOp::Eq => col.eq(val),
            ComparisonOp::Ne => col.ne(val),
            ComparisonOp::Gt => col.gt(val),
            ComparisonOp::Gte => col.gte(val),
            ComparisonOp::Lt => col.lt(val),
            ComparisonOp::Lte => col.lte(val),
        }
    }

    /// Anchored string-match patterns become LIKE; case-insensitive ones compare LOWER(col)
    fn compile_regex(&self, field: &str, pattern: &str, flags: &str) -> SimpleExpr {
        let (prefix, rest) = match pattern.strip_prefix('^') {
            Some(rest) => ("", rest),
            None => ("%", pattern),
        };
        let (body, suffix) = match rest.strip_suffix('$') {
            Some(body) => (body, ""),
            None => (rest, "%"),
        };

        let case_insensitive = flags.contains('i');
        let body = if case_insensitive { body.to_lowercase() } else { body.to_string() };
        let like = LikeExpr::new(format!("{}{}{}", prefix, escape_like(&body), suffix)).escape('\\');

        let col = Expr::col(ColumnName(field.to_string()));
        if case_insensitive {
            Expr::expr(Func::lower(col)).like(like)
        } else {
            col.like(like)
        }
    }
}

/// Collects the literals of an OR tree made only of equality checks on one field
fn collect_equality_values<'a>(
    filter: &'a BackendFilter,
    field: &mut Option<&'a str>,
    values: &mut Vec<&'a FilterValue>,
) -> bool {
    match filter {
        BackendFilter::Comparison {
            field: name,
            op: ComparisonOp::Eq,
            literal,
        } => {
            if field.is_some_and(|f| f != name) {
                return false;
            }
            *field = Some(name.as_str());
            values.push(literal);
            true
        }
        BackendFilter::BooleanCombine {
            op: BooleanOp::Or,
            left,
            right,
        } => collect_equality_values(left, field, values) && collect_equality_values(right, field, values),
        _ => false, // Other filter types break the equality pattern
    }
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Convert a filter literal to a sea-query Value
fn literal_to_value(literal: &FilterValue) -> Value {
    match literal {
        FilterValue::Integer(n) => Value::BigInt(Some(*n)),
        FilterValue::Float(n) => Value::Double(Some(*n)),
        FilterValue::Boolean(b) => Value::Bool(Some(*b)),
        FilterValue::String(s) => Value::String(Some(Box::new(s.clone()))),
        other => Value::String(Some(Box::new(other.to_string()))),
    }
}
