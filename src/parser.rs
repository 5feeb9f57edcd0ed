//! `$filter` 的语法分析器
//!
//! ## 解析流程
//!
//! ```text
//! parse()
//!   ├─ to_postfix()   中缀 → 后缀 (Shunting-Yard)
//!   │    ├─ 函数名         → 压入运算符栈
//!   │    ├─ '('           → 压入运算符栈
//!   │    ├─ ','           → 弹出到输出，直到遇到 '('
//!   │    ├─ ')'           → 弹出到输出，丢弃 '('，若其下为函数名则一并输出
//!   │    ├─ 运算符         → 弹出优先级更高（左结合时相等）的运算符后压栈
//!   │    └─ 字面量         → 直接输出；连续两个字面量报错
//!   │
//!   └─ build_tree()   后缀 → 解析树
//!        ├─ 字面量         → 叶子节点入栈
//!        └─ 运算符/函数     → 按元数弹出子节点，校验后入栈
//! ```
//!
//! ## 优先级（从高到低）
//!
//! 1. **括号分组** `(expression)`
//! 2. **关系比较** `gt`, `ge`, `lt`, `le`
//! 3. **相等比较** `eq`, `ne`
//! 4. **AND**
//! 5. **OR**
//!
//! 所有运算符均为二元左结合。

use crate::ast::ParseNode;
use crate::grammar::{Associativity, Grammar, Operator, OperatorKind};
use crate::lexer::{TokenizeError, Tokenizer};
use crate::token::{Span, Token, TokenKind};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Mismatched parenthesis at {span}")]
    MismatchedParenthesis { span: Span },

    #[error("Consecutive literals at {span}: '{text}'")]
    ConsecutiveLiterals { text: String, span: Span },

    #[error("Incompatible operands for '{operator}' at {span}")]
    IncompatibleOperands { operator: String, span: Span },

    #[error("Malformed expression: {0}")]
    MalformedExpression(String),

    #[error("Expression exceeds {limit} ({actual} > {max})")]
    ExpressionTooComplex {
        limit: &'static str,
        actual: usize,
        max: usize,
    },
}

/// 解析树大小上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_nodes: 256,
        }
    }
}

pub struct Parser<'g> {
    grammar: &'g Grammar,
    limits: ParseLimits,
}

impl<'g> Parser<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            limits: ParseLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ParseLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn parse(&self, tokens: &[Token]) -> Result<ParseNode, ParseError> {
        let postfix = self.to_postfix(tokens)?;
        debug!(tokens = tokens.len(), postfix = postfix.len(), "converted filter to postfix");
        let root = self.build_tree(postfix)?;
        trace!(depth = root.depth(), root = %root, "built filter tree");
        Ok(root)
    }

    /// 仅当 token 为已注册的运算符时返回其定义
    fn operator_of(&self, token: &Token) -> Option<&'g Operator> {
        match token.kind {
            TokenKind::Logical => self.grammar.operator(token.as_text()?),
            _ => None,
        }
    }

    fn is_function(&self, token: &Token) -> bool {
        token.kind == TokenKind::Func
            && token
                .as_text()
                .is_some_and(|name| self.grammar.function(name).is_some())
    }

    /// 中缀 → 后缀
    fn to_postfix(&self, tokens: &[Token]) -> Result<Vec<Token>, ParseError> {
        let mut output = Vec::with_capacity(tokens.len());
        let mut stack: Vec<&Token> = Vec::new();
        let mut previous_literal = false;

        for token in tokens {
            let mut is_literal = false;

            match token.kind {
                TokenKind::OpenParen => stack.push(token),
                TokenKind::CloseParen => {
                    pop_until_open_paren(&mut stack, &mut output, token.span)?;
                    stack.pop(); // 丢弃 '('
                    if let Some(top) = stack.last() {
                        if self.is_function(top) {
                            output.push((*top).clone());
                            stack.pop();
                        }
                    }
                }
                TokenKind::Comma => pop_until_open_paren(&mut stack, &mut output, token.span)?,
                _ if self.is_function(token) => stack.push(token),
                _ => {
                    if let Some(current) = self.operator_of(token) {
                        while let Some(top) = stack.last() {
                            let Some(top_op) = self.operator_of(top) else {
                                break;
                            };
                            let dominates = top_op.precedence > current.precedence
                                || (current.associativity == Associativity::Left
                                    && top_op.precedence >= current.precedence);
                            if !dominates {
                                break;
                            }
                            output.push((*top).clone());
                            stack.pop();
                        }
                        stack.push(token);
                    } else {
                        if previous_literal {
                            return Err(ParseError::ConsecutiveLiterals {
                                text: token.text.clone(),
                                span: token.span,
                            });
                        }
                        output.push(token.clone());
                        is_literal = true;
                    }
                }
            }

            previous_literal = is_literal;
        }

        while let Some(top) = stack.pop() {
            if matches!(top.kind, TokenKind::OpenParen | TokenKind::CloseParen) {
                return Err(ParseError::MismatchedParenthesis { span: top.span });
            }
            output.push(top.clone());
        }

        Ok(output)
    }

    /// 后缀 → 解析树
    fn build_tree(&self, postfix: Vec<Token>) -> Result<ParseNode, ParseError> {
        if postfix.is_empty() {
            return Err(ParseError::MalformedExpression("empty expression".to_string()));
        }

        let mut stack: Vec<ParseNode> = Vec::new();

        for token in postfix {
            let arity = match token.kind {
                TokenKind::Logical | TokenKind::Func => {
                    token.as_text().and_then(|name| self.grammar.arity(name))
                }
                _ => None,
            };

            let Some(arity) = arity else {
                stack.push(ParseNode::leaf(token));
                continue;
            };

            if stack.len() < arity {
                return Err(ParseError::MalformedExpression(format!(
                    "'{}' at {} expects {} operands, found {}",
                    token.text,
                    token.span,
                    arity,
                    stack.len()
                )));
            }
            let children = stack.split_off(stack.len() - arity);
            let node = ParseNode { token, children };
            self.check_operands(&node)?;

            let depth = node.depth();
            if depth > self.limits.max_depth {
                return Err(ParseError::ExpressionTooComplex {
                    limit: "depth",
                    actual: depth,
                    max: self.limits.max_depth,
                });
            }
            let count = node.node_count();
            if count > self.limits.max_nodes {
                return Err(ParseError::ExpressionTooComplex {
                    limit: "node count",
                    actual: count,
                    max: self.limits.max_nodes,
                });
            }
            stack.push(node);
        }

        let root = stack.pop();
        match (root, stack.is_empty()) {
            (Some(root), true) => Ok(root),
            (Some(_), false) => Err(ParseError::MalformedExpression(format!(
                "{} operands are not joined by an operator",
                stack.len() + 1
            ))),
            (None, _) => Err(ParseError::MalformedExpression("empty expression".to_string())),
        }
    }

    /// 两个子节点要么类型相同，要么至多一个是运算符/函数节点；
    /// `and`/`or` 可以连接任意两个布尔表达式。
    fn check_operands(&self, node: &ParseNode) -> Result<(), ParseError> {
        let incompatible = || ParseError::IncompatibleOperands {
            operator: node.name().to_string(),
            span: node.token.span,
        };

        let [left, right] = node.children.as_slice() else {
            return Err(incompatible());
        };

        if left.token.kind == right.token.kind || !(left.is_expression() && right.is_expression()) {
            return Ok(());
        }

        match self.operator_of(&node.token) {
            Some(op) if op.kind == OperatorKind::Boolean => Ok(()),
            _ => Err(incompatible()),
        }
    }
}

fn pop_until_open_paren(
    stack: &mut Vec<&Token>,
    output: &mut Vec<Token>,
    span: Span,
) -> Result<(), ParseError> {
    while let Some(top) = stack.last() {
        if top.kind == TokenKind::OpenParen {
            return Ok(());
        }
        output.push((*top).clone());
        stack.pop();
    }
    Err(ParseError::MismatchedParenthesis { span })
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// 词法分析器、语法表与大小上限的组合，构建一次后可在多个线程间共享
#[derive(Debug, Clone)]
pub struct FilterParser {
    tokenizer: Tokenizer,
    grammar: Grammar,
    limits: ParseLimits,
}

impl FilterParser {
    pub fn new(tokenizer: Tokenizer, grammar: Grammar) -> Self {
        Self {
            tokenizer,
            grammar,
            limits: ParseLimits::default(),
        }
    }

    pub fn odata() -> Result<Self, TokenizeError> {
        Ok(Self::new(Tokenizer::odata()?, Grammar::odata()))
    }

    pub fn with_limits(mut self, limits: ParseLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn parse_filter(&self, input: &str) -> Result<ParseNode, FilterError> {
        let tokens = self.tokenizer.tokenize(input)?;
        let root = Parser::new(&self.grammar)
            .with_limits(self.limits)
            .parse(&tokens)?;
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_string(input: &str) -> Result<ParseNode, FilterError> {
        FilterParser::odata().unwrap().parse_filter(input)
    }

    fn parse_err(input: &str) -> ParseError {
        match parse_string(input) {
            Err(FilterError::Parse(e)) => e,
            other => panic!("Expected parse error for {:?}, got {:?}", input, other),
        }
    }

    #[test]
    fn test_simple_comparison() {
        let root = parse_string("name eq 'john'").unwrap();
        assert_eq!(root.name(), "eq");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].name(), "name");
        assert_eq!(root.children[1].token.kind, TokenKind::String);
        assert_eq!(root.to_string(), "eq(name, 'john')");
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let root = parse_string("a eq 1 or b eq 2 and c eq 3").unwrap();
        assert_eq!(root.name(), "or");
        assert_eq!(root.children[0].to_string(), "eq(a, 1)");
        assert_eq!(root.children[1].name(), "and");
        assert_eq!(root.to_string(), "or(eq(a, 1), and(eq(b, 2), eq(c, 3)))");
    }

    #[test]
    fn test_parenthesis_override() {
        let root = parse_string("(a eq 1 or b eq 2) and c eq 3").unwrap();
        assert_eq!(root.name(), "and");
        assert_eq!(root.children[0].name(), "or");
        assert_eq!(root.children[1].to_string(), "eq(c, 3)");
    }

    #[test]
    fn test_left_associativity() {
        let root = parse_string("a eq 1 and b eq 2 and c eq 3").unwrap();
        assert_eq!(root.to_string(), "and(and(eq(a, 1), eq(b, 2)), eq(c, 3))");
    }

    #[test]
    fn test_function_call() {
        let root = parse_string("startswith(name,'jo')").unwrap();
        assert_eq!(root.name(), "startswith");
        assert_eq!(root.token.kind, TokenKind::Func);
        assert_eq!(root.to_string(), "startswith(name, 'jo')");
    }

    #[test]
    fn test_function_combined_with_comparison() {
        let root = parse_string("age gt 18 and contains(title, 'rust')").unwrap();
        assert_eq!(root.to_string(), "and(gt(age, 18), contains(title, 'rust'))");
    }

    #[test]
    fn test_mismatched_parenthesis() {
        assert!(matches!(parse_err("a eq 1)"), ParseError::MismatchedParenthesis { .. }));
        assert!(matches!(parse_err("(a eq 1"), ParseError::MismatchedParenthesis { .. }));
        assert!(matches!(parse_err("a, b"), ParseError::MismatchedParenthesis { .. }));
    }

    #[test]
    fn test_consecutive_literals() {
        let err = parse_err("a b eq 1");
        assert_eq!(
            err,
            ParseError::ConsecutiveLiterals {
                text: "b".to_string(),
                span: Span::new(2, 3)
            }
        );
    }

    #[test]
    fn test_incompatible_operands() {
        let err = parse_err("contains(a,'x') eq (b eq 1)");
        assert!(matches!(err, ParseError::IncompatibleOperands { ref operator, .. } if operator == "eq"));
    }

    #[test]
    fn test_malformed_expression() {
        assert!(matches!(parse_err("eq 1"), ParseError::MalformedExpression(_)));
        assert!(matches!(parse_err(""), ParseError::MalformedExpression(_)));
        assert!(matches!(parse_err("(a) (b)"), ParseError::MalformedExpression(_)));
    }

    #[test]
    fn test_tokenize_error_surfaces() {
        assert!(matches!(parse_string("a eq $"), Err(FilterError::Tokenize(_))));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let parser = FilterParser::odata().unwrap();
        let input = "(a eq 1 or endswith(b,'z')) and c le 2020-01-01";
        assert_eq!(parser.parse_filter(input).unwrap(), parser.parse_filter(input).unwrap());
    }

    #[test]
    fn test_depth_limit() {
        let parser = FilterParser::odata().unwrap().with_limits(ParseLimits {
            max_depth: 3,
            max_nodes: 256,
        });
        assert!(parser.parse_filter("a eq 1 and b eq 2").is_ok());
        let err = parser.parse_filter("a eq 1 and b eq 2 and c eq 3").unwrap_err();
        assert!(matches!(
            err,
            FilterError::Parse(ParseError::ExpressionTooComplex { limit: "depth", .. })
        ));
    }

    #[test]
    fn test_node_limit() {
        let parser = FilterParser::odata().unwrap().with_limits(ParseLimits {
            max_depth: 32,
            max_nodes: 5,
        });
        let err = parser.parse_filter("a eq 1 and b eq 2").unwrap_err();
        assert!(matches!(
            err,
            FilterError::Parse(ParseError::ExpressionTooComplex { limit: "node count", .. })
        ));
    }

    #[test]
    fn test_shared_across_threads() {
        let parser = FilterParser::odata().unwrap();
        std::thread::scope(|scope| {
            for i in 0..4 {
                let parser = &parser;
                scope.spawn(move || {
                    let root = parser.parse_filter(&format!("n eq {}", i)).unwrap();
                    assert_eq!(root.children[1].token.text, i.to_string());
                });
            }
        });
    }
}
