//! Filter表达式的词法分析器
//!
//! 词法分析器由两组有序的正则匹配器组成：
//! - **匹配器**：命中后产生一个 token
//! - **忽略器**：命中后仅推进位置（目前只有空白）
//!
//! 匹配按照注册顺序进行，第一个命中的匹配器胜出（不是最长匹配），
//! 因此更具体的模式必须先于通用的标识符模式注册。

use crate::token::{Span, Token, TokenKind, TokenValue};
use chrono::{DateTime, NaiveDate, NaiveTime};
use regex::Regex;
use thiserror::Error;
use tracing::trace;

/// 捕获组名称：存在时只有该组的文本构成 token，光标也只推进该组的长度
const TOKEN_GROUP: &str = "token";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TokenizeError {
    #[error("Unexpected input at {position}: '{remaining}'")]
    Unmatched { position: usize, remaining: String },

    #[error("Invalid {kind:?} literal '{text}' at {span}")]
    InvalidLiteral {
        kind: TokenKind,
        text: String,
        span: Span,
    },

    #[error("Invalid token pattern: {0}")]
    InvalidPattern(String),
}

#[derive(Debug, Clone)]
struct Matcher {
    pattern: Regex,
    kind: TokenKind,
}

/// 有序正则匹配器集合，构建一次后只读共享
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    matchers: Vec<Matcher>,
    ignored: Vec<Matcher>,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 构建 OData `$filter` 的标准词法规则
    pub fn odata() -> Result<Self, TokenizeError> {
        let mut tokenizer = Self::new();
        tokenizer.add(r"^\(", TokenKind::OpenParen)?;
        tokenizer.add(r"^\)", TokenKind::CloseParen)?;
        tokenizer.add(r"^,", TokenKind::Comma)?;
        tokenizer.add(r"^(?P<token>eq|ne|gt|ge|lt|le|and|or)\s", TokenKind::Logical)?;
        tokenizer.add(r"^(?P<token>contains|endswith|startswith)\s*\(", TokenKind::Func)?;
        // 时间类模式必须先于数字注册，否则 `2020-01-01` 会被拆成整数
        tokenizer.add(
            r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}(?:\.[0-9]+)?(?:Z|[+-][0-9]{2}:[0-9]{2})",
            TokenKind::DateTime,
        )?;
        tokenizer.add(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}", TokenKind::Date)?;
        tokenizer.add(r"^[0-9]{2}:[0-9]{2}(?::[0-9]{2}(?:\.[0-9]{1,9})?)?", TokenKind::Time)?;
        tokenizer.add(r"^-?[0-9]+\.[0-9]+(?:[eE][+-]?[0-9]+)?", TokenKind::Float)?;
        tokenizer.add(r"^-?[0-9]+", TokenKind::Integer)?;
        tokenizer.add(r"^(?i:true|false)\b", TokenKind::Boolean)?;
        tokenizer.add(r"^'(?:[^']|'')*'", TokenKind::String)?;
        tokenizer.add(r"^[a-zA-Z][a-zA-Z0-9_.]*", TokenKind::Literal)?;
        tokenizer.add(r"^_id\b", TokenKind::Literal)?;
        tokenizer.ignore(r"^\s+", TokenKind::Whitespace)?;
        Ok(tokenizer)
    }

    /// 注册一个产生 token 的匹配器，追加到现有匹配器之后
    pub fn add(&mut self, pattern: &str, kind: TokenKind) -> Result<(), TokenizeError> {
        self.matchers.push(Matcher {
            pattern: compile(pattern)?,
            kind,
        });
        Ok(())
    }

    /// 注册一个被跳过的匹配器
    pub fn ignore(&mut self, pattern: &str, kind: TokenKind) -> Result<(), TokenizeError> {
        self.ignored.push(Matcher {
            pattern: compile(pattern)?,
            kind,
        });
        Ok(())
    }

    pub fn lex<'t, 'a>(&'t self, input: &'a str) -> Lexer<'t, 'a> {
        Lexer {
            tokenizer: self,
            input,
            position: 0,
        }
    }

    /// 将整个输入切分为 token 序列，遇到第一个错误即返回
    pub fn tokenize(&self, input: &str) -> Result<Vec<Token>, TokenizeError> {
        let tokens = self.lex(input).collect::<Result<Vec<_>, _>>()?;
        trace!(count = tokens.len(), "tokenized filter");
        Ok(tokens)
    }
}

fn compile(pattern: &str) -> Result<Regex, TokenizeError> {
    Regex::new(pattern).map_err(|e| TokenizeError::InvalidPattern(e.to_string()))
}

/// 按需产生 token 的迭代器
pub struct Lexer<'t, 'a> {
    tokenizer: &'t Tokenizer,
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
}

impl<'t, 'a> Lexer<'t, 'a> {
    /// 尝试匹配器，返回 (token 文本, 推进长度)
    fn try_match(matcher: &Matcher, remaining: &'a str) -> Option<(&'a str, usize)> {
        let caps = matcher.pattern.captures(remaining)?;
        let whole = caps.get(0)?;
        // 未锚定的模式可能跳过前缀，只接受从当前位置开始的匹配
        if whole.start() != 0 {
            return None;
        }
        let matched = caps.name(TOKEN_GROUP).unwrap_or(whole);
        if matched.end() == 0 {
            return None;
        }
        Some((matched.as_str(), matched.end()))
    }

    fn make_token(&self, kind: TokenKind, text: &str, span: Span) -> Result<Token, TokenizeError> {
        let value = coerce(kind, text).ok_or_else(|| TokenizeError::InvalidLiteral {
            kind,
            text: text.to_string(),
            span,
        })?;
        Ok(Token::new(kind, text, value, span))
    }
}

impl<'t, 'a> Iterator for Lexer<'t, 'a> {
    type Item = Result<Token, TokenizeError>;

    fn next(&mut self) -> Option<Self::Item> {
        'outer: while self.position < self.input.len() {
            let remaining = &self.input[self.position..];

            for matcher in &self.tokenizer.matchers {
                if let Some((text, advance)) = Self::try_match(matcher, remaining) {
                    let start = self.position;
                    let span = Span::new(start, start + text.len());
                    self.position += advance;
                    return Some(self.make_token(matcher.kind, text, span));
                }
            }

            for matcher in &self.tokenizer.ignored {
                if let Some((_, advance)) = Self::try_match(matcher, remaining) {
                    self.position += advance;
                    continue 'outer;
                }
            }

            // 无法识别的输入，终止迭代
            let position = self.position;
            self.position = self.input.len();
            return Some(Err(TokenizeError::Unmatched {
                position,
                remaining: remaining.to_string(),
            }));
        }
        None
    }
}

/// 按 token 类型将文本转换为值
fn coerce(kind: TokenKind, text: &str) -> Option<TokenValue> {
    let text = text.trim();
    let value = match kind {
        TokenKind::OpenParen | TokenKind::CloseParen | TokenKind::Comma | TokenKind::Whitespace => {
            TokenValue::None
        }
        TokenKind::Integer => TokenValue::Integer(text.parse().ok()?),
        TokenKind::Float => TokenValue::Float(text.parse().ok()?),
        TokenKind::Boolean => TokenValue::Boolean(text.eq_ignore_ascii_case("true")),
        TokenKind::Date => TokenValue::Date(NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?),
        TokenKind::Time => TokenValue::Time(parse_time(text)?),
        TokenKind::DateTime => TokenValue::DateTime(DateTime::parse_from_rfc3339(text).ok()?),
        TokenKind::Logical | TokenKind::Func | TokenKind::String | TokenKind::Literal => {
            TokenValue::Text(text.to_string())
        }
    };
    Some(value)
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(text, format).ok())
}
