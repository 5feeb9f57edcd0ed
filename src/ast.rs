use crate::token::{Token, TokenKind};
use std::fmt;

/// 解析树节点
///
/// 运算符/函数节点持有其全部操作数，没有子节点的节点即为字面量叶子。
/// 父节点独占子节点，不保存指向父节点的引用。
#[derive(Debug, Clone, PartialEq)]
pub struct ParseNode {
    pub token: Token,
    pub children: Vec<ParseNode>,
}

impl ParseNode {
    pub fn leaf(token: Token) -> Self {
        Self {
            token,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// 运算符或函数节点
    pub fn is_expression(&self) -> bool {
        !self.is_leaf() && matches!(self.token.kind, TokenKind::Logical | TokenKind::Func)
    }

    /// 节点的文本名称，例如 `eq`、`startswith`、`name`
    pub fn name(&self) -> &str {
        self.token.as_text().unwrap_or(&self.token.text)
    }

    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(ParseNode::depth).max().unwrap_or(0)
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(ParseNode::node_count).sum::<usize>()
    }
}

/// 以前缀形式输出，例如 `and(eq(a, 1), startswith(b, 'x'))`
impl fmt::Display for ParseNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_leaf() {
            return f.write_str(self.token.text.trim());
        }
        write!(f, "{}(", self.name())?;
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", child)?;
        }
        f.write_str(")")
    }
}
