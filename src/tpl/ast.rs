use crate::data::value::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    /// `{{ expr }}`
    Output(Expr),
    Comment(String),
    If {
        test: Expr,
        consequent: Vec<Node>,
        alternate: Vec<Node>,
    },
    For {
        item: String,
        /// index for lists, value for maps
        second: Option<String>,
        iterable: Expr,
        body: Vec<Node>,
    },
    Import {
        path: String,
        /// `None` means the imported template sees the full current context
        bindings: Option<Vec<(String, Expr)>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Variable(Path),
    Filter {
        base: Box<Expr>,
        filters: Vec<String>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// 属性路径：`a.b.c` 与 `a["b"]["c"]` 解析为同一结构
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub root: String,
    pub keys: Vec<String>,
}

impl Path {
    pub fn new(root: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            root: root.into(),
            keys,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::Ge => ">=",
            BinaryOp::Le => "<=",
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root)?;
        for key in &self.keys {
            write!(f, ".{}", key)?;
        }
        Ok(())
    }
}

/// 还原为近似的源码形式，用于错误信息与日志
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(Value::Str(s)) => write!(f, "\"{}\"", s),
            Expr::Literal(Value::Undefined) => f.write_str("undefined"),
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::Variable(path) => write!(f, "{}", path),
            Expr::Filter { base, filters } => {
                write!(f, "{}", base)?;
                for name in filters {
                    write!(f, " | {}", name)?;
                }
                Ok(())
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => write!(f, "{} ? {} : {}", test, consequent, alternate),
            Expr::Logical { op, left, right } => {
                let op = match op {
                    LogicalOp::And => "&&",
                    LogicalOp::Or => "||",
                };
                write!(f, "{} {} {}", left, op, right)
            }
            Expr::Not(inner) => write!(f, "!{}", inner),
            Expr::Binary { op, left, right } => write!(f, "{} {} {}", left, op.as_str(), right),
        }
    }
}
