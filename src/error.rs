use thiserror::Error;

/// 模板引擎错误
/// Represents errors that can occur while scanning, parsing or rendering a template.
#[derive(Error, Debug)]
pub enum TplError {
    #[error("Syntax error: {0}")]
    Syntax(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
    #[error("Value error: {0}")]
    Value(String),
    #[error("Template not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TplError {
    pub fn syntax(msg: impl Into<String>) -> Self {
        TplError::Syntax(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        TplError::Runtime(msg.into())
    }
}

impl serde::ser::Error for TplError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        TplError::Value(msg.to_string())
    }
}
