use serde::Deserialize;

/// 块与表达式的最大嵌套层数，超出即报错而不是耗尽栈空间
pub const MAX_NESTING_DEPTH: usize = 128;

/// 渲染选项
/// Options recognised by a render call. Deserializable so a host application
/// can read it from its own configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// 输出 `<!-- comment -->`
    pub display_comments: bool,
    /// import 路径的前缀目录（简单拼接，不做规范化）
    pub import_directory: String,
    pub max_import_depth: usize,
    /// 渲染时 if / for / import 的总嵌套层数上限
    pub max_nesting_depth: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            display_comments: false,
            import_directory: String::new(),
            max_import_depth: 32,
            max_nesting_depth: MAX_NESTING_DEPTH,
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn display_comments(mut self, display_comments: bool) -> Self {
        self.display_comments = display_comments;
        self
    }

    pub fn import_directory(mut self, import_directory: impl Into<String>) -> Self {
        self.import_directory = import_directory.into();
        self
    }

    pub fn max_import_depth(mut self, max_import_depth: usize) -> Self {
        self.max_import_depth = max_import_depth;
        self
    }

    pub fn max_nesting_depth(mut self, max_nesting_depth: usize) -> Self {
        self.max_nesting_depth = max_nesting_depth;
        self
    }

    /// 将 import 路径拼接到 `import_directory` 之后
    pub fn resolve(&self, path: &str) -> String {
        let dir = self.import_directory.as_str();
        if dir.is_empty() {
            path.to_string()
        } else if dir.ends_with('/') {
            format!("{}{}", dir, path)
        } else {
            format!("{}/{}", dir, path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = RenderOptions::default();
        assert!(!options.display_comments);
        assert_eq!(options.import_directory, "");
        assert_eq!(options.max_import_depth, 32);
        assert_eq!(options.max_nesting_depth, MAX_NESTING_DEPTH);
    }

    #[test]
    fn test_resolve() {
        assert_eq!(RenderOptions::new().resolve("a.html"), "a.html");
        assert_eq!(
            RenderOptions::new().import_directory("views").resolve("a.html"),
            "views/a.html"
        );
        assert_eq!(
            RenderOptions::new().import_directory("views/").resolve("../a.html"),
            "views/../a.html"
        );
    }

    #[test]
    fn test_deserialize_partial() {
        let options: RenderOptions =
            serde_json::from_str(r#"{ "display_comments": true, "max_nesting_depth": 16 }"#)
                .unwrap();
        assert!(options.display_comments);
        assert_eq!(options.max_import_depth, 32);
        assert_eq!(options.max_nesting_depth, 16);
    }
}
