use crate::error::TplError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::Path;
use walkdir::WalkDir;

/// 模板来源：根据路径异步读取模板文本
/// Supplies the text of imported templates. Filesystem, embedded bundles or
/// remote stores all plug in here.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn read_text(&self, path: &str) -> Result<String, TplError>;
}

/// 从文件系统读取
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

#[async_trait]
impl TemplateSource for FsSource {
    async fn read_text(&self, path: &str) -> Result<String, TplError> {
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

/// 不提供任何模板，所有读取均失败
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSource;

#[async_trait]
impl TemplateSource for NoSource {
    async fn read_text(&self, path: &str) -> Result<String, TplError> {
        Err(TplError::NotFound(path.to_string()))
    }
}

/// 内存中的模板集合
#[derive(Debug, Default)]
pub struct MemorySource {
    templates: DashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 `template_assets!` 生成的 (路径, 内容) 列表构建
    pub fn from_assets(assets: &[(&str, &str)]) -> Self {
        let source = Self::new();
        for (path, content) in assets {
            source.insert(*path, *content);
        }
        source
    }

    pub fn insert(&self, path: impl Into<String>, content: impl Into<String>) {
        self.templates.insert(path.into(), content.into());
    }

    pub fn remove(&self, path: &str) -> Option<String> {
        self.templates.remove(path).map(|(_, v)| v)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.templates.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// 递归读取目录下的所有文件，以相对于 `dir` 的路径（`/` 分隔）注册。
    /// Returns the number of templates registered.
    pub fn load_from_path(&self, dir: &Path) -> Result<usize> {
        let mut count = 0;
        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let content = std::fs::read_to_string(path)
                .with_context(|| format!("读取模板失败: {}", path.display()))?;
            let relative = path
                .strip_prefix(dir)
                .with_context(|| format!("路径不在模板目录下: {}", path.display()))?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            self.insert(key, content);
            count += 1;
        }
        Ok(count)
    }
}

#[async_trait]
impl TemplateSource for MemorySource {
    async fn read_text(&self, path: &str) -> Result<String, TplError> {
        self.templates
            .get(path)
            .map(|v| v.value().clone())
            .ok_or_else(|| TplError::NotFound(path.to_string()))
    }
}
