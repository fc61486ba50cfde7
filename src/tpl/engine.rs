use crate::config::RenderOptions;
use crate::data::serializer::to_value;
use crate::data::value::Value;
use crate::error::TplError;
use crate::source::{FsSource, NoSource, TemplateSource};
use crate::tpl::ast::Node;
use crate::tpl::cache;
use crate::tpl::filters::FilterTable;
use crate::tpl::parser::parse_template;
use crate::tpl::render::{Depth, Renderer};
use crate::tpl::render_context::Context;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub use crate::tpl::cache::remove_template;

/// 渲染模板字符串，import 从文件系统读取
pub async fn render<T: Serialize + ?Sized>(
    template: &str,
    data: &T,
    filters: &FilterTable,
    options: &RenderOptions,
) -> Result<String, TplError> {
    render_with_source(template, data, filters, options, &FsSource).await
}

/// 同 [`render`]，import 通过给定的模板来源读取
pub async fn render_with_source<T: Serialize + ?Sized>(
    template: &str,
    data: &T,
    filters: &FilterTable,
    options: &RenderOptions,
    source: &dyn TemplateSource,
) -> Result<String, TplError> {
    let value = to_value(data)?;
    let nodes = parse_template(template)?;
    let renderer = Renderer {
        filters,
        source,
        options,
    };
    timed(template.len(), render_nodes(&renderer, &nodes, &value)).await
}

async fn render_nodes(
    renderer: &Renderer<'_>,
    nodes: &[Node],
    data: &Value,
) -> Result<String, TplError> {
    let ctx = Context::new(data);
    renderer.render(nodes, &ctx, Depth::default()).await
}

async fn timed(
    template_len: usize,
    fut: impl Future<Output = Result<String, TplError>>,
) -> Result<String, TplError> {
    let start = Instant::now();
    let out = fut.await?;
    debug!(
        template_len,
        output_len = out.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "template rendered"
    );
    Ok(out)
}

/// 模板引擎：持有过滤器表、模板来源与渲染选项，可在多个任务间共享
#[derive(Clone)]
pub struct Engine {
    filters: FilterTable,
    source: Arc<dyn TemplateSource>,
    options: RenderOptions,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            filters: FilterTable::builtins(),
            source: Arc::new(NoSource),
            options: RenderOptions::default(),
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("filters", &self.filters)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// 默认带内置过滤器，不提供 import 来源
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filters(mut self, filters: FilterTable) -> Self {
        self.filters = filters;
        self
    }

    pub fn source(mut self, source: impl TemplateSource + 'static) -> Self {
        self.source = Arc::new(source);
        self
    }

    pub fn shared_source(mut self, source: Arc<dyn TemplateSource>) -> Self {
        self.source = source;
        self
    }

    pub fn options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn filter_table(&self) -> &FilterTable {
        &self.filters
    }

    pub fn render_options(&self) -> &RenderOptions {
        &self.options
    }

    pub async fn render<T: Serialize + ?Sized>(
        &self,
        template: &str,
        data: &T,
    ) -> Result<String, TplError> {
        let value = to_value(data)?;
        self.render_value(template, &value).await
    }

    pub async fn render_value(&self, template: &str, data: &Value) -> Result<String, TplError> {
        let nodes = parse_template(template)?;
        let renderer = self.renderer();
        timed(template.len(), render_nodes(&renderer, &nodes, data)).await
    }

    /// 通过模板来源读取并渲染，路径按 `import_directory` 解析，AST 按路径缓存
    pub async fn render_file<T: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &T,
    ) -> Result<String, TplError> {
        let resolved = self.options.resolve(path);
        let text = self.source.read_text(&resolved).await?;
        let ast = cache::get_ast(&resolved, &text)?;
        let value = to_value(data)?;
        let renderer = self.renderer();
        timed(text.len(), render_nodes(&renderer, &ast, &value)).await
    }

    fn renderer(&self) -> Renderer<'_> {
        Renderer {
            filters: &self.filters,
            source: self.source.as_ref(),
            options: &self.options,
        }
    }
}
