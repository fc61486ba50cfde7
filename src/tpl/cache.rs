use crate::error::TplError;
use crate::tpl::ast::Node;
use crate::tpl::parser::parse_template;
use dashmap::DashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};
use tracing::trace;

#[derive(Clone)]
pub struct CachedTemplate {
    pub ast: Arc<Vec<Node>>,
    pub content_hash: u64,
}

/// 缓存模板 AST，内容变化时按哈希失效
pub(crate) static TEMPLATE_CACHE: LazyLock<DashMap<String, CachedTemplate>> =
    LazyLock::new(DashMap::new);

pub(crate) fn get_ast(
    template_name: &str,
    template_content: &str,
) -> Result<Arc<Vec<Node>>, TplError> {
    let mut hasher = DefaultHasher::new();
    template_content.hash(&mut hasher);
    let new_hash = hasher.finish();

    if let Some(cached) = TEMPLATE_CACHE.get(template_name) {
        if cached.content_hash == new_hash {
            trace!(template = template_name, "template cache hit");
            return Ok(cached.ast.clone());
        }
    }

    let ast = Arc::new(parse_template(template_content)?);
    TEMPLATE_CACHE.insert(
        template_name.to_string(),
        CachedTemplate {
            ast: ast.clone(),
            content_hash: new_hash,
        },
    );
    Ok(ast)
}

/// 卸载模板缓存
pub fn remove_template(template_name: &str) {
    TEMPLATE_CACHE.remove(template_name);
}
