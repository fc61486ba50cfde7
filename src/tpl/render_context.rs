use crate::data::value::{Map, Value};
use crate::tpl::ast::Path;

/// 渲染上下文。
///
/// A chain of scopes: the caller's data as root, plus the bindings created by
/// loops. A child scope only reads from its parent and owns its own bindings,
/// so nothing written during an iteration leaks into the parent.
pub struct Context<'a> {
    root: Option<&'a Value>,
    locals: Map,
    parent: Option<&'a Context<'a>>,
}

impl<'a> Context<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self {
            root: Some(root),
            locals: Map::new(),
            parent: None,
        }
    }

    /// 不继承任何外部数据的上下文，只包含给定的变量
    pub fn isolated(locals: Map) -> Self {
        Self {
            root: None,
            locals,
            parent: None,
        }
    }

    /// 派生子作用域
    pub fn child(&self) -> Context<'_> {
        Context {
            root: None,
            locals: Map::new(),
            parent: Some(self),
        }
    }

    pub fn bind(&mut self, key: impl Into<String>, value: Value) {
        self.locals.insert(key.into(), value);
    }

    /// 按名称查找：先局部变量，再根对象，最后父作用域
    pub fn get(&self, name: &str) -> Option<&Value> {
        if let Some(v) = self.locals.get(name) {
            return Some(v);
        }
        if let Some(Value::Map(m)) = self.root {
            if let Some(v) = m.get(name) {
                return Some(v);
            }
        }
        self.parent.and_then(|p| p.get(name))
    }

    /// 沿属性路径查找；任何一级缺失都返回 None
    pub fn lookup(&self, path: &Path) -> Option<&Value> {
        path.keys
            .iter()
            .try_fold(self.get(&path.root)?, |current, key| current.get(key))
    }
}
