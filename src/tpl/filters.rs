use crate::data::value::Value;
use crate::error::TplError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type FilterFn = Arc<dyn Fn(Value) -> Result<Value, TplError> + Send + Sync>;

/// 过滤器表：名称 -> 单参数转换函数
#[derive(Clone, Default)]
pub struct FilterTable {
    filters: HashMap<String, FilterFn>,
}

impl FilterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置常用过滤器
    /// upper, lower, trim, first, last, length, keys, values, type
    pub fn builtins() -> Self {
        Self::new()
            .with("upper", |v| Value::Str(v.to_string().to_uppercase()))
            .with("lower", |v| Value::Str(v.to_string().to_lowercase()))
            .with("trim", |v| Value::Str(v.to_string().trim().to_string()))
            .with("first", |v| match v {
                Value::List(items) => items.into_iter().next().unwrap_or_default(),
                Value::Str(s) => s
                    .chars()
                    .next()
                    .map_or(Value::Undefined, |c| c.to_string().into()),
                _ => Value::Undefined,
            })
            .with("last", |v| match v {
                Value::List(items) => items.into_iter().last().unwrap_or_default(),
                Value::Str(s) => s
                    .chars()
                    .last()
                    .map_or(Value::Undefined, |c| c.to_string().into()),
                _ => Value::Undefined,
            })
            .with("length", |v| match v {
                Value::Str(s) => s.chars().count().into(),
                Value::List(items) => items.len().into(),
                Value::Map(map) => map.len().into(),
                _ => Value::Undefined,
            })
            .with("keys", |v| match v {
                Value::Map(map) => Value::List(map.into_keys().map(Value::Str).collect()),
                _ => Value::List(Vec::new()),
            })
            .with("values", |v| match v {
                Value::Map(map) => Value::List(map.into_values().collect()),
                _ => Value::List(Vec::new()),
            })
            .with("type", |v| Value::from(v.type_name()))
    }

    pub fn with<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.insert(name, f);
        self
    }

    pub fn try_with<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, TplError> + Send + Sync + 'static,
    {
        self.insert_fallible(name, f);
        self
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Arc::new(move |v| Ok(f(v))));
    }

    pub fn insert_fallible<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Value) -> Result<Value, TplError> + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<&FilterFn> {
        self.filters.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl fmt::Debug for FilterTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FilterTable").field("filters", &names).finish()
    }
}
