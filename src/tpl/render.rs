use crate::config::RenderOptions;
use crate::data::value::{Map, Value};
use crate::error::TplError;
use crate::source::TemplateSource;
use crate::tpl::ast::{BinaryOp, Expr, LogicalOp, Node};
use crate::tpl::cache;
use crate::tpl::filters::FilterTable;
use crate::tpl::render_context::Context;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, trace};

pub(crate) type RenderFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, TplError>> + Send + 'a>>;

/// 当前递归位置：import 层数与 if / for / import 的总嵌套层数
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Depth {
    imports: usize,
    nesting: usize,
}

impl Depth {
    fn nested(self) -> Self {
        Depth {
            nesting: self.nesting + 1,
            ..self
        }
    }

    fn imported(self) -> Self {
        Depth {
            imports: self.imports + 1,
            nesting: self.nesting + 1,
        }
    }
}

/// 节点树求值器，一次渲染期间只读地持有过滤器表、模板来源与选项
pub(crate) struct Renderer<'a> {
    pub filters: &'a FilterTable,
    pub source: &'a dyn TemplateSource,
    pub options: &'a RenderOptions,
}

impl<'a> Renderer<'a> {
    /// Depth-first, left-to-right walk; sibling outputs are concatenated in order.
    pub(crate) fn render<'r>(
        &'r self,
        nodes: &'r [Node],
        ctx: &'r Context<'r>,
        depth: Depth,
    ) -> RenderFuture<'r> {
        Box::pin(async move {
            if depth.nesting > self.options.max_nesting_depth {
                return Err(TplError::runtime("maximum nesting depth exceeded"));
            }
            let mut out = String::new();
            for node in nodes {
                match node {
                    Node::Text(t) => out.push_str(t),
                    Node::Output(expr) => out.push_str(&self.eval(expr, ctx)?.to_string()),
                    Node::Comment(text) => {
                        if self.options.display_comments {
                            out.push_str("<!-- ");
                            out.push_str(text);
                            out.push_str(" -->");
                        }
                    }
                    Node::If {
                        test,
                        consequent,
                        alternate,
                    } => {
                        let branch = if self.eval(test, ctx)?.is_truthy() {
                            consequent
                        } else {
                            alternate
                        };
                        out.push_str(&self.render(branch, ctx, depth.nested()).await?);
                    }
                    Node::For {
                        item,
                        second,
                        iterable,
                        body,
                    } => {
                        let collection = self.eval(iterable, ctx)?;
                        match collection.as_ref() {
                            Value::List(items) => {
                                for (i, element) in items.iter().enumerate() {
                                    let mut scope = ctx.child();
                                    scope.bind(item.as_str(), element.clone());
                                    if let Some(index) = second {
                                        scope.bind(index.as_str(), Value::from(i));
                                    }
                                    let rendered = self.render(body, &scope, depth.nested()).await?;
                                    out.push_str(&rendered);
                                }
                            }
                            Value::Map(map) => {
                                // 只声明一个变量时绑定的是 key
                                for (key, value) in map {
                                    let mut scope = ctx.child();
                                    scope.bind(item.as_str(), Value::Str(key.clone()));
                                    if let Some(name) = second {
                                        scope.bind(name.as_str(), value.clone());
                                    }
                                    let rendered = self.render(body, &scope, depth.nested()).await?;
                                    out.push_str(&rendered);
                                }
                            }
                            _ => {
                                return Err(TplError::runtime(format!(
                                    "{} is not iterable",
                                    iterable
                                )));
                            }
                        }
                    }
                    Node::Import { path, bindings } => {
                        if depth.imports >= self.options.max_import_depth {
                            return Err(TplError::runtime(format!(
                                "maximum import depth exceeded: {}",
                                path
                            )));
                        }

                        let resolved = self.options.resolve(path);
                        trace!(path = %resolved, imports = depth.imports, "importing template");
                        let text = self.source.read_text(&resolved).await.map_err(|e| {
                            debug!(path = %resolved, error = %e, "import read failed");
                            TplError::runtime(format!(
                                "imported file does not exist: {}",
                                resolved
                            ))
                        })?;
                        let ast = cache::get_ast(&resolved, &text)?;

                        let rendered = match bindings {
                            Some(bindings) => {
                                let scope = Context::isolated(self.eval_bindings(bindings, ctx)?);
                                self.render(&ast, &scope, depth.imported()).await?
                            }
                            None => self.render(&ast, ctx, depth.imported()).await?,
                        };
                        out.push_str(&rendered);
                    }
                }
            }
            Ok(out)
        })
    }

    /// import 的 with 变量在导入方的作用域中求值
    fn eval_bindings(
        &self,
        bindings: &[(String, Expr)],
        ctx: &Context<'_>,
    ) -> Result<Map, TplError> {
        let mut locals = Map::with_capacity(bindings.len());
        for (key, expr) in bindings {
            locals.insert(key.clone(), self.eval(expr, ctx)?.into_owned());
        }
        Ok(locals)
    }

    pub(crate) fn eval<'c>(
        &self,
        expr: &'c Expr,
        ctx: &'c Context<'_>,
    ) -> Result<Cow<'c, Value>, TplError> {
        Ok(match expr {
            Expr::Literal(v) => Cow::Borrowed(v),
            Expr::Variable(path) => match ctx.lookup(path) {
                Some(v) => Cow::Borrowed(v),
                None => Cow::Owned(Value::Undefined),
            },
            Expr::Filter { base, filters } => {
                let mut value = self.eval(base, ctx)?.into_owned();
                for name in filters {
                    let filter = self
                        .filters
                        .get(name)
                        .ok_or_else(|| TplError::runtime(format!("unknown filter: {}", name)))?;
                    value = filter(value)?;
                }
                Cow::Owned(value)
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, ctx)?.is_truthy() {
                    self.eval(consequent, ctx)?
                } else {
                    self.eval(alternate, ctx)?
                }
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, ctx)?.is_truthy();
                let result = match op {
                    LogicalOp::And => left && self.eval(right, ctx)?.is_truthy(),
                    LogicalOp::Or => left || self.eval(right, ctx)?.is_truthy(),
                };
                Cow::Owned(Value::Bool(result))
            }
            Expr::Not(inner) => Cow::Owned(Value::Bool(!self.eval(inner, ctx)?.is_truthy())),
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, ctx)?;
                let right = self.eval(right, ctx)?;
                let ordering = left.compare(&right);
                let result = match op {
                    BinaryOp::Eq => left.strict_eq(&right),
                    BinaryOp::Ne => !left.strict_eq(&right),
                    BinaryOp::Gt => ordering == Some(Ordering::Greater),
                    BinaryOp::Lt => ordering == Some(Ordering::Less),
                    BinaryOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                    BinaryOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                };
                Cow::Owned(Value::Bool(result))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemorySource, NoSource};
    use crate::tpl::expr::parse_expression;
    use crate::tpl::parser::parse_template;

    fn data() -> Value {
        let mut nested = Map::new();
        nested.insert("thing".into(), "100".into());
        let mut object = Map::new();
        object.insert("a".into(), "alpha".into());
        object.insert("b".into(), "beta".into());

        let mut map = Map::new();
        map.insert("number".into(), Value::Int(100));
        map.insert("nested".into(), Value::Map(nested));
        map.insert("array_like".into(), Value::from(vec!["alpha", "beta"]));
        map.insert("object_like".into(), Value::Map(object));
        Value::Map(map)
    }

    fn eval(expr: &str) -> Result<Value, TplError> {
        let root = data();
        let ctx = Context::new(&root);
        let filters = FilterTable::builtins();
        let options = RenderOptions::default();
        let renderer = Renderer {
            filters: &filters,
            source: &NoSource,
            options: &options,
        };
        let expr = parse_expression(expr)?;
        renderer.eval(&expr, &ctx).map(Cow::into_owned)
    }

    async fn render_with(
        tpl: &str,
        source: &dyn TemplateSource,
        options: &RenderOptions,
    ) -> Result<String, TplError> {
        let root = data();
        let ctx = Context::new(&root);
        let filters = FilterTable::builtins();
        let renderer = Renderer {
            filters: &filters,
            source,
            options,
        };
        let nodes = parse_template(tpl)?;
        renderer.render(&nodes, &ctx, Depth::default()).await
    }

    async fn render(tpl: &str) -> Result<String, TplError> {
        render_with(tpl, &NoSource, &RenderOptions::default()).await
    }

    #[test]
    fn test_eval_comparisons() {
        assert_eq!(eval("number == 100").unwrap(), Value::Bool(true));
        assert_eq!(eval("number != 100").unwrap(), Value::Bool(false));
        assert_eq!(eval("number >= 100").unwrap(), Value::Bool(true));
        assert_eq!(eval("number < 100.5").unwrap(), Value::Bool(true));
        assert_eq!(eval("nested.thing == 100").unwrap(), Value::Bool(false));
        assert_eq!(eval("nested.thing == '100'").unwrap(), Value::Bool(true));
        assert_eq!(eval("missing > 1").unwrap(), Value::Bool(false));
        assert_eq!(eval("missing <= 1").unwrap(), Value::Bool(false));
        assert_eq!(eval("missing == undefined").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_eval_logical() {
        assert_eq!(eval("!false && true").unwrap(), Value::Bool(true));
        assert_eq!(eval("true || false && false").unwrap(), Value::Bool(true));
        assert_eq!(eval("!array_like || missing").unwrap(), Value::Bool(false));
        // the right operand is not evaluated once the result is known
        assert_eq!(eval("true || x | nope").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_eval_missing_paths() {
        assert_eq!(eval("nested.not.defined").unwrap(), Value::Undefined);
        assert_eq!(eval("nested[\"not\"][\"defined\"]").unwrap(), Value::Undefined);
        assert_eq!(eval("array_like.5").unwrap(), Value::Undefined);
        assert_eq!(eval("array_like.1").unwrap(), Value::from("beta"));
    }

    #[test]
    fn test_unknown_filter() {
        let err = eval("number | nope").unwrap_err();
        assert!(matches!(err, TplError::Runtime(m) if m == "unknown filter: nope"));
    }

    #[tokio::test]
    async fn test_render_for_loops() {
        assert_eq!(
            render("{% for n in array_like %}{{ n }}__{% endfor %}").await.unwrap(),
            "alpha__beta__"
        );
        assert_eq!(
            render("{% for k in object_like %}{{ k }}{% endfor %}").await.unwrap(),
            "ab"
        );
        assert_eq!(
            render("{% for n in object_like | keys %}{{ n | upper }}{% endfor %}")
                .await
                .unwrap(),
            "AB"
        );
    }

    #[tokio::test]
    async fn test_loop_bindings_do_not_leak() {
        let out = render("{% for number in array_like %}{{ number }}{% endfor %}{{ number }}")
            .await
            .unwrap();
        assert_eq!(out, "alphabeta100");
    }

    #[tokio::test]
    async fn test_not_iterable() {
        let err = render("{% for n in nested.thing %}{% endfor %}").await.unwrap_err();
        assert!(matches!(err, TplError::Runtime(m) if m == "nested.thing is not iterable"));
        let err = render("{% for n in missing %}{% endfor %}").await.unwrap_err();
        assert!(matches!(err, TplError::Runtime(_)));
    }

    #[tokio::test]
    async fn test_comments() {
        assert_eq!(render("a{# hidden #}b").await.unwrap(), "ab");
        let options = RenderOptions::new().display_comments(true);
        assert_eq!(
            render_with("a{# shown #}b", &NoSource, &options).await.unwrap(),
            "a<!-- shown -->b"
        );
    }

    #[tokio::test]
    async fn test_import_inherits_context() {
        let source = MemorySource::from_assets(&[("views/num.html", "[{{ number }}]")]);
        let options = RenderOptions::new().import_directory("views");
        let out = render_with("a{{ import 'num.html' }}b", &source, &options)
            .await
            .unwrap();
        assert_eq!(out, "a[100]b");
    }

    #[tokio::test]
    async fn test_import_with_bindings_is_isolated() {
        let source = MemorySource::from_assets(&[(
            "card.html",
            "{{ title }}|{{ number }}|{{ first }}",
        )]);
        let out = render_with(
            "{{ import 'card.html' with { title: nested.thing, first: array_like | first } }}",
            &source,
            &RenderOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(out, "100||alpha");
    }

    #[tokio::test]
    async fn test_import_inside_loop_sees_loop_variable() {
        let source = MemorySource::from_assets(&[("item.html", "<{{ n }}>")]);
        let out = render_with(
            "{% for n in array_like %}{{ import 'item.html' }}{% endfor %}",
            &source,
            &RenderOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(out, "<alpha><beta>");
    }

    #[tokio::test]
    async fn test_missing_import() {
        let options = RenderOptions::new().import_directory("views/");
        let err = render_with("{{ import 'gone.html' }}", &NoSource, &options)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TplError::Runtime(m) if m == "imported file does not exist: views/gone.html"
        ));
    }

    #[tokio::test]
    async fn test_recursive_import_is_bounded() {
        let source = MemorySource::from_assets(&[("self.html", "x{{ import 'self.html' }}")]);
        let options = RenderOptions::new().max_import_depth(4);
        let err = render_with("{{ import 'self.html' }}", &source, &options)
            .await
            .unwrap_err();
        assert!(matches!(err, TplError::Runtime(m) if m.starts_with("maximum import depth")));
    }

    #[tokio::test]
    async fn test_nesting_limit_spans_imports() {
        let source = MemorySource::from_assets(&[
            ("leaf.html", "x"),
            ("branch.html", "{% if true %}x{% endif %}"),
        ]);
        let options = RenderOptions::new().max_nesting_depth(3);

        let out = render_with(
            "{% if true %}{% if true %}{{ import 'leaf.html' }}{% endif %}{% endif %}",
            &source,
            &options,
        )
        .await
        .unwrap();
        assert_eq!(out, "x");

        let err = render_with(
            "{% if true %}{% if true %}{{ import 'branch.html' }}{% endif %}{% endif %}",
            &source,
            &options,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TplError::Runtime(m) if m == "maximum nesting depth exceeded"));
    }

    #[tokio::test]
    async fn test_loop_bodies_count_as_nesting() {
        let options = RenderOptions::new().max_nesting_depth(1);
        assert_eq!(
            render_with("{% for n in array_like %}{{ n }}{% endfor %}", &NoSource, &options)
                .await
                .unwrap(),
            "alphabeta"
        );
        let err = render_with(
            "{% for n in array_like %}{% if n %}{{ n }}{% endif %}{% endfor %}",
            &NoSource,
            &options,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TplError::Runtime(_)));
    }
}
