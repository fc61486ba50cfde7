use nano_tpl::{
    FilterTable, MemorySource, NoSource, RenderOptions, TplError, Value, parse, render,
    render_with_source, scan,
};
use serde_json::{Value as Json, json};

fn data() -> Json {
    json!({
        "number": 100,
        "nested": { "thing": "100" },
        "array_like": ["alpha", "beta"],
        "object_like": { "a": "alpha", "b": "beta" },
    })
}

fn methods() -> FilterTable {
    FilterTable::new()
        .with("upper", |v| Value::Str(v.to_string().to_uppercase()))
        .with("lower", |v| Value::Str(v.to_string().to_lowercase()))
        .with("first", |v| match v {
            Value::List(items) => items.into_iter().next().unwrap_or_default(),
            Value::Str(s) => s.chars().next().map_or(Value::Undefined, |c| c.to_string().into()),
            _ => Value::Undefined,
        })
        .with("repeat", |v| Value::Str(v.to_string().repeat(5)))
        .with("minus", |v| Value::Bool(v.strict_eq(&Value::Int(-10))))
        .with("length", |v| match v {
            Value::Str(s) => s.chars().count().into(),
            Value::List(items) => items.len().into(),
            _ => Value::Undefined,
        })
        .with("keys", |v| match v {
            Value::Map(map) => Value::List(map.into_keys().map(Value::Str).collect()),
            _ => Value::List(Vec::new()),
        })
        .with("type", |v| Value::from(v.type_name()))
}

async fn run(template: &str) -> Result<String, TplError> {
    render(template, &data(), &methods(), &RenderOptions::default()).await
}

#[tokio::test]
async fn test_render_cases() {
    let cases = [
        (r#"{{ nested.not.defined }}"#, ""),
        (r#"{{ "confusing ? : string ? " | length > 1 ? "a" : "b ? a: a" }}"#, "a"),
        (r#"{{ undefined_variable ? "a" : "b" }}"#, "b"),
        (r#"{{ !undefined_variable ? "a" : "b" }}"#, "a"),
        (r#"{{ !undefined_variable && number == 100 ? "a" : "b" }}"#, "a"),
        (r#"{{ array_like | first == "alpha" ? "a" : "b" }}"#, "a"),
        (r#"{{ array_like | first | lower == "alpha" ? "a" : "b" }}"#, "a"),
        (r#"{{ array_like | first != "alpha" ? "a" : "b" }}"#, "b"),
        (r#"{{ array_like ? "a" | repeat : "b" }}"#, "aaaaa"),
        (r#"{{ array_like || undefined_variable ? "a" | repeat : "b" }}"#, "aaaaa"),
        (r#"{{ !array_like || undefined_variable ? "a" | repeat : "b" }}"#, "b"),
        (r#"{{ object_like | keys | first == "a" ? 'yes' : 'no' }}"#, "yes"),
        (r#"{{ number == 100 ? "n == 100" | upper : 'no' }}"#, "N == 100"),
        (r#"{{ nested.thing }}"#, "100"),
        (r#"{{ nested.thing == "100" || nested.thing == "200" }}"#, "true"),
        (r#"{{ nested["thing"] }}"#, "100"),
        (r#"{{ nested["thing"] | type }}"#, "string"),
        (r#"{{ missing | type }}"#, "undefined"),
        (r#"{{ "i am a string" | type }}"#, "string"),
        (r#"{{ 200 | type }}"#, "number"),
        (r#"{{ 20.5 | type }}"#, "number"),
        (r#"{{ true | type }}"#, "boolean"),
        (r#"{{ false | type }}"#, "boolean"),
        (r#"{{ true ? 'yes' : 'no' }}"#, "yes"),
        (r#"{{ !true ? 'yes' : 'no' }}"#, "no"),
        (r#"{{ false ? 'yes' : 'no' }}"#, "no"),
        (r#"{{ !false ? 10 : 20 }}"#, "10"),
        (r#"{{ -10 | minus ? 'yes' | upper : 'no' }}"#, "YES"),
        (r#"{% for n in array_like %}{{ n }}__{% endfor %}"#, "alpha__beta__"),
        (r#"{% for n, i in array_like %}{{ i }}:{{ n }}{% endfor %}"#, "0:alpha1:beta"),
        (r#"{% for n in object_like %}{{ n }}{% endfor %}"#, "ab"),
        (r#"{% for k, v in object_like %}{{ k }}:{{ v }}{% endfor %}"#, "a:alphab:beta"),
        (r#"{% for n in object_like | keys %}{{ n | upper }}{% endfor %}"#, "AB"),
    ];

    for (input, expected) in cases {
        let out = run(input).await.unwrap_or_else(|e| panic!("{} failed: {}", input, e));
        assert_eq!(out, expected, "{}", input);
    }
}

#[tokio::test]
async fn test_quoted_separators_in_ternary() {
    let out = render(
        r#"{{ "a?b:c" == "a?b:c" ? "yes" : "no" }}"#,
        &json!({}),
        &FilterTable::new(),
        &RenderOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(out, "yes");
}

#[tokio::test]
async fn test_logical_precedence() {
    assert_eq!(run("{{ !false && true }}").await.unwrap(), "true");
    // A || (B && C)
    assert_eq!(run("{{ true || false && false }}").await.unwrap(), "true");
    assert_eq!(run("{{ false && true || true }}").await.unwrap(), "true");
    assert_eq!(run("{{ false || true && false }}").await.unwrap(), "false");
}

#[tokio::test]
async fn test_identity_on_plain_text() {
    for text in ["", "plain", "<p>a & b</p>", "50% off { not a tag } }}", "{ {x} }"] {
        assert_eq!(run(text).await.unwrap(), text);
    }
}

#[tokio::test]
async fn test_whitespace_is_stripped_outside_protected_spans() {
    let out = run("<div>\n\t{{ number }}\n</div><pre>\n  keep\n</pre>")
        .await
        .unwrap();
    assert_eq!(out, "<div>100</div><pre>\n  keep\n</pre>");
}

#[tokio::test]
async fn test_elseif_chain_matches_nested_form() {
    let chain = concat!(
        "{% if number > 200 %}big",
        "{% elseif number > 50 %}medium",
        "{% elseif number > 10 %}small",
        "{% else %}tiny{% endif %}",
    );
    let nested = concat!(
        "{% if number > 200 %}big{% else %}",
        "{% if number > 50 %}medium{% else %}",
        "{% if number > 10 %}small{% else %}tiny{% endif %}",
        "{% endif %}{% endif %}",
    );

    for number in [500, 100, 20, 1] {
        let data = json!({ "number": number });
        let filters = FilterTable::new();
        let options = RenderOptions::default();
        let a = render(chain, &data, &filters, &options).await.unwrap();
        let b = render(nested, &data, &filters, &options).await.unwrap();
        assert_eq!(a, b, "number = {}", number);
    }
}

#[tokio::test]
async fn test_syntax_errors() {
    assert!(matches!(
        scan("{% if a %}"),
        Err(TplError::Syntax(m)) if m.contains("missing end tag")
    ));
    assert!(matches!(
        scan("{% endif %}"),
        Err(TplError::Syntax(m)) if m.contains("redundant end tag")
    ));

    let marks = scan(r#"{{ a.b["c"] }}"#).unwrap();
    assert!(matches!(parse(marks), Err(TplError::Syntax(_))));

    assert!(matches!(run("{{ number + 1 }}").await, Err(TplError::Syntax(_))));
    assert!(matches!(run("{% while x %}{% endwhile %}").await, Err(TplError::Syntax(_))));
}

#[tokio::test]
async fn test_runtime_errors() {
    let err = run("{{ number | nope }}").await.unwrap_err();
    assert!(matches!(err, TplError::Runtime(m) if m == "unknown filter: nope"));

    let err = run("{% for x in number %}{% endfor %}").await.unwrap_err();
    assert!(matches!(err, TplError::Runtime(m) if m.ends_with("is not iterable")));

    let err = render("{{ import 'nope.html' }}", &data(), &methods(), &RenderOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TplError::Runtime(m) if m == "imported file does not exist: nope.html"));
}

#[tokio::test]
async fn test_display_comments() {
    let options = RenderOptions::new().display_comments(true);
    let out = render("a{# note\n  here #}b", &data(), &methods(), &options)
        .await
        .unwrap();
    assert_eq!(out, "a<!-- note\n  here -->b");
    assert_eq!(run("a{# note #}b").await.unwrap(), "ab");
}

#[tokio::test]
async fn test_imports_from_memory() {
    let source = MemorySource::from_assets(&[
        (
            "views/list.html",
            "{% for n in array_like %}{{ import 'entry.html' with { name: n | upper } }}{% endfor %}",
        ),
        ("views/entry.html", "[{{ name }}{{ number }}]"),
        ("views/shared.html", "({{ number }})"),
    ]);
    let options = RenderOptions::new().import_directory("views");

    let out = render_with_source(
        "{{ import 'list.html' }}",
        &data(),
        &methods(),
        &options,
        &source,
    )
    .await
    .unwrap();
    assert_eq!(out, "[ALPHA][BETA]");

    let out = render_with_source(
        "{{ import 'shared.html' }}",
        &data(),
        &methods(),
        &options,
        &source,
    )
    .await
    .unwrap();
    assert_eq!(out, "(100)");
}

#[tokio::test]
async fn test_import_depth_limit() {
    let source = MemorySource::from_assets(&[
        ("a.html", "{{ import 'b.html' }}"),
        ("b.html", "{{ import 'a.html' }}"),
    ]);
    let err = render_with_source(
        "{{ import 'a.html' }}",
        &data(),
        &methods(),
        &RenderOptions::default(),
        &source,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, TplError::Runtime(m) if m.starts_with("maximum import depth exceeded")));

    let err = render_with_source(
        "{{ import 'a.html' }}",
        &data(),
        &methods(),
        &RenderOptions::new().max_import_depth(0),
        &NoSource,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, TplError::Runtime(m) if m == "maximum import depth exceeded: a.html"));
}

#[tokio::test]
async fn test_imports_from_filesystem() {
    let dir = std::env::temp_dir().join(format!("nano_tpl_render_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("header.html"), "<h1>{{ title }}</h1>").unwrap();

    let options = RenderOptions::new().import_directory(dir.to_string_lossy());
    let out = render(
        "{{ import 'header.html' with { title: nested.thing } }}<p/>",
        &data(),
        &methods(),
        &options,
    )
    .await
    .unwrap();
    assert_eq!(out, "<h1>100</h1><p/>");

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_deep_nesting_is_an_error() {
    let nested = |n: usize| format!("{}x{}", "{% if a %}".repeat(n), "{% endif %}".repeat(n));
    let data = json!({ "a": true });
    let filters = FilterTable::new();
    let options = RenderOptions::default();

    let out = render(&nested(100), &data, &filters, &options).await.unwrap();
    assert_eq!(out, "x");

    let err = render(&nested(500), &data, &filters, &options).await.unwrap_err();
    assert!(matches!(err, TplError::Syntax(m) if m == "maximum nesting depth exceeded"));

    let nots = format!("{{{{ {}a }}}}", "!".repeat(2000));
    let err = render(&nots, &data, &filters, &options).await.unwrap_err();
    assert!(matches!(err, TplError::Syntax(m) if m == "maximum nesting depth exceeded"));
}
