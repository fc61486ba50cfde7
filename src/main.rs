use nano_tpl::{Engine, FilterTable, MemorySource, RenderOptions, Value};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Serialize, Debug)]
struct Item<'a> {
    name: &'a str,
    price: f64,
    tags: Vec<&'a str>,
}

#[derive(Serialize, Debug)]
struct Page<'a> {
    title: &'a str,
    user: Option<&'a str>,
    items: Vec<Item<'a>>,
}

const PAGE: &str = r#"<h1>{{ title | upper }}</h1>
{% if user %}<p>welcome, {{ user }}</p>{% else %}<p>please sign in</p>{% endif %}
<ul>
{% for item, i in items %}
    {{ import 'item.html' with { index: i, item: item } }}
{% endfor %}
</ul>
{# rendered by nano-tpl #}"#;

const ITEM: &str = r#"<li>{{ index }}. {{ item.name }}
({{ item.price >= 10 ? "premium" : "basic" }}, {{ item.tags | length }} tags)</li>"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    fmt().with_env_filter(filter).init();

    let source = MemorySource::from_assets(&[("partials/item.html", ITEM)]);
    let filters = FilterTable::builtins().with("money", |v| match v.as_f64() {
        Some(n) => Value::Str(format!("{:.2}", n)),
        None => v,
    });
    let engine = Engine::new()
        .filters(filters)
        .source(source)
        .options(
            RenderOptions::new()
                .import_directory("partials")
                .display_comments(true),
        );

    let page = Page {
        title: "catalog",
        user: Some("jason"),
        items: vec![
            Item {
                name: "pen",
                price: 2.5,
                tags: vec!["office"],
            },
            Item {
                name: "lamp",
                price: 19.0,
                tags: vec!["home", "light"],
            },
        ],
    };

    let html = engine.render(PAGE, &page).await?;
    println!("{}", html);

    let total = engine
        .render_value("total: {{ sum | money }}", &totals(&page))
        .await?;
    println!("{}", total);
    Ok(())
}

fn totals(page: &Page<'_>) -> Value {
    let mut map = nano_tpl::Map::new();
    let sum = page.items.iter().map(|i| i.price).sum();
    map.insert("sum".into(), Value::Float(sum));
    Value::Map(map)
}
