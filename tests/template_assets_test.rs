use nano_tpl::{Engine, MemorySource, template_assets};
use serde_json::json;

static ASSETS: &[(&str, &str)] = template_assets!("tests/templates/**/*.html");

#[test]
fn test_assets_are_embedded() {
    let paths: Vec<&str> = ASSETS.iter().map(|(path, _)| *path).collect();
    assert!(paths.contains(&"tests/templates/layout.html"));
    assert!(paths.contains(&"tests/templates/partials/nav.html"));

    let (_, layout) = ASSETS
        .iter()
        .find(|(path, _)| *path == "tests/templates/layout.html")
        .unwrap();
    assert!(layout.contains("<main>{{ content }}</main>"));
}

#[test]
fn test_unmatched_pattern_is_empty() {
    let none: &[(&str, &str)] = template_assets!("tests/templates/**/*.nothing");
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_render_embedded_templates() {
    let engine = Engine::new().source(MemorySource::from_assets(ASSETS));
    let out = engine
        .render_file(
            "tests/templates/layout.html",
            &json!({ "content": "hello", "links": ["home", "about"] }),
        )
        .await
        .unwrap();
    assert_eq!(
        out,
        "<html><body><nav><a>HOME</a><a>ABOUT</a></nav><main>hello</main></body></html>"
    );
}
