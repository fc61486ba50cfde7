use glob::glob;
use proc_macro::TokenStream;
use quote::quote;
use std::env;
use std::path::{Path, PathBuf};
use syn::{LitStr, parse_macro_input};

/// 在编译期嵌入模板文件。
///
/// `template_assets!("templates/**/*.html")` 展开为 `&[(&str, &str)]`：
/// 路径相对于 crate 根目录（`/` 分隔），内容通过 `include_str!` 加载，
/// 运行时无需访问文件系统。
#[proc_macro]
pub fn template_assets(input: TokenStream) -> TokenStream {
    let pattern = parse_macro_input!(input as LitStr);
    match expand(&pattern) {
        Ok(ts) => ts.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand(pattern: &LitStr) -> syn::Result<proc_macro2::TokenStream> {
    // CARGO_MANIFEST_DIR 由 Cargo 在编译时设置，指向调用方的 Cargo.toml 所在目录
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").map_err(|_| {
        syn::Error::new(
            pattern.span(),
            "编译环境异常：未设置 CARGO_MANIFEST_DIR 环境变量",
        )
    })?;
    let root = PathBuf::from(manifest_dir);
    let full_pattern = root.join(pattern.value());

    let paths = glob(&full_pattern.to_string_lossy())
        .map_err(|e| syn::Error::new(pattern.span(), format!("无效的 glob 模式: {}", e)))?;

    let mut files: Vec<PathBuf> = paths
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    let assets = files.iter().map(|file| {
        let key = relative_key(&root, file);
        let abs = file.to_string_lossy().to_string();
        quote! { (#key, include_str!(#abs)) }
    });

    Ok(quote! {
        &[ #(#assets),* ] as &[(&str, &str)]
    })
}

fn relative_key(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
