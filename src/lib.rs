pub mod config;
pub mod data;
pub mod error;
pub mod source;
pub mod tpl;

pub use config::RenderOptions;
pub use data::serializer::to_value;
pub use data::value::{Map, Value};
pub use error::TplError;
pub use nano_tpl_macros::template_assets;
pub use source::{FsSource, MemorySource, NoSource, TemplateSource};
pub use tpl::engine::{Engine, remove_template, render, render_with_source};
pub use tpl::filters::{FilterFn, FilterTable};
pub use tpl::parser::{parse, parse_template};
pub use tpl::scanner::{Mark, MarkKind, scan};
