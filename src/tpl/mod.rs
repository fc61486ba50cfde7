pub mod ast;
pub mod cache;
pub mod engine;
pub mod expr;
pub mod filters;
pub mod parser;
pub(crate) mod render;
pub mod render_context;
pub mod scanner;
