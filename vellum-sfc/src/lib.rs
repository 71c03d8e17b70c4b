//! vellum-sfc: compiles single-file components (markup plus a restricted
//! Rust script) into Rust modules targeting the vellum fragment runtime.

pub mod analysis;
pub mod codegen;
pub mod error;
pub mod sfc;
pub mod template_ast;
pub mod template_parse;

pub use error::CompileError;
pub use sfc::{compile, compile_file, component_name_from_path};
pub use template_parse::parse;
