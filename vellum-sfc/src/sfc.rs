//! Compile entrypoints: component source in, generated Rust module out.

use std::path::Path;

use crate::codegen;
use crate::error::CompileError;
use crate::template_parse;

/// Compile a component source into a Rust module named `component_name`.
pub fn compile(source: &str, component_name: &str) -> Result<String, CompileError> {
    let nodes = template_parse::parse(source);
    log::debug!(
        "compiling `{component_name}`: {} root node(s)",
        nodes.len()
    );
    codegen::generate_module(&nodes, component_name)
}

/// Compile a component file; the component name is derived from the file
/// stem (`todo_list.vel` becomes `TodoList`). Intended for build scripts.
pub fn compile_file(path: &Path) -> Result<String, CompileError> {
    let source = std::fs::read_to_string(path)?;
    compile(&source, &component_name_from_path(path))
}

/// PascalCase component name from a file path.
pub fn component_name_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.split(|c: char| c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
