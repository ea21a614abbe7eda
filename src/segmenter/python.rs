//! Syntax-tree driven chunking for Python.

use crate::models::{Chunk, Construct, Language};
use tracing::debug;
use tree_sitter::{Node, Parser};

/// Compound statements searched for definitions. Function and class
/// bodies are not, so a nested definition is analyzed with its parent.
const COMPOUND_STATEMENTS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "else_clause",
    "try_statement",
    "except_clause",
    "except_group_clause",
    "finally_clause",
    "with_statement",
    "for_statement",
    "while_statement",
    "block",
];

/// A module-level function or class definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub source: String,
    pub construct: Option<Construct>,
}

/// Extract module-level definitions in document order, including those
/// guarded by `if`, `try`, `with` or loop statements.
///
/// Returns `None` when the parser cannot be set up or the tree contains
/// syntax errors, so the caller can fall back to line chunking.
pub fn extract_definitions(code: &str) -> Option<Vec<Definition>> {
    let grammar: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&grammar) {
        debug!("Failed to load Python grammar: {}", e);
        return None;
    }

    let tree = parser.parse(code, None)?;
    let root = tree.root_node();
    if root.has_error() {
        debug!("Python source has syntax errors");
        return None;
    }

    let mut definitions = Vec::new();
    collect_definitions(code, root, &mut definitions);

    Some(definitions)
}

fn collect_definitions(code: &str, node: Node, definitions: &mut Vec<Definition>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(definition) = definition_from_node(code, child) {
            definitions.push(definition);
        } else if COMPOUND_STATEMENTS.contains(&child.kind()) {
            collect_definitions(code, child, definitions);
        }
    }
}

fn definition_from_node(code: &str, node: Node) -> Option<Definition> {
    let target = match node.kind() {
        "function_definition" | "class_definition" => node,
        "decorated_definition" => node.child_by_field_name("definition")?,
        _ => return None,
    };

    let kind = match target.kind() {
        "function_definition" => "function",
        "class_definition" => "class",
        _ => return None,
    };

    let name = target
        .child_by_field_name("name")
        .and_then(|n| n.utf8_text(code.as_bytes()).ok())
        .map(str::to_string);

    Some(Definition {
        source: code[node.byte_range()].to_string(),
        construct: name.map(|name| Construct {
            name,
            kind: kind.to_string(),
        }),
    })
}

/// Pack definitions into chunks no longer than `max_chunk_size` characters.
///
/// A definition that is larger than the limit on its own becomes a chunk by itself.
pub fn pack_definitions(definitions: Vec<Definition>, max_chunk_size: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut buffer: Vec<Definition> = Vec::new();
    let mut buffer_len = 0usize;

    for definition in definitions {
        let len = definition.source.chars().count();
        let separator = usize::from(!buffer.is_empty());

        if !buffer.is_empty() && buffer_len + separator + len > max_chunk_size {
            chunks.push(flush(std::mem::take(&mut buffer)));
            buffer_len = 0;
        }

        buffer_len += usize::from(!buffer.is_empty()) + len;
        buffer.push(definition);
    }

    if !buffer.is_empty() {
        chunks.push(flush(buffer));
    }

    chunks
}

fn flush(buffer: Vec<Definition>) -> Chunk {
    // Only a lone definition names its chunk.
    let construct = match buffer.as_slice() {
        [only] => only.construct.clone(),
        _ => None,
    };

    let code = buffer
        .into_iter()
        .map(|d| d.source)
        .collect::<Vec<_>>()
        .join("\n");

    Chunk::new(code, Language::Python, construct)
}
