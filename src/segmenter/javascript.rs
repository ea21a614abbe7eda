//! Pattern-based chunking for JavaScript.
//!
//! Declarations are found with regular expressions anchored at the start
//! of a line; their bodies are delimited by a brace-balancing scan that
//! understands string literals but nothing else. This is an approximation,
//! not a parser.

use crate::models::{Chunk, Construct, Language};
use regex::Regex;
use std::sync::LazyLock;

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?m)^(?:",
        r"(?:export\s+(?:default\s+)?)?(?:async\s+)?function\s*\*?\s*(?P<function>[A-Za-z_$][\w$]*)\s*\(",
        r"|(?:export\s+)?(?:const|let|var)\s+(?P<arrow>[A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*=>",
        r"|(?:export\s+(?:default\s+)?)?class\s+(?P<class>[A-Za-z_$][\w$]*)(?:\s+extends\s+[\w$.]+)?\s*\{",
        r")"
    ))
    .expect("valid regex")
});

/// Split JavaScript into one chunk per top-level declaration.
///
/// Returns `None` when no declaration matched.
pub fn chunk_declarations(code: &str) -> Option<Vec<Chunk>> {
    let mut chunks = Vec::new();
    let mut consumed = 0usize;

    for caps in DECLARATION.captures_iter(code) {
        let Some(head) = caps.get(0) else {
            continue;
        };
        if head.start() < consumed {
            continue;
        }

        let (construct, end) = if let Some(name) = caps.name("function") {
            // Skip the parameter list; destructured parameters and object
            // defaults carry braces of their own.
            let params_end = balanced_end(code, head.end() - 1, false);
            (construct(name.as_str(), "function"), block_end(code, params_end))
        } else if let Some(name) = caps.name("class") {
            // The class head already includes its opening brace.
            (construct(name.as_str(), "class"), block_end(code, head.end() - 1))
        } else if let Some(name) = caps.name("arrow") {
            (construct(name.as_str(), "arrow_function"), arrow_end(code, head.end()))
        } else {
            continue;
        };

        let region = code[head.start()..end].trim_end();
        chunks.push(Chunk::new(region.to_string(), Language::Javascript, Some(construct)));
        consumed = end;
    }

    if chunks.is_empty() {
        None
    } else {
        Some(chunks)
    }
}

fn construct(name: &str, kind: &str) -> Construct {
    Construct {
        name: name.to_string(),
        kind: kind.to_string(),
    }
}

/// End of the brace block that opens at or after `from`.
fn block_end(code: &str, from: usize) -> usize {
    match code[from..].find('{') {
        Some(offset) => balanced_end(code, from + offset, false),
        None => code.len(),
    }
}

/// End of an arrow function body starting after its `=>`.
fn arrow_end(code: &str, from: usize) -> usize {
    let rest = &code[from..];
    let body_start = from + (rest.len() - rest.trim_start().len());

    if code[body_start..].starts_with('{') {
        let end = balanced_end(code, body_start, false);
        // Swallow the statement terminator after the block.
        return match code[end..].chars().next() {
            Some(';') => end + 1,
            _ => end,
        };
    }

    balanced_end(code, body_start, true)
}

/// Scan from `start` tracking bracket depth and string literals.
///
/// With `expression` set, the scan stops after a `;` or newline at depth
/// zero; otherwise it stops after the bracket that returns depth to zero.
/// Unterminated regions run to the end of the text.
fn balanced_end(code: &str, start: usize, expression: bool) -> usize {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, ch) in code[start..].char_indices() {
        let index = start + offset;

        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && !expression {
                    return index + ch.len_utf8();
                }
            }
            ';' if expression && depth == 0 => return index + 1,
            '\n' if expression && depth == 0 => return index,
            _ => {}
        }
    }

    code.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(chunks: &[Chunk]) -> Vec<String> {
        chunks
            .iter()
            .map(|c| c.context.construct.as_ref().unwrap().name.clone())
            .collect()
    }

    #[test]
    fn test_function_declarations() {
        let code = "function add(a, b) {\n  if (a) { return a + b; }\n  return b;\n}\nfunction sub(a, b) {\n  return a - b;\n}";
        let chunks = chunk_declarations(code).unwrap();
        assert_eq!(names(&chunks), vec!["add", "sub"]);
        assert_eq!(
            chunks[0].code,
            "function add(a, b) {\n  if (a) { return a + b; }\n  return b;\n}"
        );
        assert_eq!(chunks[0].context.total_lines, 4);
    }

    #[test]
    fn test_arrow_functions() {
        let code = "const inc = (x) => x + 1;\nconst run = async () => {\n  await go();\n};\nlet id = v => v";
        let chunks = chunk_declarations(code).unwrap();
        assert_eq!(names(&chunks), vec!["inc", "run", "id"]);
        assert_eq!(chunks[0].code, "const inc = (x) => x + 1;");
        assert_eq!(chunks[1].code, "const run = async () => {\n  await go();\n};");
        assert_eq!(chunks[2].code, "let id = v => v");
        assert_eq!(chunks[1].context.construct.as_ref().unwrap().kind, "arrow_function");
    }

    #[test]
    fn test_class_with_methods_is_one_region() {
        let code = "class Stack extends Base {\n  push(v) { this.items.push(v); }\n  pop() { return this.items.pop(); }\n}\nexport function helper() { return '}'; }";
        let chunks = chunk_declarations(code).unwrap();
        assert_eq!(names(&chunks), vec!["Stack", "helper"]);
        assert!(chunks[0].code.ends_with("pop(); }\n}"));
        assert_eq!(chunks[1].code, "export function helper() { return '}'; }");
    }

    #[test]
    fn test_braces_in_parameters_stay_with_the_function() {
        let code = "function App({ title }) {\n  return title.toUpperCase();\n}\nfunction draw(opts = {}, [x, y] = [0, 0]) {\n  return opts.scale * x;\n}\nfunction other() { return 1; }";
        let chunks = chunk_declarations(code).unwrap();
        assert_eq!(names(&chunks), vec!["App", "draw", "other"]);
        assert_eq!(
            chunks[0].code,
            "function App({ title }) {\n  return title.toUpperCase();\n}"
        );
        assert_eq!(
            chunks[1].code,
            "function draw(opts = {}, [x, y] = [0, 0]) {\n  return opts.scale * x;\n}"
        );
        assert_eq!(chunks[2].code, "function other() { return 1; }");
    }

    #[test]
    fn test_no_declarations() {
        assert!(chunk_declarations("console.log('hi');\nlet x = 1;").is_none());
        assert!(chunk_declarations("").is_none());
    }

    #[test]
    fn test_unterminated_block_runs_to_end() {
        let code = "function broken() {\n  return 1;";
        let chunks = chunk_declarations(code).unwrap();
        assert_eq!(chunks[0].code, code);
    }
}
