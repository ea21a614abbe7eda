//! Comment and blank-line stripping ahead of segmentation.
//!
//! Sanitized text is only used to decide chunk boundaries and to
//! keep comments from eating into the chunk budget.

use crate::models::Language;
use regex::Regex;
use std::sync::LazyLock;

static HASH_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)#.*$").expect("valid regex"));
static TRIPLE_DOUBLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)""".*?""""#).expect("valid regex"));
static TRIPLE_SINGLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)'''.*?'''").expect("valid regex"));
static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)//.*$").expect("valid regex"));
static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));

/// Strip comments for the given language and collapse blank-line runs.
pub fn sanitize(code: &str, language: Language) -> String {
    let stripped = match language {
        Language::Python => {
            let code = HASH_COMMENT.replace_all(code, "");
            let code = TRIPLE_DOUBLE.replace_all(&code, "");
            TRIPLE_SINGLE.replace_all(&code, "").into_owned()
        }
        Language::Javascript => {
            // Block comments first so a `//` inside one cannot swallow its terminator.
            let code = BLOCK_COMMENT.replace_all(code, "");
            LINE_COMMENT.replace_all(&code, "").into_owned()
        }
        Language::Other => code.to_string(),
    };

    collapse_blank_lines(&stripped).trim().to_string()
}

/// Replace every run of blank (or whitespace-only) lines with a single newline.
fn collapse_blank_lines(code: &str) -> String {
    BLANK_RUN.replace_all(code, "\n").into_owned()
}
