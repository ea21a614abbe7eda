//! Prompt templates, one per analysis kind.
//!
//! Every prompt embeds the chunk's code and its serialized context, so
//! the same chunk always produces the same prompt.

use crate::models::{AnalysisKind, Chunk, Language};

/// Build the prompt for `kind` over `chunk`.
pub fn build_prompt(kind: AnalysisKind, chunk: &Chunk) -> String {
    let language = chunk.context.language;
    let context =
        serde_json::to_string(&chunk.context).unwrap_or_else(|_| chunk.context.file_name.clone());

    let mut prompt = String::new();
    prompt.push_str(&format!(
        "Analyze the following {} code and provide a detailed assessment.\n\n",
        language_label(language)
    ));
    prompt.push_str(&format!("Code context: {}\n", context));
    prompt.push_str(&format!("Code:\n```\n{}\n```\n\n", chunk.code));
    push_instructions(&mut prompt, kind, language);
    prompt
}

fn language_label(language: Language) -> &'static str {
    match language {
        Language::Python => "Python",
        Language::Javascript => "JavaScript",
        Language::Other => "source",
    }
}

fn push_instructions(prompt: &mut String, kind: AnalysisKind, language: Language) {
    match kind {
        AnalysisKind::Semantic => prompt.push_str(SEMANTIC_INSTRUCTIONS),
        AnalysisKind::Correctness => prompt.push_str(CORRECTNESS_INSTRUCTIONS),
        AnalysisKind::EdgeCases => prompt.push_str(EDGE_CASE_INSTRUCTIONS),
        AnalysisKind::TestCases => {
            let (header, format) = match language {
                Language::Python => (
                    "Generate comprehensive Python test cases:",
                    "Format the tests as Python code using pytest.",
                ),
                Language::Javascript => (
                    "Generate comprehensive JavaScript test cases:",
                    "Format the tests as JavaScript code using a modern testing framework like Jest or Mocha.",
                ),
                Language::Other => (
                    "Generate comprehensive test cases:",
                    "Format the tests appropriately for the language of the code.",
                ),
            };
            prompt.push_str(&format!("{}\n{}\n\n{}", header, TEST_CASE_CATEGORIES, format));
        }
    }
}

const SEMANTIC_INSTRUCTIONS: &str = r#"Analyze the code's semantic meaning and intent:
1. What is the primary purpose and goal of this code?
2. What are the key algorithms or patterns being used?
3. What assumptions is the code making about its inputs and environment?
4. What are the expected outputs and their formats?
5. Are there any implicit requirements or constraints?

Provide a detailed explanation of the code's semantic meaning and how it achieves its goals."#;

const CORRECTNESS_INSTRUCTIONS: &str = r#"Evaluate the code's correctness and potential issues:
1. Are there any logical flaws or incorrect assumptions?
2. Does the code handle all expected input cases correctly?
3. Are there any potential race conditions or concurrency issues?
4. Does the code properly validate inputs and handle errors?
5. Are there any security vulnerabilities or unsafe practices?

Provide a detailed assessment of the code's correctness and potential issues."#;

const EDGE_CASE_INSTRUCTIONS: &str = r#"Identify potential edge cases and boundary conditions:
1. What are the extreme or unusual input values that could cause issues?
2. How does the code handle empty or null inputs?
3. What happens with very large or very small values?
4. Are there any timing or resource constraints that could cause problems?
5. What happens in concurrent or parallel execution scenarios?

List all potential edge cases and explain how the code handles them."#;

const TEST_CASE_CATEGORIES: &str = r#"1. Normal use cases with typical inputs
2. Edge cases and boundary conditions
3. Error conditions and invalid inputs
4. Performance test cases
5. Security test cases"#;
