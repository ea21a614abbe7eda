//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{AnalysisMode, Language};
use clap::Parser;
use std::path::{Path, PathBuf};

/// CodeSage - LLM-powered semantic analysis of source code
///
/// Splits each source file into chunks, asks a local model for semantic,
/// correctness, edge-case and test-case analyses of every chunk, and
/// merges the answers into a Markdown or JSON report.
///
/// Examples:
///   codesage src/app.py
///   codesage lib.js --mode deep --model qwen2.5-coder:7b
///   cat snippet.py | codesage --language python --format json -o -
///   codesage big.py --dry-run
///   codesage --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Source files to analyze
    ///
    /// Each file is submitted as its own job. Reads stdin when no file
    /// is given or the file is `-`.
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Language of the submitted code
    ///
    /// Inferred from the file extension when omitted; defaults to python.
    #[arg(short, long, value_name = "LANG")]
    pub language: Option<Language>,

    /// Analysis mode
    ///
    /// quick uses larger chunks and a single retry, deep uses smaller
    /// chunks and more retries.
    #[arg(long, default_value = "full", value_name = "MODE")]
    pub mode: AnalysisMode,

    /// Ollama model to use for analysis
    ///
    /// Can also be set via CODESAGE_MODEL env var or .codesage.toml config.
    #[arg(short, long, env = "CODESAGE_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Output file path for the report (`-` for stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Number of chunks analyzed concurrently per job
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Number of jobs run at the same time
    #[arg(long, value_name = "NUM")]
    pub max_jobs: Option<usize>,

    /// Maximum chunk size in characters
    #[arg(long, value_name = "CHARS")]
    pub max_chunk_size: Option<usize>,

    /// Retries per model call after the first failed attempt
    #[arg(long, value_name = "NUM")]
    pub retries: Option<u32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .codesage.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: segment the input without calling the LLM
    ///
    /// Shows the chunks that would be analyzed and exits.
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .codesage.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.max_jobs == Some(0) {
            return Err("Max jobs must be at least 1".to_string());
        }

        if self.max_chunk_size == Some(0) {
            return Err("Max chunk size must be at least 1 character".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.files.iter().filter(|f| is_std_stream(f)).count() > 1 {
            return Err("Standard input can only be read once".to_string());
        }

        for file in self.files.iter().filter(|f| !is_std_stream(f)) {
            if !file.is_file() {
                return Err(format!("Input file does not exist: {}", file.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Inputs to analyze; stdin is represented by `-`.
    pub fn inputs(&self) -> Vec<PathBuf> {
        if self.files.is_empty() {
            vec![PathBuf::from("-")]
        } else {
            self.files.clone()
        }
    }

    /// Language for an input: explicit flag, then extension, then python.
    pub fn language_for(&self, input: &Path) -> Language {
        self.language
            .or_else(|| Language::from_path(input))
            .unwrap_or_default()
    }
}

/// Whether a path is `-`, standing for stdin or stdout.
pub fn is_std_stream(path: &Path) -> bool {
    path.as_os_str() == "-"
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_args() -> Args {
        Args {
            files: Vec::new(),
            language: None,
            mode: AnalysisMode::Full,
            model: None,
            ollama_url: None,
            temperature: None,
            output: None,
            format: OutputFormat::Markdown,
            concurrency: None,
            max_jobs: None,
            max_chunk_size: None,
            retries: None,
            timeout: None,
            config: None,
            verbose: false,
            quiet: false,
            dry_run: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::parse_from([
            "codesage",
            "a.js",
            "--mode",
            "deep",
            "--language",
            "javascript",
            "--format",
            "json",
            "--retries",
            "5",
        ]);
        assert_eq!(args.files, vec![PathBuf::from("a.js")]);
        assert_eq!(args.mode, AnalysisMode::Deep);
        assert_eq!(args.language, Some(Language::Javascript));
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.retries, Some(5));
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.ollama_url = Some("localhost:11434".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_limits() {
        let mut args = make_args();
        args.max_chunk_size = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.concurrency = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_file() {
        let mut args = make_args();
        args.files = vec![PathBuf::from("/definitely/not/here.py")];
        assert!(args.validate().is_err());

        args.files = vec![PathBuf::from("-"), PathBuf::from("-")];
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_inputs_default_to_stdin() {
        let args = make_args();
        assert_eq!(args.inputs(), vec![PathBuf::from("-")]);
        assert!(is_std_stream(&args.inputs()[0]));
    }

    #[test]
    fn test_language_resolution() {
        let mut args = make_args();
        assert_eq!(args.language_for(Path::new("x.js")), Language::Javascript);
        assert_eq!(args.language_for(Path::new("-")), Language::Python);

        args.language = Some(Language::Other);
        assert_eq!(args.language_for(Path::new("x.js")), Language::Other);
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
