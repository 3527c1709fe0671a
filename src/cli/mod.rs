//! CLI command definitions and parsing
use crate::document::Chunk;
use clap::{Parser, Subcommand};
use std::fmt::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "syllabot",
    version,
    about = "Course syllabus assistant: ask questions about a PDF syllabus",
    long_about = "Syllabot indexes a course syllabus PDF into a persisted vector index and answers \
                  questions about it with a generative model, citing the pages it used."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/syllabot/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Syllabus PDF to answer from (overrides document.path)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub document: Option<PathBuf>,

    /// Directory of the persisted index (overrides index.persist_dir)
    #[arg(short, long, global = true, value_name = "DIR")]
    pub persist_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a single question
    Ask {
        /// Question to ask
        question: String,

        /// Number of passages to retrieve (overrides retrieval.k)
        #[arg(short = 'k', long)]
        k: Option<usize>,

        /// Print the answer and sources as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask questions interactively
    Chat {
        /// Write the session transcript to this file after every answer
        #[arg(short, long, value_name = "FILE")]
        transcript: Option<PathBuf>,
    },

    /// Build the index, or load it if it already exists, and show its manifest
    Index {
        /// Delete the persisted index first and rebuild it
        #[arg(long)]
        rebuild: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Citation header for the `index`-th (1-based) source passage
pub fn citation_line(index: usize, chunk: &Chunk) -> String {
    format!(
        "第 {} 段（第 {} 頁） - {}",
        index,
        chunk.page(),
        chunk.source()
    )
}

/// The answer followed by every cited passage
pub fn render_answer(answer: &str, sources: &[Chunk]) -> String {
    let mut out = String::new();
    out.push_str(answer.trim_end());
    out.push('\n');

    if !sources.is_empty() {
        out.push_str("\n參考來源段落：\n");
        for (i, chunk) in sources.iter().enumerate() {
            let _ = writeln!(out, "\n{}", citation_line(i + 1, chunk));
            let _ = writeln!(out, "{}", chunk.text.trim_end());
        }
    }

    out
}
