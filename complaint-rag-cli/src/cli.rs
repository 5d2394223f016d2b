//! Command-line definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "complaint-rag")]
#[command(about = "Ask questions about consumer complaint narratives", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// JSON configuration file; missing fields take their defaults
    #[arg(short, long, global = true, env = "COMPLAINT_RAG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Chunk, embed and index complaint records
    Ingest {
        /// Records as JSON Lines, one complaint per line
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the index snapshot
        #[arg(long)]
        index: PathBuf,

        #[arg(short, long, value_enum, default_value_t = EmbedderKind::HuggingFace)]
        embedder: EmbedderKind,

        /// Normalize narratives (lower-case, strip boilerplate and punctuation)
        #[arg(long)]
        clean: bool,

        /// Keep every product instead of the default five
        #[arg(long)]
        all_products: bool,
    },

    /// Answer one question from an index
    Ask {
        /// Index snapshot written by `ingest`
        #[arg(long)]
        index: PathBuf,

        /// Must match the embedder used at ingestion
        #[arg(short, long, value_enum, default_value_t = EmbedderKind::HuggingFace)]
        embedder: EmbedderKind,

        /// Number of sources to retrieve (defaults to the configured top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        question: String,
    },

    /// Run the evaluation questions and print a markdown table
    Eval {
        /// Index snapshot written by `ingest`
        #[arg(long)]
        index: PathBuf,

        /// Must match the embedder used at ingestion
        #[arg(short, long, value_enum, default_value_t = EmbedderKind::HuggingFace)]
        embedder: EmbedderKind,
    },
}

/// Embedding backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// Local feature hashing, no network access
    Hashing,
    /// Hugging Face Inference API (reads HF_TOKEN)
    #[value(name = "huggingface")]
    HuggingFace,
}
