//! CLI interface for the resume pipeline.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "resume-pipeline")]
#[command(about = "Resume standardization and treatment pipeline for a correspondence study")]
#[command(long_about = "Sends resumes to an LLM with engineered prompts, stores the \
structured replies in a shared document store, derives analytics, generates treatment \
variants, and exports formatted PDFs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Maximum items processed concurrently
    #[arg(long, global = true, default_value_t = 4)]
    pub concurrency: usize,

    /// Per-item timeout in seconds
    #[arg(long, global = true, default_value_t = 300)]
    pub item_timeout: u64,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a folder of resumes into standardized records
    Parse {
        /// Folder of PDF/DOCX resumes
        #[arg(short, long, default_value = "resume_inputs")]
        input_dir: PathBuf,

        /// Parsing prompt template (markdown with one fenced block)
        #[arg(long, default_value = "prompts/resume_parsing.md")]
        prompt: PathBuf,

        /// Where successfully processed files are moved
        #[arg(long, default_value = "data/processed")]
        processed_dir: PathBuf,

        /// Where raw LLM replies are kept for inspection
        #[arg(long, default_value = "data/text_output")]
        raw_output_dir: PathBuf,

        /// Leave inputs in place after success
        #[arg(long)]
        keep_inputs: bool,
    },

    /// Derive key metrics (EDA) for stored records
    Eda {
        /// Specific documents; default is every document without metrics
        #[arg(long = "file-id")]
        file_id: Vec<String>,

        #[arg(long, default_value = "prompts/eda_metrics.md")]
        prompt: PathBuf,

        /// Re-run documents that already have metrics
        #[arg(long)]
        force: bool,
    },

    /// Run the validation agent over stored records
    Validate {
        #[arg(long = "file-id")]
        file_id: Vec<String>,

        #[arg(long, default_value = "prompts/validation.md")]
        prompt: PathBuf,

        #[arg(long)]
        force: bool,
    },

    /// Generate treatment variants for a sector's control resumes
    Treat {
        /// Industry prefix as stored in the collection (e.g. ITC)
        #[arg(long)]
        sector: String,

        /// Specific documents; default is every document in the sector
        #[arg(long = "file-id")]
        file_id: Vec<String>,

        /// Treatment pools JSON (education and work entries per sector)
        #[arg(long, default_value = "data/treatments.json")]
        treatments: PathBuf,

        #[arg(long, default_value = "prompts/treatment_generation.md")]
        prompt: PathBuf,

        #[arg(long, default_value = "prompts/control_refiner.md")]
        refiner_prompt: PathBuf,

        #[arg(long, default_value = "prompts/company_research.md")]
        research_prompt: PathBuf,
    },

    /// Embed stored records through the embedding cache
    Embed {
        #[arg(long = "file-id")]
        file_id: Vec<String>,

        /// Re-embed documents that already have a vector
        #[arg(long)]
        force: bool,
    },

    /// Export stored records as formatted PDFs via the resumed toolchain
    Export {
        #[arg(long, default_value = "data/exports")]
        output_dir: PathBuf,

        /// JSON-Resume theme passed to resumed
        #[arg(long, default_value = "jsonresume-theme-even")]
        theme: String,

        #[arg(long = "file-id")]
        file_id: Vec<String>,

        /// Export treated variants instead of standardized records
        #[arg(long)]
        treated: bool,
    },

    /// Show embedding cache statistics
    CacheStats,
}
