use captioneer::config::ProviderKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "captioneer")]
#[command(author, version, about = "AI caption and tag generation for image folders")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the image catalog (defaults to the config file's directory)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a folder: discover its images and caption them
    Scan {
        /// Folder to scan recursively
        #[arg(required = true)]
        folder: PathBuf,
    },

    /// Generate a fresh caption for one image
    Regenerate {
        /// Image file
        #[arg(required = true)]
        path: PathBuf,
    },

    /// Finish captioning images left pending by an interrupted run
    Resume,

    /// List catalog images
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List folders present in the catalog
    Folders,

    /// Remove a folder's images from the catalog
    RemoveFolder {
        /// Folder to remove
        #[arg(required = true)]
        folder: PathBuf,
    },

    /// List models offered by the configured provider
    Models,

    /// Change provider settings and save them to the config file
    Configure {
        /// Provider backend (openai or ollama)
        #[arg(long)]
        provider: Option<ProviderKind>,

        /// Provider base URL
        #[arg(long)]
        base_url: Option<String>,

        /// API key (openai only)
        #[arg(long)]
        api_key: Option<String>,

        /// Model name
        #[arg(long)]
        model: Option<String>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show configuration and catalog status
    Status,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
