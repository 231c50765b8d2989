//! CLI module for slidesearch.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// slidesearch - semantic search over presentation slides
///
/// Converts presentations to slide images, describes every slide with a vision
/// model, indexes the descriptions and serves a search page for them.
#[derive(Parser, Debug)]
#[command(name = "slidesearch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check system requirements and configuration
    Doctor,

    /// Render every presentation into slide images
    Convert {
        /// Convert decks again even if their slides exist
        #[arg(short, long)]
        force: bool,
    },

    /// Describe slide images with the vision model
    Describe {
        /// Describe slides again even if a description exists
        #[arg(short, long)]
        force: bool,
    },

    /// Embed slide descriptions and store them in the index
    Upload {
        /// Re-index decks even if they look unchanged
        #[arg(short, long)]
        force: bool,
    },

    /// Convert, describe and upload in one go
    Ingest {
        /// Redo every step for every deck
        #[arg(short, long)]
        force: bool,
    },

    /// Search for slides matching a query
    Search {
        /// Search query
        query: String,

        /// Maximum number of results (default: search.n_results)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Minimum similarity score (0.0-1.0)
        #[arg(short, long)]
        min_score: Option<f32>,
    },

    /// Ask a question answered from the best matching slides
    Ask {
        /// The question to ask
        question: String,

        /// Number of slides to answer from (default: search.n_results)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// List indexed decks
    List,

    /// Start the web UI
    Serve {
        /// Host to bind to (default: server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (default: server.port)
        #[arg(short, long)]
        port: Option<u16>,
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

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from(["slidesearch", "-vv", "search", "revenue", "-n", "4"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Search { query, limit, min_score } => {
                assert_eq!(query, "revenue");
                assert_eq!(limit, Some(4));
                assert_eq!(min_score, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve_and_force() {
        let cli = Cli::try_parse_from(["slidesearch", "serve", "--port", "8080"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { host: None, port: Some(8080) }));

        let cli = Cli::try_parse_from(["slidesearch", "ingest", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::Ingest { force: true }));
    }
}
