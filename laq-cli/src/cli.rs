use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Upload, search and chat with Legislative Assembly Question PDFs.
#[derive(Parser, Debug)]
#[command(name = "laq", version, about)]
pub struct Cli {
    /// Directory holding the vector database
    #[arg(long, global = true, env = "LAQ_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Collection records are stored in
    #[arg(long, global = true, env = "LAQ_COLLECTION")]
    pub collection: Option<String>,

    /// Base URL of the Ollama server
    #[arg(long, global = true, env = "LAQ_OLLAMA_HOST")]
    pub ollama_host: Option<String>,

    /// Log debug output to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract Q&A pairs from a PDF and store them
    Upload {
        path: PathBuf,
        /// Store without asking for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Show the stored pairs most relevant to a query
    Search {
        query: String,
        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Answer a question from the stored pairs
    Chat { query: String },
    /// Show database statistics and settings
    Info,
    /// Delete every stored pair
    Clear {
        /// Clear without asking for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Interactive menu (the default)
    Shell,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn shell_is_default() {
        let cli = Cli::try_parse_from(["laq"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_search_with_global_flags() {
        let cli = Cli::try_parse_from(["laq", "search", "jetty tenders", "-k", "3", "--collection", "test"])
            .unwrap();
        assert_eq!(cli.collection.as_deref(), Some("test"));
        match cli.command {
            Some(Command::Search { query, top_k }) => {
                assert_eq!(query, "jetty tenders");
                assert_eq!(top_k, Some(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
