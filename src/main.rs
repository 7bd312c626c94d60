//! # TextGPT CLI (`textgpt`)
//!
//! ## Usage
//!
//! ```bash
//! textgpt --config ./config/textgpt.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `textgpt status` | Show the persisted index and its files |
//! | `textgpt upload <FILE>...` | Upload and process text files |
//! | `textgpt ask "<question>"` | Ask one question against the index |
//! | `textgpt chat` | Interactive conversation |
//! | `textgpt clear` | Remove all files and the index |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use textgpt::{app, chat, config};

/// TextGPT: chat with your text files.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/textgpt.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "textgpt",
    about = "TextGPT — chat with your text files",
    version,
    long_about = "TextGPT indexes uploaded plain-text files into a persistent vector index \
    and answers questions about them with a chat model, keeping track of the conversation \
    so follow-up questions are understood in context."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/textgpt.toml`; if that file does not exist,
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show whether an index exists, which model built it, and its files.
    Status {
        /// Output JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Upload plain-text files and rebuild the index.
    ///
    /// Re-uploading a file with identical content is detected and skipped.
    Upload {
        /// Files to upload (UTF-8 text).
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Ask a single question about the uploaded files.
    Ask {
        question: String,

        /// Output the answer, search query, and sources as JSON.
        #[arg(long)]
        json: bool,

        /// Print the chunks the answer was based on.
        #[arg(long)]
        show_sources: bool,
    },

    /// Start an interactive conversation.
    ///
    /// Type questions, or `/upload <path>`, `/clear`, `/history`, `/help`, `/quit`.
    Chat,

    /// Remove every uploaded file and the persisted index.
    Clear,
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    dotenvy::dotenv().ok();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Status { json } => app::run_status(&cfg, json).await?,
        Commands::Upload { files } => app::run_upload(&cfg, &files).await?,
        Commands::Ask {
            question,
            json,
            show_sources,
        } => app::run_ask(&cfg, &question, json, show_sources).await?,
        Commands::Chat => {
            let mut session = app::open_session(&cfg).await?;
            chat::run_chat(&mut session).await?;
        }
        Commands::Clear => app::run_clear(&cfg).await?,
    }

    Ok(())
}
