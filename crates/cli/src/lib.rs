pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use homecat_core::config::{ConfigOverrides, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "homecat",
    about = "HomeCat property assistant CLI",
    long_about = "Chat with the property assistant, inspect its configuration, and check slot extraction.",
    after_help = "Examples:\n  homecat doctor --json\n  homecat extract \"casa en El Carmen de 3 habitaciones\"\n  homecat chat"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Config file to read instead of ./homecat.toml")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Listings JSON file, overriding the configured one")]
    catalog: Option<PathBuf>,
    #[arg(long, global = true, help = "Sentence-transformer ONNX export (model.onnx + tokenizer.json)")]
    model_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, catalog, gazetteer, embedding model and prompt template")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Print the slots found in one utterance as JSON")]
    Extract {
        #[arg(help = "Utterance to analyse")]
        text: String,
    },
    #[command(about = "Talk to the assistant on stdin until EOF or /salir")]
    Chat {
        #[arg(long, help = "Session id to use; a random one is generated otherwise")]
        session: Option<String>,
    },
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                catalog_path: self.catalog.clone(),
                embedding_model_dir: self.model_dir.clone(),
                ..Default::default()
            },
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    let result = match cli.command {
        Command::Config => commands::config::run(&options),
        Command::Doctor { json } => commands::doctor::run(&options, json),
        Command::Extract { text } => commands::extract::run(&options, &text),
        Command::Chat { session } => commands::chat::run(&options, session),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
