//! flexpage-cli - Command-line interface for flexpage
//!
//! Sends pages through a running server, or encodes them offline.

mod commands;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use flexpage_client::{Client, ConnectionConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flexpage-cli")]
#[command(about = "Command-line interface for the flexpage paging encoder")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7464", env = "FLEXPAGE_SERVER")]
    server: SocketAddr,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Ping the server
    Ping,

    /// Get server info
    Info,

    /// Send a page through the server
    Page {
        #[command(flatten)]
        page: PageArgs,

        /// Print the packed symbols as hex
        #[arg(long)]
        hex: bool,
    },

    /// Encode a page locally and write its symbols to a file
    Encode {
        #[command(flatten)]
        page: PageArgs,

        /// Output file, one byte per symbol
        #[arg(short, long)]
        output: PathBuf,

        /// Print the packed symbols as hex
        #[arg(long)]
        hex: bool,
    },
}

/// Message type on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum PageType {
    Tone,
    Numeric,
    Alpha,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct PageArgs {
    /// Pager capcode
    pub capcode: u32,

    /// Further capcodes sharing the message (same frame and phase)
    #[arg(long, value_delimiter = ',')]
    pub also: Vec<u32>,

    /// Message text (omit for tone-only)
    pub text: Option<String>,

    /// Message type
    #[arg(short = 'T', long = "type", value_enum, default_value_t = PageType::Alpha)]
    pub kind: PageType,

    /// Channel speed in bits per second
    #[arg(short, long, default_value_t = 1600)]
    pub baud: u32,

    /// Center frequency in Hz
    #[arg(short, long)]
    pub freq: Option<u64>,

    /// Cycle count to schedule against (defaults to the current time)
    #[arg(short, long)]
    pub cycle: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    // Offline encoding needs no server connection
    if let Commands::Encode { page, output, hex } = &cli.command {
        match commands::encode_offline(page, output, *hex) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("{}: {}", "Error".red(), e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let config = ConnectionConfig::new(cli.server).with_client_name("flexpage-cli");
    let client = Client::new(config);

    client.connect().await.map_err(|e| {
        eprintln!("{}: {}", "Connection failed".red(), e);
        e
    })?;

    match commands::execute(&client, cli.command).await {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            client.close().await?;
            std::process::exit(1);
        }
    }

    client.close().await?;
    Ok(())
}
