use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod echo;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an echo server.
    Echo(EchoArgs),
    /// Send a single message.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Address to listen on (host:port, or a socket path with --unix).
    pub addr: String,
    /// Treat ADDR as a Unix domain socket path.
    #[arg(long)]
    pub unix: bool,
    /// Message delimiter: a character, \n \r \t \0, or a hex byte like 0x3b.
    #[arg(long, short = 'd', default_value = "\\n")]
    pub delimiter: String,
    /// Exit after echoing N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to connect to (host:port, or a socket path with --unix).
    pub addr: String,
    /// Treat ADDR as a Unix domain socket path.
    #[arg(long)]
    pub unix: bool,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Message delimiter: a character, \n \r \t \0, or a hex byte like 0x3b.
    #[arg(long, short = 'd', default_value = "\\n")]
    pub delimiter: String,
    /// Wait for one reply message and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
