use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub(crate) const CONSOLE_REQUESTER: &str = "console";

#[derive(Debug, Parser)]
#[command(name = "sp-cli")]
#[command(about = "Script placeholder runtime CLI")]
pub(crate) struct Cli {
    #[arg(long = "data-folder")]
    pub(crate) data_folder: PathBuf,
    #[arg(long)]
    pub(crate) debug: bool,
    #[arg(long = "argument-split")]
    pub(crate) argument_split: Option<String>,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Print the loaded identifiers, one per line.
    List,
    /// Resolve a placeholder body such as `myid_a,b`.
    Resolve(ResolveArgs),
    /// Evaluate a one-off script on the default engine.
    Eval(EvalArgs),
    /// Load, reload, and print the number of loaded scripts.
    Reload,
    /// Save or reload the data of one placeholder.
    Debug(DebugArgs),
}

#[derive(Debug, Args)]
pub(crate) struct DebugArgs {
    #[command(subcommand)]
    pub(crate) command: DebugCommand,
}

#[derive(Debug, Subcommand)]
pub(crate) enum DebugCommand {
    #[command(name = "savedata")]
    SaveData { identifier: String },
    #[command(name = "loaddata")]
    LoadData { identifier: String },
}

#[derive(Debug, Args)]
pub(crate) struct ResolveArgs {
    pub(crate) body: String,
    #[arg(long, default_value = CONSOLE_REQUESTER)]
    pub(crate) requester: String,
    #[arg(long)]
    pub(crate) offline: bool,
}

#[derive(Debug, Args)]
pub(crate) struct EvalArgs {
    pub(crate) script: String,
    #[arg(long, default_value = CONSOLE_REQUESTER)]
    pub(crate) requester: String,
}
