use std::ffi::OsString;
use std::fs;
use std::sync::Arc;

use clap::Parser;
use sp_api::ScriptPlaceholders;
use sp_core::{ExpansionSettings, PlaceholderError, Requester, DEFAULT_ARGUMENT_SPLIT};
use sp_runtime::{AppContext, EngineRegistry, SimpleHost};

mod cli_args;
mod error_map;

pub(crate) use cli_args::{Cli, Command, DebugCommand, EvalArgs, ResolveArgs};
pub(crate) use error_map::{emit_error, map_cli_data_folder, unknown_identifier};

pub const UNRESOLVED: &str = "UNRESOLVED";

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn run(cli: Cli) -> Result<i32, PlaceholderError> {
    let placeholders = open(&cli)?;
    placeholders.register();
    let outcome = dispatch(&placeholders, cli.command);
    placeholders.shutdown();
    outcome.map(|()| 0)
}

fn dispatch(placeholders: &ScriptPlaceholders, command: Command) -> Result<(), PlaceholderError> {
    match command {
        Command::List => {
            for identifier in placeholders.list_identifiers() {
                println!("{}", identifier);
            }
        }
        Command::Resolve(args) => println!("{}", resolve(placeholders, &args)),
        Command::Eval(args) => println!("{}", evaluate(placeholders, &args)?),
        Command::Reload => println!("{}", placeholders.reload()),
        Command::Debug(args) => println!("{}", debug_data(placeholders, args.command)?),
    }
    Ok(())
}

fn open(cli: &Cli) -> Result<ScriptPlaceholders, PlaceholderError> {
    fs::create_dir_all(&cli.data_folder).map_err(map_cli_data_folder)?;
    let settings = ExpansionSettings {
        debug: cli.debug,
        argument_split: cli
            .argument_split
            .clone()
            .unwrap_or_else(|| DEFAULT_ARGUMENT_SPLIT.to_string()),
    };
    let context = AppContext::new(&cli.data_folder, settings, Arc::new(SimpleHost::new()))?;
    Ok(ScriptPlaceholders::new(
        Arc::new(context),
        EngineRegistry::with_builtin(),
    ))
}

fn resolve(placeholders: &ScriptPlaceholders, args: &ResolveArgs) -> String {
    let requester = if args.offline {
        Requester::offline(&args.requester)
    } else {
        Requester::online(&args.requester)
    };
    placeholders
        .on_request(Some(&requester), &args.body)
        .unwrap_or_else(|| UNRESOLVED.to_string())
}

fn evaluate(placeholders: &ScriptPlaceholders, args: &EvalArgs) -> Result<String, PlaceholderError> {
    let requester = Requester::online(&args.requester);
    placeholders.evaluate_ad_hoc(Some(&requester), &args.script)
}

fn debug_data(
    placeholders: &ScriptPlaceholders,
    command: DebugCommand,
) -> Result<String, PlaceholderError> {
    match command {
        DebugCommand::SaveData { identifier } => {
            if !placeholders.save_data(&identifier) {
                return Err(unknown_identifier(&identifier));
            }
            Ok(format!("Saved data of {}", identifier))
        }
        DebugCommand::LoadData { identifier } => match placeholders.load_data(&identifier) {
            Some(true) => Ok(format!("Loaded data of {}", identifier)),
            Some(false) => Ok(format!("No data to load for {}", identifier)),
            None => Err(unknown_identifier(&identifier)),
        },
    }
}
