use anyhow::Result;
use clap::{Parser, Subcommand};
use procscope::commands::{
    deps_command, holders_command, kill_command, load_config, load_context, modules_command,
    procs_command, symbols_command, tools_command,
};
use procscope_core::model::Pid;

/// Point-in-time process and binary introspection.
///
/// This CLI is a thin wrapper around `procscope-core` (exposed in code as `procscope_core`).
/// All substantive logic lives in the library so it can be tested thoroughly
/// and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "procscope",
    version,
    about = "Inspect running processes, the files they hold, and binaries' dependencies and symbols",
    long_about = None
)]
struct Cli {
    /// JSON or YAML tool configuration file.
    #[arg(long, global = true)]
    config: Option<String>,

    /// Enable debug logging (RUST_LOG takes precedence when set).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show processes holding a file or directory open.
    ///
    /// On Linux this delegates to `lsof` (recursively for directories). On Windows it
    /// matches process executable paths against the query, which is an approximation.
    Holders {
        /// File or directory to search for.
        path: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Find processes by name substring or exact pid and list their loaded modules.
    Procs {
        /// Process name substring (case-insensitive) or numeric pid.
        query: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List the files and shared modules mapped by a process.
    Modules {
        pid: Pid,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Forcibly terminate a process.
    Kill {
        pid: Pid,

        /// Confirm the termination; without it the command refuses.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },

    /// List a binary's dynamic dependencies.
    Deps {
        /// Path to the executable or shared library.
        binary: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List and classify a binary's symbols (exports first, full table as fallback).
    Symbols {
        /// Path to the executable or shared library.
        binary: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show the external tools procscope delegates to and whether they are installed.
    Tools {
        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Tools { json } => tools_command(&load_config(config_path)?, json)?,
        Command::Holders { path, json } => {
            holders_command(&load_context(config_path)?, &path, json)?
        }
        Command::Procs { query, json } => procs_command(&load_context(config_path)?, &query, json)?,
        Command::Modules { pid, json } => modules_command(&load_context(config_path)?, pid, json)?,
        Command::Kill { pid, yes } => kill_command(&load_context(config_path)?, pid, yes)?,
        Command::Deps { binary, json } => deps_command(&load_context(config_path)?, &binary, json)?,
        Command::Symbols { binary, json } => {
            symbols_command(&load_context(config_path)?, &binary, json)?
        }
    }

    Ok(())
}
