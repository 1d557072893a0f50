// CLI layer: clap argument definitions and subcommand dispatch.
// Every subcommand runs the same session lifecycle: log in, perform one
// operation, log out. Listing output goes to stdout; diagnostics go
// through `tracing`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use crate::client::{PwnClient, DEFAULT_BASE_URL};
use crate::config;

/// Interact with pwn.college from a terminal.
#[derive(Parser, Debug)]
#[command(name = "pwncollege-cli", version, about)]
pub struct Args {
    /// Base URL of the platform (defaults to https://pwn.college)
    #[arg(long, env = "PWNCOLLEGE_URL", global = true)]
    pub url: Option<String>,

    /// Path to the credentials file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a challenge container
    Docker {
        /// Dojo name
        #[arg(short = 'd', long)]
        dojo: String,
        /// Module name
        #[arg(short = 'm', long)]
        module: String,
        /// Challenge name
        #[arg(short = 'c', long)]
        challenge: String,
        /// Start in practice mode
        #[arg(short = 'p', long)]
        practice: bool,
    },
    /// Submit a flag
    Attempt {
        /// Challenge ID
        #[arg(short = 'c', long)]
        challenge_id: u64,
        /// Flag to submit
        #[arg(short = 'f', long)]
        flag: String,
    },
    /// Show the currently running container
    Status,
    /// List all dojos
    Dojos,
    /// List the modules of a dojo
    Modules {
        /// Dojo name
        #[arg(short = 'd', long)]
        dojo: String,
    },
    /// List the challenges of a module
    Challenges {
        /// Dojo name
        #[arg(short = 'd', long)]
        dojo: String,
        /// Module name
        #[arg(short = 'm', long)]
        module: String,
    },
    /// Print the session cookie
    Cookies,
}

/// Run one subcommand: resolve configuration and credentials, log in,
/// execute, log out.
pub fn run(args: Args) -> Result<()> {
    let settings = config::load(args.config.as_deref())?;

    // CLI flag and env var win over the config file.
    let base_url = args
        .url
        .clone()
        .or_else(|| settings.url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let creds = config::credentials(&settings)?;
    let mut client = PwnClient::new(&base_url)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").expect("template is valid"));
    spinner.set_message("Logging in...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    let login = client.login(&creds.name, &creds.password);
    spinner.finish_and_clear();
    login?;

    // Log out even when the command itself failed.
    let outcome = execute(&client, &args.command);
    if let Err(e) = client.logout() {
        warn!("logout failed: {e}");
    }
    outcome
}

/// Execute a single subcommand against a logged-in client and print the
/// result.
fn execute(client: &PwnClient, command: &Commands) -> Result<()> {
    match command {
        Commands::Docker {
            dojo,
            module,
            challenge,
            practice,
        } => {
            let res = client.docker(dojo, module, challenge, *practice)?;
            if !res.success {
                bail!(
                    "could not start container: {}",
                    res.error.unwrap_or_else(|| "unknown error".into())
                );
            }
            let mode = if *practice { " in practice mode" } else { "" };
            println!("Started {challenge} ({dojo}/{module}){mode}");
        }
        Commands::Attempt { challenge_id, flag } => {
            let res = client.attempt(*challenge_id, flag)?;
            if !res.success {
                bail!("flag submission for challenge {challenge_id} failed");
            }
            match res.data {
                Some(data) => match data.message {
                    Some(message) => println!("{}: {message}", data.status),
                    None => println!("{}", data.status),
                },
                None => println!("submitted"),
            }
        }
        Commands::Status => {
            let res = client.docker_status()?;
            if !res.success {
                bail!(
                    "could not get status: {}",
                    res.error.unwrap_or_else(|| "unknown error".into())
                );
            }
            println!(
                "challenge: {}, module: {}, dojo: {}",
                res.challenge.as_deref().unwrap_or("-"),
                res.module.as_deref().unwrap_or("-"),
                res.dojo.as_deref().unwrap_or("-"),
            );
        }
        Commands::Dojos => {
            for dojo in client.dojos()? {
                print_listing(&dojo.id, &dojo.name, &dojo.summary);
            }
        }
        Commands::Modules { dojo } => {
            for module in client.modules(dojo)? {
                print_listing(&module.id, &module.name, &module.summary);
            }
        }
        Commands::Challenges { dojo, module } => {
            for challenge in client.challenges(dojo, module)? {
                println!(
                    "{}: {} - {}",
                    challenge.id, challenge.name, challenge.description
                );
            }
        }
        Commands::Cookies => match client.session_cookie() {
            Some(cookie) => println!("{cookie}"),
            None => bail!("no session cookie"),
        },
    }
    Ok(())
}

/// One `id: name (summary)` line, dropping the parens when there is no
/// summary.
fn print_listing(id: &str, name: &str, summary: &str) {
    if summary.is_empty() {
        println!("{id}: {name}");
    } else {
        println!("{id}: {name} ({summary})");
    }
}
