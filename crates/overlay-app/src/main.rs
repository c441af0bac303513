//! `overlay` command line

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use overlay_app::{describe, init_tracing, App, AppConfig};
use overlay_registry::CapabilityKey;
use std::path::PathBuf;
use std::process::ExitCode;

fn cli() -> Command {
    Command::new("overlay")
        .version(overlay_app::VERSION)
        .about("Inspect capability bases, discovered extensions and merged values")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML config file (OVERLAY_* variables override it)"),
        )
        .subcommand(
            Command::new("resolve")
                .about("Print the effective value for a capability key")
                .arg(
                    Arg::new("key")
                        .required(true)
                        .value_parser(value_parser!(CapabilityKey))
                        .help("Capability key, e.g. core:query-config"),
                )
                .arg(
                    Arg::new("base")
                        .long("base")
                        .action(ArgAction::SetTrue)
                        .help("Ignore any extension and print the base"),
                ),
        )
        .subcommand(Command::new("list").about("List registered keys and their extension state"))
        .subcommand(Command::new("discover").about("Show the startup discovery report"))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let matches = cli().get_matches();

    let config_path = matches.get_one::<PathBuf>("config");
    let (config, issues) =
        AppConfig::load(config_path.map(PathBuf::as_path)).context("loading configuration")?;

    if let Err(err) = init_tracing(&config.log_filter, config.log_json) {
        eprintln!("tracing not initialized: {err}");
    }
    for issue in &issues {
        tracing::warn!(%issue, "invalid environment value ignored");
    }

    let app = App::bootstrap(config)
        .await
        .context("bootstrapping application")?;

    match matches.subcommand() {
        Some(("resolve", args)) => resolve(&app, args).await,
        Some(("list", _)) => {
            for entry in app.entries() {
                println!(
                    "{:<24} {:<10} {:<9} {}",
                    entry.key,
                    entry.base_kind.as_str(),
                    if entry.extended { "extended" } else { "base" },
                    entry.discovery.unwrap_or("-"),
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(("discover", _)) => {
            let report = app.discovery();
            if report.is_empty() {
                println!("no extension providers configured");
            } else {
                print!("{report}");
            }
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::SUCCESS),
    }
}

async fn resolve(app: &App, args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let key = args
        .get_one::<CapabilityKey>("key")
        .context("missing capability key")?;

    match app.resolve(key, args.get_flag("base")).await {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&describe(&value))?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("error: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}
