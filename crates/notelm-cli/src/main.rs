//! NoteLM CLI - command-line front-end for local-first notes
//!
//! Notes live in a local database; `notelm sync` reconciles them with a
//! shared remote directory.

mod cli;
mod commands;
mod config_profiles;
mod error;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::attach::run_attach;
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::export::run_export;
use crate::commands::list::run_list;
use crate::commands::search::run_search;
use crate::commands::select::run_select;
use crate::commands::settings::run_settings;
use crate::commands::show::run_show;
use crate::commands::source::run_source;
use crate::commands::sync::run_sync;
use crate::commands::tag::run_tag;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "notelm=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();
    let db_path = resolve_db_path(cli.db_path.clone());

    match cli.command {
        Some(Commands::Add {
            content,
            title,
            tags,
        }) => run_add(&content, title, &tags, &db_path).await?,
        Some(Commands::List { limit, tag, json }) => {
            run_list(limit, tag.as_deref(), json, &db_path).await?;
        }
        Some(Commands::Show { id, json }) => run_show(id.as_deref(), json, &db_path).await?,
        Some(Commands::Search { query, limit, json }) => {
            run_search(&query, limit, json, &db_path).await?;
        }
        Some(Commands::Edit { id, title }) => run_edit(&id, title, &db_path).await?,
        Some(Commands::Delete { id }) => run_delete(&id, profile, &db_path).await?,
        Some(Commands::Select { id, clear }) => run_select(id.as_deref(), clear, &db_path).await?,
        Some(Commands::Tag { command }) => run_tag(command, &db_path).await?,
        Some(Commands::Source { command }) => run_source(command, &db_path).await?,
        Some(Commands::Attach {
            id,
            file,
            name,
            kind,
        }) => run_attach(&id, &file, name, kind, &db_path).await?,
        Some(Commands::Export { format, output }) => {
            run_export(format, output.as_deref(), &db_path).await?;
        }
        Some(Commands::Settings { command }) => run_settings(command, &db_path).await?,
        Some(Commands::Sync { watch }) => run_sync(watch, profile, &db_path).await?,
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        Some(Commands::Config { command }) => run_config(command, profile)?,
        None => {
            // Quick capture mode: notelm "my thought"
            if cli.note.is_empty() {
                Cli::command().print_help().map_err(CliError::Io)?;
                println!();
            } else {
                run_add(&cli.note, None, &[], &db_path).await?;
            }
        }
    }

    Ok(())
}
