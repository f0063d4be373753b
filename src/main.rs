mod cli;
mod codec;
mod commands;
mod config;
mod locale;
mod logging;
mod model;
mod search;
mod storage;
mod sync;
mod todo;
mod ui;

use anyhow::Result;
use clap::Parser;
use config::{Config, Overrides};
use log::info;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let config = Config::load(args.config.as_deref())?.with_overrides(Overrides {
        notes_dir: args.notes_dir,
        language: args.language,
    });

    match config::default_log_dir() {
        Some(log_dir) => {
            if let Err(err) = logging::init_logging(&config.log_level, &log_dir) {
                eprintln!("daynote: file logging disabled: {}", err);
            }
        }
        None => eprintln!("daynote: file logging disabled: no data directory"),
    }
    info!(
        "event=config_loaded language={} notes_dir={}",
        config.language.code(),
        config.notes_dir.display()
    );

    let command = args.command.unwrap_or(cli::Command::Tui);
    match command {
        cli::Command::Tui => commands::tui(&config),
        cli::Command::Show { date } => commands::show(&config, date),
        cli::Command::Write { date } => commands::write(&config, date),
        cli::Command::Todos { all } => commands::todos(&config, all),
        cli::Command::Done { date, line } => commands::done(&config, date, line),
        cli::Command::Search { query, limit } => commands::search(&config, query, limit),
        cli::Command::List => commands::list(&config),
        cli::Command::Path { date } => commands::path(&config, date),
    }
}
