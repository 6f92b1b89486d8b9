mod commands;
mod config;
mod logging;
mod openai;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use commands::{
    ExportTable, cmd_ask, cmd_export, cmd_fields, cmd_history, cmd_log, cmd_show, cmd_signals,
    cmd_streaks, cmd_week, open_service,
};
use config::Config;
use daybook_core::insights::StreakThresholds;

#[derive(Parser)]
#[command(
    name = "daybook",
    version,
    about = "Turn free-text journal entries into structured health metrics",
    long_about = "Write a daily journal entry in plain language. daybook extracts sleep, training, \
                  nutrition and mood metrics with a language model, reconciles the numbers, asks \
                  for anything missing, and stores one row per day in a local SQLite database."
)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a day: extract metrics from the entry, ask for missing fields, save
    Log {
        /// Date (YYYY-MM-DD, today, yesterday; default: today)
        #[arg(long)]
        date: Option<String>,
        /// Read the entry from a file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a stored day
    Show {
        /// Date (YYYY-MM-DD, today, yesterday; default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recent days, newest first
    History {
        /// Number of days to show
        #[arg(short, long, default_value = "7")]
        days: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reconciliation signals recorded for a day
    Signals {
        /// Date (YYYY-MM-DD, today, yesterday; default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Current gym, creatine, sleep, protein and logging streaks
    Streaks {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Stats for a seven-day window, optionally with a written review
    Week {
        /// First day of the window (default: six days ago)
        #[arg(long)]
        start: Option<String>,
        /// Ask the model for a coach-style review of the week
        #[arg(long)]
        review: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ask a question about your logged history
    Ask {
        /// The question, e.g. "how many quest bars did I eat last week?"
        question: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export a table as CSV
    Export {
        /// Table to export
        #[arg(long, value_enum, default_value = "daily")]
        table: ExportTable,
        /// Output file (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Print a JSON summary (only with --output)
        #[arg(long)]
        json: bool,
    },
    /// List the required fields and the questions asked for them
    Fields {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    logging::init(&config.settings.logging, cli.verbose);

    match cli.command {
        Commands::Log { date, file, json } => {
            let svc = open_service(&config, true)?;
            cmd_log(&svc, date, file.as_deref(), json)
        }
        Commands::Show { date, json } => cmd_show(&open_service(&config, false)?, date, json),
        Commands::History { days, json } => {
            cmd_history(&open_service(&config, false)?, days, json)
        }
        Commands::Signals { date, json } => {
            cmd_signals(&open_service(&config, false)?, date, json)
        }
        Commands::Streaks { json } => cmd_streaks(
            &open_service(&config, false)?,
            StreakThresholds::from(&config.settings.streaks),
            json,
        ),
        Commands::Week {
            start,
            review,
            json,
        } => cmd_week(&open_service(&config, review)?, start, review, json),
        Commands::Ask { question, json } => {
            cmd_ask(&open_service(&config, true)?, &question, json)
        }
        Commands::Export {
            table,
            output,
            json,
        } => cmd_export(
            &open_service(&config, false)?,
            table,
            output.as_deref(),
            json,
        ),
        Commands::Fields { json } => cmd_fields(json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_export_args() {
        let cli = Cli::parse_from(["daybook", "export", "--table", "signals", "-o", "s.csv"]);
        match cli.command {
            Commands::Export { table, output, .. } => {
                assert_eq!(table, ExportTable::Signals);
                assert_eq!(output, Some(PathBuf::from("s.csv")));
            }
            _ => panic!("expected export"),
        }
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::parse_from(["daybook", "history", "-d", "3", "--verbose"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::History { days: 3, .. }));
    }
}
