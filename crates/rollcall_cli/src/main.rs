//! Rollcall command-line front end.
//!
//! # Responsibility
//! - Drive `rollcall_core` against a SQLite database file.
//! - Print every outcome as a JSON envelope on stdout.
//!
//! # Invariants
//! - Each invocation opens exactly one connection and drops it before exit.
//! - Exit status is non-zero whenever an error envelope is printed.

mod commands;
mod output;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use rollcall_core::{
    default_log_level, init_logging, parse_attendance_date, ClassKind, ReportLocale,
};
use std::path::PathBuf;

/// Attendance reconciliation and daily absence reports.
#[derive(Parser, Debug)]
#[command(name = "rollcall")]
#[command(version, about = "Attendance reconciliation and daily absence reports")]
pub struct Args {
    /// SQLite database file
    #[arg(long, env = "ROLLCALL_DB")]
    pub db: PathBuf,

    /// Absolute directory for rolling log files; logging stays off when unset
    #[arg(long, env = "ROLLCALL_LOG_DIR")]
    pub log_dir: Option<String>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, env = "ROLLCALL_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Report language
    #[arg(long, env = "ROLLCALL_LOCALE", default_value = "en", value_parser = parse_locale)]
    pub locale: ReportLocale,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List classes with their display grade
    Classes {
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },
    /// Show a class roster with absence flags for a date
    Roster {
        #[arg(long = "class")]
        class_id: i64,
        /// Attendance date (YYYY-MM-DD), defaults to today
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Replace a teaching class's absences for a date
    Submit {
        #[arg(long = "class")]
        class_id: i64,
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        /// Absent student ids, comma separated; omit to mark everyone present
        #[arg(long, value_delimiter = ',')]
        absent: Vec<i64>,
    },
    /// Render the daily absence report
    Report {
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        /// Print the structured report instead of text
        #[arg(long)]
        json: bool,
    },
    /// Import roster rows from a JSON array file
    Import {
        #[arg(long)]
        file: PathBuf,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Classes { .. } => "classes",
            Self::Roster { .. } => "roster",
            Self::Submit { .. } => "submit",
            Self::Report { .. } => "report",
            Self::Import { .. } => "import",
        }
    }
}

/// Class kind filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Administrative,
    Teaching,
}

impl From<KindArg> for ClassKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Administrative => ClassKind::Administrative,
            KindArg::Teaching => ClassKind::Teaching,
        }
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    parse_attendance_date(value).map_err(|err| err.to_string())
}

fn parse_locale(value: &str) -> Result<ReportLocale, String> {
    ReportLocale::parse(value)
        .ok_or_else(|| format!("unsupported locale `{value}`; expected en|zh"))
}

fn main() {
    let args = Args::parse();

    if let Some(log_dir) = args.log_dir.as_deref() {
        let level = args.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            output::print_error("validation_error", &err.to_string());
            std::process::exit(1);
        }
    }

    if let Err(err) = commands::run(&args) {
        output::print_error(err.code, &err.message);
        std::process::exit(1);
    }
}
