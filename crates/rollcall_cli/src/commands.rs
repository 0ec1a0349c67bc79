//! Subcommand dispatch.

use crate::output::{self, CliError};
use crate::{Args, Command};
use chrono::{Local, NaiveDate};
use log::{info, warn};
use rollcall_core::db::open_db;
use rollcall_core::{
    AttendanceService, ClassKind, ImportRow, ReportService, RosterService,
    SqliteAttendanceRepository, SqliteRosterRepository,
};
use rusqlite::Connection;
use serde_json::Value;
use std::path::Path;

/// Runs one subcommand against a freshly opened connection.
pub fn run(args: &Args) -> Result<(), CliError> {
    let command = args.command.name();
    info!("event=cli_command module=cli status=start command={command}");
    let result = dispatch(args);
    match &result {
        Ok(()) => info!("event=cli_command module=cli status=ok command={command}"),
        Err(err) => warn!(
            "event=cli_command module=cli status=error command={command} error_code={}",
            err.code
        ),
    }
    result
}

fn dispatch(args: &Args) -> Result<(), CliError> {
    let conn = open_db(&args.db)?;
    match &args.command {
        Command::Classes { kind } => {
            let kinds = match kind {
                Some(kind) => vec![ClassKind::from(*kind)],
                None => vec![ClassKind::Administrative, ClassKind::Teaching],
            };
            output::print_success(&list_classes(&conn, &kinds)?);
        }
        Command::Roster { class_id, date } => {
            let date = date.unwrap_or_else(today);
            let entries = attendance_service(&conn).roster(*class_id, date)?;
            output::print_success(&output::success("roster", &entries)?);
        }
        Command::Submit {
            class_id,
            date,
            absent,
        } => {
            let date = date.unwrap_or_else(today);
            let receipt = attendance_service(&conn).submit(*class_id, date, absent)?;
            output::print_success(&output::success("receipt", &receipt)?);
        }
        Command::Report { date, json } => {
            let date = date.unwrap_or_else(today);
            let service = ReportService::with_labels(
                SqliteRosterRepository::new(&conn),
                SqliteAttendanceRepository::new(&conn),
                args.locale.labels(),
            );
            if *json {
                let report = service.build(date)?;
                output::print_success(&output::success("report", &report)?);
            } else {
                println!("{}", service.build_report(date)?);
            }
        }
        Command::Import { file } => {
            let rows = read_import_rows(file)?;
            let summary =
                RosterService::new(SqliteRosterRepository::new(&conn)).import_rows(&rows)?;
            output::print_success(&output::success("import", &summary)?);
        }
    }
    Ok(())
}

fn list_classes(conn: &Connection, kinds: &[ClassKind]) -> Result<Value, CliError> {
    let service = RosterService::new(SqliteRosterRepository::new(conn));
    let mut options = Vec::new();
    for kind in kinds {
        options.extend(service.class_options(*kind)?);
    }
    output::success("classes", &options)
}

fn attendance_service(
    conn: &Connection,
) -> AttendanceService<SqliteRosterRepository<'_>, SqliteAttendanceRepository<'_>> {
    AttendanceService::new(
        SqliteRosterRepository::new(conn),
        SqliteAttendanceRepository::new(conn),
    )
}

fn read_import_rows(path: &Path) -> Result<Vec<ImportRow>, CliError> {
    let content = std::fs::read_to_string(path).map_err(|err| {
        CliError::new(
            "validation_error",
            format!("failed to read `{}`: {err}", path.display()),
        )
    })?;
    serde_json::from_str(&content).map_err(|err| {
        CliError::new(
            "validation_error",
            format!(
                "`{}` is not a JSON array of import rows: {err}",
                path.display()
            ),
        )
    })
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::read_import_rows;
    use std::io::Write;

    #[test]
    fn import_file_parses_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"grade":"Grade6","admin_class_name":"ClassA","student_name":"Alice","teaching_class_name":"Room1"}}]"#
        )
        .unwrap();

        let rows = read_import_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].teaching_class_name, "Room1");
    }

    #[test]
    fn malformed_import_file_is_a_validation_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"grade\": 6}}").unwrap();

        let err = read_import_rows(file.path()).unwrap_err();
        assert_eq!(err.code, "validation_error");
    }
}
