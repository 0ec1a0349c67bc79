//! Attendance reconciliation and daily absence reporting.
//! This crate is the single source of truth for roster and absence invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::attendance::{
    format_attendance_date, parse_attendance_date, AbsenceFact, AbsenceRecord,
    InvalidAttendanceDate,
};
pub use model::roster::{
    student_unique_key, Class, ClassId, ClassKind, ImportRow, Student, StudentId,
    TEACHING_CLASS_GRADE, UNKNOWN_GRADE,
};
pub use repo::attendance_repo::{AttendanceStore, ReplaceOutcome, SqliteAttendanceRepository};
pub use repo::roster_repo::{
    ImportSummary, MembershipGraph, RepoError, RepoResult, RosterWriter, SqliteRosterRepository,
};
pub use service::attendance_service::{
    AttendanceService, AttendanceServiceError, RosterEntry, SubmissionReceipt,
};
pub use service::report_service::{
    render_report, AbsenceReport, ClassSection, GradeSection, ReportLabels, ReportLocale,
    ReportService, ReportStudent,
};
pub use service::roster_service::{
    ClassOption, GradeResolution, ImportError, RosterService, RosterServiceError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
