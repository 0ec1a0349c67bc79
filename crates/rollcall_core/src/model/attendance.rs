//! Daily absence facts.
//!
//! # Responsibility
//! - Define the persisted absence record and its date encoding.
//!
//! # Invariants
//! - At most one record exists per `(student_id, date)`.
//! - `class_id` always points at the teaching class whose submission created
//!   the record.
//! - Dates are stored as `YYYY-MM-DD` text so lexical and calendar order agree.

use crate::model::roster::{ClassId, StudentId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage format of `attendance_records.attendance_date`.
pub const ATTENDANCE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Persisted absence row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsenceRecord {
    pub id: i64,
    pub student_id: StudentId,
    /// Teaching class that recorded this absence.
    pub class_id: ClassId,
    pub date: NaiveDate,
    pub is_absent: bool,
}

impl AbsenceRecord {
    pub fn fact(&self) -> AbsenceFact {
        AbsenceFact {
            student_id: self.student_id,
            teaching_class_id: self.class_id,
        }
    }
}

/// `(student, teaching class)` pair for one absent student on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbsenceFact {
    pub student_id: StudentId,
    pub teaching_class_id: ClassId,
}

/// Date text that is not a valid `YYYY-MM-DD` calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidAttendanceDate(pub String);

impl Display for InvalidAttendanceDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid attendance date `{}`; expected YYYY-MM-DD",
            self.0
        )
    }
}

impl Error for InvalidAttendanceDate {}

/// Parses a `YYYY-MM-DD` attendance date.
pub fn parse_attendance_date(value: &str) -> Result<NaiveDate, InvalidAttendanceDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, ATTENDANCE_DATE_FORMAT)
        .map_err(|_| InvalidAttendanceDate(trimmed.to_string()))
}

/// Formats a date in storage form.
pub fn format_attendance_date(date: NaiveDate) -> String {
    date.format(ATTENDANCE_DATE_FORMAT).to_string()
}
