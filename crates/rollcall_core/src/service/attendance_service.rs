//! Attendance submission use-case service.
//!
//! # Responsibility
//! - Validate a teaching-class submission and hand it to the store's
//!   replacement primitive.
//! - Build the roster view used to re-open a day's attendance session.
//!
//! # Invariants
//! - A submission is all-or-nothing: validation failures write nothing and
//!   storage failures roll back.
//! - After `submit` returns, exactly the submitted students carry an absence
//!   fact for the date among the class members; the last submission touching
//!   a student wins, whichever class made it.

use crate::model::attendance::format_attendance_date;
use crate::model::roster::{ClassId, Student, StudentId};
use crate::repo::attendance_repo::AttendanceStore;
use crate::repo::roster_repo::{MembershipGraph, RepoError};
use chrono::NaiveDate;
use log::{error, info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Error from attendance use-cases.
#[derive(Debug)]
pub enum AttendanceServiceError {
    /// Submission fields are malformed.
    InvalidSubmission(String),
    /// Referenced class does not exist.
    ClassNotFound(ClassId),
    /// Referenced class is administrative; submissions go through teaching
    /// classes only.
    ClassNotTeaching(ClassId),
    /// Submitted student id does not exist.
    StudentNotFound(StudentId),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl AttendanceServiceError {
    /// Stable status code for callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSubmission(_) | Self::ClassNotTeaching(_) => "validation_error",
            Self::ClassNotFound(_) | Self::StudentNotFound(_) => "not_found",
            Self::Repo(err) => err.code(),
        }
    }
}

impl Display for AttendanceServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSubmission(message) => write!(f, "invalid submission: {message}"),
            Self::ClassNotFound(id) => write!(f, "class not found: {id}"),
            Self::ClassNotTeaching(id) => write!(f, "class is not a teaching class: {id}"),
            Self::StudentNotFound(id) => write!(f, "student not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AttendanceServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AttendanceServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::ClassNotFound(id) => Self::ClassNotFound(id),
            RepoError::StudentNotFound(id) => Self::StudentNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Result of one accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub class_id: ClassId,
    pub date: NaiveDate,
    /// Distinct absent ids, ascending.
    pub absent: Vec<StudentId>,
    /// Prior records removed for the date.
    pub cleared: usize,
    /// Submitted ids outside the class membership. Recorded anyway.
    pub non_members: Vec<StudentId>,
}

/// One roster line with the student's current state for the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub student: Student,
    pub is_absent_today: bool,
}

/// Attendance service facade over graph and store implementations.
pub struct AttendanceService<G: MembershipGraph, S: AttendanceStore> {
    graph: G,
    store: S,
}

impl<G: MembershipGraph, S: AttendanceStore> AttendanceService<G, S> {
    /// Creates a service from graph and store implementations.
    pub fn new(graph: G, store: S) -> Self {
        Self { graph, store }
    }

    /// Replaces the day's absence facts for a teaching class.
    ///
    /// # Contract
    /// - Unknown class → `ClassNotFound`; administrative class →
    ///   `ClassNotTeaching`.
    /// - Non-positive ids → `InvalidSubmission`; unknown ids →
    ///   `StudentNotFound`. Nothing is written in either case.
    /// - Duplicate ids collapse to one fact.
    /// - Ids outside the class membership are recorded and reported in
    ///   `non_members`.
    pub fn submit(
        &self,
        teaching_class_id: ClassId,
        date: NaiveDate,
        absent_student_ids: &[StudentId],
    ) -> Result<SubmissionReceipt, AttendanceServiceError> {
        let started_at = Instant::now();
        let result = self.submit_inner(teaching_class_id, date, absent_student_ids);
        match &result {
            Ok(receipt) => info!(
                "event=attendance_submit module=service status=ok class_id={} date={} absent={} cleared={} non_members={} duration_ms={}",
                teaching_class_id,
                format_attendance_date(date),
                receipt.absent.len(),
                receipt.cleared,
                receipt.non_members.len(),
                started_at.elapsed().as_millis()
            ),
            Err(AttendanceServiceError::Repo(err)) => error!(
                "event=attendance_submit module=service status=error class_id={} date={} duration_ms={} error_code=storage_error error={}",
                teaching_class_id,
                format_attendance_date(date),
                started_at.elapsed().as_millis(),
                err
            ),
            Err(err) => warn!(
                "event=attendance_submit module=service status=rejected class_id={} date={} error_code={}",
                teaching_class_id,
                format_attendance_date(date),
                err.code()
            ),
        }
        result
    }

    fn submit_inner(
        &self,
        teaching_class_id: ClassId,
        date: NaiveDate,
        absent_student_ids: &[StudentId],
    ) -> Result<SubmissionReceipt, AttendanceServiceError> {
        if let Some(&bad) = absent_student_ids.iter().find(|&&id| id <= 0) {
            return Err(AttendanceServiceError::InvalidSubmission(format!(
                "student id must be positive, got {bad}"
            )));
        }

        let class = self
            .graph
            .get_class(teaching_class_id)?
            .ok_or(AttendanceServiceError::ClassNotFound(teaching_class_id))?;
        if !class.is_teaching() {
            return Err(AttendanceServiceError::ClassNotTeaching(teaching_class_id));
        }

        let absent: BTreeSet<StudentId> = absent_student_ids.iter().copied().collect();
        let outcome = self
            .store
            .replace_absences(teaching_class_id, date, &absent)?;

        if !outcome.non_members.is_empty() {
            warn!(
                "event=attendance_submit module=service status=non_member class_id={} count={}",
                teaching_class_id,
                outcome.non_members.len()
            );
        }

        Ok(SubmissionReceipt {
            class_id: teaching_class_id,
            date,
            absent: absent.into_iter().collect(),
            cleared: outcome.cleared,
            non_members: outcome.non_members,
        })
    }

    /// Lists members of a class with their absence state for the date.
    ///
    /// Works for either class kind. Order follows the membership graph
    /// (`name ASC, id ASC`).
    pub fn roster(
        &self,
        class_id: ClassId,
        date: NaiveDate,
    ) -> Result<Vec<RosterEntry>, AttendanceServiceError> {
        if self.graph.get_class(class_id)?.is_none() {
            return Err(AttendanceServiceError::ClassNotFound(class_id));
        }

        let mut entries = Vec::new();
        for student in self.graph.students_of(class_id)? {
            let is_absent_today = self.store.is_absent_today(student.id, date)?;
            entries.push(RosterEntry {
                student,
                is_absent_today,
            });
        }
        Ok(entries)
    }
}
