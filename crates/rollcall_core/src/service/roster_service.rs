//! Roster use-case service.
//!
//! # Responsibility
//! - Normalize and import tabular roster rows.
//! - List classes for selection, pairing teaching classes with a display
//!   grade resolved through their members.
//!
//! # Invariants
//! - A batch with any blank field is rejected before storage is touched.
//! - Display grade resolution never fails on empty or mixed-grade classes;
//!   mixed grades are logged as `grade_resolution status=ambiguous`.

use crate::model::roster::{Class, ClassId, ClassKind, ImportRow, UNKNOWN_GRADE};
use crate::repo::roster_repo::{ImportSummary, MembershipGraph, RepoError, RosterWriter};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Error from roster import.
#[derive(Debug)]
pub enum ImportError {
    /// Row has a blank field. `row` is 1-based.
    InvalidRow { row: usize, message: String },
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl ImportError {
    /// Stable status code for callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRow { .. } => "validation_error",
            Self::Repo(err) => err.code(),
        }
    }
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRow { row, message } => write!(f, "invalid import row {row}: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::InvalidRow { .. } => None,
        }
    }
}

impl From<RepoError> for ImportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Error from roster read use-cases.
#[derive(Debug)]
pub enum RosterServiceError {
    ClassNotFound(ClassId),
    Repo(RepoError),
}

impl RosterServiceError {
    /// Stable status code for callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ClassNotFound(_) => "not_found",
            Self::Repo(err) => err.code(),
        }
    }
}

impl Display for RosterServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClassNotFound(id) => write!(f, "class not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RosterServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::ClassNotFound(_) => None,
        }
    }
}

impl From<RepoError> for RosterServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::ClassNotFound(id) => Self::ClassNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Display grade of a teaching class, resolved through member students.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeResolution {
    /// Chosen grade, or [`UNKNOWN_GRADE`] when no member has one.
    pub grade: String,
    /// Distinct administrative grades found among members.
    pub candidates: Vec<String>,
}

impl GradeResolution {
    /// Members span more than one administrative grade.
    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }

    /// No member has an administrative grade.
    pub fn is_unknown(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Class selection entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassOption {
    pub class: Class,
    /// Grade shown next to the class. For administrative classes this is the
    /// stored grade.
    pub display_grade: String,
}

/// Roster service facade over membership graph implementations.
pub struct RosterService<R: MembershipGraph + RosterWriter> {
    repo: R,
}

impl<R: MembershipGraph + RosterWriter> RosterService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Normalizes and imports a batch of rows in one transaction.
    ///
    /// Re-importing the same rows is a no-op apart from `students_merged`.
    pub fn import_rows(&self, rows: &[ImportRow]) -> Result<ImportSummary, ImportError> {
        let started_at = Instant::now();
        let normalized = rows
            .iter()
            .enumerate()
            .map(|(index, row)| normalize_import_row(row, index + 1))
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|err| {
                warn!(
                    "event=roster_import module=service status=rejected rows={} error_code={}",
                    rows.len(),
                    err.code()
                );
            })?;

        let summary = self.repo.import_rows(&normalized)?;
        info!(
            "event=roster_import module=service status=ok rows={} classes_created={} students_created={} students_merged={} memberships_created={} duration_ms={}",
            summary.rows,
            summary.classes_created,
            summary.students_created,
            summary.students_merged,
            summary.memberships_created,
            started_at.elapsed().as_millis()
        );
        Ok(summary)
    }

    /// Lists classes of one kind in display order with their display grade.
    pub fn class_options(&self, kind: ClassKind) -> Result<Vec<ClassOption>, RosterServiceError> {
        let classes = self.repo.classes_of_kind(kind)?;
        let mut options = Vec::with_capacity(classes.len());
        for class in classes {
            let display_grade = match class.kind {
                ClassKind::Administrative => class.grade.clone(),
                ClassKind::Teaching => resolve_display_grade(&self.repo, class.id)?.grade,
            };
            options.push(ClassOption {
                class,
                display_grade,
            });
        }
        Ok(options)
    }

    /// Resolves the display grade of one teaching class.
    pub fn resolve_display_grade(
        &self,
        class_id: ClassId,
    ) -> Result<GradeResolution, RosterServiceError> {
        if self.repo.get_class(class_id)?.is_none() {
            return Err(RosterServiceError::ClassNotFound(class_id));
        }
        Ok(resolve_display_grade(&self.repo, class_id)?)
    }
}

/// Picks the grade of an administrative class shared by members of
/// `class_id`.
///
/// Members are assumed to share one grade. When they do not, the smallest
/// grade is chosen so repeated calls agree, and the mix is logged.
pub fn resolve_display_grade<G: MembershipGraph>(
    graph: &G,
    class_id: ClassId,
) -> Result<GradeResolution, RepoError> {
    let candidates = graph.administrative_grades_of(class_id)?;
    let grade = candidates
        .first()
        .cloned()
        .unwrap_or_else(|| UNKNOWN_GRADE.to_string());

    if candidates.len() > 1 {
        warn!(
            "event=grade_resolution module=service status=ambiguous class_id={} candidates={}",
            class_id,
            candidates.len()
        );
    }

    Ok(GradeResolution { grade, candidates })
}

/// Trims a roster field and collapses inner whitespace runs to one space.
pub fn normalize_roster_field(value: &str) -> Option<String> {
    let collapsed = WHITESPACE_RE.replace_all(value.trim(), " ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.into_owned())
    }
}

fn normalize_import_row(row: &ImportRow, row_number: usize) -> Result<ImportRow, ImportError> {
    let field = |value: &str, name: &str| {
        normalize_roster_field(value).ok_or_else(|| ImportError::InvalidRow {
            row: row_number,
            message: format!("`{name}` must not be blank"),
        })
    };

    Ok(ImportRow {
        grade: field(&row.grade, "grade")?,
        admin_class_name: field(&row.admin_class_name, "admin_class_name")?,
        student_name: field(&row.student_name, "student_name")?,
        teaching_class_name: field(&row.teaching_class_name, "teaching_class_name")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{normalize_import_row, normalize_roster_field, ImportError};
    use crate::model::roster::ImportRow;

    #[test]
    fn normalize_field_trims_and_collapses_whitespace() {
        assert_eq!(
            normalize_roster_field("  Grade 6\t\tA  ").as_deref(),
            Some("Grade 6 A")
        );
        assert_eq!(normalize_roster_field(" \t\n "), None);
    }

    #[test]
    fn blank_field_reports_row_number_and_field() {
        let row = ImportRow {
            grade: "Grade6".to_string(),
            admin_class_name: "ClassA".to_string(),
            student_name: "   ".to_string(),
            teaching_class_name: "Room1".to_string(),
        };
        let err = normalize_import_row(&row, 3).expect_err("blank name must be rejected");
        match err {
            ImportError::InvalidRow { row, message } => {
                assert_eq!(row, 3);
                assert!(message.contains("student_name"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
