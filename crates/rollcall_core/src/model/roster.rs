//! Students, classes and memberships.
//!
//! # Responsibility
//! - Define the two class kinds and the records linked by memberships.
//! - Derive the import identity key for students.
//!
//! # Invariants
//! - `(grade, name, kind)` identifies exactly one class.
//! - `unique_key` identifies exactly one student.
//! - Teaching classes carry `TEACHING_CLASS_GRADE`; their display grade is
//!   resolved through member students, not read from the row.

use serde::{Deserialize, Serialize};

/// Stable storage identifier of a student.
pub type StudentId = i64;

/// Stable storage identifier of a class of either kind.
pub type ClassId = i64;

/// Grade label returned when a teaching class has no resolvable members.
pub const UNKNOWN_GRADE: &str = "unknown";

/// Synthetic grade stored on every teaching class.
pub const TEACHING_CLASS_GRADE: &str = "general";

/// Role of a class in the membership graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    /// Home-room grouping. Determines the grade shown in reports.
    Administrative,
    /// Cross-cutting instructional grouping. Unit of attendance submission.
    Teaching,
}

impl ClassKind {
    /// Storage/wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Administrative => "administrative",
            Self::Teaching => "teaching",
        }
    }

    /// Parses a storage/wire name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "administrative" => Some(Self::Administrative),
            "teaching" => Some(Self::Teaching),
            _ => None,
        }
    }
}

/// Class row shared by both kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub id: ClassId,
    /// Free-text grouping label. Meaningful only for administrative classes.
    pub grade: String,
    pub name: String,
    pub kind: ClassKind,
}

impl Class {
    pub fn is_administrative(&self) -> bool {
        self.kind == ClassKind::Administrative
    }

    pub fn is_teaching(&self) -> bool {
        self.kind == ClassKind::Teaching
    }
}

/// Student identity. Owned by the membership graph, never by one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    /// Import dedup key, see [`student_unique_key`].
    pub unique_key: String,
}

/// One validated tabular import row: a student, their administrative class
/// and one teaching class they attend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRow {
    pub grade: String,
    pub admin_class_name: String,
    pub student_name: String,
    pub teaching_class_name: String,
}

/// Builds the import identity key `grade-admin_class-name`.
///
/// Two rows naming the same student in the same administrative class map to
/// one student; the same name in another administrative class does not.
pub fn student_unique_key(grade: &str, admin_class_name: &str, student_name: &str) -> String {
    format!("{grade}-{admin_class_name}-{student_name}")
}

#[cfg(test)]
mod tests {
    use super::{student_unique_key, ClassKind};

    #[test]
    fn class_kind_parse_is_case_insensitive() {
        assert_eq!(ClassKind::parse(" Teaching "), Some(ClassKind::Teaching));
        assert_eq!(
            ClassKind::parse("ADMINISTRATIVE"),
            Some(ClassKind::Administrative)
        );
        assert_eq!(ClassKind::parse("homeroom"), None);
    }

    #[test]
    fn class_kind_round_trips_through_storage_name() {
        for kind in [ClassKind::Administrative, ClassKind::Teaching] {
            assert_eq!(ClassKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn unique_key_scopes_name_to_administrative_class() {
        let first = student_unique_key("Grade6", "ClassA", "Alice");
        let second = student_unique_key("Grade6", "ClassB", "Alice");
        assert_eq!(first, "Grade6-ClassA-Alice");
        assert_ne!(first, second);
    }
}
