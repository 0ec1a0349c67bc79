//! Membership graph contracts and SQLite implementation.
//!
//! # Responsibility
//! - Resolve the many-to-many student/class graph in both directions.
//! - Own idempotent get-or-create import writes for classes, students and
//!   memberships.
//!
//! # Invariants
//! - Administrative classes list by `grade ASC, name ASC`; teaching classes
//!   list by `name ASC`. Ties break on `id ASC`.
//! - Duplicate membership inserts are no-ops, never errors.
//! - An import batch is written in one transaction or not at all.

use crate::db::DbError;
use crate::model::roster::{
    student_unique_key, Class, ClassId, ClassKind, ImportRow, Student, StudentId,
    TEACHING_CLASS_GRADE,
};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

const CLASS_SELECT_SQL: &str = "SELECT
    c.id AS id,
    c.grade AS grade,
    c.name AS name,
    c.kind AS kind
FROM classes c";

const STUDENT_SELECT_SQL: &str = "SELECT
    s.id AS id,
    s.name AS name,
    s.unique_key AS unique_key
FROM students s";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by roster and attendance storage.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    ClassNotFound(ClassId),
    StudentNotFound(StudentId),
    InvalidData(String),
}

impl RepoError {
    /// Stable status code: `not_found` or `storage_error`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ClassNotFound(_) | Self::StudentNotFound(_) => "not_found",
            Self::Db(_) | Self::InvalidData(_) => "storage_error",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ClassNotFound(id) => write!(f, "class not found: {id}"),
            Self::StudentNotFound(id) => write!(f, "student not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::ClassNotFound(_) => None,
            Self::StudentNotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Counters reported by one import batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Rows processed.
    pub rows: usize,
    /// Classes of either kind inserted by this batch.
    pub classes_created: usize,
    /// Students inserted by this batch.
    pub students_created: usize,
    /// Rows whose student already existed under the same `unique_key`.
    pub students_merged: usize,
    /// Membership edges inserted by this batch.
    pub memberships_created: usize,
}

/// Outcome of a get-or-create lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    Created(i64),
    Existing(i64),
}

impl Lookup {
    fn id(self) -> i64 {
        match self {
            Self::Created(id) | Self::Existing(id) => id,
        }
    }

    fn was_created(self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Read contract over the student/class membership graph.
pub trait MembershipGraph {
    /// Loads one class by id.
    fn get_class(&self, class_id: ClassId) -> RepoResult<Option<Class>>;
    /// Loads one student by id.
    fn get_student(&self, student_id: StudentId) -> RepoResult<Option<Student>>;
    /// Lists classes of one kind in display order.
    fn classes_of_kind(&self, kind: ClassKind) -> RepoResult<Vec<Class>>;
    /// Lists members of one class, ordered by `name ASC, id ASC`.
    fn students_of(&self, class_id: ClassId) -> RepoResult<Vec<Student>>;
    /// Lists distinct grades of administrative classes shared by members of
    /// one class, ordered ascending.
    fn administrative_grades_of(&self, class_id: ClassId) -> RepoResult<Vec<String>>;
    /// Loads the administrative class a student belongs to, if any.
    ///
    /// When convention is violated and several exist, the first by
    /// `grade, name, id` wins.
    fn administrative_class_of(&self, student_id: StudentId) -> RepoResult<Option<Class>>;
}

/// Write contract used by tabular import.
pub trait RosterWriter {
    /// Upserts classes, students and memberships for every row in one
    /// transaction. Rows must already be normalized.
    fn import_rows(&self, rows: &[ImportRow]) -> RepoResult<ImportSummary>;
}

/// SQLite-backed membership graph.
pub struct SqliteRosterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRosterRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl MembershipGraph for SqliteRosterRepository<'_> {
    fn get_class(&self, class_id: ClassId) -> RepoResult<Option<Class>> {
        load_class(self.conn, class_id)
    }

    fn get_student(&self, student_id: StudentId) -> RepoResult<Option<Student>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{STUDENT_SELECT_SQL} WHERE s.id = ?1;"))?;
        let mut rows = stmt.query([student_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_student_row(row)?));
        }
        Ok(None)
    }

    fn classes_of_kind(&self, kind: ClassKind) -> RepoResult<Vec<Class>> {
        let order = match kind {
            ClassKind::Administrative => "c.grade ASC, c.name ASC, c.id ASC",
            ClassKind::Teaching => "c.name ASC, c.id ASC",
        };
        let mut stmt = self.conn.prepare(&format!(
            "{CLASS_SELECT_SQL} WHERE c.kind = ?1 ORDER BY {order};"
        ))?;
        let mut rows = stmt.query([kind.as_str()])?;
        let mut classes = Vec::new();
        while let Some(row) = rows.next()? {
            classes.push(parse_class_row(row)?);
        }
        Ok(classes)
    }

    fn students_of(&self, class_id: ClassId) -> RepoResult<Vec<Student>> {
        let mut stmt = self.conn.prepare(&format!(
            "{STUDENT_SELECT_SQL}
             INNER JOIN student_class_memberships m ON m.student_id = s.id
             WHERE m.class_id = ?1
             ORDER BY s.name ASC, s.id ASC;"
        ))?;
        let mut rows = stmt.query([class_id])?;
        let mut students = Vec::new();
        while let Some(row) = rows.next()? {
            students.push(parse_student_row(row)?);
        }
        Ok(students)
    }

    fn administrative_grades_of(&self, class_id: ClassId) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT c.grade
             FROM student_class_memberships taught
             INNER JOIN student_class_memberships home ON home.student_id = taught.student_id
             INNER JOIN classes c ON c.id = home.class_id
             WHERE taught.class_id = ?1
               AND c.kind = 'administrative'
             ORDER BY c.grade ASC;",
        )?;
        let mut rows = stmt.query([class_id])?;
        let mut grades = Vec::new();
        while let Some(row) = rows.next()? {
            grades.push(row.get(0)?);
        }
        Ok(grades)
    }

    fn administrative_class_of(&self, student_id: StudentId) -> RepoResult<Option<Class>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CLASS_SELECT_SQL}
             INNER JOIN student_class_memberships m ON m.class_id = c.id
             WHERE m.student_id = ?1
               AND c.kind = 'administrative'
             ORDER BY c.grade ASC, c.name ASC, c.id ASC
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query([student_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_class_row(row)?));
        }
        Ok(None)
    }
}

impl RosterWriter for SqliteRosterRepository<'_> {
    fn import_rows(&self, rows: &[ImportRow]) -> RepoResult<ImportSummary> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut summary = ImportSummary::default();

        for row in rows {
            let admin_class = get_or_create_class(
                &tx,
                row.grade.as_str(),
                row.admin_class_name.as_str(),
                ClassKind::Administrative,
            )?;
            let teaching_class = get_or_create_class(
                &tx,
                TEACHING_CLASS_GRADE,
                row.teaching_class_name.as_str(),
                ClassKind::Teaching,
            )?;
            let unique_key = student_unique_key(
                row.grade.as_str(),
                row.admin_class_name.as_str(),
                row.student_name.as_str(),
            );
            let student = get_or_create_student(&tx, row.student_name.as_str(), &unique_key)?;

            for lookup in [admin_class, teaching_class] {
                if lookup.was_created() {
                    summary.classes_created += 1;
                }
            }
            if student.was_created() {
                summary.students_created += 1;
            } else {
                summary.students_merged += 1;
                debug!(
                    "event=roster_import module=repo status=merged student_id={}",
                    student.id()
                );
            }

            for class_id in [admin_class.id(), teaching_class.id()] {
                if link_membership(&tx, student.id(), class_id)? {
                    summary.memberships_created += 1;
                }
            }
            summary.rows += 1;
        }

        tx.commit()?;
        Ok(summary)
    }
}

/// Loads one class by id on any connection or open transaction.
pub(crate) fn load_class(conn: &Connection, class_id: ClassId) -> RepoResult<Option<Class>> {
    let mut stmt = conn.prepare(&format!("{CLASS_SELECT_SQL} WHERE c.id = ?1;"))?;
    let mut rows = stmt.query([class_id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_class_row(row)?));
    }
    Ok(None)
}

fn get_or_create_class(
    conn: &Connection,
    grade: &str,
    name: &str,
    kind: ClassKind,
) -> RepoResult<Lookup> {
    let existing: Option<ClassId> = conn
        .query_row(
            "SELECT id FROM classes WHERE grade = ?1 AND name = ?2 AND kind = ?3;",
            params![grade, name, kind.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(Lookup::Existing(id));
    }

    conn.execute(
        "INSERT INTO classes (grade, name, kind) VALUES (?1, ?2, ?3);",
        params![grade, name, kind.as_str()],
    )?;
    Ok(Lookup::Created(conn.last_insert_rowid()))
}

fn get_or_create_student(conn: &Connection, name: &str, unique_key: &str) -> RepoResult<Lookup> {
    let existing: Option<StudentId> = conn
        .query_row(
            "SELECT id FROM students WHERE unique_key = ?1;",
            [unique_key],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(Lookup::Existing(id));
    }

    conn.execute(
        "INSERT INTO students (name, unique_key) VALUES (?1, ?2);",
        params![name, unique_key],
    )?;
    Ok(Lookup::Created(conn.last_insert_rowid()))
}

fn link_membership(
    conn: &Connection,
    student_id: StudentId,
    class_id: ClassId,
) -> RepoResult<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO student_class_memberships (student_id, class_id)
         VALUES (?1, ?2);",
        params![student_id, class_id],
    )?;
    Ok(changed > 0)
}

fn parse_class_row(row: &Row<'_>) -> RepoResult<Class> {
    let kind_text: String = row.get("kind")?;
    let kind = ClassKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid class kind `{kind_text}` in classes.kind"))
    })?;

    Ok(Class {
        id: row.get("id")?,
        grade: row.get("grade")?,
        name: row.get("name")?,
        kind,
    })
}

fn parse_student_row(row: &Row<'_>) -> RepoResult<Student> {
    Ok(Student {
        id: row.get("id")?,
        name: row.get("name")?,
        unique_key: row.get("unique_key")?,
    })
}
