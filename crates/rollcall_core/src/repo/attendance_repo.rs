//! Attendance store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Read daily absence facts for reporting and roster pre-population.
//! - Own the delete-then-insert replacement primitive behind submissions.
//!
//! # Invariants
//! - `replace_absences` clears and rewrites inside one IMMEDIATE transaction;
//!   readers never observe the cleared-but-not-rewritten state.
//! - The delete scope is per student, not per class: every member of the
//!   submitting class loses its record for the date, whichever class wrote it.
//! - Fact listings are ordered by insertion (`id ASC`).

use crate::model::attendance::{
    format_attendance_date, parse_attendance_date, AbsenceFact, AbsenceRecord,
};
use crate::model::roster::{ClassId, StudentId};
use crate::repo::roster_repo::{load_class, RepoError, RepoResult};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::collections::BTreeSet;

/// Keeps `IN (...)` lists well below SQLite's bound-parameter limit.
const DELETE_CHUNK_SIZE: usize = 500;

/// What one replacement did inside its transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// Members of the submitting class at commit time.
    pub member_count: usize,
    /// Records removed for the date.
    pub cleared: usize,
    /// Records inserted for the date.
    pub inserted: usize,
    /// Submitted ids that are not members of the submitting class.
    pub non_members: Vec<StudentId>,
}

/// Repository interface over daily absence facts.
pub trait AttendanceStore {
    /// Lists absence records for one date in insertion order.
    fn absence_records_for(&self, date: NaiveDate) -> RepoResult<Vec<AbsenceRecord>>;

    /// Lists `(student, teaching class)` absence facts for one date in
    /// insertion order.
    fn absence_facts_for(&self, date: NaiveDate) -> RepoResult<Vec<AbsenceFact>> {
        Ok(self
            .absence_records_for(date)?
            .iter()
            .map(AbsenceRecord::fact)
            .collect())
    }

    /// Returns whether the student already has an absence fact for the date.
    fn is_absent_today(&self, student_id: StudentId, date: NaiveDate) -> RepoResult<bool>;

    /// Replaces the date's absence facts for every member of
    /// `teaching_class_id` (and every submitted id) with `absent`.
    fn replace_absences(
        &self,
        teaching_class_id: ClassId,
        date: NaiveDate,
        absent: &BTreeSet<StudentId>,
    ) -> RepoResult<ReplaceOutcome>;
}

/// SQLite-backed attendance store.
pub struct SqliteAttendanceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAttendanceRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AttendanceStore for SqliteAttendanceRepository<'_> {
    fn absence_records_for(&self, date: NaiveDate) -> RepoResult<Vec<AbsenceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                id,
                student_id,
                class_id,
                attendance_date,
                is_absent
             FROM attendance_records
             WHERE attendance_date = ?1
               AND is_absent = 1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([format_attendance_date(date)])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }
        Ok(records)
    }

    fn is_absent_today(&self, student_id: StudentId, date: NaiveDate) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM attendance_records
                WHERE student_id = ?1
                  AND attendance_date = ?2
                  AND is_absent = 1
            );",
            params![student_id, format_attendance_date(date)],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn replace_absences(
        &self,
        teaching_class_id: ClassId,
        date: NaiveDate,
        absent: &BTreeSet<StudentId>,
    ) -> RepoResult<ReplaceOutcome> {
        let date_text = format_attendance_date(date);
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        if load_class(&tx, teaching_class_id)?.is_none() {
            return Err(RepoError::ClassNotFound(teaching_class_id));
        }
        for &student_id in absent {
            if !student_exists(&tx, student_id)? {
                return Err(RepoError::StudentNotFound(student_id));
            }
        }

        let members = member_ids(&tx, teaching_class_id)?;
        let non_members: Vec<StudentId> = absent.difference(&members).copied().collect();
        let scope: Vec<StudentId> = members.union(absent).copied().collect();

        let mut cleared = 0;
        for chunk in scope.chunks(DELETE_CHUNK_SIZE) {
            cleared += delete_for_students(&tx, &date_text, chunk)?;
        }

        let mut inserted = 0;
        {
            let mut insert = tx.prepare(
                "INSERT INTO attendance_records (student_id, class_id, attendance_date, is_absent)
                 VALUES (?1, ?2, ?3, 1);",
            )?;
            for &student_id in absent {
                inserted += insert.execute(params![student_id, teaching_class_id, date_text])?;
            }
        }

        tx.commit()?;
        Ok(ReplaceOutcome {
            member_count: members.len(),
            cleared,
            inserted,
            non_members,
        })
    }
}

fn student_exists(conn: &Connection, student_id: StudentId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM students WHERE id = ?1);",
        [student_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn member_ids(conn: &Connection, class_id: ClassId) -> RepoResult<BTreeSet<StudentId>> {
    let mut stmt =
        conn.prepare("SELECT student_id FROM student_class_memberships WHERE class_id = ?1;")?;
    let mut rows = stmt.query([class_id])?;
    let mut ids = BTreeSet::new();
    while let Some(row) = rows.next()? {
        ids.insert(row.get(0)?);
    }
    Ok(ids)
}

fn delete_for_students(
    conn: &Connection,
    date_text: &str,
    students: &[StudentId],
) -> RepoResult<usize> {
    if students.is_empty() {
        return Ok(0);
    }

    let placeholders = vec!["?"; students.len()].join(", ");
    let sql = format!(
        "DELETE FROM attendance_records
         WHERE attendance_date = ?
           AND student_id IN ({placeholders});"
    );
    let mut bind_values: Vec<Value> = Vec::with_capacity(students.len() + 1);
    bind_values.push(Value::Text(date_text.to_string()));
    bind_values.extend(students.iter().map(|&id| Value::Integer(id)));

    let removed = conn.execute(&sql, params_from_iter(bind_values))?;
    Ok(removed)
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<AbsenceRecord> {
    let date_text: String = row.get("attendance_date")?;
    let date = parse_attendance_date(&date_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid date `{date_text}` in attendance_records.attendance_date"
        ))
    })?;

    let is_absent = match row.get::<_, i64>("is_absent")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_absent value `{other}` in attendance_records.is_absent"
            )));
        }
    };

    Ok(AbsenceRecord {
        id: row.get("id")?,
        student_id: row.get("student_id")?,
        class_id: row.get("class_id")?,
        date,
        is_absent,
    })
}
