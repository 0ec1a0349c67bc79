//! Daily absence report use-case service.
//!
//! # Responsibility
//! - Join a day's absence facts to administrative classes.
//! - Group by grade then class, dedupe students, render report text.
//!
//! # Invariants
//! - Output is recomputed on every call; unchanged storage yields
//!   byte-identical text.
//! - Grades and class names sort lexicographically. Students keep first-seen
//!   order across facts, which is record insertion order.
//! - Dedup is by student id; two students sharing a name stay separate.
//! - Students without an administrative class land in `ungrouped` instead of
//!   being dropped.

use crate::model::attendance::format_attendance_date;
use crate::model::roster::{Class, ClassId, StudentId};
use crate::repo::attendance_repo::AttendanceStore;
use crate::repo::roster_repo::{MembershipGraph, RepoError, RepoResult};
use chrono::NaiveDate;
use log::{info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

/// Student line in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportStudent {
    pub id: StudentId,
    pub name: String,
}

/// Absent students of one administrative class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassSection {
    pub class_id: ClassId,
    pub class_name: String,
    pub students: Vec<ReportStudent>,
}

/// Classes with absences inside one grade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeSection {
    pub grade: String,
    pub classes: Vec<ClassSection>,
}

/// Structured daily report, rendered by [`render_report`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbsenceReport {
    pub date: NaiveDate,
    pub grades: Vec<GradeSection>,
    /// Absent students with no administrative class, first-seen order.
    pub ungrouped: Vec<ReportStudent>,
}

impl AbsenceReport {
    /// Nothing to report for the date.
    pub fn is_empty(&self) -> bool {
        self.grades.is_empty() && self.ungrouped.is_empty()
    }

    /// Unique absent students across all sections.
    pub fn total_absent(&self) -> usize {
        self.grades
            .iter()
            .flat_map(|grade| grade.classes.iter())
            .map(|class| class.students.len())
            .sum::<usize>()
            + self.ungrouped.len()
    }
}

/// Language preset for report text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportLocale {
    #[default]
    En,
    Zh,
}

impl ReportLocale {
    /// Parses `en` or `zh`, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Self::En),
            "zh" => Some(Self::Zh),
            _ => None,
        }
    }

    pub fn labels(self) -> ReportLabels {
        match self {
            Self::En => ReportLabels::english(),
            Self::Zh => ReportLabels::chinese(),
        }
    }
}

/// Every user-visible string the renderer emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLabels {
    /// Appended to the grade label to form the grade header.
    pub grade_header_suffix: String,
    pub class_prefix: String,
    pub count_prefix: String,
    pub names_prefix: String,
    pub names_suffix: String,
    pub name_separator: String,
    /// Header of the block for students without an administrative class.
    pub ungrouped_header: String,
    /// Sole line of an empty report.
    pub empty_report: String,
}

impl ReportLabels {
    pub fn english() -> Self {
        Self {
            grade_header_suffix: " absence summary".to_string(),
            class_prefix: "Class: ".to_string(),
            count_prefix: "Absent count: ".to_string(),
            names_prefix: "Absent students: ".to_string(),
            names_suffix: ".".to_string(),
            name_separator: ", ".to_string(),
            ungrouped_header: "Students without an administrative class".to_string(),
            empty_report: "No absences recorded today.".to_string(),
        }
    }

    pub fn chinese() -> Self {
        Self {
            grade_header_suffix: "缺勤情况统计".to_string(),
            class_prefix: "班级：".to_string(),
            count_prefix: "缺勤人数：".to_string(),
            names_prefix: "缺勤学生姓名：".to_string(),
            names_suffix: "。".to_string(),
            name_separator: "，".to_string(),
            ungrouped_header: "未分配行政班级的学生".to_string(),
            empty_report: "今日所有班级均无缺勤记录。".to_string(),
        }
    }
}

impl Default for ReportLabels {
    fn default() -> Self {
        Self::english()
    }
}

/// Report service facade over graph and store implementations.
pub struct ReportService<G: MembershipGraph, S: AttendanceStore> {
    graph: G,
    store: S,
    labels: ReportLabels,
}

impl<G: MembershipGraph, S: AttendanceStore> ReportService<G, S> {
    /// Creates a service rendering with English labels.
    pub fn new(graph: G, store: S) -> Self {
        Self::with_labels(graph, store, ReportLabels::default())
    }

    pub fn with_labels(graph: G, store: S, labels: ReportLabels) -> Self {
        Self {
            graph,
            store,
            labels,
        }
    }

    /// Builds the structured report for one date.
    pub fn build(&self, date: NaiveDate) -> RepoResult<AbsenceReport> {
        let started_at = Instant::now();
        let facts = self.store.absence_facts_for(date)?;

        let mut grades: BTreeMap<String, BTreeMap<String, ClassBucket>> = BTreeMap::new();
        let mut ungrouped = ClassBucket::default();
        let mut home_classes: HashMap<StudentId, Option<Class>> = HashMap::new();

        for fact in facts {
            let student = self
                .graph
                .get_student(fact.student_id)?
                .ok_or(RepoError::StudentNotFound(fact.student_id))?;
            let home = match home_classes.get(&student.id) {
                Some(cached) => cached.clone(),
                None => {
                    let loaded = self.graph.administrative_class_of(student.id)?;
                    home_classes.insert(student.id, loaded.clone());
                    loaded
                }
            };
            let entry = ReportStudent {
                id: student.id,
                name: student.name,
            };

            match home {
                Some(class) => grades
                    .entry(class.grade)
                    .or_default()
                    .entry(class.name)
                    .or_insert_with(|| ClassBucket::for_class(class.id))
                    .push(entry),
                None => ungrouped.push(entry),
            }
        }

        let report = AbsenceReport {
            date,
            grades: grades
                .into_iter()
                .map(|(grade, classes)| GradeSection {
                    grade,
                    classes: classes
                        .into_iter()
                        .map(|(class_name, bucket)| ClassSection {
                            class_id: bucket.class_id,
                            class_name,
                            students: bucket.students,
                        })
                        .collect(),
                })
                .collect(),
            ungrouped: ungrouped.students,
        };

        if !report.ungrouped.is_empty() {
            warn!(
                "event=report_build module=service status=ungrouped date={} count={}",
                format_attendance_date(date),
                report.ungrouped.len()
            );
        }
        info!(
            "event=report_build module=service status=ok date={} grades={} absent={} duration_ms={}",
            format_attendance_date(date),
            report.grades.len(),
            report.total_absent(),
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    /// Builds and renders the report text for one date.
    pub fn build_report(&self, date: NaiveDate) -> RepoResult<String> {
        let report = self.build(date)?;
        Ok(render_report(&report, &self.labels))
    }
}

/// Renders report text.
///
/// Each grade gets a header line, each class a name line, a count line, a
/// names line and a blank separator. Lines are joined with `\n`.
pub fn render_report(report: &AbsenceReport, labels: &ReportLabels) -> String {
    if report.is_empty() {
        return labels.empty_report.clone();
    }

    let mut lines = Vec::new();
    for grade in &report.grades {
        lines.push(format!("{}{}", grade.grade, labels.grade_header_suffix));
        for class in &grade.classes {
            lines.push(format!("{}{}", labels.class_prefix, class.class_name));
            push_student_lines(&mut lines, &class.students, labels);
        }
    }

    if !report.ungrouped.is_empty() {
        lines.push(labels.ungrouped_header.clone());
        push_student_lines(&mut lines, &report.ungrouped, labels);
    }

    lines.join("\n")
}

fn push_student_lines(lines: &mut Vec<String>, students: &[ReportStudent], labels: &ReportLabels) {
    let names = students
        .iter()
        .map(|student| student.name.as_str())
        .collect::<Vec<_>>()
        .join(labels.name_separator.as_str());
    lines.push(format!("{}{}", labels.count_prefix, students.len()));
    lines.push(format!(
        "{}{}{}",
        labels.names_prefix, names, labels.names_suffix
    ));
    lines.push(String::new());
}

#[derive(Debug, Default)]
struct ClassBucket {
    class_id: ClassId,
    students: Vec<ReportStudent>,
    seen: HashSet<StudentId>,
}

impl ClassBucket {
    fn for_class(class_id: ClassId) -> Self {
        Self {
            class_id,
            ..Self::default()
        }
    }

    fn push(&mut self, student: ReportStudent) {
        if self.seen.insert(student.id) {
            self.students.push(student);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        render_report, AbsenceReport, ClassBucket, ClassSection, GradeSection, ReportLabels,
        ReportLocale, ReportStudent,
    };
    use chrono::NaiveDate;

    fn student(id: i64, name: &str) -> ReportStudent {
        ReportStudent {
            id,
            name: name.to_string(),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date")
    }

    #[test]
    fn bucket_dedupes_by_id_not_name() {
        let mut bucket = ClassBucket::for_class(7);
        bucket.push(student(1, "Alice"));
        bucket.push(student(2, "Alice"));
        bucket.push(student(1, "Alice"));
        assert_eq!(
            bucket.students,
            vec![student(1, "Alice"), student(2, "Alice")]
        );
    }

    #[test]
    fn empty_report_renders_sentinel_only() {
        let report = AbsenceReport {
            date: day(),
            grades: Vec::new(),
            ungrouped: Vec::new(),
        };
        assert_eq!(
            render_report(&report, &ReportLabels::english()),
            "No absences recorded today."
        );
        assert_eq!(
            render_report(&report, &ReportLabels::chinese()),
            "今日所有班级均无缺勤记录。"
        );
    }

    #[test]
    fn chinese_labels_use_full_width_punctuation() {
        let report = AbsenceReport {
            date: day(),
            grades: vec![GradeSection {
                grade: "六年级".to_string(),
                classes: vec![ClassSection {
                    class_id: 1,
                    class_name: "六1班".to_string(),
                    students: vec![student(1, "王少钦"), student(2, "颜圣容")],
                }],
            }],
            ungrouped: Vec::new(),
        };
        assert_eq!(
            render_report(&report, &ReportLocale::Zh.labels()),
            "六年级缺勤情况统计\n班级：六1班\n缺勤人数：2\n缺勤学生姓名：王少钦，颜圣容。\n"
        );
    }

    #[test]
    fn locale_parse_accepts_known_codes() {
        assert_eq!(ReportLocale::parse(" ZH "), Some(ReportLocale::Zh));
        assert_eq!(ReportLocale::parse("en"), Some(ReportLocale::En));
        assert_eq!(ReportLocale::parse("fr"), None);
    }
}
