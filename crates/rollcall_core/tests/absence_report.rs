use chrono::NaiveDate;
use rollcall_core::db::open_db_in_memory;
use rollcall_core::{
    AttendanceService, ClassKind, ImportRow, ReportLabels, ReportLocale, ReportService,
    RosterService, SqliteAttendanceRepository, SqliteRosterRepository,
};
use rusqlite::{params, Connection};

fn row(grade: &str, admin: &str, student: &str, teaching: &str) -> ImportRow {
    ImportRow {
        grade: grade.to_string(),
        admin_class_name: admin.to_string(),
        student_name: student.to_string(),
        teaching_class_name: teaching.to_string(),
    }
}

fn import(conn: &Connection, rows: &[ImportRow]) {
    RosterService::new(SqliteRosterRepository::new(conn))
        .import_rows(rows)
        .unwrap();
}

fn submit(conn: &Connection, teaching_class: &str, date: NaiveDate, names: &[&str]) {
    let class = class_id(conn, teaching_class, ClassKind::Teaching);
    let ids: Vec<i64> = names.iter().map(|name| student_id(conn, name)).collect();
    AttendanceService::new(
        SqliteRosterRepository::new(conn),
        SqliteAttendanceRepository::new(conn),
    )
    .submit(class, date, &ids)
    .unwrap();
}

fn report(conn: &Connection, date: NaiveDate) -> String {
    ReportService::new(
        SqliteRosterRepository::new(conn),
        SqliteAttendanceRepository::new(conn),
    )
    .build_report(date)
    .unwrap()
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn student_id(conn: &Connection, name: &str) -> i64 {
    conn.query_row(
        "SELECT id FROM students WHERE name = ?1 ORDER BY id LIMIT 1;",
        [name],
        |row| row.get(0),
    )
    .unwrap()
}

fn class_id(conn: &Connection, name: &str, kind: ClassKind) -> i64 {
    conn.query_row(
        "SELECT id FROM classes WHERE name = ?1 AND kind = ?2;",
        params![name, kind.as_str()],
        |row| row.get(0),
    )
    .unwrap()
}

fn add_student(conn: &Connection, name: &str, unique_key: &str, classes: &[i64]) -> i64 {
    conn.execute(
        "INSERT INTO students (name, unique_key) VALUES (?1, ?2);",
        params![name, unique_key],
    )
    .unwrap();
    let id = conn.last_insert_rowid();
    for class in classes {
        conn.execute(
            "INSERT INTO student_class_memberships (student_id, class_id) VALUES (?1, ?2);",
            params![id, class],
        )
        .unwrap();
    }
    id
}

#[test]
fn groups_absences_by_grade_then_administrative_class() {
    let conn = open_db_in_memory().unwrap();
    import(
        &conn,
        &[
            row("Grade6", "ClassA", "Alice", "Room1"),
            row("Grade6", "ClassA", "Bob", "Room3"),
            row("Grade7", "ClassB", "Carol", "Room1"),
        ],
    );

    submit(&conn, "Room1", day(), &["Alice", "Carol"]);

    assert_eq!(
        report(&conn, day()),
        "Grade6 absence summary\n\
         Class: ClassA\n\
         Absent count: 1\n\
         Absent students: Alice.\n\
         \n\
         Grade7 absence summary\n\
         Class: ClassB\n\
         Absent count: 1\n\
         Absent students: Carol.\n"
    );
}

#[test]
fn empty_day_renders_sentinel() {
    let conn = open_db_in_memory().unwrap();
    import(&conn, &[row("Grade6", "ClassA", "Alice", "Room1")]);

    assert_eq!(report(&conn, day()), "No absences recorded today.");

    submit(&conn, "Room1", day(), &["Alice"]);
    submit(&conn, "Room1", day(), &[]);
    assert_eq!(report(&conn, day()), "No absences recorded today.");
}

#[test]
fn student_in_two_teaching_classes_is_listed_once() {
    let conn = open_db_in_memory().unwrap();
    import(
        &conn,
        &[
            row("Grade6", "ClassA", "Alice", "Room1"),
            row("Grade6", "ClassA", "Alice", "Room2"),
            row("Grade6", "ClassA", "Bob", "Room2"),
        ],
    );

    submit(&conn, "Room1", day(), &["Alice"]);
    submit(&conn, "Room2", day(), &["Alice", "Bob"]);

    let text = report(&conn, day());
    let class_block = "Absent count: 2\nAbsent students: Alice, Bob.\n";
    assert_eq!(text.matches("Alice").count(), 1);
    assert!(text.contains(class_block));
}

#[test]
fn report_is_byte_identical_across_calls() {
    let conn = open_db_in_memory().unwrap();
    import(
        &conn,
        &[
            row("Grade6", "ClassA", "Alice", "Room1"),
            row("Grade7", "ClassB", "Carol", "Room1"),
        ],
    );
    submit(&conn, "Room1", day(), &["Alice", "Carol"]);

    let first = report(&conn, day());
    let second = report(&conn, day());
    assert_eq!(first, second);

    submit(&conn, "Room1", day(), &["Alice", "Carol"]);
    assert_eq!(report(&conn, day()), first);
}

#[test]
fn students_sharing_a_name_are_not_merged() {
    let conn = open_db_in_memory().unwrap();
    import(&conn, &[row("Grade6", "ClassA", "Alice", "Room1")]);
    let class_a = class_id(&conn, "ClassA", ClassKind::Administrative);
    let room1 = class_id(&conn, "Room1", ClassKind::Teaching);
    let first_alice = student_id(&conn, "Alice");
    let second_alice = add_student(&conn, "Alice", "manual-alice", &[class_a, room1]);

    AttendanceService::new(
        SqliteRosterRepository::new(&conn),
        SqliteAttendanceRepository::new(&conn),
    )
    .submit(room1, day(), &[first_alice, second_alice])
    .unwrap();

    let text = report(&conn, day());
    let class_block = "Absent count: 2\nAbsent students: Alice, Alice.\n";
    assert!(text.contains(class_block));
}

#[test]
fn names_keep_first_seen_order_not_alphabetical() {
    let conn = open_db_in_memory().unwrap();
    import(
        &conn,
        &[
            row("Grade6", "ClassA", "Zed", "Room1"),
            row("Grade6", "ClassA", "Amy", "Room1"),
        ],
    );

    submit(&conn, "Room1", day(), &["Amy", "Zed"]);

    let text = report(&conn, day());
    assert!(text.contains("Absent students: Zed, Amy.\n"));
}

#[test]
fn grades_and_classes_sort_lexicographically() {
    let conn = open_db_in_memory().unwrap();
    import(
        &conn,
        &[
            row("Grade6", "ClassB", "Bea", "Room1"),
            row("Grade6", "ClassA", "Abe", "Room1"),
            row("Grade10", "ClassZ", "Zoe", "Room1"),
        ],
    );

    submit(&conn, "Room1", day(), &["Bea", "Abe", "Zoe"]);

    let text = report(&conn, day());
    let headers: Vec<&str> = text
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with("Absent"))
        .collect();
    assert_eq!(
        headers,
        vec![
            "Grade10 absence summary",
            "Class: ClassZ",
            "Grade6 absence summary",
            "Class: ClassA",
            "Class: ClassB",
        ]
    );
}

#[test]
fn students_without_administrative_class_are_reported_as_ungrouped() {
    let conn = open_db_in_memory().unwrap();
    import(&conn, &[row("Grade6", "ClassA", "Alice", "Room1")]);
    let room1 = class_id(&conn, "Room1", ClassKind::Teaching);
    add_student(&conn, "Eve", "transfer-eve", &[room1]);

    submit(&conn, "Room1", day(), &["Eve"]);
    assert_eq!(
        report(&conn, day()),
        "Students without an administrative class\n\
         Absent count: 1\n\
         Absent students: Eve.\n"
    );

    submit(&conn, "Room1", day(), &["Alice", "Eve"]);
    let text = report(&conn, day());
    let grade_at = text.find("Grade6 absence summary").unwrap();
    let ungrouped_at = text
        .find("Students without an administrative class")
        .unwrap();
    assert!(grade_at < ungrouped_at);

    let structured = ReportService::new(
        SqliteRosterRepository::new(&conn),
        SqliteAttendanceRepository::new(&conn),
    )
    .build(day())
    .unwrap();
    assert_eq!(structured.total_absent(), 2);
    assert_eq!(structured.ungrouped.len(), 1);
    assert_eq!(structured.ungrouped[0].name, "Eve");
}

#[test]
fn chinese_labels_render_full_width_report() {
    let conn = open_db_in_memory().unwrap();
    import(
        &conn,
        &[
            row("六年级", "六1班", "王少钦", "101教室"),
            row("六年级", "六1班", "颜圣容", "101教室"),
            row("六年级", "六2班", "赵宇航", "101教室"),
            row("七年级", "七3班", "吴伟", "102教室"),
        ],
    );
    submit(&conn, "101教室", day(), &["王少钦", "赵宇航"]);
    submit(&conn, "102教室", day(), &["吴伟"]);

    let text = ReportService::with_labels(
        SqliteRosterRepository::new(&conn),
        SqliteAttendanceRepository::new(&conn),
        ReportLocale::Zh.labels(),
    )
    .build_report(day())
    .unwrap();

    assert_eq!(
        text,
        "七年级缺勤情况统计\n\
         班级：七3班\n\
         缺勤人数：1\n\
         缺勤学生姓名：吴伟。\n\
         \n\
         六年级缺勤情况统计\n\
         班级：六1班\n\
         缺勤人数：1\n\
         缺勤学生姓名：王少钦。\n\
         \n\
         班级：六2班\n\
         缺勤人数：1\n\
         缺勤学生姓名：赵宇航。\n"
    );
}

#[test]
fn structured_report_serializes_for_json_callers() {
    let conn = open_db_in_memory().unwrap();
    import(&conn, &[row("Grade6", "ClassA", "Alice", "Room1")]);
    submit(&conn, "Room1", day(), &["Alice"]);

    let built = ReportService::with_labels(
        SqliteRosterRepository::new(&conn),
        SqliteAttendanceRepository::new(&conn),
        ReportLabels::english(),
    )
    .build(day())
    .unwrap();
    let value = serde_json::to_value(&built).unwrap();

    assert_eq!(value["date"], "2024-01-01");
    assert_eq!(value["grades"][0]["grade"], "Grade6");
    let first_class = &value["grades"][0]["classes"][0];
    assert_eq!(first_class["class_name"], "ClassA");
    assert_eq!(first_class["students"][0]["name"], "Alice");
}
