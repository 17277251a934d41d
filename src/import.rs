use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::attendance::AttendanceLedger;
use crate::errors::ValidationError;
use crate::models::{AttendanceRecord, Course, GradeRecord, Role, TimetableSlot, UserRecord};
use crate::timetable::validate_slot;

/// Upper bound on a roster upload, matching the dashboard upload limit.
pub const MAX_IMPORT_BYTES: u64 = 10 * 1024 * 1024;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("Invalid email regex")
});

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Reads a JSON array or a headed CSV file into typed records.
pub fn load_records<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let records = if is_json(path) {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid JSON records in {}", path.display()))?
    } else {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let mut records = Vec::new();
        for (index, result) in reader.deserialize::<T>().enumerate() {
            // Line 1 is the header.
            let record = result
                .with_context(|| format!("{}: invalid row at line {}", path.display(), index + 2))?;
            records.push(record);
        }
        records
    };

    debug!(path = %path.display(), count = records.len(), "loaded records");
    Ok(records)
}

pub fn load_courses(path: &Path) -> anyhow::Result<Vec<Course>> {
    load_records(path)
}

pub fn load_grades(path: &Path) -> anyhow::Result<Vec<GradeRecord>> {
    let grades: Vec<GradeRecord> = load_records(path)?;
    let over_max = grades
        .iter()
        .filter(|record| record.grade.is_some_and(|grade| grade > record.max_marks))
        .count();
    if over_max > 0 {
        warn!(path = %path.display(), over_max, "grades exceed max marks");
    }
    Ok(grades)
}

/// Builds a ledger so a repeated (student, slot, date) mark fails the load.
pub fn load_attendance(path: &Path) -> anyhow::Result<AttendanceLedger> {
    let records: Vec<AttendanceRecord> = load_records(path)?;
    let json = is_json(path);
    let mut ledger = AttendanceLedger::new();
    for (index, record) in records.into_iter().enumerate() {
        ledger.mark(record).with_context(|| {
            if json {
                format!("{}: record {}", path.display(), index + 1)
            } else {
                // Line 1 is the header.
                format!("{}: line {}", path.display(), index + 2)
            }
        })?;
    }
    Ok(ledger)
}

pub fn load_slots(path: &Path) -> anyhow::Result<Vec<TimetableSlot>> {
    let slots: Vec<TimetableSlot> = load_records(path)?;
    for slot in &slots {
        validate_slot(slot).with_context(|| format!("{}: slot {}", path.display(), slot.id))?;
    }
    Ok(slots)
}

pub fn load_users(path: &Path) -> anyhow::Result<Vec<UserRecord>> {
    load_records(path)
}

#[derive(Debug, Clone, Deserialize)]
struct RosterRow {
    name: String,
    email: String,
    roll_number: String,
    department: String,
    role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportOutcome {
    pub accepted: Vec<UserRecord>,
    pub rejected: Vec<RejectedRow>,
}

fn validate_row(
    row: &RosterRow,
    emails: &HashSet<String>,
    rolls: &HashSet<String>,
) -> Result<(), ValidationError> {
    if row.name.trim().is_empty() {
        return Err(ValidationError::Empty("name"));
    }
    let email = row.email.trim();
    if !is_valid_email(email) {
        return Err(ValidationError::InvalidEmail(row.email.clone()));
    }
    let roll_number = row.roll_number.trim();
    if roll_number.is_empty() {
        return Err(ValidationError::Empty("roll_number"));
    }
    if emails.contains(&email.to_lowercase()) {
        return Err(ValidationError::Duplicate("email", email.to_string()));
    }
    if rolls.contains(roll_number) {
        return Err(ValidationError::Duplicate("roll_number", roll_number.to_string()));
    }
    Ok(())
}

/// Validates a roster CSV row by row. Bad rows are collected with their line
/// number and never abort the import; accepted users get sequential ids
/// starting at `first_id`.
pub fn import_roster(path: &Path, first_id: i64) -> anyhow::Result<ImportOutcome> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?
        .len();
    if size > MAX_IMPORT_BYTES {
        return Err(ValidationError::FileTooLarge(size, MAX_IMPORT_BYTES))
            .with_context(|| format!("refusing to import {}", path.display()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut outcome = ImportOutcome::default();
    let mut emails = HashSet::new();
    let mut rolls = HashSet::new();
    let mut next_id = first_id;

    for (index, result) in reader.deserialize::<RosterRow>().enumerate() {
        let line = index + 2;
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                outcome.rejected.push(RejectedRow {
                    line,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        if let Err(err) = validate_row(&row, &emails, &rolls) {
            outcome.rejected.push(RejectedRow {
                line,
                reason: err.to_string(),
            });
            continue;
        }

        emails.insert(row.email.trim().to_lowercase());
        rolls.insert(row.roll_number.trim().to_string());
        outcome.accepted.push(UserRecord {
            id: next_id,
            name: row.name.trim().to_string(),
            email: row.email.trim().to_string(),
            roll_number: row.roll_number.trim().to_string(),
            department: row.department.trim().to_string(),
            role: row.role,
        });
        next_id += 1;
    }

    info!(
        path = %path.display(),
        accepted = outcome.accepted.len(),
        rejected = outcome.rejected.len(),
        "roster import validated"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendanceStatus;
    use std::fs;

    #[test]
    fn loads_csv_attendance_into_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.csv");
        fs::write(
            &path,
            "student_id,course_id,timetable_slot_id,date,status,marked_by\n\
             1,10,100,2026-02-02,present,900\n\
             2,10,100,2026-02-02,absent,900\n",
        )
        .unwrap();

        let ledger = load_attendance(&path).unwrap();
        assert_eq!(ledger.len(), 2);
        let statuses: Vec<_> = ledger.records().map(|r| r.status).collect();
        assert_eq!(statuses, vec![AttendanceStatus::Present, AttendanceStatus::Absent]);
    }

    #[test]
    fn duplicate_attendance_fails_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.csv");
        fs::write(
            &path,
            "student_id,course_id,timetable_slot_id,date,status,marked_by\n\
             1,10,100,2026-02-02,present,900\n\
             1,10,100,2026-02-02,absent,901\n",
        )
        .unwrap();

        let err = format!("{:#}", load_attendance(&path).unwrap_err());
        assert!(err.contains("attendance.csv: line 3: attendance already marked"), "{err}");
    }

    #[test]
    fn duplicate_json_attendance_names_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.json");
        let row = r#"{"student_id": 1, "course_id": 10, "timetable_slot_id": 100, "date": "2026-02-02", "status": "present", "marked_by": 900}"#;
        fs::write(&path, format!("[{row}, {row}]")).unwrap();

        let err = format!("{:#}", load_attendance(&path).unwrap_err());
        assert!(err.contains("attendance.json: record 2: attendance already marked"), "{err}");
    }

    #[test]
    fn loads_ungraded_csv_cells_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grades.csv");
        fs::write(
            &path,
            "student_id,assignment_id,course_id,grade,max_marks,feedback,graded_at\n\
             1,1,10,80,100,Good work,2026-02-03T10:00:00Z\n\
             1,2,10,,100,,\n",
        )
        .unwrap();

        let grades = load_grades(&path).unwrap();
        assert_eq!(grades.len(), 2);
        assert_eq!(grades[0].grade, Some(80.0));
        assert_eq!(grades[0].feedback.as_deref(), Some("Good work"));
        assert!(grades[1].grade.is_none());
        assert!(grades[1].graded_at.is_none());
    }

    #[test]
    fn loads_json_courses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courses.json");
        fs::write(
            &path,
            r#"[{"id": 10, "code": "PHY101", "name": "Mechanics", "department": "Physics", "credits": 4}]"#,
        )
        .unwrap();

        let courses = load_courses(&path).unwrap();
        assert_eq!(courses[0].code, "PHY101");
        assert_eq!(courses[0].credits, 4.0);
    }

    #[test]
    fn rejects_slots_with_inverted_times() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slots.csv");
        fs::write(
            &path,
            "id,course_id,faculty_id,room,day,start,end\n\
             1,10,900,B-101,Mon,11:00:00,09:00:00\n",
        )
        .unwrap();

        assert!(load_slots(&path).is_err());
    }

    #[test]
    fn roster_import_collects_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.csv");
        fs::write(
            &path,
            "name,email,roll_number,department,role\n\
             Avery Lee,avery@campus.edu,R001,Physics,student\n\
             ,blank@campus.edu,R002,Physics,student\n\
             Jules Moreno,not-an-email,R003,History,student\n\
             Kiara Patel,AVERY@campus.edu,R004,Physics,student\n\
             Marcus Lee,marcus@campus.edu,R001,Chemistry,faculty\n\
             Dana Cole,dana@campus.edu,R005,History,janitor\n\
             Sam Ortiz, sam@campus.edu , R006 ,History,faculty\n",
        )
        .unwrap();

        let outcome = import_roster(&path, 500).unwrap();
        let accepted: Vec<(i64, &str)> = outcome
            .accepted
            .iter()
            .map(|user| (user.id, user.roll_number.as_str()))
            .collect();
        assert_eq!(accepted, vec![(500, "R001"), (501, "R006")]);
        assert_eq!(outcome.accepted[1].email, "sam@campus.edu");

        let lines: Vec<usize> = outcome.rejected.iter().map(|row| row.line).collect();
        assert_eq!(lines, vec![3, 4, 5, 6, 7]);
        assert_eq!(outcome.rejected[0].reason, "name must not be empty");
        assert!(outcome.rejected[2].reason.contains("duplicate email"));
        assert!(outcome.rejected[3].reason.contains("duplicate roll_number"));
    }

    #[test]
    fn roster_import_rejects_malformed_emails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.csv");
        fs::write(
            &path,
            "name,email,roll_number,department,role\n\
             Ana Diaz,a@@b.edu,R001,Physics,student\n\
             Ben Ode,x y@z.edu,R002,Physics,student\n\
             Cai Lin,c@d@e.edu,R003,Physics,student\n\
             Dee Roy,dee@campus,R004,Physics,student\n\
             Eli Fox,eli.fox+cs@mail.campus.edu,R005,Physics,student\n",
        )
        .unwrap();

        let outcome = import_roster(&path, 1).unwrap();
        let accepted: Vec<&str> = outcome.accepted.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(accepted, vec!["eli.fox+cs@mail.campus.edu"]);
        assert_eq!(outcome.rejected.len(), 4);
        assert!(outcome
            .rejected
            .iter()
            .all(|row| row.reason.starts_with("invalid email address")));
    }

    #[test]
    fn email_pattern_matches_plain_addresses() {
        assert!(is_valid_email("avery@campus.edu"));
        assert!(!is_valid_email("a@@b"));
        assert!(!is_valid_email("x y@z"));
        assert!(!is_valid_email("c@d@e"));
    }

    fn roster_padded_to(path: &Path, len: u64) {
        fs::write(
            path,
            "name,email,roll_number,department,role\n\
             Avery Lee,avery@campus.edu,R001,Physics,student\n",
        )
        .unwrap();
        fs::OpenOptions::new()
            .write(true)
            .open(path)
            .unwrap()
            .set_len(len)
            .unwrap();
    }

    #[test]
    fn roster_over_size_limit_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.csv");
        roster_padded_to(&path, MAX_IMPORT_BYTES + 1);

        let err = import_roster(&path, 1).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::FileTooLarge(MAX_IMPORT_BYTES + 1, MAX_IMPORT_BYTES))
        );
    }

    #[test]
    fn roster_at_size_limit_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.csv");
        roster_padded_to(&path, MAX_IMPORT_BYTES);

        let outcome = import_roster(&path, 1).unwrap();
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.accepted[0].roll_number, "R001");
    }
}
