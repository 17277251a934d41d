use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::errors::LedgerError;
use crate::models::{AttendanceKey, AttendanceRecord, AttendanceStatus, AttendanceSummary, Course};

pub const EXCELLENT_THRESHOLD: f64 = 85.0;
pub const GOOD_THRESHOLD: f64 = 75.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttendanceStanding {
    Excellent,
    Good,
    NeedsAttention,
}

impl AttendanceStanding {
    pub fn classify(percentage: f64) -> Self {
        if percentage >= EXCELLENT_THRESHOLD {
            Self::Excellent
        } else if percentage >= GOOD_THRESHOLD {
            Self::Good
        } else {
            Self::NeedsAttention
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::NeedsAttention => "Needs Attention",
        }
    }
}

impl fmt::Display for AttendanceStanding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Round-half-up to the nearest integer percentage; 0 when no classes were held.
pub fn attendance_percentage(present: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let ratio = 100.0 * present as f64 / total as f64;
    (ratio + 0.5).floor() as u32
}

pub fn summarize<'a, I>(records: I) -> AttendanceSummary
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    let mut present_count = 0usize;
    let mut absent_count = 0usize;

    for record in records {
        match record.status {
            AttendanceStatus::Present => present_count += 1,
            AttendanceStatus::Absent => absent_count += 1,
        }
    }

    let total_classes = present_count + absent_count;
    AttendanceSummary {
        total_classes,
        present_count,
        absent_count,
        attendance_percentage: attendance_percentage(present_count, total_classes),
    }
}

impl AttendanceSummary {
    pub fn standing(&self) -> AttendanceStanding {
        AttendanceStanding::classify(self.attendance_percentage as f64)
    }
}

fn group_by<'a, F>(records: &'a [AttendanceRecord], key: F) -> BTreeMap<i64, AttendanceSummary>
where
    F: Fn(&AttendanceRecord) -> i64,
{
    let mut grouped: BTreeMap<i64, Vec<&'a AttendanceRecord>> = BTreeMap::new();
    for record in records {
        grouped.entry(key(record)).or_default().push(record);
    }

    grouped
        .into_iter()
        .map(|(id, items)| (id, summarize(items)))
        .collect()
}

pub fn by_course(records: &[AttendanceRecord]) -> BTreeMap<i64, AttendanceSummary> {
    group_by(records, |record| record.course_id)
}

pub fn by_student(records: &[AttendanceRecord]) -> BTreeMap<i64, AttendanceSummary> {
    group_by(records, |record| record.student_id)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentRate {
    pub department: String,
    pub course_count: usize,
    /// Mean of the already-rounded per-course percentages.
    pub average_rate: f64,
    /// Rate over the raw counts of every course in the department.
    pub pooled_rate: u32,
}

impl DepartmentRate {
    pub fn standing(&self) -> AttendanceStanding {
        AttendanceStanding::classify(self.average_rate)
    }
}

/// Department rollup as dashboards show it: a floating mean of rounded course
/// rates. This differs from `pooled_rate` when course sizes differ.
pub fn department_rates(records: &[AttendanceRecord], courses: &[Course]) -> Vec<DepartmentRate> {
    let per_course = by_course(records);
    let department_of: HashMap<i64, &str> = courses
        .iter()
        .map(|course| (course.id, course.department.as_str()))
        .collect();

    let mut departments: BTreeMap<&str, Vec<&AttendanceSummary>> = BTreeMap::new();
    for (course_id, summary) in &per_course {
        if let Some(department) = department_of.get(course_id) {
            departments.entry(*department).or_default().push(summary);
        }
    }

    departments
        .into_iter()
        .map(|(department, summaries)| {
            let course_count = summaries.len();
            let rate_sum: u32 = summaries.iter().map(|s| s.attendance_percentage).sum();
            let present: usize = summaries.iter().map(|s| s.present_count).sum();
            let total: usize = summaries.iter().map(|s| s.total_classes).sum();

            DepartmentRate {
                department: department.to_string(),
                course_count,
                average_rate: if course_count == 0 {
                    0.0
                } else {
                    rate_sum as f64 / course_count as f64
                },
                pooled_rate: attendance_percentage(present, total),
            }
        })
        .collect()
}

/// Attendance marks keyed by (student, slot, date). A mark is immutable
/// except through [`AttendanceLedger::update`].
#[derive(Debug, Clone, Default)]
pub struct AttendanceLedger {
    records: BTreeMap<AttendanceKey, AttendanceRecord>,
}

impl AttendanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn mark(&mut self, record: AttendanceRecord) -> Result<(), LedgerError> {
        let key = record.key();
        if self.records.contains_key(&key) {
            return Err(LedgerError::AlreadyMarked(key));
        }
        self.records.insert(key, record);
        Ok(())
    }

    /// Marks every listed student for one class session. Nothing is written
    /// if any student already has a mark for that slot and date.
    pub fn mark_session(
        &mut self,
        timetable_slot_id: i64,
        course_id: i64,
        date: NaiveDate,
        marked_by: i64,
        marks: &[(i64, AttendanceStatus)],
    ) -> Result<usize, LedgerError> {
        let mut pending: BTreeMap<AttendanceKey, AttendanceRecord> = BTreeMap::new();

        for &(student_id, status) in marks {
            let record = AttendanceRecord {
                student_id,
                course_id,
                timetable_slot_id,
                date,
                status,
                marked_by,
            };
            let key = record.key();
            if self.records.contains_key(&key) || pending.contains_key(&key) {
                return Err(LedgerError::AlreadyMarked(key));
            }
            pending.insert(key, record);
        }

        let written = pending.len();
        self.records.extend(pending);
        Ok(written)
    }

    pub fn update(
        &mut self,
        key: &AttendanceKey,
        status: AttendanceStatus,
        marked_by: i64,
    ) -> Result<&AttendanceRecord, LedgerError> {
        let record = self
            .records
            .get_mut(key)
            .ok_or(LedgerError::NotFound(*key))?;
        record.status = status;
        record.marked_by = marked_by;
        Ok(record)
    }

    pub fn get(&self, key: &AttendanceKey) -> Option<&AttendanceRecord> {
        self.records.get(key)
    }

    pub fn records(&self) -> impl Iterator<Item = &AttendanceRecord> {
        self.records.values()
    }

    pub fn into_records(self) -> Vec<AttendanceRecord> {
        self.records.into_values().collect()
    }
}
