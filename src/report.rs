use std::collections::HashMap;
use std::fmt::Write;

use crate::attendance::{self, AttendanceStanding};
use crate::grades::{self, GradeScale};
use crate::models::{AttendanceRecord, Course, GradeRecord};

pub struct ReportContext<'a> {
    pub attendance: &'a [AttendanceRecord],
    pub grades: &'a [GradeRecord],
    pub courses: &'a [Course],
    pub scale: &'a GradeScale,
    pub gpa_precision: u32,
    pub student_id: Option<i64>,
}

fn course_label(courses: &HashMap<i64, &Course>, course_id: i64) -> String {
    courses
        .get(&course_id)
        .map(|course| format!("{} {}", course.code, course.name))
        .unwrap_or_else(|| format!("course {course_id}"))
}

pub fn build_report(ctx: &ReportContext<'_>) -> String {
    let courses: HashMap<i64, &Course> = ctx.courses.iter().map(|c| (c.id, c)).collect();
    let mut output = String::new();

    let _ = writeln!(output, "# Academic Dashboard Report");
    match ctx.student_id {
        Some(student_id) => {
            let _ = writeln!(output, "Generated for student {student_id}");
        }
        None => {
            let _ = writeln!(output, "Generated for all students");
        }
    }

    let attendance: Vec<AttendanceRecord> = ctx
        .attendance
        .iter()
        .filter(|record| ctx.student_id.map_or(true, |id| record.student_id == id))
        .cloned()
        .collect();

    let _ = writeln!(output);
    let _ = writeln!(output, "## Attendance by Course");
    let per_course = attendance::by_course(&attendance);
    if per_course.is_empty() {
        let _ = writeln!(output, "No attendance recorded.");
    } else {
        for (course_id, summary) in &per_course {
            let _ = writeln!(
                output,
                "- {}: {}% ({} of {} classes) {}",
                course_label(&courses, *course_id),
                summary.attendance_percentage,
                summary.present_count,
                summary.total_classes,
                summary.standing()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Department Attendance");
    let departments = attendance::department_rates(&attendance, ctx.courses);
    if departments.is_empty() {
        let _ = writeln!(output, "No department attendance recorded.");
    } else {
        for rate in &departments {
            let _ = writeln!(
                output,
                "- {}: {:.1}% mean course rate (courses: {}, pooled {}%) {}",
                rate.department,
                rate.average_rate,
                rate.course_count,
                rate.pooled_rate,
                rate.standing()
            );
        }
    }

    if ctx.student_id.is_none() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Students Needing Attention");
        let flagged: Vec<_> = attendance::by_student(&attendance)
            .into_iter()
            .filter(|(_, summary)| summary.standing() == AttendanceStanding::NeedsAttention)
            .collect();
        if flagged.is_empty() {
            let _ = writeln!(output, "Every student is at or above the attendance threshold.");
        } else {
            for (student_id, summary) in flagged {
                let _ = writeln!(
                    output,
                    "- student {}: {}% ({} absences)",
                    student_id, summary.attendance_percentage, summary.absent_count
                );
            }
        }
    }

    let grade_records: Vec<GradeRecord> = ctx
        .grades
        .iter()
        .filter(|record| ctx.student_id.map_or(true, |id| record.student_id == id))
        .cloned()
        .collect();
    let course_gpas = grades::course_gpas(&grade_records, ctx.courses, ctx.scale);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Course Grades");
    if course_gpas.is_empty() {
        let _ = writeln!(output, "No graded assignments.");
    } else {
        for course in &course_gpas {
            let _ = writeln!(
                output,
                "- {}: {:.1}% ({}, {:.1} points, {} credits)",
                course_label(&courses, course.course_id),
                course.average_grade,
                course.letter,
                course.gpa_points,
                course.credits
            );
        }
    }

    if ctx.student_id.is_some() {
        let gpa = grades::round_to(grades::overall_gpa(&course_gpas), ctx.gpa_precision);
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "Overall GPA: {:.*}",
            ctx.gpa_precision as usize,
            gpa
        );
    }

    output
}
