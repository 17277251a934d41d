use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use crate::errors::ValidationError;
use crate::models::{Course, GradeRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LetterGrade {
    F,
    D,
    DPlus,
    CMinus,
    C,
    CPlus,
    BMinus,
    B,
    BPlus,
    AMinus,
    A,
    APlus,
}

/// Lower bound of each letter, highest first. Lookup takes the first match.
const LETTER_THRESHOLDS: [(f64, LetterGrade); 11] = [
    (97.0, LetterGrade::APlus),
    (93.0, LetterGrade::A),
    (90.0, LetterGrade::AMinus),
    (87.0, LetterGrade::BPlus),
    (83.0, LetterGrade::B),
    (80.0, LetterGrade::BMinus),
    (77.0, LetterGrade::CPlus),
    (73.0, LetterGrade::C),
    (70.0, LetterGrade::CMinus),
    (67.0, LetterGrade::DPlus),
    (65.0, LetterGrade::D),
];

impl LetterGrade {
    pub const ALL: [LetterGrade; 12] = [
        LetterGrade::APlus,
        LetterGrade::A,
        LetterGrade::AMinus,
        LetterGrade::BPlus,
        LetterGrade::B,
        LetterGrade::BMinus,
        LetterGrade::CPlus,
        LetterGrade::C,
        LetterGrade::CMinus,
        LetterGrade::DPlus,
        LetterGrade::D,
        LetterGrade::F,
    ];

    pub fn from_percentage(percentage: f64) -> Self {
        LETTER_THRESHOLDS
            .iter()
            .find(|(threshold, _)| percentage >= *threshold)
            .map(|(_, letter)| *letter)
            .unwrap_or(LetterGrade::F)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::AMinus => "A-",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::BMinus => "B-",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::CMinus => "C-",
            Self::DPlus => "D+",
            Self::D => "D",
            Self::F => "F",
        }
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|letter| letter.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ValidationError::UnknownLetter(input.to_string()))
    }

    fn default_points(&self) -> f64 {
        match self {
            Self::APlus | Self::A => 4.0,
            Self::AMinus => 3.7,
            Self::BPlus => 3.3,
            Self::B => 3.0,
            Self::BMinus => 2.7,
            Self::CPlus => 2.3,
            Self::C => 2.0,
            Self::CMinus => 1.7,
            Self::DPlus => 1.3,
            Self::D => 1.0,
            Self::F => 0.0,
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GPA points per letter. Institutions set their own values; the default is
/// the conventional 4.0 scale.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeScale {
    points: BTreeMap<LetterGrade, f64>,
}

impl Default for GradeScale {
    fn default() -> Self {
        let points = LetterGrade::ALL
            .iter()
            .map(|letter| (*letter, letter.default_points()))
            .collect();
        Self { points }
    }
}

impl GradeScale {
    /// Applies `letter -> points` overrides on top of the default scale.
    pub fn with_overrides<'a, I>(overrides: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (&'a String, &'a f64)>,
    {
        let mut scale = Self::default();
        let mut seen = BTreeSet::new();
        for (letter, points) in overrides {
            let parsed = LetterGrade::parse(letter)?;
            if !seen.insert(parsed) {
                return Err(ValidationError::Duplicate("grade letter", letter.clone()));
            }
            if !(0.0..=4.0).contains(points) {
                return Err(ValidationError::InvalidPoints(
                    letter.clone(),
                    points.to_string(),
                ));
            }
            scale.points.insert(parsed, *points);
        }
        Ok(scale)
    }

    pub fn points(&self, letter: LetterGrade) -> f64 {
        self.points
            .get(&letter)
            .copied()
            .unwrap_or_else(|| letter.default_points())
    }

    pub fn points_for_percentage(&self, percentage: f64) -> f64 {
        self.points(LetterGrade::from_percentage(percentage))
    }
}

/// Round-half-up to `decimals` places, for display.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor + 0.5).floor() / factor
}

pub fn percentage(grade: f64, max_marks: f64) -> f64 {
    if max_marks > 0.0 {
        100.0 * grade / max_marks
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CourseAverage {
    pub average: f64,
    pub graded_count: usize,
    pub ungraded_count: usize,
}

/// Mean percentage over graded records only; ungraded ones are counted but
/// never treated as zero.
pub fn course_average<'a, I>(records: I) -> CourseAverage
where
    I: IntoIterator<Item = &'a GradeRecord>,
{
    let mut sum = 0.0;
    let mut graded_count = 0usize;
    let mut ungraded_count = 0usize;

    for record in records {
        match record.grade {
            Some(grade) => {
                graded_count += 1;
                sum += percentage(grade, record.max_marks);
            }
            None => ungraded_count += 1,
        }
    }

    CourseAverage {
        average: if graded_count > 0 {
            sum / graded_count as f64
        } else {
            0.0
        },
        graded_count,
        ungraded_count,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseGpa {
    pub course_id: i64,
    pub course_code: String,
    pub average_grade: f64,
    pub letter: LetterGrade,
    pub gpa_points: f64,
    pub credits: f64,
}

/// One entry per known course with at least one graded record, ordered by
/// course code. Records for courses missing from `courses` are skipped.
pub fn course_gpas(records: &[GradeRecord], courses: &[Course], scale: &GradeScale) -> Vec<CourseGpa> {
    let mut grouped: HashMap<i64, Vec<&GradeRecord>> = HashMap::new();
    for record in records {
        grouped.entry(record.course_id).or_default().push(record);
    }

    let mut values: Vec<CourseGpa> = courses
        .iter()
        .filter_map(|course| {
            let average = course_average(grouped.get(&course.id)?.iter().copied());
            if average.graded_count == 0 {
                return None;
            }
            let letter = LetterGrade::from_percentage(average.average);
            Some(CourseGpa {
                course_id: course.id,
                course_code: course.code.clone(),
                average_grade: average.average,
                letter,
                gpa_points: scale.points(letter),
                credits: course.credits,
            })
        })
        .collect();

    values.sort_by(|a, b| a.course_code.cmp(&b.course_code));
    values
}

/// Credit-weighted mean of course GPA points; 0 when no credits are carried.
pub fn overall_gpa(courses: &[CourseGpa]) -> f64 {
    let credits: f64 = courses.iter().map(|course| course.credits).sum();
    if credits <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = courses
        .iter()
        .map(|course| course.gpa_points * course.credits)
        .sum();
    weighted / credits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graded(course_id: i64, assignment_id: i64, grade: Option<f64>, max_marks: f64) -> GradeRecord {
        GradeRecord {
            student_id: 1,
            assignment_id,
            course_id,
            grade,
            max_marks,
            feedback: None,
            graded_at: None,
        }
    }

    fn course(id: i64, code: &str, credits: f64) -> Course {
        Course {
            id,
            code: code.to_string(),
            name: code.to_string(),
            department: "Science".to_string(),
            credits,
        }
    }

    fn course_gpa(points: f64, credits: f64) -> CourseGpa {
        CourseGpa {
            course_id: 0,
            course_code: "X".to_string(),
            average_grade: 0.0,
            letter: LetterGrade::F,
            gpa_points: points,
            credits,
        }
    }

    #[test]
    fn letter_boundaries_favor_higher_grade() {
        assert_eq!(LetterGrade::from_percentage(97.0), LetterGrade::APlus);
        assert_eq!(LetterGrade::from_percentage(96.9), LetterGrade::A);
        assert_eq!(LetterGrade::from_percentage(65.0), LetterGrade::D);
        assert_eq!(LetterGrade::from_percentage(64.9), LetterGrade::F);
        assert_eq!(LetterGrade::from_percentage(80.0).to_string(), "B-");
        assert_eq!(LetterGrade::from_percentage(120.0), LetterGrade::APlus);
    }

    #[test]
    fn letter_lookup_is_monotonic() {
        let mut previous = LetterGrade::F;
        for tenth in 0..=1000 {
            let letter = LetterGrade::from_percentage(tenth as f64 / 10.0);
            assert!(letter >= previous, "{letter} dropped below {previous} at {tenth}");
            previous = letter;
        }
    }

    #[test]
    fn parses_letters_case_insensitively() {
        assert_eq!(LetterGrade::parse("a-").unwrap(), LetterGrade::AMinus);
        assert_eq!(LetterGrade::parse(" B+ ").unwrap(), LetterGrade::BPlus);
        assert!(matches!(
            LetterGrade::parse("E"),
            Err(ValidationError::UnknownLetter(_))
        ));
    }

    #[test]
    fn scale_overrides_replace_only_named_letters() {
        let overrides: BTreeMap<String, f64> =
            [("A+".to_string(), 4.0), ("A".to_string(), 3.9)].into_iter().collect();
        let scale = GradeScale::with_overrides(&overrides).unwrap();
        assert_eq!(scale.points(LetterGrade::A), 3.9);
        assert_eq!(scale.points(LetterGrade::B), 3.0);
        assert_eq!(scale.points_for_percentage(50.0), 0.0);

        let invalid: BTreeMap<String, f64> = [("B".to_string(), 5.0)].into_iter().collect();
        assert!(GradeScale::with_overrides(&invalid).is_err());
    }

    #[test]
    fn scale_rejects_letter_named_twice() {
        let overrides: BTreeMap<String, f64> =
            [("A".to_string(), 4.0), ("a".to_string(), 3.9)].into_iter().collect();
        assert_eq!(
            GradeScale::with_overrides(&overrides),
            Err(ValidationError::Duplicate("grade letter", "a".to_string()))
        );
    }

    #[test]
    fn average_excludes_ungraded_assignments() {
        let records = vec![
            graded(1, 1, Some(80.0), 100.0),
            graded(1, 2, None, 100.0),
            graded(1, 3, Some(90.0), 100.0),
        ];
        let average = course_average(&records);
        assert!((average.average - 85.0).abs() < 1e-9);
        assert_eq!(average.graded_count, 2);
        assert_eq!(average.ungraded_count, 1);
    }

    #[test]
    fn average_scales_by_max_marks() {
        let records = vec![graded(1, 1, Some(15.0), 20.0), graded(1, 2, Some(45.0), 50.0)];
        let average = course_average(&records);
        assert!((average.average - 82.5).abs() < 1e-9);
    }

    #[test]
    fn average_of_nothing_graded_is_zero() {
        let records = vec![graded(1, 1, None, 100.0)];
        assert_eq!(course_average(&records).average, 0.0);
        assert_eq!(course_average(&Vec::<GradeRecord>::new()).graded_count, 0);
    }

    #[test]
    fn overall_gpa_weights_by_credits() {
        let gpa = overall_gpa(&[course_gpa(4.0, 3.0), course_gpa(3.0, 4.0)]);
        assert!((gpa - 24.0 / 7.0).abs() < 1e-9);
        assert_eq!(round_to(gpa, 2), 3.43);
        assert_eq!(overall_gpa(&[]), 0.0);
    }

    #[test]
    fn courses_without_graded_work_drop_out_of_gpa() {
        let courses = vec![course(1, "MATH101", 3.0), course(2, "PHYS101", 4.0), course(3, "HIST101", 2.0)];
        let records = vec![
            graded(1, 1, Some(98.0), 100.0),
            graded(2, 2, Some(84.0), 100.0),
            graded(3, 3, None, 100.0),
        ];

        let gpas = course_gpas(&records, &courses, &GradeScale::default());
        assert_eq!(gpas.len(), 2);
        assert_eq!(gpas[0].course_code, "MATH101");
        assert_eq!(gpas[0].letter, LetterGrade::APlus);
        assert_eq!(gpas[1].letter, LetterGrade::B);
        assert_eq!(round_to(overall_gpa(&gpas), 2), 3.43);
    }

    #[test]
    fn round_to_rounds_half_up() {
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(3.14159, 2), 3.14);
        assert_eq!(round_to(85.0, 1), 85.0);
    }
}
