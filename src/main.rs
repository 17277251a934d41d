use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use uni_dashboard_aggregates::config::{AppConfig, ConfigOverrides};
use uni_dashboard_aggregates::listing::{CategoryFilter, ListView};
use uni_dashboard_aggregates::{
    attendance, grades, import, listing, models, report, timetable,
};

#[derive(Parser)]
#[command(name = "uni-aggregates")]
#[command(about = "Attendance, grade and roster aggregates for university dashboards", long_about = None)]
struct Cli {
    /// TOML configuration file (defaults to $UNI_AGGREGATES_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter, e.g. `debug` or `uni_aggregates=trace`
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize attendance per course, student and department
    #[command(group(
        ArgGroup::new("scope")
            .args(["student", "course"])
            .multiple(false)
    ))]
    Attendance {
        #[arg(long)]
        records: PathBuf,
        #[arg(long)]
        courses: PathBuf,
        #[arg(long)]
        student: Option<i64>,
        #[arg(long)]
        course: Option<i64>,
        #[arg(long)]
        json: bool,
    },
    /// Course averages, letter grades and overall GPA for one student
    Grades {
        #[arg(long)]
        grades: PathBuf,
        #[arg(long)]
        courses: PathBuf,
        #[arg(long)]
        student: i64,
        #[arg(long)]
        json: bool,
    },
    /// Search, filter and page through a user list
    Roster {
        #[arg(long)]
        users: PathBuf,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = "all")]
        department: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        page_size: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Validate a roster CSV before bulk import
    Import {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value_t = 1)]
        first_id: i64,
        #[arg(long)]
        json: bool,
    },
    /// List clashing timetable slots
    Timetable {
        #[arg(long)]
        slots: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown dashboard report
    Report {
        #[arg(long)]
        attendance: PathBuf,
        #[arg(long)]
        grades: PathBuf,
        #[arg(long)]
        courses: PathBuf,
        #[arg(long)]
        student: Option<i64>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level '{level}'"))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{rendered}");
    Ok(())
}

#[derive(Serialize)]
struct AttendanceOutput {
    overall: models::AttendanceSummary,
    courses: Vec<(i64, models::AttendanceSummary)>,
    students: Vec<(i64, models::AttendanceSummary)>,
    departments: Vec<attendance::DepartmentRate>,
}

fn run_attendance(
    records: &Path,
    courses: &Path,
    student: Option<i64>,
    course: Option<i64>,
    json: bool,
) -> anyhow::Result<()> {
    let ledger = import::load_attendance(records)?;
    let courses = import::load_courses(courses)?;
    let records: Vec<models::AttendanceRecord> = ledger
        .into_records()
        .into_iter()
        .filter(|record| student.map_or(true, |id| record.student_id == id))
        .filter(|record| course.map_or(true, |id| record.course_id == id))
        .collect();
    debug!(count = records.len(), "attendance records in scope");

    let output = AttendanceOutput {
        overall: attendance::summarize(&records),
        courses: attendance::by_course(&records).into_iter().collect(),
        students: attendance::by_student(&records).into_iter().collect(),
        departments: attendance::department_rates(&records, &courses),
    };

    if json {
        return print_json(&output);
    }

    println!(
        "Overall: {}% ({} of {} classes) {}",
        output.overall.attendance_percentage,
        output.overall.present_count,
        output.overall.total_classes,
        output.overall.standing()
    );
    println!("By course:");
    for (course_id, summary) in &output.courses {
        let code = courses
            .iter()
            .find(|c| c.id == *course_id)
            .map(|c| c.code.as_str())
            .unwrap_or("unknown");
        println!(
            "- {} ({}): {}% {}",
            code,
            course_id,
            summary.attendance_percentage,
            summary.standing()
        );
    }
    println!("By department:");
    for rate in &output.departments {
        println!(
            "- {}: {:.1}% mean of course rates, {}% pooled, {}",
            rate.department,
            rate.average_rate,
            rate.pooled_rate,
            rate.standing()
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct GradesOutput {
    student_id: i64,
    courses: Vec<grades::CourseGpa>,
    overall_gpa: f64,
}

fn run_grades(
    config: &AppConfig,
    grades_path: &Path,
    courses: &Path,
    student: i64,
    json: bool,
) -> anyhow::Result<()> {
    let scale = config.grade_scale()?;
    let records: Vec<models::GradeRecord> = import::load_grades(grades_path)?
        .into_iter()
        .filter(|record| record.student_id == student)
        .collect();
    let courses = import::load_courses(courses)?;

    let course_gpas = grades::course_gpas(&records, &courses, &scale);
    let overall = grades::round_to(
        grades::overall_gpa(&course_gpas),
        config.display.gpa_precision,
    );

    if json {
        return print_json(&GradesOutput {
            student_id: student,
            courses: course_gpas,
            overall_gpa: overall,
        });
    }

    if course_gpas.is_empty() {
        println!("No graded assignments for student {student}.");
        return Ok(());
    }
    for course in &course_gpas {
        println!(
            "- {}: {:.1}% {} ({:.1} points x {} credits)",
            course.course_code, course.average_grade, course.letter, course.gpa_points, course.credits
        );
    }
    println!(
        "Overall GPA: {:.*}",
        config.display.gpa_precision as usize,
        overall
    );
    Ok(())
}

#[derive(Serialize)]
struct RosterOutput<'a> {
    page: listing::Page<&'a models::UserRecord>,
    buttons: Vec<usize>,
}

fn run_roster(
    config: &AppConfig,
    users: &Path,
    search: &str,
    department: &str,
    page: usize,
    json: bool,
) -> anyhow::Result<()> {
    let users = import::load_users(users)?;
    let mut view = ListView::new(config.display.page_size);
    view.set_search(search);
    view.set_category(CategoryFilter::parse(department));
    view.set_page(page);

    let output = RosterOutput {
        page: view.apply(&users),
        buttons: view.buttons(&users).collect(),
    };

    if json {
        return print_json(&output);
    }

    let info = &output.page.pagination;
    println!(
        "Page {} of {} ({} matching users)",
        info.page, info.total_pages, info.total
    );
    for user in &output.page.items {
        println!(
            "- {} <{}> {} [{}]",
            user.name, user.email, user.roll_number, user.department
        );
    }
    let buttons: Vec<String> = output
        .buttons
        .iter()
        .map(|n| if *n == info.page { format!("[{n}]") } else { n.to_string() })
        .collect();
    println!("Pages: {}", buttons.join(" "));
    Ok(())
}

fn run_import(csv: &Path, first_id: i64, json: bool) -> anyhow::Result<()> {
    let outcome = import::import_roster(csv, first_id)?;
    if json {
        return print_json(&outcome);
    }

    println!(
        "{} rows accepted, {} rejected from {}.",
        outcome.accepted.len(),
        outcome.rejected.len(),
        csv.display()
    );
    for row in &outcome.rejected {
        println!("- line {}: {}", row.line, row.reason);
    }
    Ok(())
}

fn run_timetable(slots: &Path, json: bool) -> anyhow::Result<()> {
    let slots = import::load_slots(slots)?;
    let conflicts = timetable::find_conflicts(&slots);
    if json {
        return print_json(&conflicts);
    }

    if conflicts.is_empty() {
        println!("No timetable conflicts (slots checked: {}).", slots.len());
        return Ok(());
    }
    for conflict in &conflicts {
        println!(
            "- slots {} and {} clash ({})",
            conflict.first_slot_id, conflict.second_slot_id, conflict.kind
        );
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let page_size = match &cli.command {
        Commands::Roster { page_size, .. } => *page_size,
        _ => None,
    };
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_overrides(&ConfigOverrides {
        log_level: cli.log_level.clone(),
        page_size,
    });
    init_logging(&config.logging.level)?;
    info!(
        "{} {} starting",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    match cli.command {
        Commands::Attendance {
            records,
            courses,
            student,
            course,
            json,
        } => run_attendance(&records, &courses, student, course, json)?,
        Commands::Grades {
            grades,
            courses,
            student,
            json,
        } => run_grades(&config, &grades, &courses, student, json)?,
        Commands::Roster {
            users,
            search,
            department,
            page,
            json,
            ..
        } => run_roster(&config, &users, &search, &department, page, json)?,
        Commands::Import {
            csv,
            first_id,
            json,
        } => run_import(&csv, first_id, json)?,
        Commands::Timetable { slots, json } => run_timetable(&slots, json)?,
        Commands::Report {
            attendance,
            grades,
            courses,
            student,
            out,
        } => {
            let scale = config.grade_scale()?;
            let ledger = import::load_attendance(&attendance)?;
            let grade_records = import::load_grades(&grades)?;
            let courses = import::load_courses(&courses)?;
            let attendance_records = ledger.into_records();

            let report = report::build_report(&report::ReportContext {
                attendance: &attendance_records,
                grades: &grade_records,
                courses: &courses,
                scale: &scale,
                gpa_precision: config.display.gpa_precision,
                student_id: student,
            });
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
