use std::fmt::{Display, Formatter};

use crate::models::AttendanceKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    AlreadyMarked(AttendanceKey),
    NotFound(AttendanceKey),
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyMarked(key) => write!(f, "attendance already marked for {key}"),
            Self::NotFound(key) => write!(f, "no attendance recorded for {key}"),
        }
    }
}

impl std::error::Error for LedgerError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Empty(&'static str),
    InvalidEmail(String),
    Duplicate(&'static str, String),
    UnknownLetter(String),
    InvalidPoints(String, String),
    InvalidSlot(i64),
    FileTooLarge(u64, u64),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty(field) => write!(f, "{field} must not be empty"),
            Self::InvalidEmail(email) => write!(f, "invalid email address '{email}'"),
            Self::Duplicate(field, value) => write!(f, "duplicate {field} '{value}'"),
            Self::UnknownLetter(letter) => write!(f, "unknown letter grade '{letter}'"),
            Self::InvalidPoints(letter, points) => {
                write!(f, "grade points for {letter} must be within 0.0..=4.0, got {points}")
            }
            Self::InvalidSlot(id) => write!(f, "timetable slot {id} must start before it ends"),
            Self::FileTooLarge(size, max) => {
                write!(f, "file is {size} bytes, the import limit is {max} bytes")
            }
        }
    }
}

impl std::error::Error for ValidationError {}
