use std::fmt;

use serde::Serialize;

use crate::errors::ValidationError;
use crate::models::TimetableSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConflictKind {
    Room,
    Faculty,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Room => f.write_str("room"),
            Self::Faculty => f.write_str("faculty"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotConflict {
    pub first_slot_id: i64,
    pub second_slot_id: i64,
    pub kind: ConflictKind,
}

pub fn validate_slot(slot: &TimetableSlot) -> Result<(), ValidationError> {
    if slot.start >= slot.end {
        return Err(ValidationError::InvalidSlot(slot.id));
    }
    if slot.room.trim().is_empty() {
        return Err(ValidationError::Empty("room"));
    }
    Ok(())
}

/// Half-open intervals on the same weekday; a class ending at 10:00 does not
/// clash with one starting at 10:00.
pub fn overlaps(a: &TimetableSlot, b: &TimetableSlot) -> bool {
    a.day == b.day && a.start < b.end && b.start < a.end
}

/// Every overlapping pair sharing a room or a faculty member. A pair sharing
/// both is reported once per kind.
pub fn find_conflicts(slots: &[TimetableSlot]) -> Vec<SlotConflict> {
    let mut conflicts = Vec::new();

    for (i, first) in slots.iter().enumerate() {
        for second in slots.iter().skip(i + 1) {
            if !overlaps(first, second) {
                continue;
            }
            if first.room == second.room {
                conflicts.push(SlotConflict {
                    first_slot_id: first.id,
                    second_slot_id: second.id,
                    kind: ConflictKind::Room,
                });
            }
            if first.faculty_id == second.faculty_id {
                conflicts.push(SlotConflict {
                    first_slot_id: first.id,
                    second_slot_id: second.id,
                    kind: ConflictKind::Faculty,
                });
            }
        }
    }

    conflicts
}
