use serde::Serialize;

use crate::models::{Appointment, AppointmentStatus};

pub const OPENING_HOUR: u32 = 10;
pub const CLOSING_HOUR: u32 = 20;
pub const SLOT_MINUTES: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub time: String,
    pub available: bool,
}

/// Hour slots for one staff member's day, ascending from opening hour.
///
/// Only appointments for `staff_id` on `date` that are not cancelled can
/// block a slot. A slot is blocked when an appointment starts less than
/// [`SLOT_MINUTES`] away from it; exactly one slot-width apart is free.
pub fn compute_slots(staff_id: &str, date: &str, appointments: &[Appointment]) -> Vec<Slot> {
    let taken: Vec<u32> = appointments
        .iter()
        .filter(|appt| {
            appt.staff_id == staff_id
                && appt.date == date
                && appt.status != AppointmentStatus::Cancelled
        })
        .filter_map(|appt| minutes_of_day(&appt.time))
        .collect();

    (OPENING_HOUR..CLOSING_HOUR)
        .map(|hour| {
            let slot_minutes = hour * 60;
            let blocked = taken
                .iter()
                .any(|&minutes| slot_minutes.abs_diff(minutes) < SLOT_MINUTES);
            Slot {
                time: slot_label(hour),
                available: !blocked,
            }
        })
        .collect()
}

pub fn slot_label(hour: u32) -> String {
    format!("{hour}:00")
}

/// Parses `H:MM` / `HH:MM` into minutes since midnight.
pub fn minutes_of_day(time: &str) -> Option<u32> {
    let (hours, minutes) = time.trim().split_once(':')?;
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}
