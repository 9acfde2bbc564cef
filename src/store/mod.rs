//! Narrow interface between the booking engine and whatever document store
//! holds staff and appointment records.

pub(crate) mod sqlite;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::models::{Appointment, AppointmentStatus, Deposit, NewAppointment, StaffMember};

pub use sqlite::{seed_demo_staff, SqliteStore};

/// Which appointments a reader is interested in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppointmentFilter {
    All,
    Staff(String),
    /// One staff member's agenda for a single `YYYY-MM-DD` day.
    StaffOn { staff_id: String, date: String },
}

impl AppointmentFilter {
    pub fn from_staff_id(staff_id: Option<&str>) -> Self {
        match staff_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => AppointmentFilter::Staff(id.to_string()),
            None => AppointmentFilter::All,
        }
    }

    pub fn staff_on(staff_id: &str, date: &str) -> Self {
        AppointmentFilter::StaffOn {
            staff_id: staff_id.to_string(),
            date: date.trim().to_string(),
        }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        match self {
            AppointmentFilter::All => true,
            AppointmentFilter::Staff(id) => appointment.staff_id == *id,
            AppointmentFilter::StaffOn { staff_id, date } => {
                appointment.staff_id == *staff_id && appointment.date == *date
            }
        }
    }
}

/// Status and deposit a freshly created appointment starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opening {
    pub status: AppointmentStatus,
    pub deposit: Deposit,
}

/// One logical status change. Stores apply it as a single write, and only
/// while the record is still in `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub from: AppointmentStatus,
    pub status: AppointmentStatus,
    pub deposit_paid: Option<bool>,
    pub cancellation_reason: Option<String>,
}

impl StatusUpdate {
    pub fn confirm_payment() -> Self {
        Self {
            from: AppointmentStatus::Pending,
            status: AppointmentStatus::Confirmed,
            deposit_paid: Some(true),
            cancellation_reason: None,
        }
    }

    pub fn cancel(from: AppointmentStatus, reason: impl Into<String>) -> Self {
        Self {
            from,
            status: AppointmentStatus::Cancelled,
            deposit_paid: None,
            cancellation_reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
}

/// Pushed to subscribers after every successful write.
#[derive(Debug, Clone, Serialize)]
pub struct StoreEvent {
    pub kind: ChangeKind,
    pub appointment: Appointment,
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn create_appointment(
        &self,
        fields: NewAppointment,
        opening: Opening,
    ) -> Result<Appointment>;

    async fn update_appointment_status(
        &self,
        id: &str,
        update: StatusUpdate,
    ) -> Result<Appointment>;

    async fn get_appointment(&self, id: &str) -> Result<Option<Appointment>>;

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>>;

    /// Change feed. Dropping the receiver ends the subscription.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

#[async_trait]
pub trait RosterStore: Send + Sync {
    async fn list_staff(&self) -> Result<Vec<StaffMember>>;

    async fn get_staff(&self, id: &str) -> Result<Option<StaffMember>>;
}
