use std::sync::Arc;

use serde::Serialize;

use crate::config::CreationPolicy;
use crate::error::{BookingError, Result};
use crate::messaging::{self, OutboundMessage};
use crate::models::{Appointment, AppointmentStatus, NewAppointment};
use crate::store::{AppointmentStore, StatusUpdate};

/// Result of a cancellation: the stored record plus the message the
/// messaging collaborator should deliver to the client.
#[derive(Debug, Clone, Serialize)]
pub struct Cancellation {
    pub appointment: Appointment,
    pub notice: OutboundMessage,
}

/// Owns every status change an appointment goes through.
///
/// ```text
/// pending ──confirm──▶ confirmed
///    │                    │
///    └──cancel──▶ cancelled ◀──cancel──┘
/// ```
pub struct LifecycleController {
    store: Arc<dyn AppointmentStore>,
    policy: CreationPolicy,
    deposit_method: String,
}

impl LifecycleController {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        policy: CreationPolicy,
        deposit_method: impl Into<String>,
    ) -> Self {
        Self {
            store,
            policy,
            deposit_method: deposit_method.into(),
        }
    }

    pub async fn create(&self, draft: NewAppointment) -> Result<Appointment> {
        let opening = self.policy.opening(&self.deposit_method);
        let appointment = self.store.create_appointment(draft, opening).await?;
        log::info!(
            "Appointment {} created for {} on {} at {} ({})",
            appointment.id,
            appointment.staff_id,
            appointment.date,
            appointment.time,
            appointment.status
        );
        Ok(appointment)
    }

    /// Staff acknowledges the deposit. Only pending appointments qualify.
    pub async fn confirm_payment(&self, id: &str) -> Result<Appointment> {
        let current = self.load(id).await?;
        if current.status != AppointmentStatus::Pending {
            return Err(BookingError::InvalidState {
                action: "confirm",
                status: current.status.to_string(),
            });
        }

        let appointment = self
            .store
            .update_appointment_status(id, StatusUpdate::confirm_payment())
            .await?;
        log::info!("Appointment {id} confirmed, deposit marked paid");
        Ok(appointment)
    }

    pub async fn cancel(&self, id: &str, reason: &str) -> Result<Cancellation> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(BookingError::validation("a cancellation reason is required"));
        }

        let current = self.load(id).await?;
        if current.status.is_terminal() {
            return Err(BookingError::InvalidState {
                action: "cancel",
                status: current.status.to_string(),
            });
        }

        let appointment = self
            .store
            .update_appointment_status(id, StatusUpdate::cancel(current.status, reason))
            .await?;
        log::info!("Appointment {id} cancelled from {}", current.status);

        let notice = messaging::cancellation_notice(&appointment, reason);
        Ok(Cancellation {
            appointment,
            notice,
        })
    }

    async fn load(&self, id: &str) -> Result<Appointment> {
        self.store
            .get_appointment(id)
            .await?
            .ok_or_else(|| BookingError::not_found("appointment", id))
    }
}
