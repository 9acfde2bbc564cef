use std::sync::Arc;

use serde::Serialize;

use crate::config::Settings;
use crate::error::Result;
use crate::lifecycle::LifecycleController;
use crate::read_model::AppointmentView;
use crate::store::{AppointmentFilter, AppointmentStore, ChangeKind, RosterStore, StoreEvent};

#[derive(Clone)]
pub struct AppState {
    pub appointments: Arc<dyn AppointmentStore>,
    pub roster: Arc<dyn RosterStore>,
    pub controller: Arc<LifecycleController>,
}

impl AppState {
    pub fn new<S>(store: Arc<S>, settings: &Settings) -> Self
    where
        S: AppointmentStore + RosterStore + 'static,
    {
        let appointments: Arc<dyn AppointmentStore> = store.clone();
        let roster: Arc<dyn RosterStore> = store;
        let controller = LifecycleController::new(
            appointments.clone(),
            settings.policy,
            settings.deposit_method.clone(),
        );
        Self {
            appointments,
            roster,
            controller: Arc::new(controller),
        }
    }

    /// Opens a read model scoped to `filter`, owned by the caller.
    pub async fn view(&self, filter: AppointmentFilter) -> Result<AppointmentView> {
        AppointmentView::open(self.appointments.as_ref(), filter).await
    }
}

/// Change notification pushed to dashboards.
#[derive(Clone, Debug, Serialize)]
pub struct ServerEvent {
    pub kind: ChangeKind,
    pub appointment_id: String,
    pub staff_id: String,
    pub status: String,
    pub client_name: String,
    pub client_phone: String,
    pub service: String,
    pub price: i64,
    pub date: String,
    pub time: String,
    pub deposit_paid: bool,
    pub cancellation_reason: Option<String>,
}

impl From<StoreEvent> for ServerEvent {
    fn from(event: StoreEvent) -> Self {
        let appt = event.appointment;
        Self {
            kind: event.kind,
            appointment_id: appt.id,
            staff_id: appt.staff_id,
            status: appt.status.to_string(),
            client_name: appt.client_name,
            client_phone: appt.client_phone,
            service: appt.service_name,
            price: appt.price,
            date: appt.date,
            time: appt.time,
            deposit_paid: appt.deposit.paid,
            cancellation_reason: appt.cancellation_reason,
        }
    }
}

/// What the client's own status page may see.
#[derive(Clone, Debug, Serialize)]
pub struct PublicStatusEvent {
    pub appointment_id: String,
    pub status: String,
    pub service: String,
    pub date: String,
    pub time: String,
}

impl From<&ServerEvent> for PublicStatusEvent {
    fn from(event: &ServerEvent) -> Self {
        Self {
            appointment_id: event.appointment_id.clone(),
            status: event.status.clone(),
            service: event.service.clone(),
            date: event.date.clone(),
            time: event.time.clone(),
        }
    }
}
