use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::error::Result;
use crate::models::{Appointment, AppointmentStatus};
use crate::slots::{compute_slots, minutes_of_day, Slot};
use crate::store::{AppointmentFilter, AppointmentStore, StoreEvent};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub confirmed: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    pub fn tally<'a>(appointments: impl IntoIterator<Item = &'a Appointment>) -> Self {
        appointments
            .into_iter()
            .fold(StatusCounts::default(), |mut counts, appt| {
                match appt.status {
                    AppointmentStatus::Pending => counts.pending += 1,
                    AppointmentStatus::Confirmed => counts.confirmed += 1,
                    AppointmentStatus::Cancelled => counts.cancelled += 1,
                }
                counts
            })
    }
}

/// What [`AppointmentView::next_change`] folded into the view.
#[derive(Debug, Clone)]
pub enum ViewChange {
    Applied(StoreEvent),
    /// The feed overflowed and the view was rebuilt from a fresh snapshot.
    Reloaded,
}

/// Appointments for one subject, kept current from the store's change feed.
///
/// Each reader opens its own view scoped to what it needs; nothing is shared
/// between requests. Dropping the view ends its subscription.
pub struct AppointmentView {
    filter: AppointmentFilter,
    appointments: Vec<Appointment>,
    events: broadcast::Receiver<StoreEvent>,
}

impl AppointmentView {
    pub async fn open(store: &dyn AppointmentStore, filter: AppointmentFilter) -> Result<Self> {
        // Subscribe first so nothing written during the snapshot is lost.
        let events = store.subscribe();
        let mut appointments = store.list_appointments(&filter).await?;
        sort(&mut appointments);
        Ok(Self {
            filter,
            appointments,
            events,
        })
    }

    /// Waits for the next change to this view's subject and folds it in.
    /// Returns `None` once the store's feed is closed.
    pub async fn next_change(&mut self, store: &dyn AppointmentStore) -> Result<Option<ViewChange>> {
        loop {
            match self.events.recv().await {
                Ok(event) => {
                    if self.apply(event.clone()) {
                        return Ok(Some(ViewChange::Applied(event)));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Appointment feed lagged by {skipped} events, reloading");
                    self.appointments = store.list_appointments(&self.filter).await?;
                    sort(&mut self.appointments);
                    return Ok(Some(ViewChange::Reloaded));
                }
                Err(RecvError::Closed) => return Ok(None),
            }
        }
    }

    /// Upserts one event. Returns false when the event is for another subject.
    pub fn apply(&mut self, event: StoreEvent) -> bool {
        let appointment = event.appointment;
        if !self.filter.matches(&appointment) {
            return false;
        }
        match self.appointments.iter_mut().find(|a| a.id == appointment.id) {
            Some(existing) => *existing = appointment,
            None => {
                self.appointments.push(appointment);
                sort(&mut self.appointments);
            }
        }
        true
    }

    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn slots(&self, staff_id: &str, date: &str) -> Vec<Slot> {
        compute_slots(staff_id, date, &self.appointments)
    }

    pub fn counts(&self) -> StatusCounts {
        StatusCounts::tally(&self.appointments)
    }
}

fn sort(appointments: &mut [Appointment]) {
    appointments.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| minutes_of_day(&a.time).cmp(&minutes_of_day(&b.time)))
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}
