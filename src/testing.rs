use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::{BookingError, Result};
use crate::models::{
    Appointment, BankDetails, NewAppointment, PaymentDetails, Service, StaffMember,
};
use crate::store::{
    AppointmentFilter, AppointmentStore, ChangeKind, Opening, RosterStore, StatusUpdate,
    StoreEvent,
};

/// In-memory store that records every write it receives.
pub struct RecordingStore {
    records: Mutex<Vec<Appointment>>,
    staff: Vec<StaffMember>,
    updates: Mutex<Vec<StatusUpdate>>,
    creates: AtomicUsize,
    fail: AtomicBool,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for RecordingStore {
    fn default() -> Self {
        Self::with_staff(Vec::new())
    }
}

impl RecordingStore {
    pub fn with_staff(staff: Vec<StaffMember>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            records: Mutex::new(Vec::new()),
            staff,
            updates: Mutex::new(Vec::new()),
            creates: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            events,
        }
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        self.creates() + self.updates().len()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn get(&self, id: &str) -> Appointment {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|appt| appt.id == id)
            .cloned()
            .unwrap()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BookingError::StoreUnavailable("store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AppointmentStore for RecordingStore {
    async fn create_appointment(
        &self,
        fields: NewAppointment,
        opening: Opening,
    ) -> Result<Appointment> {
        self.check_available()?;
        let count = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        let appointment = Appointment {
            id: format!("appt-{count}"),
            staff_id: fields.staff_id,
            client_name: fields.client_name,
            client_phone: fields.client_phone,
            service_name: fields.service_name,
            price: fields.price,
            date: fields.date,
            time: fields.time,
            status: opening.status,
            deposit: opening.deposit,
            cancellation_reason: None,
            created_at: "2025-05-30T10:00:00+00:00".to_string(),
        };
        self.records.lock().unwrap().push(appointment.clone());
        let _ = self.events.send(StoreEvent {
            kind: ChangeKind::Created,
            appointment: appointment.clone(),
        });
        Ok(appointment)
    }

    async fn update_appointment_status(
        &self,
        id: &str,
        update: StatusUpdate,
    ) -> Result<Appointment> {
        self.check_available()?;
        self.updates.lock().unwrap().push(update.clone());
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|appt| appt.id == id)
            .ok_or_else(|| BookingError::not_found("appointment", id))?;
        if record.status != update.from {
            return Err(BookingError::InvalidState {
                action: "move",
                status: record.status.to_string(),
            });
        }
        record.status = update.status;
        if let Some(paid) = update.deposit_paid {
            record.deposit.paid = paid;
        }
        if let Some(reason) = update.cancellation_reason {
            record.cancellation_reason = Some(reason);
        }
        let appointment = record.clone();
        let _ = self.events.send(StoreEvent {
            kind: ChangeKind::Updated,
            appointment: appointment.clone(),
        });
        Ok(appointment)
    }

    async fn get_appointment(&self, id: &str) -> Result<Option<Appointment>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|appt| appt.id == id)
            .cloned())
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|appt| filter.matches(appt))
            .cloned()
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl RosterStore for RecordingStore {
    async fn list_staff(&self) -> Result<Vec<StaffMember>> {
        Ok(self.staff.clone())
    }

    async fn get_staff(&self, id: &str) -> Result<Option<StaffMember>> {
        Ok(self.staff.iter().find(|staff| staff.id == id).cloned())
    }
}

pub fn new_appointment(staff_id: &str, time: &str) -> NewAppointment {
    NewAppointment {
        staff_id: staff_id.to_string(),
        client_name: "Ana".to_string(),
        client_phone: "912345678".to_string(),
        service_name: "Haircut".to_string(),
        price: 10000,
        date: "2025-06-01".to_string(),
        time: time.to_string(),
    }
}

pub fn staff_member(id: &str) -> StaffMember {
    StaffMember {
        id: id.to_string(),
        display_name: "Felix".to_string(),
        phone: "56911111111".to_string(),
        services: vec![
            Service {
                id: "haircut".to_string(),
                name: "Haircut".to_string(),
                price: 10000,
            },
            Service {
                id: "beard".to_string(),
                name: "Beard Trim".to_string(),
                price: 7000,
            },
        ],
        payment: PaymentDetails::Transfer(BankDetails {
            holder: "Felix Rojas".to_string(),
            tax_id: "12.345.678-9".to_string(),
            bank_name: "Banco Estado".to_string(),
            account_type: "Cuenta RUT".to_string(),
            account_number: "12345678".to_string(),
            email: "felix@example.com".to_string(),
        }),
    }
}
