use chrono::NaiveDate;

use crate::error::{BookingError, Result};
use crate::lifecycle::LifecycleController;
use crate::models::{Appointment, NewAppointment, Service, StaffMember};
use crate::slots::compute_slots;

/// Where a client is in the booking wizard. Each step only carries what has
/// been chosen so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    ChoosingStaff,
    ChoosingService {
        staff: StaffMember,
    },
    ChoosingSlot {
        staff: StaffMember,
        service: Service,
    },
    ConfirmingDetails {
        staff: StaffMember,
        service: Service,
        date: String,
        time: String,
        client_name: String,
        client_phone: String,
    },
    /// Last booking went through; a new flow may start right away.
    Submitted {
        appointment_id: String,
    },
}

impl Reservation {
    pub fn step(&self) -> u8 {
        match self {
            Reservation::ChoosingStaff | Reservation::Submitted { .. } => 1,
            Reservation::ChoosingService { .. } => 2,
            Reservation::ChoosingSlot { .. } => 3,
            Reservation::ConfirmingDetails { .. } => 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReservationBuilder {
    state: Reservation,
}

impl Default for ReservationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReservationBuilder {
    pub fn new() -> Self {
        Self {
            state: Reservation::ChoosingStaff,
        }
    }

    pub fn choose_staff(&mut self, staff: StaffMember) -> Result<()> {
        match self.state {
            Reservation::ChoosingStaff | Reservation::Submitted { .. } => {
                self.state = Reservation::ChoosingService { staff };
                Ok(())
            }
            _ => Err(self.out_of_order("choose a staff member")),
        }
    }

    pub fn choose_service(&mut self, service_id: &str) -> Result<()> {
        let Reservation::ChoosingService { staff } = &self.state else {
            return Err(self.out_of_order("choose a service"));
        };
        let service = staff.service(service_id).cloned().ok_or_else(|| {
            BookingError::validation(format!(
                "service '{service_id}' is not offered by {}",
                staff.display_name
            ))
        })?;
        let staff = staff.clone();
        self.state = Reservation::ChoosingSlot { staff, service };
        Ok(())
    }

    /// Records a date and time, accepting only slots the calculator reports
    /// as free against `appointments`.
    pub fn choose_slot(&mut self, date: &str, time: &str, appointments: &[Appointment]) -> Result<()> {
        let Reservation::ChoosingSlot { staff, service } = &self.state else {
            return Err(self.out_of_order("choose a slot"));
        };
        let date = date.trim();
        let time = time.trim();
        if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            return Err(BookingError::validation(format!(
                "'{date}' is not a date in YYYY-MM-DD form"
            )));
        }

        let slot = compute_slots(&staff.id, date, appointments)
            .into_iter()
            .find(|slot| slot.time == time)
            .ok_or_else(|| BookingError::validation(format!("'{time}' is not a bookable slot")))?;
        if !slot.available {
            return Err(BookingError::validation(format!(
                "{time} on {date} is already taken"
            )));
        }

        self.state = Reservation::ConfirmingDetails {
            staff: staff.clone(),
            service: service.clone(),
            date: date.to_string(),
            time: slot.time,
            client_name: String::new(),
            client_phone: String::new(),
        };
        Ok(())
    }

    pub fn enter_client(&mut self, name: &str, phone: &str) -> Result<()> {
        let Reservation::ConfirmingDetails {
            client_name,
            client_phone,
            ..
        } = &mut self.state
        else {
            return Err(self.out_of_order("enter contact details"));
        };
        *client_name = name.trim().to_string();
        *client_phone = phone.trim().to_string();
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        let all = vec!["staff", "service", "date", "time", "client_name", "client_phone"];
        match &self.state {
            Reservation::ChoosingStaff | Reservation::Submitted { .. } => all,
            Reservation::ChoosingService { .. } => all[1..].to_vec(),
            Reservation::ChoosingSlot { .. } => all[2..].to_vec(),
            Reservation::ConfirmingDetails {
                client_name,
                client_phone,
                ..
            } => {
                let mut missing = Vec::new();
                if client_name.is_empty() {
                    missing.push("client_name");
                }
                if client_phone.is_empty() {
                    missing.push("client_phone");
                }
                missing
            }
        }
    }

    /// Hands the completed reservation to the controller. On success the
    /// builder is ready for a new booking; on failure it keeps its state so
    /// the client can correct and retry.
    pub async fn submit(&mut self, controller: &LifecycleController) -> Result<Appointment> {
        if !self.is_complete() {
            return Err(BookingError::validation(format!(
                "reservation is incomplete, missing: {}",
                self.missing_fields().join(", ")
            )));
        }
        let Reservation::ConfirmingDetails {
            staff,
            service,
            date,
            time,
            client_name,
            client_phone,
        } = &self.state
        else {
            return Err(self.out_of_order("submit"));
        };

        let draft = NewAppointment {
            staff_id: staff.id.clone(),
            client_name: client_name.clone(),
            client_phone: client_phone.clone(),
            service_name: service.name.clone(),
            price: service.price,
            date: date.clone(),
            time: time.clone(),
        };
        let appointment = controller.create(draft).await?;
        self.state = Reservation::Submitted {
            appointment_id: appointment.id.clone(),
        };
        Ok(appointment)
    }

    fn out_of_order(&self, action: &str) -> BookingError {
        BookingError::validation(format!(
            "cannot {action} at step {} of the booking flow",
            self.state.step()
        ))
    }
}
