use actix_web::{web, HttpResponse};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    booking::ReservationBuilder,
    error::{BookingError, Result},
    messaging::{self, OutboundMessage},
    models::{Appointment, AppointmentStatus, PaymentDetails, Service, StaffMember},
    slots::Slot,
    state::AppState,
    store::AppointmentFilter,
};

#[derive(Debug, Serialize)]
struct StaffSummary {
    id: String,
    display_name: String,
    initials: String,
    phone: String,
    services: Vec<Service>,
    accepts_transfer: bool,
    payment: PaymentDetails,
}

impl From<StaffMember> for StaffSummary {
    fn from(staff: StaffMember) -> Self {
        let initials = staff
            .display_name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .take(2)
            .collect::<String>()
            .to_uppercase();
        Self {
            id: staff.id,
            display_name: staff.display_name,
            initials,
            phone: staff.phone,
            services: staff.services,
            accepts_transfer: staff.payment.is_configured(),
            payment: staff.payment,
        }
    }
}

#[derive(Deserialize)]
struct SlotQuery {
    date: String,
}

#[derive(Debug, Serialize)]
struct SlotsView {
    staff_id: String,
    date: String,
    slots: Vec<Slot>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BookingForm {
    staff_id: String,
    service_id: String,
    date: String,
    time: String,
    client_name: String,
    client_phone: String,
}

#[derive(Debug, Serialize)]
struct BookingCreated {
    appointment: Appointment,
    payment: PaymentDetails,
    transfer_instructions: Option<String>,
    receipt: Option<OutboundMessage>,
}

#[derive(Debug, Serialize)]
struct BookingStatusView {
    id: String,
    status: AppointmentStatus,
    service: String,
    price: i64,
    date: String,
    time: String,
    deposit_paid: bool,
    cancellation_reason: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/staff").route(web::get().to(list_staff)))
        .service(web::resource("/staff/{id}/slots").route(web::get().to(staff_slots)))
        .service(web::resource("/bookings").route(web::post().to(create_booking)))
        .service(web::resource("/bookings/{id}").route(web::get().to(booking_status)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn list_staff(state: web::Data<AppState>) -> Result<HttpResponse> {
    let staff: Vec<StaffSummary> = state
        .roster
        .list_staff()
        .await?
        .into_iter()
        .map(StaffSummary::from)
        .collect();
    Ok(HttpResponse::Ok().json(staff))
}

async fn staff_slots(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<SlotQuery>,
) -> Result<HttpResponse> {
    let staff_id = path.into_inner();
    let date = query.into_inner().date.trim().to_string();
    if NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_err() {
        return Err(BookingError::validation(format!(
            "'{date}' is not a date in YYYY-MM-DD form"
        )));
    }
    if state.roster.get_staff(&staff_id).await?.is_none() {
        return Err(BookingError::not_found("staff member", staff_id));
    }

    let slots = state
        .view(AppointmentFilter::staff_on(&staff_id, &date))
        .await?
        .slots(&staff_id, &date);
    Ok(HttpResponse::Ok().json(SlotsView {
        staff_id,
        date,
        slots,
    }))
}

/// Runs the booking wizard server-side in one request, so every step's
/// checks apply before anything is written.
async fn create_booking(
    state: web::Data<AppState>,
    form: web::Json<BookingForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let mut builder = ReservationBuilder::new();

    let staff_id = form.staff_id.trim();
    if staff_id.is_empty() {
        return Err(BookingError::validation("please choose a staff member"));
    }
    let staff = state
        .roster
        .get_staff(staff_id)
        .await?
        .ok_or_else(|| BookingError::not_found("staff member", staff_id))?;

    builder.choose_staff(staff.clone())?;
    builder.choose_service(form.service_id.trim())?;
    let day = state
        .view(AppointmentFilter::staff_on(&staff.id, &form.date))
        .await?;
    builder.choose_slot(&form.date, &form.time, day.appointments())?;
    builder.enter_client(&form.client_name, &form.client_phone)?;
    let appointment = builder.submit(&state.controller).await?;

    let receipt = (appointment.status == AppointmentStatus::Pending)
        .then(|| messaging::booking_receipt(&staff, &appointment));

    Ok(HttpResponse::Created().json(BookingCreated {
        transfer_instructions: messaging::transfer_instructions(&staff.payment),
        payment: staff.payment,
        receipt,
        appointment,
    }))
}

async fn booking_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let appointment_id = path.into_inner();
    let appointment = state
        .appointments
        .get_appointment(&appointment_id)
        .await?
        .ok_or_else(|| BookingError::not_found("appointment", &appointment_id))?;

    Ok(HttpResponse::Ok().json(BookingStatusView {
        id: appointment.id,
        status: appointment.status,
        service: appointment.service_name,
        price: appointment.price,
        date: appointment.date,
        time: appointment.time,
        deposit_paid: appointment.deposit.paid,
        cancellation_reason: appointment.cancellation_reason,
    }))
}
