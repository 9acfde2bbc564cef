use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    models::Appointment,
    read_model::StatusCounts,
    state::AppState,
    store::AppointmentFilter,
};

#[derive(Deserialize)]
struct DashboardQuery {
    staff_id: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct CancelForm {
    reason: String,
}

#[derive(Serialize)]
struct DashboardView {
    counts: StatusCounts,
    appointments: Vec<Appointment>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/dashboard")
            .service(web::resource("/appointments").route(web::get().to(list_appointments)))
            .service(
                web::resource("/appointments/{id}/confirm")
                    .route(web::post().to(confirm_payment)),
            )
            .service(
                web::resource("/appointments/{id}/cancel").route(web::post().to(cancel)),
            ),
    );
}

/// Admin view without `staff_id`, a single staff member's view with it.
/// Cancelled records are counted but not listed.
async fn list_appointments(
    state: web::Data<AppState>,
    query: web::Query<DashboardQuery>,
) -> Result<HttpResponse> {
    let filter = AppointmentFilter::from_staff_id(query.staff_id.as_deref());
    let view = state.view(filter).await?;
    let counts = view.counts();
    let appointments = view
        .appointments()
        .iter()
        .filter(|appt| !appt.status.is_terminal())
        .cloned()
        .collect();

    Ok(HttpResponse::Ok().json(DashboardView {
        counts,
        appointments,
    }))
}

async fn confirm_payment(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let appointment = state.controller.confirm_payment(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(appointment))
}

async fn cancel(
    state: web::Data<AppState>,
    path: web::Path<String>,
    form: Option<web::Json<CancelForm>>,
) -> Result<HttpResponse> {
    let reason = form.map(|form| form.into_inner().reason).unwrap_or_default();
    let cancellation = state.controller.cancel(&path.into_inner(), &reason).await?;
    Ok(HttpResponse::Ok().json(cancellation))
}
