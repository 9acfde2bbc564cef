use actix_web::{http::header, rt, web, HttpResponse};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::{BroadcastStream, ReceiverStream};
use tokio_stream::{Stream, StreamExt};

use crate::{
    error::Result,
    read_model::{StatusCounts, ViewChange},
    state::{AppState, PublicStatusEvent, ServerEvent},
    store::AppointmentFilter,
};

#[derive(Deserialize)]
struct EventsQuery {
    staff_id: Option<String>,
}

/// One dashboard push: the change, if any, and the subject's fresh counts.
#[derive(Debug, Serialize)]
struct DashboardUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    change: Option<ServerEvent>,
    counts: StatusCounts,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/events").route(web::get().to(stream_events)))
        .service(
            web::resource("/bookings/{id}/events").route(web::get().to(stream_booking_events)),
        );
}

/// Dashboard feed. Each subscriber owns a view of its own subject, which
/// lives until the client disconnects.
async fn stream_events(
    state: web::Data<AppState>,
    query: web::Query<EventsQuery>,
) -> Result<HttpResponse> {
    let filter = AppointmentFilter::from_staff_id(query.staff_id.as_deref());
    let mut view = state.view(filter).await?;
    let store = state.appointments.clone();
    let (tx, rx) = mpsc::channel::<std::result::Result<web::Bytes, actix_web::Error>>(16);

    rt::spawn(async move {
        loop {
            let (name, change) = match view.next_change(store.as_ref()).await {
                Ok(Some(ViewChange::Applied(event))) => ("update", Some(ServerEvent::from(event))),
                Ok(Some(ViewChange::Reloaded)) => ("reload", None),
                Ok(None) => break,
                Err(err) => {
                    log::warn!("Dashboard event stream stopped: {err}");
                    break;
                }
            };
            let update = DashboardUpdate {
                change,
                counts: view.counts(),
            };
            if tx.send(Ok(event_to_bytes(name, &update))).await.is_err() {
                break;
            }
        }
    });

    Ok(sse_response(ReceiverStream::new(rx)))
}

async fn stream_booking_events(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let appointment_id = path.into_inner();
    let rx = state.appointments.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let event = ServerEvent::from(result.ok()?);
        if event.appointment_id != appointment_id {
            return None;
        }
        let public = PublicStatusEvent::from(&event);
        Some(Ok::<web::Bytes, actix_web::Error>(event_to_bytes("update", &public)))
    });

    sse_response(stream)
}

fn sse_response<S>(stream: S) -> HttpResponse
where
    S: Stream<Item = std::result::Result<web::Bytes, actix_web::Error>> + 'static,
{
    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream)
}

fn event_to_bytes<T: Serialize>(name: &str, event: &T) -> web::Bytes {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    web::Bytes::from(format!("event: {name}\ndata: {payload}\n\n"))
}
