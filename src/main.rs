mod booking;
mod config;
mod error;
mod lifecycle;
mod messaging;
mod models;
mod read_model;
mod routes;
mod slots;
mod state;
mod store;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};

use crate::config::{CreationPolicy, Settings};
use crate::state::AppState;
use crate::store::{seed_demo_staff, SqliteStore};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = run().await {
        eprintln!("Startup error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::from_env();
    let store = Arc::new(SqliteStore::connect(&settings.database_url, settings.slot_guard).await?);
    if settings.seed_staff {
        seed_demo_staff(store.pool()).await?;
    }

    let state = AppState::new(store, &settings);

    let policy = match settings.policy {
        CreationPolicy::Transfer => "transfer (bookings start pending)",
        CreationPolicy::PayNow => "pay now (bookings start confirmed)",
    };
    log::info!("Booking policy: {policy}");
    if settings.slot_guard {
        log::info!("Slot guard enabled: overlapping bookings are rejected at write time");
    }

    let address = format!("0.0.0.0:{}", settings.port);
    log::info!("Starting Barberpro on http://{address}");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .configure(routes::public::configure)
            .configure(routes::dashboard::configure)
            .configure(routes::events::configure)
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}
