use std::{collections::HashMap, fs, path::Path, str::FromStr};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{
    AppointmentFilter, AppointmentStore, ChangeKind, Opening, RosterStore, StatusUpdate,
    StoreEvent,
};
use crate::error::{BookingError, Result};
use crate::models::{
    Appointment, AppointmentRow, NewAppointment, ServiceRow, StaffMember, StaffRow,
    STATUS_CANCELLED,
};
use crate::slots::{minutes_of_day, SLOT_MINUTES};

const EVENT_BUFFER: usize = 256;

const APPOINTMENT_COLUMNS: &str = "id, staff_id, client_name, client_phone, service_name, price, \
     date, time, status, deposit_paid, deposit_method, cancellation_reason, created_at";

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    events: broadcast::Sender<StoreEvent>,
    slot_guard: bool,
}

impl SqliteStore {
    pub async fn connect(db_url: &str, slot_guard: bool) -> Result<Self, Box<dyn std::error::Error>> {
        ensure_sqlite_dir(db_url)?;
        let connect_options = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::from_pool(pool, slot_guard))
    }

    pub fn from_pool(pool: SqlitePool, slot_guard: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            pool,
            events,
            slot_guard,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch(&self, id: &str) -> Result<Option<Appointment>> {
        let row = sqlx::query_as::<_, AppointmentRow>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ? LIMIT 1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(decode_row).transpose()
    }

    fn publish(&self, kind: ChangeKind, appointment: &Appointment) {
        // No receivers is the normal idle state.
        let _ = self.events.send(StoreEvent {
            kind,
            appointment: appointment.clone(),
        });
    }

    async fn log_activity(&self, kind: &str, message: &str, appointment_id: &str) {
        let result = sqlx::query(
            r#"INSERT INTO activities (id, kind, message, created_at, appointment_id)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(new_id())
        .bind(kind)
        .bind(message)
        .bind(Utc::now().to_rfc3339())
        .bind(appointment_id)
        .execute(&self.pool)
        .await;
        if let Err(err) = result {
            log::warn!("Failed to record activity '{kind}': {err}");
        }
    }
}

#[async_trait]
impl AppointmentStore for SqliteStore {
    async fn create_appointment(
        &self,
        fields: NewAppointment,
        opening: Opening,
    ) -> Result<Appointment> {
        let appointment = Appointment {
            id: new_id(),
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
            created_at: Utc::now().to_rfc3339(),
        };
        let start_minute = minutes_of_day(&appointment.time).map(i64::from);

        let insert = r#"INSERT INTO appointments
               (id, staff_id, client_name, client_phone, service_name, price, date, time,
                start_minute, status, deposit_paid, deposit_method, created_at)"#;

        let result = if self.slot_guard {
            // Only lands if no live appointment for this staff member starts
            // within one slot of it.
            let sql = format!(
                r#"{insert}
                   SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
                   WHERE NOT EXISTS (
                       SELECT 1 FROM appointments
                       WHERE staff_id = ? AND date = ? AND status != ?
                         AND ABS(start_minute - ?) < ?
                   )"#
            );
            bind_appointment(sqlx::query(&sql), &appointment, start_minute)
                .bind(&appointment.staff_id)
                .bind(&appointment.date)
                .bind(STATUS_CANCELLED)
                .bind(start_minute)
                .bind(i64::from(SLOT_MINUTES))
                .execute(&self.pool)
                .await?
        } else {
            let sql = format!("{insert} VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)");
            bind_appointment(sqlx::query(&sql), &appointment, start_minute)
                .execute(&self.pool)
                .await?
        };

        if result.rows_affected() == 0 {
            return Err(BookingError::Conflict {
                date: appointment.date,
                time: appointment.time,
            });
        }

        self.log_activity(
            "appointment_created",
            &format!(
                "{} booked {} on {} at {}.",
                appointment.client_name, appointment.service_name, appointment.date, appointment.time
            ),
            &appointment.id,
        )
        .await;
        self.publish(ChangeKind::Created, &appointment);
        Ok(appointment)
    }

    async fn update_appointment_status(
        &self,
        id: &str,
        update: StatusUpdate,
    ) -> Result<Appointment> {
        let result = sqlx::query(
            r#"UPDATE appointments
               SET status = ?,
                   deposit_paid = COALESCE(?, deposit_paid),
                   cancellation_reason = COALESCE(?, cancellation_reason)
               WHERE id = ? AND status = ?"#,
        )
        .bind(update.status.as_str())
        .bind(update.deposit_paid.map(i64::from))
        .bind(update.cancellation_reason.as_deref())
        .bind(id)
        .bind(update.from.as_str())
        .execute(&self.pool)
        .await?;

        let current = self
            .fetch(id)
            .await?
            .ok_or_else(|| BookingError::not_found("appointment", id))?;

        if result.rows_affected() == 0 {
            return Err(BookingError::InvalidState {
                action: "move",
                status: current.status.to_string(),
            });
        }

        self.log_activity(
            "status_changed",
            &format!("Appointment {id} moved from {} to {}.", update.from, update.status),
            id,
        )
        .await;
        self.publish(ChangeKind::Updated, &current);
        Ok(current)
    }

    async fn get_appointment(&self, id: &str) -> Result<Option<Appointment>> {
        self.fetch(id).await
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>> {
        let rows = match filter {
            AppointmentFilter::All => {
                sqlx::query_as::<_, AppointmentRow>(&format!(
                    "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
                     ORDER BY date, start_minute, created_at"
                ))
                .fetch_all(&self.pool)
                .await?
            }
            AppointmentFilter::Staff(staff_id) => {
                sqlx::query_as::<_, AppointmentRow>(&format!(
                    "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE staff_id = ? \
                     ORDER BY date, start_minute, created_at"
                ))
                .bind(staff_id)
                .fetch_all(&self.pool)
                .await?
            }
            AppointmentFilter::StaffOn { staff_id, date } => {
                sqlx::query_as::<_, AppointmentRow>(&format!(
                    "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
                     WHERE staff_id = ? AND date = ? \
                     ORDER BY start_minute, created_at"
                ))
                .bind(staff_id)
                .bind(date)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(decode_row).collect()
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl RosterStore for SqliteStore {
    async fn list_staff(&self) -> Result<Vec<StaffMember>> {
        let rows = sqlx::query_as::<_, StaffRow>(
            r#"SELECT id, display_name, phone, bank_holder, bank_tax_id, bank_name,
                      bank_account_type, bank_account_number, bank_email
               FROM staff
               WHERE active = 1
               ORDER BY display_name"#,
        )
        .fetch_all(&self.pool)
        .await?;

        let services = sqlx::query_as::<_, ServiceRow>(
            "SELECT id, staff_id, name, price FROM services ORDER BY position, name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_staff: HashMap<String, Vec<_>> = HashMap::new();
        for row in services {
            by_staff.entry(row.staff_id).or_default().push(crate::models::Service {
                id: row.id,
                name: row.name,
                price: row.price,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let services = by_staff.remove(&row.id).unwrap_or_default();
                row.into_staff(services)
            })
            .collect())
    }

    async fn get_staff(&self, id: &str) -> Result<Option<StaffMember>> {
        let row = sqlx::query_as::<_, StaffRow>(
            r#"SELECT id, display_name, phone, bank_holder, bank_tax_id, bank_name,
                      bank_account_type, bank_account_number, bank_email
               FROM staff
               WHERE id = ? AND active = 1
               LIMIT 1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let services = sqlx::query_as::<_, ServiceRow>(
            "SELECT id, staff_id, name, price FROM services WHERE staff_id = ? ORDER BY position, name",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| crate::models::Service {
            id: row.id,
            name: row.name,
            price: row.price,
        })
        .collect();

        Ok(Some(row.into_staff(services)))
    }
}

fn bind_appointment<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    appointment: &'q Appointment,
    start_minute: Option<i64>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    query
        .bind(&appointment.id)
        .bind(&appointment.staff_id)
        .bind(&appointment.client_name)
        .bind(&appointment.client_phone)
        .bind(&appointment.service_name)
        .bind(appointment.price)
        .bind(&appointment.date)
        .bind(&appointment.time)
        .bind(start_minute)
        .bind(appointment.status.as_str())
        .bind(i64::from(appointment.deposit.paid))
        .bind(&appointment.deposit.method)
        .bind(&appointment.created_at)
}

fn decode_row(row: AppointmentRow) -> Result<Appointment> {
    row.into_appointment().map_err(BookingError::StoreUnavailable)
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"));

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Inserts a demo staff member with services and transfer details when the
/// roster is empty.
pub async fn seed_demo_staff(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM staff LIMIT 1")
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let staff_id = new_id();
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"INSERT INTO staff (id, display_name, phone, bank_holder, bank_tax_id, bank_name,
                              bank_account_type, bank_account_number, bank_email, active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?)"#,
    )
    .bind(&staff_id)
    .bind("Felix")
    .bind("56911111111")
    .bind("Felix Rojas")
    .bind("12.345.678-9")
    .bind("Banco Estado")
    .bind("Cuenta RUT")
    .bind("12345678")
    .bind("felix@example.com")
    .bind(&now)
    .execute(pool)
    .await?;

    for (position, (name, price)) in [("Haircut", 10000_i64), ("Beard Trim", 7000)]
        .into_iter()
        .enumerate()
    {
        sqlx::query(
            "INSERT INTO services (id, staff_id, name, price, position) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(new_id())
        .bind(&staff_id)
        .bind(name)
        .bind(price)
        .bind(position as i64)
        .execute(pool)
        .await?;
    }

    log::info!("Seeded demo staff member 'Felix'");
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{AppointmentStatus, Deposit};

    pub(crate) async fn memory_store(slot_guard: bool) -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteStore::from_pool(pool, slot_guard)
    }

    pub(crate) fn booking(staff_id: &str, date: &str, time: &str) -> NewAppointment {
        NewAppointment {
            staff_id: staff_id.to_string(),
            client_name: "Ana".to_string(),
            client_phone: "912345678".to_string(),
            service_name: "Haircut".to_string(),
            price: 10000,
            date: date.to_string(),
            time: time.to_string(),
        }
    }

    fn pending() -> Opening {
        Opening {
            status: AppointmentStatus::Pending,
            deposit: Deposit {
                paid: false,
                method: "transfer".to_string(),
            },
        }
    }

    #[actix_web::test]
    async fn create_assigns_id_and_defaults() {
        let store = memory_store(false).await;
        let created = store
            .create_appointment(booking("a", "2025-06-01", "14:00"), pending())
            .await
            .unwrap();
        assert!(!created.id.is_empty());

        let loaded = store.get_appointment(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.status, AppointmentStatus::Pending);
        assert!(!loaded.deposit.paid);
        assert_eq!(loaded.deposit.method, "transfer");
    }

    #[actix_web::test]
    async fn confirm_sets_status_and_deposit_together() {
        let store = memory_store(false).await;
        let created = store
            .create_appointment(booking("a", "2025-06-01", "14:00"), pending())
            .await
            .unwrap();

        let updated = store
            .update_appointment_status(&created.id, StatusUpdate::confirm_payment())
            .await
            .unwrap();
        assert_eq!(updated.status, AppointmentStatus::Confirmed);
        assert!(updated.deposit.paid);
        assert!(updated.cancellation_reason.is_none());
    }

    #[actix_web::test]
    async fn stale_update_is_rejected_without_writing() {
        let store = memory_store(false).await;
        let created = store
            .create_appointment(booking("a", "2025-06-01", "14:00"), pending())
            .await
            .unwrap();
        store
            .update_appointment_status(
                &created.id,
                StatusUpdate::cancel(AppointmentStatus::Pending, "sick"),
            )
            .await
            .unwrap();

        let err = store
            .update_appointment_status(&created.id, StatusUpdate::confirm_payment())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidState { .. }));

        let loaded = store.get_appointment(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, AppointmentStatus::Cancelled);
        assert!(!loaded.deposit.paid);
        assert_eq!(loaded.cancellation_reason.as_deref(), Some("sick"));
    }

    #[actix_web::test]
    async fn update_unknown_id_is_not_found() {
        let store = memory_store(false).await;
        let err = store
            .update_appointment_status("missing", StatusUpdate::confirm_payment())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotFound { .. }));
    }

    #[actix_web::test]
    async fn list_filters_by_staff_and_orders_by_time() {
        let store = memory_store(false).await;
        for (staff, time) in [("a", "15:00"), ("b", "10:00"), ("a", "9:00")] {
            store
                .create_appointment(booking(staff, "2025-06-01", time), pending())
                .await
                .unwrap();
        }

        let all = store.list_appointments(&AppointmentFilter::All).await.unwrap();
        assert_eq!(all.len(), 3);

        let mine = store
            .list_appointments(&AppointmentFilter::Staff("a".into()))
            .await
            .unwrap();
        let times: Vec<&str> = mine.iter().map(|appt| appt.time.as_str()).collect();
        assert_eq!(times, vec!["9:00", "15:00"]);
    }

    #[actix_web::test]
    async fn day_filter_reads_one_staff_member_on_one_date() {
        let store = memory_store(false).await;
        for (staff, date, time) in [
            ("a", "2025-06-01", "12:00"),
            ("a", "2025-06-02", "12:00"),
            ("b", "2025-06-01", "12:00"),
            ("a", "2025-06-01", "10:00"),
        ] {
            store
                .create_appointment(booking(staff, date, time), pending())
                .await
                .unwrap();
        }

        let day = store
            .list_appointments(&AppointmentFilter::staff_on("a", " 2025-06-01 "))
            .await
            .unwrap();
        let times: Vec<&str> = day.iter().map(|appt| appt.time.as_str()).collect();
        assert_eq!(times, vec!["10:00", "12:00"]);
        assert!(day.iter().all(|appt| appt.staff_id == "a" && appt.date == "2025-06-01"));
    }

    #[actix_web::test]
    async fn without_guard_double_booking_is_accepted() {
        let store = memory_store(false).await;
        store
            .create_appointment(booking("a", "2025-06-01", "14:00"), pending())
            .await
            .unwrap();
        store
            .create_appointment(booking("a", "2025-06-01", "14:00"), pending())
            .await
            .unwrap();
        let all = store.list_appointments(&AppointmentFilter::All).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[actix_web::test]
    async fn guard_rejects_overlapping_create() {
        let store = memory_store(true).await;
        let first = store
            .create_appointment(booking("a", "2025-06-01", "14:00"), pending())
            .await
            .unwrap();

        let err = store
            .create_appointment(booking("a", "2025-06-01", "14:00"), pending())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Conflict { .. }));

        // Neighbouring hour, another staff member, or a freed slot all pass.
        store
            .create_appointment(booking("a", "2025-06-01", "15:00"), pending())
            .await
            .unwrap();
        store
            .create_appointment(booking("b", "2025-06-01", "14:00"), pending())
            .await
            .unwrap();
        store
            .update_appointment_status(
                &first.id,
                StatusUpdate::cancel(AppointmentStatus::Pending, "moved"),
            )
            .await
            .unwrap();
        store
            .create_appointment(booking("a", "2025-06-01", "14:00"), pending())
            .await
            .unwrap();
    }

    #[actix_web::test]
    async fn writes_are_published_to_subscribers() {
        let store = memory_store(false).await;
        let mut rx = store.subscribe();
        let created = store
            .create_appointment(booking("a", "2025-06-01", "14:00"), pending())
            .await
            .unwrap();
        store
            .update_appointment_status(&created.id, StatusUpdate::confirm_payment())
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, ChangeKind::Created);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, ChangeKind::Updated);
        assert_eq!(second.appointment.status, AppointmentStatus::Confirmed);
    }

    #[actix_web::test]
    async fn seeded_roster_lists_services_in_order() {
        let store = memory_store(false).await;
        seed_demo_staff(store.pool()).await.unwrap();
        seed_demo_staff(store.pool()).await.unwrap();

        let staff = store.list_staff().await.unwrap();
        assert_eq!(staff.len(), 1);
        let names: Vec<&str> = staff[0].services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Haircut", "Beard Trim"]);
        assert!(staff[0].payment.is_configured());

        let fetched = store.get_staff(&staff[0].id).await.unwrap().unwrap();
        assert_eq!(fetched, staff[0]);
        assert!(store.get_staff("missing").await.unwrap().is_none());
    }

    #[test]
    fn sqlite_dir_skips_memory_urls() {
        assert!(ensure_sqlite_dir("sqlite::memory:").is_ok());
        assert!(ensure_sqlite_dir("postgres://localhost/db").is_ok());
    }
}
