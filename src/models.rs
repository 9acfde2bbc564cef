use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_CONFIRMED: &str = "confirmed";
pub const STATUS_CANCELLED: &str = "cancelled";

pub const DEFAULT_DEPOSIT_METHOD: &str = "transfer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => STATUS_PENDING,
            AppointmentStatus::Confirmed => STATUS_CONFIRMED,
            AppointmentStatus::Cancelled => STATUS_CANCELLED,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            STATUS_PENDING => Ok(AppointmentStatus::Pending),
            STATUS_CONFIRMED => Ok(AppointmentStatus::Confirmed),
            STATUS_CANCELLED => Ok(AppointmentStatus::Cancelled),
            other => Err(format!("unknown appointment status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub paid: bool,
    pub method: String,
}

/// A booked (or formerly booked) slot with one staff member.
///
/// `service_name` and `price` are copied from the [`Service`] at booking time
/// and never follow later edits to the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub staff_id: String,
    pub client_name: String,
    pub client_phone: String,
    pub service_name: String,
    pub price: i64,
    pub date: String,
    pub time: String,
    pub status: AppointmentStatus,
    pub deposit: Deposit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    pub created_at: String,
}

/// Fields the client supplies for a new appointment. Status and deposit are
/// decided by the creation policy, not the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub staff_id: String,
    pub client_name: String,
    pub client_phone: String,
    pub service_name: String,
    pub price: i64,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetails {
    pub holder: String,
    pub tax_id: String,
    pub bank_name: String,
    pub account_type: String,
    pub account_number: String,
    pub email: String,
}

/// Whether a staff member has published where to send a deposit transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentDetails {
    NotConfigured,
    Transfer(BankDetails),
}

impl PaymentDetails {
    pub fn is_configured(&self) -> bool {
        matches!(self, PaymentDetails::Transfer(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: String,
    pub display_name: String,
    pub phone: String,
    pub services: Vec<Service>,
    pub payment: PaymentDetails,
}

impl StaffMember {
    pub fn service(&self, service_id: &str) -> Option<&Service> {
        self.services.iter().find(|service| service.id == service_id)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AppointmentRow {
    pub id: String,
    pub staff_id: String,
    pub client_name: String,
    pub client_phone: String,
    pub service_name: String,
    pub price: i64,
    pub date: String,
    pub time: String,
    pub status: String,
    pub deposit_paid: i64,
    pub deposit_method: String,
    pub cancellation_reason: Option<String>,
    pub created_at: String,
}

impl AppointmentRow {
    pub fn into_appointment(self) -> Result<Appointment, String> {
        let status = self.status.parse::<AppointmentStatus>()?;
        Ok(Appointment {
            id: self.id,
            staff_id: self.staff_id,
            client_name: self.client_name,
            client_phone: self.client_phone,
            service_name: self.service_name,
            price: self.price,
            date: self.date,
            time: self.time,
            status,
            deposit: Deposit {
                paid: self.deposit_paid != 0,
                method: self.deposit_method,
            },
            cancellation_reason: self.cancellation_reason,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StaffRow {
    pub id: String,
    pub display_name: String,
    pub phone: String,
    pub bank_holder: Option<String>,
    pub bank_tax_id: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account_type: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_email: Option<String>,
}

impl StaffRow {
    pub fn into_staff(self, services: Vec<Service>) -> StaffMember {
        let payment = match (self.bank_holder, self.bank_account_number) {
            (Some(holder), Some(account_number)) => PaymentDetails::Transfer(BankDetails {
                holder,
                tax_id: self.bank_tax_id.unwrap_or_default(),
                bank_name: self.bank_name.unwrap_or_default(),
                account_type: self.bank_account_type.unwrap_or_default(),
                account_number,
                email: self.bank_email.unwrap_or_default(),
            }),
            _ => PaymentDetails::NotConfigured,
        };
        StaffMember {
            id: self.id,
            display_name: self.display_name,
            phone: self.phone,
            services,
            payment,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ServiceRow {
    pub id: String,
    pub staff_id: String,
    pub name: String,
    pub price: i64,
}
