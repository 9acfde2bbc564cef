use std::env;

use crate::models::{AppointmentStatus, Deposit, DEFAULT_DEPOSIT_METHOD};
use crate::store::Opening;

/// How a deployment collects the deposit, which decides the status a new
/// booking starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationPolicy {
    /// Client transfers off-platform; staff confirms later.
    Transfer,
    /// Paid at booking time; the appointment starts confirmed.
    PayNow,
}

impl CreationPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "transfer" | "pending" => Some(CreationPolicy::Transfer),
            "pay_now" | "paynow" | "confirmed" => Some(CreationPolicy::PayNow),
            _ => None,
        }
    }

    pub fn opening(&self, deposit_method: &str) -> Opening {
        let (status, paid) = match self {
            CreationPolicy::Transfer => (AppointmentStatus::Pending, false),
            CreationPolicy::PayNow => (AppointmentStatus::Confirmed, true),
        };
        Opening {
            status,
            deposit: Deposit {
                paid,
                method: deposit_method.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub port: u16,
    pub policy: CreationPolicy,
    pub deposit_method: String,
    pub slot_guard: bool,
    pub seed_staff: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/barberpro.db".to_string(),
            port: 8080,
            policy: CreationPolicy::Transfer,
            deposit_method: DEFAULT_DEPOSIT_METHOD.to_string(),
            slot_guard: false,
            seed_staff: false,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Settings::default();

        let policy = match lookup("BOOKING_POLICY") {
            Some(raw) => CreationPolicy::parse(&raw).unwrap_or_else(|| {
                log::warn!("Unknown BOOKING_POLICY '{raw}'. Falling back to 'transfer'.");
                CreationPolicy::Transfer
            }),
            None => defaults.policy,
        };

        Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            port: lookup("PORT")
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.port),
            policy,
            deposit_method: lookup("DEPOSIT_METHOD")
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.deposit_method),
            slot_guard: lookup("SLOT_GUARD").map(|v| flag(&v)).unwrap_or(defaults.slot_guard),
            seed_staff: lookup("SEED_STAFF").map(|v| flag(&v)).unwrap_or(defaults.seed_staff),
        }
    }
}

fn flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
