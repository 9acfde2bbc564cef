//! Payloads handed to the chat-messaging collaborator. Nothing here sends
//! anything; it only builds the destination and the text.

use serde::Serialize;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::models::{Appointment, PaymentDetails, StaffMember};

const CHAT_BASE: &str = "https://wa.me/";
const COUNTRY_PREFIX: &str = "56";
const MOBILE_PREFIX: &str = "569";
const MIN_DIALABLE_DIGITS: usize = 8;

/// Everything except the characters a URI component leaves bare.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub phone: String,
    pub text: String,
    pub link: String,
}

impl OutboundMessage {
    pub fn new(phone: String, text: String) -> Self {
        let link = chat_link(&phone, &text);
        Self { phone, text, link }
    }
}

/// Digits only, with the local mobile prefix added to numbers that are long
/// enough to dial but lack the country code. Short inputs pass through.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() >= MIN_DIALABLE_DIGITS && !digits.starts_with(COUNTRY_PREFIX) {
        format!("{MOBILE_PREFIX}{digits}")
    } else {
        digits
    }
}

pub fn chat_link(phone: &str, text: &str) -> String {
    format!(
        "{CHAT_BASE}{phone}?text={}",
        utf8_percent_encode(text, URI_COMPONENT)
    )
}

/// Sent by the client to the staff member after booking, as proof that the
/// deposit transfer is on its way.
pub fn booking_receipt(staff: &StaffMember, appointment: &Appointment) -> OutboundMessage {
    let text = format!(
        "Hola {staff}, soy {client}. Acabo de transferir el abono para mi cita: *{service}* el {date} a las {time}. Aquí te envío el comprobante. Quedo atento a tu confirmación.",
        staff = staff.display_name,
        client = appointment.client_name,
        service = appointment.service_name,
        date = appointment.date,
        time = appointment.time,
    );
    OutboundMessage::new(normalize_phone(&staff.phone), text)
}

/// Sent by staff to the client when an appointment is cancelled.
pub fn cancellation_notice(appointment: &Appointment, reason: &str) -> OutboundMessage {
    let text = format!(
        "Hola {client}. Cancelamos tu cita de {service} el {date} a las {time}: {reason}.",
        client = appointment.client_name,
        service = appointment.service_name,
        date = appointment.date,
        time = appointment.time,
        reason = reason.trim(),
    );
    OutboundMessage::new(normalize_phone(&appointment.client_phone), text)
}

/// Human-readable transfer instructions, or `None` when the staff member has
/// not published any.
pub fn transfer_instructions(payment: &PaymentDetails) -> Option<String> {
    match payment {
        PaymentDetails::NotConfigured => None,
        PaymentDetails::Transfer(bank) => Some(format!(
            "{holder} · RUT {tax_id} · {bank_name} · {account_type} N° {number} · {email}",
            holder = bank.holder,
            tax_id = bank.tax_id,
            bank_name = bank.bank_name,
            account_type = bank.account_type,
            number = bank.account_number,
            email = bank.email,
        )),
    }
}
