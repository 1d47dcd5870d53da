use chrono::{DateTime, Duration, Utc};

/// Current UTC time
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Returns `candidate`, or one microsecond after `previous` when the clock has
/// not moved past it. Keeps append-only logs strictly increasing.
pub fn monotonic_after(previous: Option<DateTime<Utc>>, candidate: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(prev) if candidate <= prev => prev + Duration::microseconds(1),
        _ => candidate,
    }
}

/// Generate a collision-resistant order identifier (`ord_<uuid-v4>`).
pub fn order_id() -> String {
    format!("ord_{}", uuid::Uuid::new_v4().simple())
}

/// Format an amount in minor currency units for display, e.g. `19.99 EUR`.
pub fn format_amount(amount_minor: i64, currency: &str) -> String {
    let sign = if amount_minor < 0 { "-" } else { "" };
    let abs = amount_minor.unsigned_abs();
    format!(
        "{sign}{}.{:02} {}",
        abs / 100,
        abs % 100,
        currency.to_uppercase()
    )
}
