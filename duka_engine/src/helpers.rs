use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Utc};
use once_cell::sync::Lazy;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use regex::Regex;

pub const CONFIRMATION_TOKEN_LENGTH: usize = 32;

/// Rwandan mobile-money numbers: MTN (078/079) and Airtel (072/073), with or without the 250 country code.
static PHONE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\+?250|0)?(7[2389]\d{7})$").expect("phone number regex is valid"));

/// A random single-use token that is safe to embed in a URL.
pub fn new_confirmation_token() -> String {
    thread_rng().sample_iter(&Alphanumeric).take(CONFIRMATION_TOKEN_LENGTH).map(char::from).collect()
}

/// Midnight UTC on the first day of the month containing `now`.
pub fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0).single().unwrap_or(now)
}

/// One calendar month after `from`, clamped to the end of shorter months.
pub fn one_month_after(from: DateTime<Utc>) -> DateTime<Utc> {
    from.checked_add_months(Months::new(1)).unwrap_or_else(|| from + Duration::days(30))
}

/// Normalizes a phone number into the local `07XXXXXXXX` form the provider expects.
/// Returns `None` if the number is not a Rwandan mobile number.
pub fn normalize_phone_number(phone: &str) -> Option<String> {
    let compact = phone.chars().filter(|c| !c.is_whitespace() && *c != '-').collect::<String>();
    PHONE_NUMBER.captures(&compact).and_then(|c| c.get(1)).map(|m| format!("0{}", m.as_str()))
}
