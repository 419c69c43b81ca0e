//! Wire-format date parsing and Austrian German date formatting.

use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use super::error::DomainError;

const WIRE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

const MONTHS: [&str; 12] = [
    "Jänner",
    "Februar",
    "März",
    "April",
    "Mai",
    "Juni",
    "Juli",
    "August",
    "September",
    "Oktober",
    "November",
    "Dezember",
];

/// Parse a `YYYY-MM-DD` date as submitted by the letter form.
pub fn parse_wire_date(input: &str) -> Result<Date, DomainError> {
    Date::parse(input, WIRE_FORMAT).map_err(|err| {
        DomainError::validation(format!(
            "date `{input}` is not a valid YYYY-MM-DD date: {err}"
        ))
    })
}

/// Format a date as `day. month-name year`, e.g. `1. Jänner 2024`.
pub fn german_date(date: Date) -> String {
    let month = MONTHS[usize::from(u8::from(date.month())) - 1];
    format!("{}. {} {}", date.day(), month, date.year())
}

/// Today's date (UTC) in wire format, used to prefill the letter form.
pub fn today_wire_date() -> String {
    let today = time::OffsetDateTime::now_utc().date();
    today
        .format(WIRE_FORMAT)
        .unwrap_or_else(|_| String::from("2000-01-01"))
}
