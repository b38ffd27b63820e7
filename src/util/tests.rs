use super::*;

use chrono::{NaiveDate, TimeZone};

#[test]
fn utc_date_is_stable_within_a_day() {
    let early = Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 1).unwrap();
    let late = Utc.with_ymd_and_hms(2026, 3, 10, 23, 59, 59).unwrap();
    let expected = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();

    assert_eq!(early.utc_date(), expected);
    assert_eq!(late.utc_date(), expected);
}

#[test]
fn utc_date_advances_at_midnight() {
    let before = Utc.with_ymd_and_hms(2026, 3, 10, 23, 59, 59).unwrap();
    let after = Utc.with_ymd_and_hms(2026, 3, 11, 0, 0, 0).unwrap();

    assert!(after.utc_date() > before.utc_date());
}

#[test]
fn panic_payload_from_str_and_string() {
    let from_str: PanicPayload = (Box::new("boom") as Box<dyn Any + Send>).into();
    assert_eq!(from_str.to_string(), "boom");

    let from_string: PanicPayload = (Box::new("bang".to_string()) as Box<dyn Any + Send>).into();
    assert_eq!(from_string.to_string(), "bang");

    let opaque: PanicPayload = (Box::new(42u8) as Box<dyn Any + Send>).into();
    assert_eq!(opaque.to_string(), "unknown panic payload");
}
