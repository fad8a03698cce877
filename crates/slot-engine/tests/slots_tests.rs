//! Tests for slot enumeration.

use chrono::{DateTime, NaiveDate, TimeZone, Utc, Weekday};
use slot_engine::{
    available_slots, candidate_slots, first_available_slot, Break, ExistingBooking,
    ScheduleConfig, ServiceId, ServiceInfo, SlotStep, WorkInterval,
};

/// Monday 2026-03-16.
fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 16).unwrap()
}

fn at(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, min, 0).unwrap()
}

/// Long before any test date.
fn early() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
}

fn ids(names: &[&str]) -> Vec<ServiceId> {
    names.iter().map(|n| ServiceId::from(*n)).collect()
}

fn schedule(zone: &str, weekday: Weekday, start: &str, end: &str) -> ScheduleConfig {
    ScheduleConfig::new(zone).with_day(weekday, vec![WorkInterval::parse(start, end).unwrap()])
}

/// Start times `from`, `from + step`, ... up to and including `to`.
fn every(step: i64, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut out = Vec::new();
    let mut t = from;
    while t <= to {
        out.push(t);
        t += chrono::Duration::minutes(step);
    }
    out
}

#[test]
fn reference_day_exact_slot_set() {
    // Work 09:00-18:00, booking 12:00-13:00 with a 15 minute buffer (busy until
    // 13:15), 60 minute service with the same buffer, min 30, step 15.
    let mut config = schedule("UTC", Weekday::Mon, "09:00", "18:00");
    config.buffer_minutes = 15;
    config.min_service_duration_minutes = 30;
    config.slot_step_minutes = SlotStep::FIFTEEN;

    let services = vec![ServiceInfo::new("consult", 60)];
    let bookings = vec![ExistingBooking::new(at(16, 12, 0), at(16, 13, 0)).for_service("consult")];

    let slots =
        available_slots(&config, monday(), &ids(&["consult"]), &bookings, &services, early())
            .unwrap();

    let mut expected = every(15, at(16, 9, 0), at(16, 10, 15));
    // 10:30 would leave a 15 minute tail before 12:00.
    expected.push(at(16, 10, 45));
    expected.extend(every(15, at(16, 13, 15), at(16, 16, 15)));
    // 16:30 would leave a 15 minute tail before 18:00.
    expected.push(at(16, 16, 45));

    assert_eq!(slots, expected);
}

#[test]
fn reference_day_in_moscow_is_shifted_by_offset() {
    let mut config = schedule("Europe/Moscow", Weekday::Mon, "09:00", "18:00");
    config.buffer_minutes = 15;

    let services = vec![ServiceInfo::new("consult", 60)];
    // 12:00-13:00 Moscow time.
    let bookings = vec![ExistingBooking::new(at(16, 9, 0), at(16, 10, 0)).for_service("consult")];

    let slots =
        available_slots(&config, monday(), &ids(&["consult"]), &bookings, &services, early())
            .unwrap();

    let mut expected = every(15, at(16, 6, 0), at(16, 7, 15));
    expected.push(at(16, 7, 45));
    expected.extend(every(15, at(16, 10, 15), at(16, 13, 15)));
    expected.push(at(16, 13, 45));

    assert_eq!(slots, expected);
}

#[test]
fn slots_start_from_rounded_up_now() {
    let config = schedule("UTC", Weekday::Mon, "09:00", "12:00");
    let services = vec![ServiceInfo::new("cut", 60).with_buffer(0)];
    let now = at(16, 9, 7);

    let slots = available_slots(&config, monday(), &ids(&["cut"]), &[], &services, now).unwrap();

    let mut expected = every(15, at(16, 9, 15), at(16, 10, 30));
    expected.push(at(16, 11, 0));
    assert_eq!(slots, expected);
    assert!(slots.iter().all(|s| *s >= now));
}

#[test]
fn past_work_interval_is_skipped() {
    let config = ScheduleConfig::new("UTC").with_day(
        Weekday::Mon,
        vec![
            WorkInterval::parse("09:00", "12:00").unwrap(),
            WorkInterval::parse("14:00", "16:00").unwrap(),
        ],
    );
    let services = vec![ServiceInfo::new("cut", 60).with_buffer(0)];

    let slots =
        available_slots(&config, monday(), &ids(&["cut"]), &[], &services, at(16, 13, 0)).unwrap();

    assert_eq!(
        slots,
        vec![at(16, 14, 0), at(16, 14, 15), at(16, 14, 30), at(16, 15, 0)]
    );
}

#[test]
fn day_without_work_intervals_has_no_slots() {
    let config = schedule("UTC", Weekday::Mon, "09:00", "18:00");
    let sunday = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
    let services = vec![ServiceInfo::new("cut", 60)];

    let slots = available_slots(&config, sunday, &ids(&["cut"]), &[], &services, early()).unwrap();
    assert!(slots.is_empty());
}

#[test]
fn fully_booked_day_has_no_slots() {
    let config = schedule("UTC", Weekday::Mon, "09:00", "18:00");
    let services = vec![ServiceInfo::new("cut", 60)];
    let bookings = vec![ExistingBooking::new(at(16, 8, 0), at(16, 18, 30))];

    let slots =
        available_slots(&config, monday(), &ids(&["cut"]), &bookings, &services, early()).unwrap();
    assert!(slots.is_empty());
}

#[test]
fn free_interval_shorter_than_service_has_no_slots() {
    let config = schedule("UTC", Weekday::Mon, "09:00", "12:00");
    let services = vec![ServiceInfo::new("long", 90).with_buffer(0)];
    let bookings = vec![
        ExistingBooking::new(at(16, 9, 0), at(16, 10, 0)),
        ExistingBooking::new(at(16, 11, 0), at(16, 12, 0)),
    ];

    let slots =
        available_slots(&config, monday(), &ids(&["long"]), &bookings, &services, early())
            .unwrap();
    assert!(slots.is_empty());
}

#[test]
fn unknown_service_falls_back_to_shortest_duration() {
    // min 30 + default buffer 15 = 45 minutes in a one-hour window.
    let mut config = schedule("UTC", Weekday::Mon, "09:00", "10:00");
    config.buffer_minutes = 15;
    let services: Vec<ServiceInfo> = Vec::new();

    let slots =
        available_slots(&config, monday(), &ids(&["missing"]), &[], &services, early()).unwrap();

    // 09:00 would leave a 15 minute tail.
    assert_eq!(slots, vec![at(16, 9, 15)]);
}

#[test]
fn multiple_services_use_longest_not_sum() {
    let mut config = schedule("UTC", Weekday::Mon, "09:00", "10:00");
    config.min_service_duration_minutes = 15;
    let services = vec![
        ServiceInfo::new("wash", 30).with_buffer(0),
        ServiceInfo::new("cut", 45).with_buffer(0),
    ];

    let slots =
        available_slots(&config, monday(), &ids(&["wash", "cut"]), &[], &services, early())
            .unwrap();

    assert_eq!(slots, vec![at(16, 9, 0), at(16, 9, 15)]);
}

#[test]
fn breaks_split_the_day() {
    let config = schedule("UTC", Weekday::Mon, "09:00", "13:00")
        .with_break(Break::parse("10:00", "10:30").unwrap().with_reason("coffee"));
    let services = vec![ServiceInfo::new("cut", 30).with_buffer(0)];

    let slots = available_slots(&config, monday(), &ids(&["cut"]), &[], &services, early()).unwrap();

    let mut expected = vec![at(16, 9, 0), at(16, 9, 30)];
    expected.extend(every(15, at(16, 10, 30), at(16, 12, 0)));
    expected.push(at(16, 12, 30));
    assert_eq!(slots, expected);
}

#[test]
fn break_limited_to_other_weekday_is_ignored() {
    let config = schedule("UTC", Weekday::Mon, "09:00", "10:00")
        .with_break(Break::parse("09:00", "09:30").unwrap().on_days(&[Weekday::Tue]));
    let services = vec![ServiceInfo::new("cut", 30).with_buffer(0)];

    let slots = available_slots(&config, monday(), &ids(&["cut"]), &[], &services, early()).unwrap();
    assert_eq!(slots, vec![at(16, 9, 0), at(16, 9, 30)]);
}

#[test]
fn dst_switch_day_uses_new_offset() {
    // New York springs forward on Sunday 2026-03-08.
    let config = schedule("America/New_York", Weekday::Sun, "09:00", "11:00");
    let services = vec![ServiceInfo::new("cut", 60).with_buffer(0)];
    let cut = ids(&["cut"]);

    let before = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let after = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
    let now = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();

    let est = available_slots(&config, before, &cut, &[], &services, now).unwrap();
    let edt = available_slots(&config, after, &cut, &[], &services, now).unwrap();

    assert_eq!(
        est,
        vec![at(1, 14, 0), at(1, 14, 15), at(1, 14, 30), at(1, 15, 0)]
    );
    assert_eq!(
        edt,
        vec![at(8, 13, 0), at(8, 13, 15), at(8, 13, 30), at(8, 14, 0)]
    );
}

#[test]
fn step_of_five_minutes() {
    let mut config = schedule("UTC", Weekday::Mon, "09:00", "09:45");
    config.slot_step_minutes = SlotStep::FIVE;
    config.min_service_duration_minutes = 10;
    let services = vec![ServiceInfo::new("trim", 20).with_buffer(0)];

    let slots = available_slots(&config, monday(), &ids(&["trim"]), &[], &services, early()).unwrap();

    // Tails of 5 are rejected: 09:20 (tail 5) is skipped, 09:25 (tail 0) kept.
    let mut expected = every(5, at(16, 9, 0), at(16, 9, 15));
    expected.push(at(16, 9, 25));
    assert_eq!(slots, expected);
}

#[test]
fn candidate_slots_exclude_buffer_from_visible_end() {
    let mut config = schedule("Europe/Moscow", Weekday::Mon, "12:00", "13:30");
    config.buffer_minutes = 30;
    let services = vec![ServiceInfo::new("consult", 60)];

    let slots =
        candidate_slots(&config, monday(), &ids(&["consult"]), &[], &services, early()).unwrap();

    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].start, at(16, 9, 0));
    assert_eq!(slots[0].end, at(16, 10, 0));
    assert_eq!(slots[0].local_start, "12:00");
}

#[test]
fn candidate_end_follows_service_that_sets_slot_length() {
    // "color" blocks 60 + 60 minutes, "cut" 90 + 0: slots are sized for
    // "color", so the visible end is 60 minutes after the start.
    let config = schedule("UTC", Weekday::Mon, "09:00", "11:00");
    let services = vec![
        ServiceInfo::new("cut", 90).with_buffer(0),
        ServiceInfo::new("color", 60).with_buffer(60),
    ];

    let wanted = ids(&["cut", "color"]);
    let slots = candidate_slots(&config, monday(), &wanted, &[], &services, early()).unwrap();

    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].start, at(16, 9, 0));
    assert_eq!(slots[0].end, at(16, 10, 0));
}

#[test]
fn break_inside_spring_forward_gap_does_not_split_free_time() {
    // Sunday 2026-03-08: New York skips 02:00-03:00, so this break covers no time.
    let sunday = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
    let plain = schedule("America/New_York", Weekday::Sun, "00:00", "06:00");
    let with_break = plain.clone().with_break(Break::parse("02:00", "03:00").unwrap());
    with_break.validate().unwrap();
    let services = vec![ServiceInfo::new("consult", 60)];
    let wanted = ids(&["consult"]);

    let without = available_slots(&plain, sunday, &wanted, &[], &services, early()).unwrap();
    let gap_break =
        available_slots(&with_break, sunday, &wanted, &[], &services, early()).unwrap();

    // Work runs 05:00Z-10:00Z; 09:00Z ends flush, 08:45Z would leave 15 minutes.
    let mut expected = every(15, at(8, 5, 0), at(8, 8, 30));
    expected.push(at(8, 9, 0));
    assert_eq!(without, expected);
    assert_eq!(gap_break, without);
}

#[test]
fn first_available_slot_skips_days_off() {
    let config = schedule("UTC", Weekday::Mon, "09:00", "10:00");
    let services = vec![ServiceInfo::new("cut", 60).with_buffer(0)];
    let saturday = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();

    let found =
        first_available_slot(&config, saturday, 7, &ids(&["cut"]), &[], &services, early())
            .unwrap();
    assert_eq!(found, Some(at(16, 9, 0)));

    let within_weekend =
        first_available_slot(&config, saturday, 2, &ids(&["cut"]), &[], &services, early())
            .unwrap();
    assert_eq!(within_weekend, None);
}

#[test]
fn invalid_timezone_is_an_error_not_utc() {
    let config = schedule("Not/AZone", Weekday::Mon, "09:00", "10:00");
    let services = vec![ServiceInfo::new("cut", 60)];

    let err =
        available_slots(&config, monday(), &ids(&["cut"]), &[], &services, early()).unwrap_err();
    assert!(matches!(err, slot_engine::EngineError::InvalidTimezone(_)));
}
