use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use proptest::prelude::*;

use crate::{Context, Error, HolidaySet, OpeningHours, State, validate};

fn hours(raw: &str) -> OpeningHours {
    OpeningHours::parse(raw).unwrap_or_else(|err| panic!("'{raw}' should parse: {err}"))
}

fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

fn time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap()
}

#[test]
fn state_examples() {
    // Array of (expression, instant, expected state). 2024-05-13 is a Monday.
    let cases: Vec<(&str, &str, State)> = vec![
        ("22:00-04:00", "2024-05-13 23:30", State::Open),
        ("22:00-04:00", "2024-05-14 03:59", State::Open),
        ("22:00-04:00", "2024-05-14 05:00", State::Closed),
        ("Mo-Su 09:00-18:00; Tu off", "2024-05-14 10:00", State::Closed),
        ("Mo-Su 09:00-18:00; Tu off", "2024-05-15 10:00", State::Open),
        ("Mo 18:00+", "2024-05-13 20:00", State::Open),
        ("Mo 18:00+", "2024-05-14 00:30", State::Closed),
        ("We-Mo 11:00-19:00", "2024-05-13 12:00", State::Open),
        ("We-Mo 11:00-19:00", "2024-05-14 12:00", State::Closed),
        ("Mo-Fr 08:00-12:00,13:00-17:30", "2024-05-13 12:30", State::Closed),
        ("Mo-Fr 08:00-12:00,13:00-17:30", "2024-05-13 17:29", State::Open),
        ("Mo-Fr 10:00-20:00, We 12:00-14:00 off", "2024-05-15 13:00", State::Closed),
        ("Mo-Fr 10:00-20:00, We 12:00-14:00 off", "2024-05-15 15:00", State::Open),
        ("Mo 22:00-02:00; Tu off", "2024-05-14 01:00", State::Open),
        ("Mo 22:00-02:00; Tu off", "2024-05-14 10:00", State::Closed),
        ("Mo[1] 10:00-12:00", "2024-05-06 11:00", State::Open),
        ("Mo[1] 10:00-12:00", "2024-05-13 11:00", State::Closed),
        ("Mo[-1] 10:00-12:00", "2024-05-27 11:00", State::Open),
        ("Mo-Su 10:00-12:00; Dec 25 off", "2024-12-25 11:00", State::Closed),
        ("Mo-Su 10:00-12:00; Dec 25 off", "2024-12-24 11:00", State::Open),
        ("Dec 25 off; Mo-Su 10:00-12:00", "2024-12-25 11:00", State::Open),
        ("2024 Jun-Aug 10:00-12:00", "2024-07-01 11:00", State::Open),
        ("2024 Jun-Aug 10:00-12:00", "2025-07-01 11:00", State::Closed),
        ("Nov-Feb 10:00-12:00", "2025-01-15 11:00", State::Open),
        ("Nov-Feb 10:00-12:00", "2025-03-01 11:00", State::Closed),
        ("week 20 Mo-Fr 10:00-12:00", "2024-05-13 11:00", State::Open),
        ("week 21 Mo-Fr 10:00-12:00", "2024-05-13 11:00", State::Closed),
        ("2020-2030/2 10:00-12:00", "2024-05-13 11:00", State::Open),
        ("2020-2030/2 10:00-12:00", "2025-05-13 11:00", State::Closed),
        ("sunrise-sunset", "2024-05-13 12:00", State::Open),
        ("sunrise-sunset", "2024-05-13 05:00", State::Closed),
        ("(sunrise+01:00)-(sunset-01:00)", "2024-05-13 06:30", State::Closed),
        ("(sunrise+01:00)-(sunset-01:00)", "2024-05-13 16:59", State::Open),
        ("\"by appointment\"", "2024-05-13 03:00", State::Unknown),
        ("Mo-Fr 09:00-17:00 || \"call us\"", "2024-05-18 12:00", State::Unknown),
        ("Mo-Fr 09:00-17:00 || \"call us\"", "2024-05-13 08:00", State::Closed),
        ("Mo 10:00-12:00 unknown", "2024-05-13 11:00", State::Unknown),
        ("24/7", "2024-05-13 11:00", State::Open),
        ("24/7; Dec 25 off", "2024-12-25 11:00", State::Closed),
        ("off", "2024-05-13 11:00", State::Closed),
        ("mo-fr 09:00-18:00", "2024-05-13 11:00", State::Open),
    ];

    for (raw, instant, expected) in cases {
        let state = hours(raw).state(at(instant));
        assert_eq!(state, expected, "'{raw}' at {instant}");
    }
}

#[test]
fn next_change_examples() {
    // Array of (expression, instant, expected next change).
    let cases: Vec<(&str, &str, Option<&str>)> = vec![
        ("Mo-Fr 09:00-18:00", "2024-05-13 10:00", Some("2024-05-13 18:00")),
        ("Mo-Fr 09:00-18:00", "2024-05-17 19:00", Some("2024-05-20 09:00")),
        ("22:00-04:00", "2024-05-13 23:30", Some("2024-05-14 04:00")),
        ("Mo-Su 09:00-02:00", "2018-01-04 23:00", Some("2018-01-05 02:00")),
        ("Mo-Su 09:00-00:00", "2018-06-14 23:00", Some("2018-06-15 00:00")),
        ("Jan-Feb 10:00-20:00", "2018-06-14 21:30", Some("2019-01-01 10:00")),
        ("Mo-Sa 10:00-22:00; Su 10:00-14:00, 18:00-22:00", "2018-06-14 11:30", Some("2018-06-14 22:00")),
        ("Mo-Su 12:00-14:30; Mo-Su,PH 19:00-22:30", "2018-10-26 15:00", Some("2018-10-26 19:00")),
        ("We-Mo 11:00-19:00", "2018-06-15 21:00", Some("2018-06-16 11:00")),
        ("Mo 18:00+", "2024-05-13 20:00", Some("2024-05-14 00:00")),
        ("Mo 10:00-12:00 \"a\", Mo 12:00-14:00 \"b\"", "2024-05-13 11:00", Some("2024-05-13 12:00")),
        ("2030 Jan 01 10:00-12:00", "2024-05-13 10:00", Some("2030-01-01 10:00")),
        ("10:00-12:00; Dec 24-Jan 02 off", "2024-12-20 13:00", Some("2024-12-21 10:00")),
        ("10:00-12:00; Dec 24-Jan 02 off", "2024-12-24 09:00", Some("2025-01-03 10:00")),
        ("24/7", "2024-05-13 10:00", None),
        ("off", "2024-05-13 10:00", None),
        ("2020-2022 Mo 10:00-12:00", "2024-05-13 10:00", None),
        ("Jan-Dec 00:00-24:00", "2024-05-13 10:00", None),
        ("Jan-Dec Mo-Su 00:00-24:00", "2024-05-13 10:00", None),
        ("2024 Jun-Aug Sa 10:00-12:00", "2024-08-31 11:00", Some("2024-08-31 12:00")),
        ("2024 Jun-Aug Sa 10:00-12:00", "2024-08-31 12:00", None),
        ("2024 Jun-Aug Sa 10:00-12:00", "2025-10-01 10:00", None),
        ("2023 Dec Mo-Fr 10:00-12:00", "2025-10-01 10:00", None),
        ("2023 Dec Mo-Fr 10:00-12:00; Sa 10:00-12:00", "2025-10-01 10:00", Some("2025-10-04 10:00")),
    ];

    for (raw, instant, expected) in cases {
        let next = hours(raw).next_change(at(instant));
        assert_eq!(next, Ok(expected.map(at)), "'{raw}' from {instant}");
        if let Ok(Some(next)) = next {
            assert!(next > at(instant));
        }
    }
}

#[test]
fn next_change_reports_exhaustion_separately() {
    let far = hours("2040 Jan 01 10:00-12:00");
    let from = at("2024-05-13 10:00");
    assert_eq!(far.next_change(from), Err(Error::SearchExhausted { from, years: 10 }));

    let patient = far.with_context(Context::default().with_max_search_years(20));
    assert_eq!(patient.next_change(from), Ok(Some(at("2040-01-01 10:00"))));
}

#[test]
fn next_change_with_metrics_counts_days() {
    let run = hours("Mo-Fr 09:00-18:00").next_change_with_metrics(at("2024-05-17 19:00"));
    assert_eq!(run.result, Ok(Some(at("2024-05-20 09:00"))));
    // Thursday (overflow source) through Monday.
    assert_eq!(run.metrics.days_evaluated, 5);
}

#[test]
fn midnight_crossing_interval() {
    let state = hours("22:00-04:00").state_at(at("2024-05-13 23:30"));
    assert_eq!(state.state, State::Open);
    let interval = state.interval.unwrap();
    assert_eq!(interval.start, Some(at("2024-05-13 22:00")));
    assert_eq!(interval.end, Some(at("2024-05-14 04:00")));
    assert!(!interval.open_end);
}

#[test]
fn open_end_is_reported() {
    let state = hours("Mo 18:00+").state_at(at("2024-05-13 20:00"));
    assert!(state.is_open());
    assert!(state.open_end());
    assert_eq!(state.interval.unwrap().end, Some(at("2024-05-14 00:00")));
}

#[test]
fn closed_instants_have_no_interval() {
    let hours = hours("Mo-Fr 09:00-18:00");
    assert_eq!(hours.interval_containing(at("2024-05-13 19:00")), None);
    assert_eq!(hours.state_at(at("2024-05-13 19:00")).interval, None);
}

#[test]
fn always_open_interval_is_unbounded() {
    let interval = hours("24/7").interval_containing(at("2024-05-13 10:00")).unwrap();
    assert_eq!((interval.start, interval.end), (None, None));
    assert!(hours("24/7").is_24_7(at("2024-05-13 10:00")));
    assert!(!hours("Mo-Fr 09:00-18:00").is_24_7(at("2024-05-13 10:00")));
}

#[test]
fn comments_travel_with_the_state() {
    let state = hours("Mo-Fr 09:00-17:00 || \"by appointment\"").state_at(at("2024-05-18 12:00"));
    assert_eq!(state.state, State::Unknown);
    assert_eq!(state.comment.as_deref(), Some("by appointment"));
    let interval = state.interval.unwrap();
    assert_eq!(interval.start, Some(at("2024-05-18 00:00")));
    // Monday is covered by the first rule, so the fallback stops at midnight.
    assert_eq!(interval.end, Some(at("2024-05-20 00:00")));
}

#[test]
fn open_intervals_are_clipped_and_merged() {
    let intervals = hours("22:00-04:00").open_intervals(at("2024-05-13 00:00"), at("2024-05-15 00:00"));
    let bounds: Vec<(NaiveDateTime, NaiveDateTime)> = intervals.iter().map(|i| (i.start, i.end)).collect();
    assert_eq!(bounds, vec![
        (at("2024-05-13 00:00"), at("2024-05-13 04:00")),
        (at("2024-05-13 22:00"), at("2024-05-14 04:00")),
        (at("2024-05-14 22:00"), at("2024-05-15 00:00")),
    ]);

    let always = hours("24/7").open_intervals(at("2024-05-13 10:00"), at("2024-05-16 10:00"));
    assert_eq!(always.len(), 1);
    assert_eq!((always[0].start, always[0].end), (at("2024-05-13 10:00"), at("2024-05-16 10:00")));

    let unknown =
        hours("Mo 10:00-12:00; Tu unknown \"ask\"").open_intervals(at("2024-05-13 00:00"), at("2024-05-15 00:00"));
    assert_eq!(unknown.len(), 2);
    assert!(unknown[1].is_unknown());
    assert_eq!(unknown[1].comment.as_deref(), Some("ask"));
}

#[test]
fn open_intervals_of_an_empty_range() {
    let hours = hours("24/7");
    assert!(hours.open_intervals(at("2024-05-13 10:00"), at("2024-05-13 10:00")).is_empty());
    assert!(hours.open_intervals(at("2024-05-13 10:00"), at("2024-05-12 10:00")).is_empty());
}

#[test]
fn intervals_on_a_day() {
    let hours = hours("Mo-Su 09:00-02:00");
    let day = NaiveDate::from_ymd_opt(2018, 1, 4).unwrap();

    let clipped: Vec<(NaiveDateTime, NaiveDateTime)> =
        hours.intervals_on(day, false).iter().map(|i| (i.start, i.end)).collect();
    assert_eq!(clipped, vec![
        (at("2018-01-04 00:00"), at("2018-01-04 02:00")),
        (at("2018-01-04 09:00"), at("2018-01-05 00:00")),
    ]);

    let overlapping: Vec<(NaiveDateTime, NaiveDateTime)> =
        hours.intervals_on(day, true).iter().map(|i| (i.start, i.end)).collect();
    assert_eq!(overlapping, vec![(at("2018-01-04 09:00"), at("2018-01-05 02:00"))]);

    assert!(hours.is_open_on(day));
    assert!(!self::hours("Sa 10:00-12:00").is_open_on(day));
}

#[test]
fn week_schedule_with_wrapping_day_range() {
    let week = hours("We-Mo 11:00-19:00").week_schedule(NaiveDate::from_ymd_opt(2018, 6, 15).unwrap());
    assert_eq!(week.len(), 7);
    assert_eq!(week[0].date, NaiveDate::from_ymd_opt(2018, 6, 11).unwrap());
    assert_eq!(week[0].weekday, chrono::Weekday::Mon);
    assert_eq!(week[0].status, State::Open);
    assert_eq!(week[0].spans, vec![(time("11:00"), time("19:00"))]);
    assert_eq!(week[1].status, State::Closed);
    assert!(week[1].spans.is_empty());
    assert!(week[2..].iter().all(|day| day.status == State::Open));
}

#[test]
fn week_schedule_keeps_overnight_ends() {
    let week = hours("Mo-Su 09:00-02:00").week_schedule(NaiveDate::from_ymd_opt(2018, 1, 4).unwrap());
    assert!(week.iter().all(|day| day.spans == vec![(time("09:00"), time("02:00"))]));
}

#[test]
fn holidays_come_from_the_context() {
    let holidays: HolidaySet =
        [NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(), NaiveDate::from_ymd_opt(2024, 12, 25).unwrap()]
            .into_iter()
            .collect();
    let context = Context::default().with_public_holidays(holidays);
    let with = |raw: &str| hours(raw).with_context(context.clone());

    assert_eq!(with("Mo-Fr 09:00-17:00; PH off").state(at("2024-12-25 10:00")), State::Closed);
    assert_eq!(with("Mo-Fr 09:00-17:00; PH off").state(at("2024-12-24 10:00")), State::Open);
    assert_eq!(with("PH Mo 10:00-12:00").state(at("2024-05-20 11:00")), State::Open);
    assert_eq!(with("PH Mo 10:00-12:00").state(at("2024-12-25 11:00")), State::Closed);
    assert_eq!(with("PH Mo 10:00-12:00").state(at("2024-05-13 11:00")), State::Closed);
    assert_eq!(with("Sa,PH 10:00-12:00").state(at("2024-12-25 11:00")), State::Open);
    assert_eq!(
        with("Mo-Fr 09:00-17:00; PH off").next_change(at("2024-12-24 18:00")),
        Ok(Some(at("2024-12-26 09:00")))
    );
    assert_eq!(hours("PH off").state(at("2024-12-25 10:00")), State::Closed);
    assert_eq!(hours("Sa,PH 10:00-12:00").state(at("2024-12-25 11:00")), State::Closed);
}

#[test]
fn validate_rejects_hostile_input_with_a_position() {
    // Array of (expression, byte offset reported).
    let cases: Vec<(&str, usize)> = vec![
        ("Mo ١٠:٠٠-12:00", 3),
        ("１０:00-12:00", 0),
        ("Mo[99999999999] 10:00-12:00", 3),
        ("week 99999999999", 5),
        ("Mo é", 3),
        ("Mo Straße", 3),
        ("99999999999999999999:00", 0),
        ("(sunrise+99:99)-sunset", 9),
        ("Mo-Fr 25:99", 6),
        ("2025 Jan 01-2024 Dec 31", 12),
        ("\"unterminated", 0),
        ("Mo 10:00-", 9),
    ];

    for (raw, position) in cases {
        let err = validate(raw).expect_err(raw);
        assert!(err.contains(&format!("at position {position}")), "'{raw}': {err}");
    }
}

#[test]
fn queries_at_the_end_of_the_calendar_do_not_panic() {
    let hours = hours("Mo-Su 22:00-02:00");
    let last = NaiveDate::MAX;
    let instant = last.and_hms_opt(23, 0, 0).unwrap();

    assert_eq!(hours.state(instant), State::Open);
    let interval = hours.interval_containing(instant).unwrap();
    assert_eq!(interval.start, Some(last.and_hms_opt(22, 0, 0).unwrap()));
    assert!(hours.is_open_on(last));
    assert!(!hours.intervals_on(last, false).is_empty());
    assert!(hours.week_schedule(last).len() <= 7);
}

const EXPRESSIONS: &[&str] = &[
    "24/7",
    "Mo-Fr 09:00-18:00",
    "Mo-Fr 09:00-12:00,13:00-18:00; Sa 10:00-14:00",
    "22:00-04:00",
    "Mo-Su 09:00-18:00; Tu off",
    "Mo 18:00+",
    "We-Mo 11:00-19:00",
    "Mo-Fr 10:00-20:00, We 12:00-14:00 off",
    "Mo-Fr 09:00-17:00 || \"by appointment\"",
    "Jan-Feb 10:00-20:00",
    "Mo[1,-1] 10:00-12:00",
    "Mo-Sa 08:00-20:00; Dec 24-Jan 02 off",
    "week 01-26/2 Mo-Fr 08:00-12:00",
    "sunrise-sunset",
    "Mo 22:00-02:00; Tu off",
];

fn instant(days: i64, minute: u32) -> NaiveDateTime {
    let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    base + Duration::days(days) + Duration::minutes(i64::from(minute))
}

proptest! {
    #[test]
    fn validate_never_panics(raw in "\\PC{0,40}") {
        if let Err(message) = validate(&raw) {
            prop_assert!(message.contains("at position"), "{:?}: {}", raw, message);
        }
    }

    #[test]
    fn near_grammar_input_parses_or_fails_cleanly(raw in "[0-9A-Za-z:;,+/ \\-\\[\\]()\"|]{0,30}") {
        match OpeningHours::parse(&raw) {
            Ok(hours) => {
                let _ = hours.state(instant(0, 600));
            }
            Err(err) => prop_assert!(err.position().is_some(), "{:?}: {}", raw, err),
        }
    }

    #[test]
    fn parsing_is_idempotent(raw in prop::sample::select(EXPRESSIONS)) {
        let first = OpeningHours::parse(raw).unwrap();
        let second = OpeningHours::parse(raw).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn open_state_lies_in_its_interval(
        raw in prop::sample::select(EXPRESSIONS),
        days in 0i64..3650,
        minute in 0u32..1440,
    ) {
        let hours = OpeningHours::parse(raw).unwrap();
        let t = instant(days, minute);
        let state = hours.state_at(t);
        if state.state == State::Open {
            let interval = state.interval.clone().unwrap();
            prop_assert!(interval.contains(t), "{} at {}: {:?}", raw, t, interval);
            if let Ok(next) = hours.next_change(t) {
                prop_assert_eq!(interval.end, next);
            }
        }
    }

    #[test]
    fn next_change_is_strictly_later(
        raw in prop::sample::select(EXPRESSIONS),
        days in 0i64..3650,
        minute in 0u32..1440,
    ) {
        let hours = OpeningHours::parse(raw).unwrap();
        let t = instant(days, minute);
        if let Ok(Some(next)) = hours.next_change(t) {
            prop_assert!(next > t);
            let (before, after) = (hours.state_at(t), hours.state_at(next));
            prop_assert!(
                before.state != after.state
                    || before.comment != after.comment
                    || before.open_end() != after.open_end(),
                "{} unchanged between {} and {}", raw, t, next
            );
        }
    }
}
