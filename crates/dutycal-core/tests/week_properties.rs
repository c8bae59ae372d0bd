use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use dutycal_core::event::{Event, NewEvent, derive_id};
use dutycal_core::week::{week_of, week_start};
use proptest::prelude::*;

const ZONES: [Tz; 5] = [
    Tz::UTC,
    chrono_tz::Europe::Zurich,
    chrono_tz::America::New_York,
    chrono_tz::Asia::Kolkata,
    chrono_tz::Pacific::Auckland,
];

// Roughly 1900..2100, well inside chrono's range.
fn arb_instant() -> impl Strategy<Value = DateTime<Utc>> {
    (-2_208_988_800_i64..4_102_444_800_i64)
        .prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap_or_default())
}

fn arb_zone() -> impl Strategy<Value = Tz> {
    prop::sample::select(ZONES.to_vec())
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(2000))]

    #[test]
    fn a_week_later_is_the_next_bucket(instant in arb_instant()) {
        let t = instant.with_timezone(&Tz::UTC);
        prop_assert_eq!(week_of(&(t + Duration::days(7))), week_of(&t) + 1);
    }

    #[test]
    fn local_bucket_starts_on_monday_midnight(instant in arb_instant(), zone in arb_zone()) {
        let t = instant.with_timezone(&zone);
        let start = week_start(week_of(&t), zone);
        prop_assert!(start <= t);
        prop_assert_eq!(start.weekday(), Weekday::Mon);
        prop_assert_eq!(week_of(&start), week_of(&t));
    }

    #[test]
    fn bucket_is_stable_within_a_local_week(instant in arb_instant(), zone in arb_zone(), hours in 0_i64..167) {
        let start = week_start(week_of(&instant.with_timezone(&zone)), zone);
        let local = start.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default()
            + Duration::hours(hours);
        if let Some(t) = zone.from_local_datetime(&local).earliest() {
            prop_assert_eq!(week_of(&t), week_of(&start));
        }
    }

    #[test]
    fn derived_ids_are_stable(title in "[A-Za-z ]{1,24}", instant in arb_instant(), minutes in 0_i64..600) {
        let event = Event::create(
            NewEvent {
                title,
                description: "generated".into(),
                owner: String::new(),
                start: instant.with_timezone(&Tz::UTC),
                duration: Duration::minutes(minutes),
                reference: None,
                required: false,
            },
            Tz::UTC,
        );
        let id = derive_id(&event);
        prop_assert!(id.is_some());
        prop_assert_eq!(id.clone(), derive_id(&event.clone()));
        let prefix = format!("{:08X}:", event.week());
        prop_assert!(id.unwrap_or_default().starts_with(&prefix));
    }
}

#[test]
fn monday_nine_utc_lands_in_week_2819() {
    let t = Tz::UTC
        .with_ymd_and_hms(2024, 1, 8, 9, 0, 0)
        .single()
        .expect("valid time");
    assert_eq!(week_of(&t), 2819);
    assert_eq!(week_start(2819, Tz::UTC).hour(), 0);
    assert_eq!(week_of(&(t - Duration::hours(10))), 2818);
}
