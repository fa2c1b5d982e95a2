use chrono::{Duration, TimeZone, Timelike, Utc};
use pipeline_core::PipelineError;
use pipeline_dispatcher::{Cadence, CadenceKind};

#[test]
fn test_interval_forms() {
    for expr in ["every 10 minutes", "every 1 minute", "every 2 hours", "every 45 seconds"] {
        let cadence = Cadence::parse(expr).unwrap();
        assert!(cadence.is_interval(), "{expr}");
        assert_eq!(cadence.expression(), expr);
    }

    let cadence: Cadence = "every 2 hours".parse().unwrap();
    match cadence.kind() {
        CadenceKind::Interval(every) => assert_eq!(*every, Duration::hours(2)),
        CadenceKind::Calendar(_) => panic!("expected interval"),
    }
}

#[test]
fn test_calendar_forms() {
    let from = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

    let daily = Cadence::parse("0 0 0 * * *").unwrap();
    let next = daily.next_after(from).unwrap();
    assert_eq!((next.hour(), next.minute(), next.second()), (0, 0, 0));
    assert_eq!(next.date_naive(), from.date_naive() + Duration::days(1));

    let shortcut = Cadence::parse("@hourly").unwrap();
    assert_eq!(
        shortcut.next_after(from),
        Some(Utc.with_ymd_and_hms(2024, 3, 1, 13, 0, 0).unwrap())
    );

    let classic = Cadence::parse("*/15 * * * *").unwrap();
    assert_eq!(
        classic.next_after(from),
        Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 45, 0).unwrap())
    );
}

#[test]
fn test_invalid_expressions_are_config_errors() {
    for expr in [
        "",
        "every",
        "every ten minutes",
        "every 0 minutes",
        "every -5 minutes",
        "every 5 fortnights",
        "every 5",
        "invalid",
        "0 0 0 32 * *",
        "* * *",
    ] {
        let err = Cadence::parse(expr).unwrap_err();
        assert!(
            matches!(err, PipelineError::InvalidCadence { .. }),
            "{expr}: {err}"
        );
        assert!(err.is_config_error());
    }
}
