//! Integration tests for the event journal

use chrono::{TimeZone, Utc};
use curfew_agent::{Event, EventJournal, EventKind, JournalError};
use std::fs;
use tempfile::TempDir;

fn journal_in(dir: &TempDir) -> EventJournal {
    EventJournal::new(dir.path().join("events_journal.json"))
}

fn sample_events() -> Vec<Event> {
    let base = Utc.with_ymd_and_hms(2024, 2, 1, 21, 58, 3).unwrap();
    EventKind::ALL
        .iter()
        .enumerate()
        .map(|(i, kind)| {
            // Sub-second precision must survive the round trip.
            let at = base
                + chrono::Duration::minutes(i as i64 * 17)
                + chrono::Duration::nanoseconds(123_456_789 + i as i64);
            Event::new(*kind, at)
        })
        .collect()
}

#[test]
fn test_fresh_store_is_empty() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);

    assert_eq!(journal.read_all().unwrap(), Vec::<Event>::new());
}

#[test]
fn test_round_trip_preserves_order_and_timestamps() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);
    let events = sample_events();

    for (i, event) in events.iter().enumerate() {
        let outcome = journal.append(event.clone()).unwrap();
        assert_eq!(outcome.total_events, i + 1);
        assert!(outcome.recovered.is_none());
    }

    assert_eq!(journal.read_all().unwrap(), events);
}

#[test]
fn test_append_order_is_kept_even_when_not_chronological() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);
    let later = Event::new(EventKind::Wake, Utc.with_ymd_and_hms(2024, 2, 2, 7, 0, 0).unwrap());
    let earlier = Event::new(EventKind::Sleep, Utc.with_ymd_and_hms(2024, 2, 1, 23, 0, 0).unwrap());

    journal.append(later.clone()).unwrap();
    journal.append(earlier.clone()).unwrap();

    assert_eq!(journal.read_all().unwrap(), vec![later, earlier]);
}

#[test]
fn test_repeated_reads_are_identical() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);
    for event in sample_events() {
        journal.append(event).unwrap();
    }

    let first = journal.read_all().unwrap();
    let second = journal.read_all().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_separate_handles_see_the_same_journal() {
    let dir = TempDir::new().unwrap();
    journal_in(&dir).append(Event::now(EventKind::AppStart)).unwrap();

    let reopened = journal_in(&dir);
    let events = reopened.read_all().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::AppStart);
}

#[test]
fn test_persisted_format_is_tagged_json_array() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);
    let at = Utc.with_ymd_and_hms(2024, 2, 1, 22, 0, 0).unwrap();
    journal.append(Event::new(EventKind::PowerOff, at)).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(journal.path()).unwrap()).unwrap();
    assert_eq!(
        raw,
        serde_json::json!([{ "timestamp": "2024-02-01T22:00:00Z", "kind": "power_off" }])
    );
}

#[test]
fn test_crash_between_temp_write_and_replace_keeps_previous_state() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);
    let before = sample_events();
    for event in &before {
        journal.append(event.clone()).unwrap();
    }

    let mut next = before.clone();
    next.push(Event::now(EventKind::Sleep));
    let staged = journal.stage(&next).unwrap();
    let temp_path = staged.temp_path().to_path_buf();
    // The process dies here: the temp file is left behind and never renamed.
    std::mem::forget(staged);

    assert!(temp_path.exists());
    assert_eq!(journal.read_all().unwrap(), before);

    // The leftover temp file does not disturb later appends.
    let outcome = journal.append(Event::now(EventKind::Wake)).unwrap();
    assert_eq!(outcome.total_events, before.len() + 1);
    assert!(outcome.recovered.is_none());

    // Once old enough, the orphan is swept away.
    assert!(temp_path.exists());
    assert_eq!(
        journal
            .remove_stale_temp_files(std::time::Duration::ZERO)
            .unwrap(),
        1
    );
    assert!(!temp_path.exists());
    assert_eq!(journal.read_all().unwrap().len(), before.len() + 1);
}

#[test]
fn test_committed_stage_replaces_journal() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);
    let events = sample_events();

    let staged = journal.stage(&events).unwrap();
    let temp_path = staged.temp_path().to_path_buf();
    staged.commit().unwrap();

    assert!(!temp_path.exists());
    assert_eq!(journal.read_all().unwrap(), events);
}

#[test]
fn test_malformed_journal_is_reported_as_corrupt() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);
    fs::write(journal.path(), br#"[{"timestamp": "2024-02-01T22:00:00Z", "kind": "#).unwrap();

    match journal.read_all() {
        Err(JournalError::CorruptData { path, .. }) => assert_eq!(path, journal.path()),
        other => panic!("expected CorruptData, got {other:?}"),
    }
}

#[test]
fn test_unknown_kind_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);
    fs::write(
        journal.path(),
        r#"[{"timestamp": "2024-02-01T22:00:00Z", "kind": "hibernate"}]"#,
    )
    .unwrap();

    assert!(matches!(
        journal.read_all(),
        Err(JournalError::CorruptData { .. })
    ));
}

#[test]
fn test_append_over_corrupt_journal_recovers_and_keeps_backup() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);
    let garbage = b"this is not json";
    fs::write(journal.path(), garbage).unwrap();

    let event = Event::now(EventKind::Wake);
    let outcome = journal.append(event.clone()).unwrap();

    assert_eq!(outcome.total_events, 1);
    let recovery = outcome.recovered.expect("recovery should be reported");
    assert!(recovery.reason.contains("corrupt"));
    let backup = recovery.backup.expect("backup should be written");
    assert_eq!(fs::read(&backup).unwrap(), garbage);

    assert_eq!(journal.read_all().unwrap(), vec![event]);
}

#[test]
fn test_write_failure_is_surfaced() {
    let dir = TempDir::new().unwrap();
    // The journal's parent "directory" is a regular file, so nothing can be created under it.
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, b"x").unwrap();
    let journal = EventJournal::new(blocker.join("events_journal.json"));

    let result = journal.append(Event::now(EventKind::Sleep));
    assert!(matches!(result, Err(JournalError::WriteFailed { .. })));
}
