// Integration tests for transcript assembly
//
// These tests verify marker cadence, ordering, and export through the
// public assembler API.

use std::time::Duration;
use streamscribe::{TranscriptAssembler, TranscriptEvent};

fn assembler_30s() -> TranscriptAssembler {
    TranscriptAssembler::new(Duration::from_secs(30))
}

#[test]
fn test_first_segment_gets_forced_marker() {
    let mut transcript = assembler_30s();

    transcript.append("hello", Duration::from_secs(0));

    assert_eq!(transcript.render(), "[00:00] hello");
    assert!(matches!(
        transcript.events()[0],
        TranscriptEvent::Marker { elapsed_secs: 0 }
    ));
}

#[test]
fn test_no_second_marker_inside_interval() {
    let mut transcript = assembler_30s();

    transcript.append("a", Duration::from_secs(0));
    for secs in [5u64, 12, 20, 29] {
        transcript.append("x", Duration::from_secs(secs));
    }

    let markers = transcript
        .events()
        .iter()
        .filter(|e| matches!(e, TranscriptEvent::Marker { .. }))
        .count();
    assert_eq!(markers, 1, "only the forced marker inside the interval");
}

#[test]
fn test_marker_returns_after_interval_elapses() {
    let mut transcript = assembler_30s();

    transcript.append("a", Duration::from_secs(0));
    transcript.append("b", Duration::from_secs(31));
    transcript.append("c", Duration::from_secs(45));
    transcript.append("d", Duration::from_secs(61));

    assert_eq!(transcript.render(), "[00:00] a [00:31] b c [01:01] d");
}

#[test]
fn test_segments_preserve_append_order() {
    let mut transcript = assembler_30s();

    for (i, word) in ["one", "two", "three", "four"].iter().enumerate() {
        transcript.append(word, Duration::from_secs(i as u64));
    }

    let texts: Vec<&str> = transcript
        .events()
        .iter()
        .filter_map(|e| match e {
            TranscriptEvent::Segment { text, .. } => Some(text.as_str()),
            TranscriptEvent::Marker { .. } => None,
        })
        .collect();
    assert_eq!(texts, vec!["one", "two", "three", "four"]);
}

#[test]
fn test_whitespace_only_text_appends_nothing() {
    let mut transcript = assembler_30s();

    transcript.append("  \n\t ", Duration::from_secs(0));

    assert!(transcript.events().is_empty());
    assert_eq!(transcript.segment_count(), 0);
}

#[test]
fn test_text_is_trimmed_before_append() {
    let mut transcript = assembler_30s();

    transcript.append("  padded  ", Duration::from_secs(0));

    assert_eq!(transcript.render(), "[00:00] padded");
}

#[test]
fn test_custom_interval_cadence() {
    let mut transcript = TranscriptAssembler::new(Duration::from_secs(10));

    transcript.append("a", Duration::from_secs(0));
    transcript.append("b", Duration::from_secs(9));
    transcript.append("c", Duration::from_secs(10));

    assert_eq!(transcript.render(), "[00:00] a b [00:10] c");
}

#[test]
fn test_export_document() {
    let mut transcript = assembler_30s();
    transcript.append("hello", Duration::from_secs(0));
    transcript.append("world", Duration::from_secs(3));

    let export = transcript.export();
    assert_eq!(export.text, "[00:00] hello world");

    // The document round-trips through serde for the export API.
    let json = serde_json::to_string(&export).unwrap();
    assert!(json.contains("\"created_at\""));
    assert!(json.contains("[00:00] hello world"));
}
