//! End-to-end behaviour of the sink against the in-memory workbook.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use serde_json::{json, Map, Value};

use sheetsink::memory::{AckMode, StoreCall};
use sheetsink::{
    apply_style, provision, ColumnClass, FieldSpec, FormatOp, MemoryStore, RegionSource,
    SheetLayout, StyleRole, StyleTemplate, SubmissionSchema, TabularSink,
};

fn feedback_schema() -> SubmissionSchema {
    SubmissionSchema::new(
        "feedback",
        "username",
        vec![
            FieldSpec::new("age", "Age", ColumnClass::Compact),
            FieldSpec::new("comments", "Further comments", ColumnClass::Wrapped),
        ],
    )
    .unwrap()
}

fn values(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|s| s.to_string()).collect()
}

fn fields(v: Value) -> Map<String, Value> {
    v.as_object().unwrap().clone()
}

#[test]
fn test_two_sequential_submits_share_one_table() {
    let store = Arc::new(MemoryStore::new("wb"));
    let sink = TabularSink::new(store.clone(), StyleTemplate::default());
    let schema = SubmissionSchema::user_export();

    for (email, v1) in [("a@x.io", "first"), ("a@x.io", "second")] {
        sink.submit_record(
            &schema,
            &fields(json!({"username": "alice", "email": email, "value1": v1, "value2": ""})),
        )
        .unwrap();
    }

    assert_eq!(store.table_names(), vec!["alice"]);
    assert_eq!(store.call_count(StoreCall::CreateTable), 1);
    let rows = store.rows("alice").unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[1], values(&["Username", "Email", "Value1", "Value2"]));
    assert_eq!(rows[2], values(&["alice", "a@x.io", "first"]));
    assert_eq!(rows[3], values(&["alice", "a@x.io", "second"]));
}

#[test]
fn test_concurrent_provisioning_creates_one_table_and_one_header() {
    let store = Arc::new(MemoryStore::new("wb").with_latency(Duration::from_millis(2)));
    let schema = Arc::new(feedback_schema());
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let (store, schema, barrier) = (store.clone(), schema.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                provision(
                    store.as_ref(),
                    "alice",
                    &schema,
                    &StyleTemplate::default(),
                    &SheetLayout::default(),
                )
            })
        })
        .collect();

    let locators: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();

    assert_eq!(locators[0], locators[1]);
    assert_eq!(store.table_names(), vec!["alice"]);
    let rows = store.rows("alice").unwrap();
    let headers = rows
        .iter()
        .filter(|r| **r == values(&["Age", "Further comments"]))
        .count();
    assert_eq!(headers, 1);
    assert_eq!(rows.len(), 2);
}

#[test]
fn test_concurrent_submits_never_overlap() {
    const N: usize = 16;
    let store = Arc::new(MemoryStore::new("wb").with_latency(Duration::from_millis(1)));
    let sink = Arc::new(TabularSink::new(store.clone(), StyleTemplate::default()));
    let schema = Arc::new(feedback_schema());
    let barrier = Arc::new(Barrier::new(N));

    let handles: Vec<_> = (0..N)
        .map(|i| {
            let (sink, schema, barrier) = (sink.clone(), schema.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                sink.submit("shared", &schema, values(&[&i.to_string(), "hi"]))
            })
        })
        .collect();

    let records: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();

    for (i, a) in records.iter().enumerate() {
        assert_eq!(a.source, RegionSource::Reported);
        for b in &records[i + 1..] {
            assert!(!a.region.overlaps(&b.region), "{:?} overlaps {:?}", a.region, b.region);
        }
    }

    assert_eq!(store.table_names(), vec!["shared"]);
    let rows = store.rows("shared").unwrap();
    assert_eq!(rows.len(), 2 + N);
    let mut ages: Vec<usize> = rows[2..].iter().map(|r| r[0].parse().unwrap()).collect();
    ages.sort_unstable();
    assert_eq!(ages, (0..N).collect::<Vec<_>>());
}

#[test]
fn test_styling_is_a_pure_function_of_its_inputs() {
    let template = StyleTemplate::default();
    let classes = feedback_schema().column_classes();
    let store = Arc::new(MemoryStore::new("wb"));
    let sink = TabularSink::new(store.clone(), template.clone());
    let schema = feedback_schema();

    let rec = sink.submit("alice", &schema, values(&["34", "great session"])).unwrap();
    let expected = apply_style(&rec.region, &classes, &template, StyleRole::AppendedRow);
    let applied = store.format_ops();
    assert!(applied.ends_with(&expected));
    assert_eq!(
        apply_style(&rec.region, &classes, &template, StyleRole::AppendedRow),
        expected
    );
}

#[test]
fn test_malformed_ack_still_succeeds() {
    for mode in [AckMode::Malformed, AckMode::Missing] {
        let store = Arc::new(MemoryStore::new("wb"));
        store.set_ack_mode(mode);
        let sink = TabularSink::new(store.clone(), StyleTemplate::default());

        let rec = sink.submit("alice", &feedback_schema(), values(&["34", "ok"])).unwrap();
        assert_eq!(rec.source, RegionSource::Fallback);
        assert_eq!(rec.display_row(), 3);
        assert_eq!(store.rows("alice").unwrap()[2], values(&["34", "ok"]));
    }
}

#[test]
fn test_range_label_ack_is_parsed() {
    let store = Arc::new(MemoryStore::new("wb"));
    store.set_ack_mode(AckMode::RangeLabel);
    let sink = TabularSink::new(store.clone(), StyleTemplate::default());
    let schema = feedback_schema();

    sink.submit("o'brien", &schema, values(&["1", "a"])).unwrap();
    let rec = sink.submit("o'brien", &schema, values(&["2", "b"])).unwrap();
    assert_eq!(rec.source, RegionSource::Reported);
    assert_eq!(rec.display_row(), 4);
}

#[test]
fn test_worked_example_alice() {
    let template = StyleTemplate::default();
    let store = Arc::new(MemoryStore::new("wb"));
    let sink = TabularSink::new(store.clone(), template.clone());
    let schema = feedback_schema();

    let first = sink
        .submit("alice", &schema, values(&["34", "great session"]))
        .unwrap();
    assert!(first.provisioned);
    assert_eq!(first.display_row(), 3);
    assert_eq!(first.range_a1(), "'alice'!A3:B3");

    let rows = store.rows("alice").unwrap();
    assert_eq!(rows[1], values(&["Age", "Further comments"]));
    assert_eq!(rows[2], values(&["34", "great session"]));

    // Appended-row styling: Age overflows, comments wrap.
    let row_styles: Vec<_> = store
        .format_ops()
        .into_iter()
        .filter_map(|op| match op {
            FormatOp::CellStyle { region, style } if region == first.region.with_cols(0..1)
                || region == first.region.with_cols(1..2) =>
            {
                Some((region.col_start, style.wrap))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        row_styles,
        vec![
            (0, Some(template.body.compact.wrap)),
            (1, Some(template.body.wrapped.wrap)),
        ]
    );

    let second = sink.submit("alice", &schema, values(&["35", "again"])).unwrap();
    assert!(!second.provisioned);
    assert_eq!(second.display_row(), 4);
    assert_eq!(store.call_count(StoreCall::CreateTable), 1);
}

#[test]
fn test_manual_edits_between_submits_are_tolerated() {
    let store = Arc::new(MemoryStore::new("wb"));
    let sink = TabularSink::new(store.clone(), StyleTemplate::default());
    let schema = feedback_schema();

    sink.submit("alice", &schema, values(&["1", "a"])).unwrap();
    // Someone adds a row by hand further down, then deletes the tab entirely.
    store.set_cell("alice", 9, 0, "manual");
    let rec = sink.submit("alice", &schema, values(&["2", "b"])).unwrap();
    assert_eq!(rec.display_row(), 11);

    store.delete_table("alice");
    let rec = sink.submit("alice", &schema, values(&["3", "c"])).unwrap();
    assert!(rec.provisioned);
    assert_eq!(rec.display_row(), 3);
}
