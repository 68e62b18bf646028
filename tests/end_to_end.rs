//! Full partition -> join pipeline, exercised the way the teacher's own
//! `tests/*.rs` integration tests do: build small fixture inputs under a
//! `tempfile::tempdir()`, drive the public `diskjoin` API end to end, and
//! assert on the resulting frame/output file contents. Covers spec.md
//! section 8's named scenarios (S1-S6) plus its boundary behaviors.

use std::fs;
use std::io::Write;

use diskjoin::{JoinOptions, PartitionOptions};

fn write_csv(path: &std::path::Path, header: &str, rows: &[&str]) {
    let mut f = std::fs::File::create(path).unwrap();
    writeln!(f, "{header}").unwrap();
    for row in rows {
        writeln!(f, "{row}").unwrap();
    }
}

fn partition_csv(dir: &std::path::Path, name: &str, header: &str, rows: &[&str], n: usize, key: &str) -> std::path::PathBuf {
    let source = dir.join(format!("{name}.csv"));
    write_csv(&source, header, rows);
    let dest = dir.join(name);
    let skipped = PartitionOptions::new(source.to_string_lossy(), &dest, n).with_key_name(key).run().unwrap();
    assert_eq!(skipped, 0);
    dest
}

// S2: two-way join, complete match.
#[test]
fn two_way_join_complete_match() {
    let dir = tempfile::tempdir().unwrap();
    let left = partition_csv(dir.path(), "countries", "iso,name", &["AU,Australia", "RU,Russia"], 4, "iso");
    let right = partition_csv(dir.path(), "currencies", "iso,currency", &["AU,Dollar", "RU,Rouble"], 4, "iso");

    let dest = dir.path().join("out.csv");
    JoinOptions::new(dest.to_string_lossy(), vec![left, right])
        .with_format(diskjoin::codec::Format::Csv)
        .run()
        .unwrap();

    let out = fs::read_to_string(&dest).unwrap();
    let mut lines: Vec<&str> = out.lines().collect();
    let header = lines.remove(0);
    assert_eq!(header, "iso,name,currency");
    lines.sort();
    assert_eq!(lines, vec!["AU,Australia,Dollar", "RU,Russia,Rouble"]);
}

// S3: missing right -> left-outer nulls.
#[test]
fn missing_right_pads_with_nulls() {
    let dir = tempfile::tempdir().unwrap();
    let left = partition_csv(
        dir.path(),
        "countries",
        "iso,name",
        &["AU,Australia", "KP,Kraplakistan", "RU,Russia"],
        4,
        "iso",
    );
    let right = partition_csv(dir.path(), "currencies", "iso,currency", &["AU,Dollar", "RU,Rouble"], 4, "iso");

    let dest = dir.path().join("out.csv");
    JoinOptions::new(dest.to_string_lossy(), vec![left, right])
        .with_format(diskjoin::codec::Format::Csv)
        .run()
        .unwrap();

    let out = fs::read_to_string(&dest).unwrap();
    let mut lines: Vec<&str> = out.lines().collect();
    lines.remove(0);
    lines.sort();
    assert_eq!(lines, vec!["AU,Australia,Dollar", "KP,Kraplakistan,", "RU,Russia,Rouble"]);
}

// S5: three-way join.
#[test]
fn three_way_join() {
    let dir = tempfile::tempdir().unwrap();
    let left = partition_csv(dir.path(), "countries", "iso,name", &["AU,Australia", "RU,Russia"], 3, "iso");
    let r1 = partition_csv(dir.path(), "currencies", "iso,currency", &["AU,Dollar", "RU,Rouble"], 3, "iso");
    let r2 = partition_csv(dir.path(), "capitals", "iso,capital", &["AU,Canberra", "RU,Moscow"], 3, "iso");

    let dest = dir.path().join("out.csv");
    JoinOptions::new(dest.to_string_lossy(), vec![left, r1, r2])
        .with_format(diskjoin::codec::Format::Csv)
        .run()
        .unwrap();

    let out = fs::read_to_string(&dest).unwrap();
    let mut lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.remove(0), "iso,name,currency,capital");
    lines.sort();
    assert_eq!(lines, vec!["AU,Australia,Dollar,Canberra", "RU,Russia,Rouble,Moscow"]);
}

// S6: SELECT resolution.
#[test]
fn select_expression_picks_and_renames_fields() {
    let dir = tempfile::tempdir().unwrap();
    let left = partition_csv(dir.path(), "countries", "iso,name", &["AU,Australia", "RU,Russia"], 4, "iso");
    let right = partition_csv(dir.path(), "currencies", "iso,currency", &["AU,Dollar", "RU,Rouble"], 4, "iso");

    let dest = dir.path().join("out.csv");
    JoinOptions::new(dest.to_string_lossy(), vec![left, right])
        .with_format(diskjoin::codec::Format::Csv)
        .with_select("iso, name, 1.iso as iso_r, currency")
        .run()
        .unwrap();

    let out = fs::read_to_string(&dest).unwrap();
    let mut lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.remove(0), "iso,name,iso_r,currency");
    lines.sort();
    assert_eq!(lines, vec!["AU,Australia,AU,Dollar", "RU,Russia,RU,Rouble"]);
}

// Boundary: right shard empty for every shard -> left-outer nulls everywhere.
#[test]
fn empty_right_frame_pads_every_row_with_nulls() {
    let dir = tempfile::tempdir().unwrap();
    let left = partition_csv(dir.path(), "countries", "iso,name", &["AU,Australia", "RU,Russia"], 3, "iso");
    let right = partition_csv(dir.path(), "currencies", "iso,currency", &[], 3, "iso");

    let dest = dir.path().join("out.csv");
    JoinOptions::new(dest.to_string_lossy(), vec![left, right])
        .with_format(diskjoin::codec::Format::Csv)
        .run()
        .unwrap();

    let out = fs::read_to_string(&dest).unwrap();
    let mut lines: Vec<&str> = out.lines().collect();
    lines.remove(0);
    lines.sort();
    assert_eq!(lines, vec!["AU,Australia,", "RU,Russia,"]);
}

// Boundary: empty left frame -> empty output (header only).
#[test]
fn empty_left_frame_produces_header_only_output() {
    let dir = tempfile::tempdir().unwrap();
    let left = partition_csv(dir.path(), "countries", "iso,name", &[], 3, "iso");
    let right = partition_csv(dir.path(), "currencies", "iso,currency", &["AU,Dollar"], 3, "iso");

    let dest = dir.path().join("out.csv");
    JoinOptions::new(dest.to_string_lossy(), vec![left, right])
        .with_format(diskjoin::codec::Format::Csv)
        .run()
        .unwrap();

    let out = fs::read_to_string(&dest).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines, vec!["iso,name,currency"]);
}

// Boundary: mismatched shard counts between frames is a fatal, upfront error.
#[test]
fn shard_count_mismatch_is_fatal_before_any_work() {
    let dir = tempfile::tempdir().unwrap();
    let left = partition_csv(dir.path(), "countries", "iso,name", &["AU,Australia"], 4, "iso");
    let right = partition_csv(dir.path(), "currencies", "iso,currency", &["AU,Dollar"], 5, "iso");

    let dest = dir.path().join("out.csv");
    let err = JoinOptions::new(dest.to_string_lossy(), vec![left, right])
        .with_format(diskjoin::codec::Format::Csv)
        .run()
        .unwrap_err();
    assert!(err.to_string().to_lowercase().contains("shard"));
    assert!(!dest.exists());
}

// Boundary: null join keys on the partitioner side are skipped, not fatal.
#[test]
fn null_key_records_are_skipped_during_partitioning() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("countries.csv");
    write_csv(&source, "iso,name", &["AU,Australia", ",Nowhere", "RU,Russia"]);
    let dest = dir.path().join("countries");
    let skipped = PartitionOptions::new(source.to_string_lossy(), &dest, 4).with_key_name("iso").run().unwrap();
    assert_eq!(skipped, 1);

    let frame = diskjoin::PartitionedFrame::open(&dest).unwrap();
    let total: usize = (0..frame.len())
        .map(|i| frame.shard(i).unwrap().iter().unwrap().count())
        .sum();
    assert_eq!(total, 2);
}

// Round-trip: partitioning then iterating every shard recovers every record
// exactly once, with the schema preserved.
#[test]
fn partition_round_trips_every_record_with_schema_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let dest = partition_csv(
        dir.path(),
        "countries",
        "iso,name",
        &["AU,Australia", "RU,Russia", "JP,Japan", "US,United States", "FR,France"],
        4,
        "iso",
    );
    let frame = diskjoin::PartitionedFrame::open(&dest).unwrap();
    assert_eq!(frame.schema().field_names, vec!["iso".to_string(), "name".to_string()]);

    let mut isos: Vec<String> = Vec::new();
    for i in 0..frame.len() {
        let shard = frame.shard(i).unwrap();
        let records: Vec<_> = shard.iter().unwrap().collect::<anyhow::Result<_>>().unwrap();
        for window in records.windows(2) {
            assert_ne!(window[0][0].key_cmp(&window[1][0]), std::cmp::Ordering::Greater);
        }
        for r in records {
            isos.push(r[0].to_string());
        }
    }
    isos.sort();
    assert_eq!(isos, vec!["AU", "FR", "JP", "RU", "US"]);
}
