use std::io::Write;
use std::path::Path;

use brc_lanes::{run, BrcError, PipelineConfig, ReadMode, StoreKind};
use tempfile::NamedTempFile;

fn input(data: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

fn config(path: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::new(path);
    config.lanes = 3;
    config.segment_size = 64;
    config.batch_size = 4;
    config.segment_queue = 2;
    config.batch_queue = 2;
    config
}

/// Every store / read mode / lane count combination, each of which must
/// produce the same bytes.
fn variants(path: &Path) -> Vec<PipelineConfig> {
    let mut out = Vec::new();
    for store in [StoreKind::Hash, StoreKind::Trie] {
        for read_mode in [ReadMode::Mmap, ReadMode::Blocks] {
            for lanes in [1, 2, 5] {
                let mut c = config(path);
                c.store = store;
                c.read_mode = read_mode;
                c.lanes = lanes;
                out.push(c);
            }
        }
    }
    out
}

fn output_of(data: &[u8]) -> Vec<u8> {
    let file = input(data);
    let mut outputs = variants(file.path())
        .into_iter()
        .map(|c| run(&c).unwrap().output);
    let first = outputs.next().unwrap();
    for other in outputs {
        assert_eq!(String::from_utf8_lossy(&other), String::from_utf8_lossy(&first));
    }
    first
}

#[test]
fn two_keys_example() {
    assert_eq!(
        output_of(b"A;5.0\nB;-3.2\nA;7.0\n"),
        b"A=5.0/6.0/7.0\nB=-3.2/-3.2/-3.2\n"
    );
}

#[test]
fn repeated_key_counts_every_line() {
    let data = "Kyiv;1.0\n".repeat(1000);
    let file = input(data.as_bytes());
    for c in variants(file.path()) {
        let report = run(&c).unwrap();
        assert_eq!(report.output, b"Kyiv=1.0/1.0/1.0\n");
        assert_eq!(report.lines, 1000);
        assert_eq!(report.keys, 1);
    }
}

#[test]
fn empty_input_gives_empty_output() {
    let file = input(b"");
    for c in variants(file.path()) {
        let report = run(&c).unwrap();
        assert!(report.output.is_empty());
        assert_eq!(report.lines, 0);
        assert_eq!(report.segments, 0);
    }
}

#[test]
fn last_line_without_newline_is_included() {
    assert_eq!(
        output_of(b"b;1.0\na;2.0\nb;3.0"),
        b"a=2.0/2.0/2.0\nb=1.0/2.0/3.0\n"
    );
}

#[test]
fn output_is_sorted_by_raw_bytes() {
    let data = "Zürich;1.0\nabc;1.0\nab;1.0\nAbc;1.0\nZ;1.0\nÜrümqi;1.0\n";
    let out = output_of(data.as_bytes());
    let keys: Vec<&str> = std::str::from_utf8(&out)
        .unwrap()
        .lines()
        .map(|l| l.split('=').next().unwrap())
        .collect();
    assert_eq!(keys, ["Abc", "Z", "Zürich", "ab", "abc", "Ürümqi"]);
}

#[test]
fn many_keys_agree_with_a_sequential_fold() {
    use std::collections::BTreeMap;

    let mut data = String::new();
    let mut expected: BTreeMap<String, (i64, i64, i64, i64)> = BTreeMap::new();
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    for _ in 0..5000 {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        let key = format!("station-{}", seed % 97);
        let value = (seed >> 20) as i64 % 1999 - 999;
        let sign = if value < 0 { "-" } else { "" };
        data.push_str(&format!("{key};{sign}{}.{}\n", value.abs() / 10, value.abs() % 10));
        let e = expected.entry(key).or_insert((value, value, 0, 0));
        e.0 = e.0.min(value);
        e.1 = e.1.max(value);
        e.2 += value;
        e.3 += 1;
    }

    let mut rendered = Vec::new();
    for (key, (min, max, sum, count)) in &expected {
        let fmt = |v: i64| {
            let sign = if v < 0 { "-" } else { "" };
            format!("{sign}{}.{}", v.abs() / 10, v.abs() % 10)
        };
        rendered.extend_from_slice(
            format!("{key}={}/{}/{}\n", fmt(*min), fmt(sum / count), fmt(*max)).as_bytes(),
        );
    }

    assert_eq!(
        String::from_utf8(output_of(data.as_bytes())).unwrap(),
        String::from_utf8(rendered).unwrap()
    );
}

#[test]
fn extreme_values_sum_without_wrapping() {
    let out = output_of(
        b"a;922337203685477580.7\na;0.1\nb;-922337203685477580.8\nb;-922337203685477580.8\n",
    );
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "a=0.1/461168601842738790.4/922337203685477580.7\n\
         b=-922337203685477580.8/-922337203685477580.8/-922337203685477580.8\n"
    );
}

#[test]
fn partial_run_processes_leading_lines() {
    let file = input(b"a;1.0\nb;2.0\nc;3.0\nd;4.0\n");
    let mut c = config(file.path());
    c.percent = 50;
    let report = run(&c).unwrap();
    // 50% of 24 bytes lands on the boundary after "b;2.0\n".
    assert_eq!(report.output, b"a=1.0/1.0/1.0\nb=2.0/2.0/2.0\n");

    c.percent = 0;
    assert!(run(&c).unwrap().output.is_empty());
}

#[test]
fn malformed_number_fails_the_run() {
    let file = input(b"a;1.0\nb;2,5\nc;3.0\n");
    for c in variants(file.path()) {
        let err = run(&c).unwrap_err();
        assert!(
            matches!(&err, BrcError::MalformedNumber { line, .. } if line == "b;2,5"),
            "{err}"
        );
    }
}

#[test]
fn missing_separator_fails_the_run() {
    let file = input(b"a;1.0\njust text\n");
    let err = run(&config(file.path())).unwrap_err();
    assert!(matches!(err, BrcError::MissingSeparator { .. }), "{err}");
}

#[test]
fn missing_file_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let err = run(&config(&dir.path().join("absent.txt"))).unwrap_err();
    assert!(matches!(err, BrcError::Open { .. }), "{err}");
    assert!(err.to_string().starts_with("reader: cannot open"));
}

#[test]
fn invalid_config_is_rejected_before_reading() {
    let mut c = config(Path::new("does-not-matter"));
    c.lanes = 0;
    assert!(matches!(run(&c), Err(BrcError::Config(_))));
}

#[test]
fn timings_cover_every_lane() {
    let file = input(b"a;1.0\nb;2.0\n");
    let mut c = config(file.path());
    c.lanes = 4;
    let report = run(&c).unwrap();
    let parse = report.timings.summary(brc_lanes::timing::Stage::Parse);
    let aggregate = report.timings.summary(brc_lanes::timing::Stage::Aggregate);
    assert_eq!(parse.workers, 4);
    assert_eq!(aggregate.workers, 4);
    assert_eq!(report.timings.summary(brc_lanes::timing::Stage::Read).workers, 1);
}
