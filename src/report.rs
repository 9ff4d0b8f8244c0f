use rayon::prelude::*;

use crate::fixed_point::format_into;
use crate::stats::AggregateEntry;

/// Orders entries by raw key bytes. Keys are unique, so stability is moot.
pub fn sort_entries(entries: &mut [AggregateEntry]) {
    entries.par_sort_unstable_by(|a, b| a.key.cmp(&b.key));
}

/// Renders `key=min/mean/max\n` for every entry into one buffer.
pub fn render(entries: &[AggregateEntry]) -> Vec<u8> {
    // Key plus three short numbers and separators covers almost every line.
    let estimate: usize = entries.iter().map(|e| e.key.len() + 24).sum();
    let mut out = Vec::with_capacity(estimate);
    for entry in entries {
        write_line(entry, &mut out);
    }
    out
}

pub fn write_line(entry: &AggregateEntry, out: &mut Vec<u8>) {
    let stats = &entry.stats;
    out.extend_from_slice(&entry.key);
    out.push(b'=');
    format_into(stats.min, out);
    out.push(b'/');
    format_into(stats.mean(), out);
    out.push(b'/');
    format_into(stats.max, out);
    out.push(b'\n');
}

/// First line where a rendered report departs from an expected one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// 1-based line number.
    pub line: usize,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

pub fn first_mismatch(actual: &[u8], expected: &[u8]) -> Option<Mismatch> {
    let mut actual_lines = actual.split(|&b| b == b'\n');
    let mut expected_lines = expected.split(|&b| b == b'\n');
    let mut line = 0;
    loop {
        line += 1;
        match (actual_lines.next(), expected_lines.next()) {
            (None, None) => return None,
            (a, e) if a == e => continue,
            (a, e) => {
                let text = |l: Option<&[u8]>| l.map(|l| String::from_utf8_lossy(l).into_owned());
                return Some(Mismatch {
                    line,
                    expected: text(e),
                    actual: text(a),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Stats;

    fn entry(key: &str, values: &[i64]) -> AggregateEntry {
        let mut e = AggregateEntry::new(key.as_bytes(), values[0]);
        for &v in &values[1..] {
            e.stats.update(v);
        }
        e
    }

    #[test]
    fn renders_min_mean_max_lines() {
        let entries = [entry("A", &[50, 70]), entry("B", &[-32])];
        assert_eq!(render(&entries), b"A=5.0/6.0/7.0\nB=-3.2/-3.2/-3.2\n");
    }

    #[test]
    fn mean_truncates_toward_zero() {
        let e = AggregateEntry {
            key: b"k"[..].into(),
            stats: Stats {
                min: -10,
                max: 0,
                sum: -15,
                count: 2,
            },
        };
        assert_eq!(render(&[e]), b"k=-1.0/-0.7/0.0\n");
    }

    #[test]
    fn sorts_by_raw_bytes_with_prefixes_first() {
        let mut entries = vec![
            entry("b", &[1]),
            entry("ab", &[1]),
            entry("a", &[1]),
            entry("B", &[1]),
            entry("Ürümqi", &[1]),
            entry("abc", &[1]),
        ];
        sort_entries(&mut entries);
        let keys: Vec<&[u8]> = entries.iter().map(|e| &*e.key).collect();
        assert_eq!(
            keys,
            [
                &b"B"[..],
                &b"a"[..],
                &b"ab"[..],
                &b"abc"[..],
                &b"b"[..],
                "Ürümqi".as_bytes()
            ]
        );
        for pair in entries.windows(2) {
            assert!(pair[0].key < pair[1].key);
        }
    }

    #[test]
    fn empty_report_is_empty() {
        assert!(render(&[]).is_empty());
    }

    #[test]
    fn mismatch_reports_first_differing_line() {
        let expected = b"a=1.0/1.0/1.0\nb=2.0/2.0/2.0\n";
        assert_eq!(first_mismatch(expected, expected), None);

        let actual = b"a=1.0/1.0/1.0\nb=2.0/2.5/3.0\n";
        let mismatch = first_mismatch(actual, expected).unwrap();
        assert_eq!(mismatch.line, 2);
        assert_eq!(mismatch.actual.as_deref(), Some("b=2.0/2.5/3.0"));
        assert_eq!(mismatch.expected.as_deref(), Some("b=2.0/2.0/2.0"));

        let short = b"a=1.0/1.0/1.0";
        let mismatch = first_mismatch(short, expected).unwrap();
        assert_eq!(mismatch.line, 2);
        assert_eq!(mismatch.actual, None);
    }
}
