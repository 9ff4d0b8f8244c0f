/// Running statistics for one key, all values scaled by 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub min: i64,
    pub max: i64,
    /// Wider than the values so that any accepted input sums without wrapping.
    pub sum: i128,
    pub count: u64,
}

impl Stats {
    pub fn new(value: i64) -> Self {
        Self {
            min: value,
            max: value,
            sum: i128::from(value),
            count: 1,
        }
    }

    #[inline]
    pub fn update(&mut self, value: i64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += i128::from(value);
        self.count += 1;
    }

    #[inline]
    pub fn merge(&mut self, other: &Stats) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    /// `sum / count`, truncated toward zero like the scaled representation.
    pub fn mean(&self) -> i64 {
        // Lies within min..=max, so it always fits back into i64.
        (self.sum / i128::from(self.count)) as i64
    }
}

/// A key together with its statistics, as handed out by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateEntry {
    pub key: Box<[u8]>,
    pub stats: Stats,
}

impl AggregateEntry {
    pub fn new(key: &[u8], value: i64) -> Self {
        Self {
            key: key.into(),
            stats: Stats::new(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(values: &[i64]) -> Stats {
        let mut s = Stats::new(values[0]);
        for &v in &values[1..] {
            s.update(v);
        }
        s
    }

    fn merged(a: Stats, b: Stats) -> Stats {
        let mut out = a;
        out.merge(&b);
        out
    }

    #[test]
    fn update_tracks_bounds_sum_and_count() {
        let s = stats(&[50, -32, 70, 0]);
        assert_eq!(
            s,
            Stats {
                min: -32,
                max: 70,
                sum: 88,
                count: 4
            }
        );
    }

    #[test]
    fn mean_truncates_toward_zero() {
        assert_eq!(stats(&[50, 70]).mean(), 60);
        assert_eq!(stats(&[1, 2]).mean(), 1);
        assert_eq!(stats(&[-1, -2]).mean(), -1);
        assert_eq!(stats(&[-5, 0]).mean(), -2);
    }

    #[test]
    fn merge_is_commutative_and_associative() {
        let samples = [
            stats(&[10]),
            stats(&[-300, 5, 12]),
            stats(&[999, 998]),
            stats(&[0, 0, 0, -1]),
        ];
        for a in samples {
            for b in samples {
                assert_eq!(merged(a, b), merged(b, a));
                for c in samples {
                    assert_eq!(merged(merged(a, b), c), merged(a, merged(b, c)));
                }
            }
        }
    }

    #[test]
    fn sum_survives_values_near_i64_bounds() {
        let s = stats(&[i64::MAX, i64::MAX, 1]);
        assert_eq!(s.sum, 2 * i128::from(i64::MAX) + 1);
        assert_eq!(s.mean(), i64::MAX / 3 * 2 + 1);
        assert!(s.min <= s.mean() && s.mean() <= s.max);

        let low = stats(&[i64::MIN, i64::MIN]);
        assert_eq!(low.mean(), i64::MIN);

        let mut wide = stats(&[i64::MAX]);
        wide.merge(&stats(&[i64::MAX]));
        assert_eq!(wide.mean(), i64::MAX);
    }

    #[test]
    fn merge_equals_sequential_update() {
        let left = [12, -7, 40];
        let right = [3, 99, -100, 0];
        let all: Vec<i64> = left.iter().chain(&right).copied().collect();
        assert_eq!(merged(stats(&left), stats(&right)), stats(&all));
    }
}
