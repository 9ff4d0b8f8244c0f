use std::mem;

use crossbeam_channel::{Receiver, Sender};
use memchr::memchr;

use crate::error::{BrcError, Result};
use crate::fixed_point;
use crate::reader::Segment;
use crate::timing::StageClock;

/// Key hash shared by every lane. Seeds are fixed so a hash computed by one
/// parser is meaningful to any table in the run.
#[derive(Clone)]
pub struct KeyHasher(ahash::RandomState);

impl Default for KeyHasher {
    fn default() -> Self {
        Self(ahash::RandomState::with_seeds(
            0x243f_6a88_85a3_08d3,
            0x1319_8a2e_0370_7344,
            0xa409_3822_299f_31d0,
            0x082e_fa98_ec4e_6c89,
        ))
    }
}

impl KeyHasher {
    #[inline]
    pub fn hash(&self, key: &[u8]) -> u64 {
        self.0.hash_one(key)
    }
}

/// One parsed line. The key is a span of the batch's segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub hash: u64,
    pub key_start: usize,
    pub key_len: usize,
    pub value: i64,
}

/// Measurements parsed from a single segment. Holding the segment keeps
/// every key span alive while the batch travels to the aggregator.
#[derive(Debug)]
pub struct Batch<'a> {
    segment: Segment<'a>,
    rows: Vec<Measurement>,
}

impl<'a> Batch<'a> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &[u8], i64)> + '_ {
        let bytes: &[u8] = &self.segment;
        self.rows.iter().map(move |row| {
            (
                row.hash,
                &bytes[row.key_start..row.key_start + row.key_len],
                row.value,
            )
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseCounts {
    pub lines: u64,
    pub batches: u64,
}

pub struct LineParser {
    lane: usize,
    hasher: KeyHasher,
    batch_size: usize,
    counts: ParseCounts,
}

impl LineParser {
    pub fn new(lane: usize, hasher: KeyHasher, batch_size: usize) -> Self {
        Self {
            lane,
            hasher,
            batch_size: batch_size.max(1),
            counts: ParseCounts::default(),
        }
    }

    pub fn counts(&self) -> ParseCounts {
        self.counts
    }

    /// Parses every line of `segment`, handing full batches to `emit` and
    /// flushing the remainder at the end. Returns `false` once `emit`
    /// reports that downstream is gone.
    pub fn parse_segment<'a>(
        &mut self,
        segment: Segment<'a>,
        mut emit: impl FnMut(Batch<'a>) -> bool,
    ) -> Result<bool> {
        let bytes: &[u8] = &segment;
        let mut rows = Vec::with_capacity(self.batch_size.min(bytes.len() / 4 + 1));
        let mut pos = 0;

        while pos < bytes.len() {
            let end = memchr(b'\n', &bytes[pos..]).map_or(bytes.len(), |i| pos + i);
            let line = &bytes[pos..end];
            let line_start = pos;
            pos = end + 1;
            if line.is_empty() {
                continue;
            }

            let Some(sep) = memchr(b';', line) else {
                return Err(BrcError::MissingSeparator {
                    lane: self.lane,
                    line: String::from_utf8_lossy(line).into_owned(),
                });
            };
            let value = fixed_point::parse(&line[sep + 1..]).map_err(|source| {
                BrcError::MalformedNumber {
                    lane: self.lane,
                    line: String::from_utf8_lossy(line).into_owned(),
                    source,
                }
            })?;
            rows.push(Measurement {
                hash: self.hasher.hash(&line[..sep]),
                key_start: line_start,
                key_len: sep,
                value,
            });
            self.counts.lines += 1;

            if rows.len() == self.batch_size {
                let full = mem::replace(&mut rows, Vec::with_capacity(self.batch_size));
                self.counts.batches += 1;
                let batch = Batch {
                    segment: segment.clone(),
                    rows: full,
                };
                if !emit(batch) {
                    return Ok(false);
                }
            }
        }

        if rows.is_empty() {
            return Ok(true);
        }
        self.counts.batches += 1;
        Ok(emit(Batch { segment, rows }))
    }

    /// Lane loop: drains the segment queue until the reader closes it.
    pub fn run<'a>(
        &mut self,
        segments: Receiver<Segment<'a>>,
        batches: Sender<Batch<'a>>,
        clock: &mut StageClock,
    ) -> Result<ParseCounts> {
        while let Ok(segment) = clock.blocked(|| segments.recv()) {
            let open = self.parse_segment(segment, |batch| {
                clock.blocked(|| batches.send(batch)).is_ok()
            })?;
            if !open {
                break;
            }
        }
        Ok(self.counts)
    }
}
