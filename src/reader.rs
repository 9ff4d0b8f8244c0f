//! Input access and newline-aligned segmentation.
//!
//! A segment always ends right after a `\n`, except the last one when the
//! file has no trailing newline. Segments tile the processed range exactly:
//! no gaps, no overlaps, no line split across two segments.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use crossbeam_channel::Sender;
use memchr::{memchr, memrchr};
use memmap2::Mmap;
use tracing::{debug, warn};

use crate::config::ReadMode;
use crate::error::{BrcError, Result};
use crate::timing::StageClock;

/// A run of whole lines, borrowed from the mapping or owned by a block read.
#[derive(Debug, Clone)]
pub enum Segment<'a> {
    Mapped(&'a [u8]),
    Owned(Arc<[u8]>),
}

impl Deref for Segment<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Segment::Mapped(bytes) => bytes,
            Segment::Owned(bytes) => bytes,
        }
    }
}

/// Read-only handle on the input file. It owns the mapping, so every
/// `Segment::Mapped` borrowed from it is valid for as long as it lives.
pub enum InputSource {
    Empty,
    Mapped(Mmap),
    Streamed { file: File, len: u64 },
}

impl InputSource {
    pub fn open(path: &Path, mode: ReadMode) -> Result<Self> {
        let open_err = |source| BrcError::Open {
            path: path.to_owned(),
            source,
        };
        let file = File::open(path).map_err(open_err)?;
        let len = file.metadata().map_err(open_err)?.len();
        if len == 0 {
            return Ok(InputSource::Empty);
        }

        match mode {
            ReadMode::Blocks => Ok(InputSource::Streamed { file, len }),
            ReadMode::Mmap => map(&file).map(InputSource::Mapped).map_err(|source| BrcError::Map {
                path: path.to_owned(),
                source,
            }),
            ReadMode::Auto => match map(&file) {
                Ok(mmap) => Ok(InputSource::Mapped(mmap)),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "mmap failed, using block reads");
                    Ok(InputSource::Streamed { file, len })
                }
            },
        }
    }

    pub fn len(&self) -> u64 {
        match self {
            InputSource::Empty => 0,
            InputSource::Mapped(mmap) => mmap.len() as u64,
            InputSource::Streamed { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, InputSource::Mapped(_))
    }

    /// Lazily splits the first `percent`% of the input into segments of
    /// roughly `segment_size` bytes. The line straddling the cut-off is kept.
    pub fn segments(&self, segment_size: usize, percent: u8) -> Segments<'_> {
        let limit = cut_off(self.len(), percent);
        match self {
            InputSource::Empty => Segments::Done,
            InputSource::Mapped(mmap) => Segments::Mapped(SegmentSplitter::new(
                &mmap[..],
                segment_size,
                limit as usize,
            )),
            InputSource::Streamed { file, .. } => {
                Segments::Blocks(BlockSplitter::new(file, segment_size, limit))
            }
        }
    }
}

fn map(file: &File) -> io::Result<Mmap> {
    // SAFETY: the mapping is read-only and the input is assumed not to be
    // modified or truncated while the run is in progress.
    let mmap = unsafe { Mmap::map(file)? };
    advise_sequential(&mmap);
    Ok(mmap)
}

#[cfg(unix)]
fn advise_sequential(mmap: &Mmap) {
    if let Err(err) = mmap.advise(memmap2::Advice::Sequential) {
        debug!(error = %err, "madvise(sequential) rejected");
    }
}

#[cfg(not(unix))]
fn advise_sequential(_mmap: &Mmap) {}

fn cut_off(len: u64, percent: u8) -> u64 {
    if percent >= 100 {
        len
    } else {
        (len as u128 * percent as u128 / 100) as u64
    }
}

pub enum Segments<'a> {
    Done,
    Mapped(SegmentSplitter<'a>),
    Blocks(BlockSplitter<'a>),
}

impl<'a> Iterator for Segments<'a> {
    type Item = Result<Segment<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Segments::Done => None,
            Segments::Mapped(splitter) => splitter.next().map(|bytes| Ok(Segment::Mapped(bytes))),
            Segments::Blocks(splitter) => splitter.next(),
        }
    }
}

/// Zero-copy splitting over an in-memory buffer.
pub struct SegmentSplitter<'a> {
    data: &'a [u8],
    pos: usize,
    limit: usize,
    segment_size: usize,
}

impl<'a> SegmentSplitter<'a> {
    pub fn new(data: &'a [u8], segment_size: usize, limit: usize) -> Self {
        Self {
            data,
            pos: 0,
            limit: limit.min(data.len()),
            segment_size: segment_size.max(1),
        }
    }
}

impl<'a> Iterator for SegmentSplitter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.pos >= self.limit {
            return None;
        }
        let data = self.data;
        let end = self.limit.min(self.pos.saturating_add(self.segment_size));
        let cut = if end == data.len() {
            end
        } else {
            match memrchr(b'\n', &data[self.pos..end]) {
                Some(i) => self.pos + i + 1,
                // A single line longer than the block: extend to its end.
                None => memchr(b'\n', &data[end..]).map_or(data.len(), |i| end + i + 1),
            }
        };
        let segment = &data[self.pos..cut];
        self.pos = cut;
        Some(segment)
    }
}

/// Fallback splitting over fixed-size block reads. The unterminated tail of
/// each block is carried over as the head of the next one. Reads are
/// positioned explicitly, so several splitters may walk the same file.
pub struct BlockSplitter<'a> {
    file: &'a File,
    pending: Vec<u8>,
    /// File offset of `pending[0]`.
    offset: u64,
    limit: u64,
    block_size: usize,
    eof: bool,
    done: bool,
}

impl<'a> BlockSplitter<'a> {
    pub fn new(file: &'a File, block_size: usize, limit: u64) -> Self {
        let block_size = block_size.max(1);
        Self {
            file,
            pending: Vec::with_capacity(block_size),
            offset: 0,
            limit,
            block_size,
            eof: false,
            done: false,
        }
    }

    fn fill(&mut self, target: usize) -> Result<()> {
        while self.pending.len() < target && !self.eof {
            let start = self.pending.len();
            self.pending.resize(target, 0);
            let position = self.offset + start as u64;
            let mut file = self.file;
            let read = file.seek(SeekFrom::Start(position)).and_then(|_| loop {
                match file.read(&mut self.pending[start..]) {
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    other => break other,
                }
            });
            match read {
                Ok(0) => {
                    self.pending.truncate(start);
                    self.eof = true;
                }
                Ok(n) => self.pending.truncate(start + n),
                Err(source) => {
                    self.pending.truncate(start);
                    return Err(BrcError::Read {
                        offset: position,
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    fn next_cut(&mut self) -> Result<usize> {
        let mut target = self.block_size;
        loop {
            self.fill(target)?;
            if let Some(i) = memrchr(b'\n', &self.pending) {
                return Ok(i + 1);
            }
            if self.eof {
                return Ok(self.pending.len());
            }
            target = target.saturating_add(self.block_size);
        }
    }

    fn next_segment(&mut self) -> Result<Option<Segment<'a>>> {
        if self.done || self.offset >= self.limit {
            self.done = true;
            return Ok(None);
        }
        let mut cut = self.next_cut()?;
        if cut == 0 {
            self.done = true;
            return Ok(None);
        }

        if self.offset + cut as u64 > self.limit {
            // Keep the line that contains the last byte before the limit.
            let last = (self.limit - self.offset) as usize - 1;
            if let Some(i) = memchr(b'\n', &self.pending[last..cut]) {
                cut = last + i + 1;
            }
            self.done = true;
        }

        let segment: Arc<[u8]> = self.pending[..cut].into();
        self.pending.drain(..cut);
        self.offset += cut as u64;
        Ok(Some(Segment::Owned(segment)))
    }
}

impl<'a> Iterator for BlockSplitter<'a> {
    type Item = Result<Segment<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_segment() {
            Ok(segment) => segment.map(Ok),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadCounts {
    pub segments: u64,
    pub bytes: u64,
}

/// Deals segments round-robin onto the lane queues, blocking while a queue
/// is full. Dropping `lanes` on return closes every queue.
pub fn distribute<'a>(
    segments: impl Iterator<Item = Result<Segment<'a>>>,
    lanes: Vec<Sender<Segment<'a>>>,
    mut clock: StageClock,
) -> Result<ReadCounts> {
    let mut counts = ReadCounts::default();
    if lanes.is_empty() {
        return Ok(counts);
    }
    for (i, segment) in segments.enumerate() {
        let segment = segment?;
        let lane = i % lanes.len();
        counts.segments += 1;
        counts.bytes += segment.len() as u64;
        if clock.blocked(|| lanes[lane].send(segment)).is_err() {
            debug!(lane, "lane stopped accepting segments, reader exits early");
            break;
        }
    }
    Ok(counts)
}
