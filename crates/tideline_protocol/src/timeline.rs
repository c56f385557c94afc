//! Per-conversation message-ID timeline of hole and filled ranges.
//!
//! A [`Timeline`] keeps disjoint, inclusive ranges ("bars") on the message-ID
//! axis of one conversation. Each bar is either a [`BarKind::Hole`] (messages
//! known to be missing locally) or [`BarKind::Filled`] (messages known to be
//! complete). Painting a bar overwrites whatever it overlaps; the last paint
//! wins.
//!
//! After every paint the bars are normalized:
//!
//! - sorted by `min`, pairwise disjoint, `min <= max`;
//! - contiguous from the lowest painted ID (or 0) to [`Timeline::max_index`],
//!   unknown gaps being materialized as holes;
//! - adjacent bars never share the same kind.
//!
//! An empty timeline means "unknown": every point is a hole.
//!
//! ```rust
//! use tideline_protocol::{Bar, Timeline};
//!
//! let mut timeline = Timeline::new();
//! timeline.paint(Bar::hole(0, 100));
//! timeline.paint(Bar::filled(10, 30));
//! assert!(timeline.is_range_filled(12, 30));
//! assert!(timeline.is_point_hole(31));
//! assert_eq!(timeline.to_string(), "[H: 0 - 9][F: 10 - 30][H: 31 - 100]");
//! ```

use crate::codec::{CborDecode, CborEncode};
use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Current timeline blob version.
const TIMELINE_VERSION: u8 = 1;

/// Kind of a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarKind {
    /// Range known to be missing locally.
    Hole,
    /// Range known to be complete locally.
    Filled,
}

impl BarKind {
    fn short(self) -> &'static str {
        match self {
            BarKind::Hole => "H",
            BarKind::Filled => "F",
        }
    }
}

/// An inclusive range of message IDs with a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bar {
    /// Lowest message ID, inclusive.
    pub min: i64,
    /// Highest message ID, inclusive.
    pub max: i64,
    /// Kind of the range.
    pub kind: BarKind,
}

impl Bar {
    /// Creates a bar.
    pub const fn new(min: i64, max: i64, kind: BarKind) -> Self {
        Self { min, max, kind }
    }

    /// Creates a hole bar.
    pub const fn hole(min: i64, max: i64) -> Self {
        Self::new(min, max, BarKind::Hole)
    }

    /// Creates a filled bar.
    pub const fn filled(min: i64, max: i64) -> Self {
        Self::new(min, max, BarKind::Filled)
    }

    /// Returns true if `min > max`.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Returns true if `point` lies within the bar.
    pub fn contains(&self, point: i64) -> bool {
        self.min <= point && point <= self.max
    }
}

impl fmt::Display for Bar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}: {} - {}]", self.kind.short(), self.min, self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    max: i64,
    kind: BarKind,
}

/// Persisted form of a timeline.
#[derive(Serialize, Deserialize)]
struct TimelineBlob {
    version: u8,
    bars: Vec<Bar>,
}

/// Ordered set of disjoint bars for one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    // min -> span
    spans: BTreeMap<i64, Span>,
}

impl Timeline {
    /// Creates an empty ("unknown") timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a timeline by painting `bars` in order.
    pub fn from_paints(bars: impl IntoIterator<Item = Bar>) -> Self {
        let mut timeline = Self::new();
        for bar in bars {
            timeline.paint(bar);
        }
        timeline
    }

    /// Returns true if nothing was painted yet.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Removes every bar.
    pub fn clear(&mut self) {
        self.spans.clear();
    }

    /// Highest painted message ID.
    pub fn max_index(&self) -> Option<i64> {
        self.spans.values().next_back().map(|span| span.max)
    }

    /// Returns the normalized bars in ascending order.
    pub fn bars(&self) -> Vec<Bar> {
        self.spans
            .iter()
            .map(|(&min, span)| Bar::new(min, span.max, span.kind))
            .collect()
    }

    /// Overwrites `[bar.min, bar.max]` with `bar.kind`.
    ///
    /// A bar with `min > max` is ignored.
    pub fn paint(&mut self, bar: Bar) {
        if bar.is_empty() {
            return;
        }

        let overlapping: Vec<(i64, Span)> = self
            .spans
            .range(..=bar.max)
            .rev()
            .take_while(|(_, span)| span.max >= bar.min)
            .map(|(&min, &span)| (min, span))
            .collect();

        for (min, span) in overlapping {
            self.spans.remove(&min);
            if min < bar.min {
                self.spans.insert(
                    min,
                    Span {
                        max: bar.min - 1,
                        kind: span.kind,
                    },
                );
            }
            if span.max > bar.max {
                self.spans.insert(
                    bar.max + 1,
                    Span {
                        max: span.max,
                        kind: span.kind,
                    },
                );
            }
        }

        self.spans.insert(
            bar.min,
            Span {
                max: bar.max,
                kind: bar.kind,
            },
        );

        self.fill_gaps();
        self.coalesce();
    }

    /// Paints `[min, max]` as a hole.
    pub fn mark_hole(&mut self, min: i64, max: i64) {
        self.paint(Bar::hole(min, max));
    }

    /// Paints `[min, max]` as filled.
    pub fn mark_filled(&mut self, min: i64, max: i64) {
        self.paint(Bar::filled(min, max));
    }

    /// Returns true iff `[min, max]` lies entirely within one filled bar.
    pub fn is_range_filled(&self, min: i64, max: i64) -> bool {
        if min > max {
            return false;
        }
        match self.containing(min) {
            Some(bar) => bar.kind == BarKind::Filled && max <= bar.max,
            None => false,
        }
    }

    /// Returns true unless `point` falls in a filled bar.
    pub fn is_point_hole(&self, point: i64) -> bool {
        !matches!(self.containing(point), Some(bar) if bar.kind == BarKind::Filled)
    }

    /// Returns the filled range from `point` up to the end of its filled bar.
    pub fn upper_filled(&self, point: i64) -> Option<Bar> {
        self.containing(point)
            .filter(|bar| bar.kind == BarKind::Filled)
            .map(|bar| Bar::filled(point, bar.max))
    }

    /// Returns the filled range from the start of its filled bar up to `point`.
    pub fn lower_filled(&self, point: i64) -> Option<Bar> {
        self.containing(point)
            .filter(|bar| bar.kind == BarKind::Filled)
            .map(|bar| Bar::filled(bar.min, point))
    }

    /// Paints `[max_index + 1, point]` filled when `point` lies past the
    /// known domain. Returns false, leaving the timeline untouched, otherwise.
    pub fn set_upper_filled(&mut self, point: i64) -> bool {
        let end = self.max_index().unwrap_or(0);
        if point <= end {
            return false;
        }
        self.paint(Bar::filled(end + 1, point));
        true
    }

    /// Extends the lowest filled bar down to 0.
    ///
    /// Used once the first message of a conversation has been reached.
    pub fn set_lower_filled(&mut self) {
        let first_filled = self
            .spans
            .iter()
            .find(|(_, span)| span.kind == BarKind::Filled)
            .map(|(&min, _)| min);
        if let Some(min) = first_filled {
            if min > 0 {
                self.paint(Bar::filled(0, min));
            }
        }
    }

    /// Encodes the timeline to an opaque blob.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        TimelineBlob {
            version: TIMELINE_VERSION,
            bars: self.bars(),
        }
        .encode_cbor()
    }

    /// Decodes a blob produced by [`Timeline::encode`].
    ///
    /// Fails with [`ProtocolError::CorruptTimeline`] when the bars are not
    /// sorted, overlap, or have `min > max`.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let blob = TimelineBlob::decode_cbor(bytes)
            .map_err(|e| ProtocolError::corrupt_timeline(e.to_string()))?;
        if blob.version != TIMELINE_VERSION {
            return Err(ProtocolError::corrupt_timeline(format!(
                "unsupported version {}",
                blob.version
            )));
        }

        let mut spans = BTreeMap::new();
        let mut previous: Option<Bar> = None;
        for bar in blob.bars {
            if bar.is_empty() {
                return Err(ProtocolError::corrupt_timeline(format!(
                    "inverted bar {bar}"
                )));
            }
            if let Some(prev) = previous {
                if bar.min <= prev.max {
                    return Err(ProtocolError::corrupt_timeline(format!(
                        "{bar} overlaps or precedes {prev}"
                    )));
                }
            }
            spans.insert(
                bar.min,
                Span {
                    max: bar.max,
                    kind: bar.kind,
                },
            );
            previous = Some(bar);
        }

        let mut timeline = Self { spans };
        timeline.fill_gaps();
        timeline.coalesce();
        Ok(timeline)
    }

    fn containing(&self, point: i64) -> Option<Bar> {
        self.spans
            .range(..=point)
            .next_back()
            .filter(|(_, span)| span.max >= point)
            .map(|(&min, span)| Bar::new(min, span.max, span.kind))
    }

    /// Materializes unknown ranges between bars, and below the first bar down
    /// to 0, as holes.
    fn fill_gaps(&mut self) {
        let mut gaps = Vec::new();
        let mut cursor: Option<i64> = None;
        for (&min, span) in &self.spans {
            match cursor {
                None if min > 0 => gaps.push((0, min - 1)),
                Some(end) if end + 1 < min => gaps.push((end + 1, min - 1)),
                _ => {}
            }
            cursor = Some(span.max);
        }
        for (min, max) in gaps {
            self.spans.insert(
                min,
                Span {
                    max,
                    kind: BarKind::Hole,
                },
            );
        }
    }

    /// Merges touching bars of the same kind.
    fn coalesce(&mut self) {
        let mut merged: BTreeMap<i64, Span> = BTreeMap::new();
        let mut current: Option<(i64, Span)> = None;
        for (&min, &span) in &self.spans {
            current = match current {
                Some((start, open)) if open.kind == span.kind && open.max + 1 == min => Some((
                    start,
                    Span {
                        max: span.max,
                        kind: span.kind,
                    },
                )),
                Some((start, open)) => {
                    merged.insert(start, open);
                    Some((min, span))
                }
                None => Some((min, span)),
            };
        }
        if let Some((start, open)) = current {
            merged.insert(start, open);
        }
        self.spans = merged;
    }
}

impl fmt::Display for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bar in self.bars() {
            write!(f, "{bar}")?;
        }
        Ok(())
    }
}
