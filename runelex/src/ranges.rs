use std::cmp::Ordering;
use std::fmt::{self, Display};

use itertools::Itertools;
use runelex_automaton::Merge;

/// A 32-bit Unicode scalar value. Surrogates are not excluded; the universe
/// is the closed interval `[0, RUNE_MAX]`.
pub type Rune = u32;

pub const RUNE_MAX: Rune = 0x10FFFF;

/// An inclusive interval of runes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RuneRange {
    pub lo: Rune,
    pub hi: Rune,
}

impl RuneRange {
    pub fn new(lo: Rune, hi: Rune) -> Self {
        RuneRange { lo, hi }
    }

    pub fn contains(&self, rune: Rune) -> bool {
        self.lo <= rune && rune <= self.hi
    }
}

/// A set of runes kept as a sorted, disjoint, non-adjacent list of inclusive
/// ranges. `push` may temporarily break the invariant; `normalize` restores
/// it and is idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RangeSet {
    ranges: Vec<RuneRange>,
}

impl RangeSet {
    pub fn new() -> Self {
        RangeSet { ranges: Vec::new() }
    }

    /// The full universe `[0, RUNE_MAX]`.
    pub fn full() -> Self {
        Self::of(0, RUNE_MAX)
    }

    pub fn of(lo: Rune, hi: Rune) -> Self {
        let mut set = Self::new();
        set.push(lo, hi);
        set
    }

    pub fn single(rune: Rune) -> Self {
        Self::of(rune, rune)
    }

    pub fn push(&mut self, lo: Rune, hi: Rune) {
        self.ranges.push(RuneRange::new(lo, hi));
    }

    pub fn union(&mut self, other: &RangeSet) {
        self.ranges.extend_from_slice(&other.ranges);
        self.normalize();
    }

    /// Sorts on `lo` and merges neighbours that overlap or touch
    /// (`hi + 1 == lo`).
    pub fn normalize(&mut self) {
        self.ranges.sort_unstable();
        self.ranges = std::mem::take(&mut self.ranges)
            .into_iter()
            .coalesce(|left, right| {
                if right.lo <= left.hi.saturating_add(1) {
                    Ok(RuneRange::new(left.lo, left.hi.max(right.hi)))
                } else {
                    Err((left, right))
                }
            })
            .collect();
    }

    /// Complement within `[0, RUNE_MAX]`.
    pub fn complement(&self) -> RangeSet {
        let mut normalized = self.clone();
        normalized.normalize();
        let mut out = RangeSet::new();
        let mut next: Rune = 0;
        for range in &normalized.ranges {
            if range.lo > next {
                out.push(next, range.lo - 1);
            }
            next = match range.hi.checked_add(1) {
                Some(value) => value,
                None => return out,
            };
            if next > RUNE_MAX {
                return out;
            }
        }
        if next <= RUNE_MAX {
            out.push(next, RUNE_MAX);
        }
        out
    }

    /// Membership test. Requires a normalized set.
    pub fn contains(&self, rune: Rune) -> bool {
        self.ranges
            .binary_search_by(|range| {
                if range.hi < rune {
                    Ordering::Less
                } else if range.lo > rune {
                    Ordering::Greater
                } else {
                    Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn ranges(&self) -> &[RuneRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl Merge for RangeSet {
    fn merge(&mut self, other: &Self) {
        self.union(other);
    }
}

impl Display for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            if range.lo == range.hi {
                write!(f, "{:#x}", range.lo)?;
            } else {
                write!(f, "{:#x}-{:#x}", range.lo, range.hi)?;
            }
        }
        write!(f, "]")
    }
}
