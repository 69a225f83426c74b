//! Minute-of-week bitmask
//!
//! One bit per minute of the week (Monday 00:00 = bit 0, Sunday 23:59 =
//! bit 10079). Set bits mark minutes in which a category is blocked.
//!
//! The bitmask is immutable once shared: clones share the same word storage
//! and any modification copies it first.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::{MINUTES_PER_DAY, Result, WardenError};

/// Number of minutes in a week; also the number of bits in the mask
pub const MINUTES_PER_WEEK: usize = 7 * MINUTES_PER_DAY as usize;

const WORD_BITS: usize = u64::BITS as usize;
const WORDS: usize = MINUTES_PER_WEEK.div_ceil(WORD_BITS);

#[derive(Clone, PartialEq, Eq)]
pub struct MinuteOfWeekBitmask {
    words: Arc<[u64; WORDS]>,
}

impl Default for MinuteOfWeekBitmask {
    fn default() -> Self {
        Self::empty()
    }
}

impl MinuteOfWeekBitmask {
    pub fn empty() -> Self {
        Self {
            words: Arc::new([0; WORDS]),
        }
    }

    /// Build a mask from end-exclusive minute ranges
    pub fn from_ranges(ranges: impl IntoIterator<Item = Range<usize>>) -> Result<Self> {
        let mut mask = Self::empty();
        for range in ranges {
            mask.set_range(range)?;
        }
        Ok(mask)
    }

    /// Return a copy of this mask with the given range set
    pub fn with_range(&self, range: Range<usize>) -> Result<Self> {
        let mut mask = self.clone();
        mask.set_range(range)?;
        Ok(mask)
    }

    fn set_range(&mut self, range: Range<usize>) -> Result<()> {
        if range.start > range.end {
            return Err(WardenError::bitmask(format!(
                "range start {} is after end {}",
                range.start, range.end
            )));
        }
        if range.end > MINUTES_PER_WEEK {
            return Err(WardenError::bitmask(format!(
                "range end {} exceeds {}",
                range.end, MINUTES_PER_WEEK
            )));
        }
        if range.is_empty() {
            return Ok(());
        }

        let words = Arc::make_mut(&mut self.words);
        for bit in range {
            words[bit / WORD_BITS] |= 1 << (bit % WORD_BITS);
        }
        Ok(())
    }

    /// Check whether a minute of the week is blocked. Out of range is never set.
    pub fn test(&self, minute_of_week: usize) -> bool {
        if minute_of_week >= MINUTES_PER_WEEK {
            return false;
        }
        self.words[minute_of_week / WORD_BITS] & (1 << (minute_of_week % WORD_BITS)) != 0
    }

    /// First set bit at or after `from`
    pub fn next_set(&self, from: usize) -> Option<usize> {
        if from >= MINUTES_PER_WEEK {
            return None;
        }

        let mut index = from / WORD_BITS;
        let mut word = self.words[index] & (u64::MAX << (from % WORD_BITS));

        loop {
            if word != 0 {
                let bit = index * WORD_BITS + word.trailing_zeros() as usize;
                return (bit < MINUTES_PER_WEEK).then_some(bit);
            }
            index += 1;
            if index >= WORDS {
                return None;
            }
            word = self.words[index];
        }
    }

    /// First clear bit at or after `from`; `MINUTES_PER_WEEK` if every
    /// remaining bit is set.
    pub fn next_clear(&self, from: usize) -> usize {
        if from >= MINUTES_PER_WEEK {
            return MINUTES_PER_WEEK;
        }

        let mut index = from / WORD_BITS;
        let mut word = !self.words[index] & (u64::MAX << (from % WORD_BITS));

        loop {
            if word != 0 {
                let bit = index * WORD_BITS + word.trailing_zeros() as usize;
                return bit.min(MINUTES_PER_WEEK);
            }
            index += 1;
            if index >= WORDS {
                return MINUTES_PER_WEEK;
            }
            word = !self.words[index];
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Maximal runs of set bits as end-exclusive ranges
    pub fn ranges(&self) -> Vec<Range<usize>> {
        let mut result = Vec::new();
        let mut cursor = 0;

        while let Some(start) = self.next_set(cursor) {
            let end = self.next_clear(start);
            result.push(start..end);
            cursor = end;
        }

        result
    }

    /// Encode as `start,end,start,end,...` with end-exclusive ranges.
    /// The empty mask encodes as an empty string.
    pub fn to_compact_string(&self) -> String {
        self.ranges()
            .iter()
            .map(|r| format!("{},{}", r.start, r.end))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn parse_compact(data: &str) -> Result<Self> {
        let values = data
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<usize>()
                    .map_err(|_| WardenError::bitmask(format!("not a minute index: {:?}", s)))
            })
            .collect::<Result<Vec<_>>>()?;

        if values.len() % 2 != 0 {
            return Err(WardenError::bitmask("odd number of range bounds"));
        }

        Self::from_ranges(values.chunks_exact(2).map(|pair| pair[0]..pair[1]))
    }
}

impl fmt::Debug for MinuteOfWeekBitmask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MinuteOfWeekBitmask")
            .field(&self.to_compact_string())
            .finish()
    }
}

impl Serialize for MinuteOfWeekBitmask {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_compact_string())
    }
}

impl<'de> Deserialize<'de> for MinuteOfWeekBitmask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let data = String::deserialize(deserializer)?;
        Self::parse_compact(&data).map_err(serde::de::Error::custom)
    }
}
