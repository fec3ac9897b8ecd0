//! Coalesced list of drawable index ranges

use std::ops::Range;

use crate::core::error::MeshError;

/// Ordered, non-overlapping `[begin, end)` index ranges that are ready to
/// draw. One draw call is issued per range, so adjacent insertions are
/// merged into the previous range instead of appended.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DisplayList {
    ranges: Vec<Range<u32>>,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `[begin, end)`.
    ///
    /// Ranges must arrive in non-decreasing `begin` order. A range that
    /// starts at or before the end of the last range extends it.
    pub fn insert_range(&mut self, begin: u32, end: u32) -> Result<(), MeshError> {
        if begin > end {
            return Err(MeshError::Order(format!("range [{}, {}) is reversed", begin, end)));
        }
        if begin == end {
            return Ok(());
        }

        match self.ranges.last_mut() {
            Some(last) if begin < last.start => Err(MeshError::Order(format!(
                "range [{}, {}) starts before [{}, {})",
                begin, end, last.start, last.end
            ))),
            Some(last) if begin <= last.end => {
                last.end = last.end.max(end);
                Ok(())
            }
            _ => {
                self.ranges.push(begin..end);
                Ok(())
            }
        }
    }

    pub fn ranges(&self) -> &[Range<u32>] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Total number of indices covered
    pub fn index_count(&self) -> u32 {
        self.ranges.iter().map(|r| r.end - r.start).sum()
    }

    /// End of the last range, i.e. the first index not yet drawable
    pub fn end(&self) -> u32 {
        self.ranges.last().map_or(0, |r| r.end)
    }
}
