//! In-memory index
//!
//! Built once when a channel opens by scanning the index file. Each entry
//! spans the time between two consecutive records, so the entries tile the
//! file's whole time range and a binary search lands on exactly one.

use crate::time::HighTime;

/// One span between consecutive index records.
#[derive(Debug, Clone, Copy)]
pub struct IndexEntry {
    /// Time of this entry's record
    pub start_time: HighTime,
    /// Time of the next record (file end time for the last entry)
    pub end_time: HighTime,
    /// Offset of the record in the index file
    pub my_location: i64,
    /// Offset of the chunk this record points at in the data file
    pub data_location: i64,
}

/// Binary search for the entry whose `[start_time, end_time]` contains
/// `time`. Returns its position, or `None` when the index is empty or the
/// time lies outside the file's range.
pub fn find(entries: &[IndexEntry], time: &HighTime) -> Option<usize> {
    let first = entries.first()?;
    let last = entries.last()?;
    if !time.is_between(&first.start_time, &last.end_time) {
        return None;
    }

    let mut low = 0usize;
    let mut high = entries.len() - 1;
    while low <= high {
        let mid = low + (high - low) / 2;
        let entry = &entries[mid];
        if time.is_between(&entry.start_time, &entry.end_time) {
            return Some(mid);
        }
        if *time < entry.start_time {
            if mid == 0 {
                break;
            }
            high = mid - 1;
        } else {
            low = mid + 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(bounds: &[(i64, i64)]) -> Vec<IndexEntry> {
        bounds
            .iter()
            .enumerate()
            .map(|(i, &(s, e))| IndexEntry {
                start_time: HighTime::new(s, 0.0),
                end_time: HighTime::new(e, 0.0),
                my_location: 1024 + i as i64 * 44,
                data_location: i as i64 * 1000,
            })
            .collect()
    }

    #[test]
    fn test_find_hits_containing_entry() {
        let idx = entries(&[(0, 10), (10, 20), (20, 30), (30, 40)]);
        let hit = find(&idx, &HighTime::new(25, 0.5)).unwrap();
        assert_eq!(hit, 2);
    }

    #[test]
    fn test_find_boundaries_are_inclusive() {
        let idx = entries(&[(0, 10), (10, 20)]);
        assert_eq!(find(&idx, &HighTime::ZERO), Some(0));
        assert_eq!(find(&idx, &HighTime::new(20, 0.0)), Some(1));
    }

    #[test]
    fn test_find_outside_range() {
        let idx = entries(&[(10, 20), (20, 30)]);
        assert!(find(&idx, &HighTime::new(9, 0.999)).is_none());
        assert!(find(&idx, &HighTime::new(30, 0.001)).is_none());
    }

    #[test]
    fn test_find_empty_index() {
        assert!(find(&[], &HighTime::ZERO).is_none());
    }
}
