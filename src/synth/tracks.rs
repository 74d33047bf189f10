/// Non-owning reference to a partial: `(source slot, partial index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackRef {
    pub source: usize,
    pub partial: usize,
}

/// Fixed-capacity table of the partials currently being synthesized.
///
/// Closing a track leaves a gap; [`compact`](TrackTable::compact) closes the
/// gaps once per block while preserving order. A secondary list holds the
/// audible tracks sorted by decreasing amplitude; the primary table is never
/// reordered, so the back-links held by partials stay meaningful.
#[derive(Debug)]
pub struct TrackTable {
    slots: Vec<Option<TrackRef>>,
    audible: Vec<(TrackRef, f64)>,
    capacity: usize,
}

impl TrackTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            audible: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Occupied slots, gaps included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Appends a track and returns its slot, or `None` when full.
    pub fn push(&mut self, track: TrackRef) -> Option<usize> {
        if self.slots.len() >= self.capacity {
            return None;
        }
        self.slots.push(Some(track));
        Some(self.slots.len() - 1)
    }

    /// Leaves a gap at `slot`.
    pub fn close(&mut self, slot: usize) {
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = None;
        }
    }

    #[cfg(test)]
    pub(crate) fn get(&self, slot: usize) -> Option<TrackRef> {
        self.slots.get(slot).copied().flatten()
    }

    /// Removes the gaps, preserving order, and reports each surviving
    /// track's new slot through `relink`. Returns the number of gaps closed.
    pub fn compact<F>(&mut self, mut relink: F) -> usize
    where
        F: FnMut(TrackRef, usize),
    {
        let mut write = 0;
        for read in 0..self.slots.len() {
            if let Some(track) = self.slots[read] {
                self.slots[write] = Some(track);
                relink(track, write);
                write += 1;
            }
        }
        let closed = self.slots.len() - write;
        self.slots.truncate(write);
        closed
    }

    /// Rebuilds the audible list from the tracks whose amplitude is positive,
    /// loudest first.
    pub fn collect_audible<F>(&mut self, amplitude: F)
    where
        F: Fn(TrackRef) -> f64,
    {
        self.audible.clear();
        for track in self.slots.iter().flatten() {
            let a = amplitude(*track);
            if a > 0.0 {
                self.audible.push((*track, a));
            }
        }
        self.audible.sort_unstable_by(|x, y| y.1.total_cmp(&x.1));
    }

    /// Audible tracks by decreasing amplitude.
    pub fn audible(&self) -> &[(TrackRef, f64)] {
        &self.audible
    }

    /// Tracks in table order, skipping gaps.
    pub fn iter(&self) -> impl Iterator<Item = TrackRef> + '_ {
        self.slots.iter().flatten().copied()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.audible.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(partial: usize) -> TrackRef {
        TrackRef { source: 0, partial }
    }

    #[test]
    fn test_push_until_full() {
        let mut table = TrackTable::new(2);
        assert_eq!(table.push(track(0)), Some(0));
        assert_eq!(table.push(track(1)), Some(1));
        assert_eq!(table.push(track(2)), None);
        // Gaps still count until compaction.
        table.close(0);
        assert_eq!(table.push(track(2)), None);
        table.compact(|_, _| {});
        assert_eq!(table.push(track(2)), Some(1));
    }

    #[test]
    fn test_compact_preserves_order_and_relinks() {
        let mut table = TrackTable::new(8);
        for p in 0..6 {
            table.push(track(p));
        }
        table.close(1);
        table.close(4);

        let mut links = Vec::new();
        let closed = table.compact(|t, slot| links.push((t.partial, slot)));
        assert_eq!(closed, 2);
        assert_eq!(links, vec![(0, 0), (2, 1), (3, 2), (5, 3)]);
        let order: Vec<usize> = table.iter().map(|t| t.partial).collect();
        assert_eq!(order, vec![0, 2, 3, 5]);
        for (slot, t) in table.iter().enumerate() {
            assert_eq!(table.get(slot), Some(t));
        }
    }

    #[test]
    fn test_audible_sorted_descending() {
        let mut table = TrackTable::new(8);
        for p in 0..5 {
            table.push(track(p));
        }
        let amps = [0.1, 0.0, 0.5, 0.3, 0.2];
        table.collect_audible(|t| amps[t.partial]);
        let order: Vec<usize> = table.audible().iter().map(|(t, _)| t.partial).collect();
        assert_eq!(order, vec![2, 3, 4, 0]);
        // The primary table keeps insertion order.
        let primary: Vec<usize> = table.iter().map(|t| t.partial).collect();
        assert_eq!(primary, vec![0, 1, 2, 3, 4]);
    }
}
