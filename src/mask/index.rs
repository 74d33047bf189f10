//! Ordered index of mask contributions.
//!
//! A skip list with backward links, keyed by perceptual frequency. Nodes live
//! in a pool sized once for the largest number of simultaneous tracks;
//! [`MaskIndex::reset`] rewinds the pool so the masking pass never allocates.
//!
//! The index keeps a cursor on the most recently inserted node. Neighbour
//! queries and removal act on that node, since the search path recorded
//! during insertion is exactly what removal needs.

use rand::RngCore;
use rand::rngs::StdRng;
use tracing::error;

use super::perceptual::MaskEntry;

/// Maximum number of forward levels of a node.
pub const MAX_LEVEL: usize = 32;

const HEAD: usize = 0;
const NIL: usize = 1;

#[derive(Debug, Clone, Copy)]
struct Node {
    entry: MaskEntry,
    /// Offset of the node's first forward link in `MaskIndex::links`.
    links: usize,
    level: usize,
    prev: usize,
}

/// Skip list of [`MaskEntry`] sorted by ascending Bark frequency.
#[derive(Debug)]
pub struct MaskIndex {
    nodes: Vec<Node>,
    links: Vec<usize>,
    capacity: usize,
    level: usize,
    update: [usize; MAX_LEVEL],
    cursor: Option<usize>,
    len: usize,
    rng: StdRng,
}

impl MaskIndex {
    /// Creates an index able to hold `capacity` insertions between resets.
    pub fn new(capacity: usize, rng: StdRng) -> Self {
        let mut nodes = Vec::with_capacity(capacity + 2);
        // Header with every level, then the NIL sentinel with none.
        nodes.push(Node {
            entry: MaskEntry::default(),
            links: 0,
            level: MAX_LEVEL,
            prev: HEAD,
        });
        nodes.push(Node {
            entry: MaskEntry::default(),
            links: MAX_LEVEL,
            level: 0,
            prev: HEAD,
        });

        let mut links = Vec::with_capacity((capacity + 1) * MAX_LEVEL);
        links.resize(MAX_LEVEL, NIL);

        Self {
            nodes,
            links,
            capacity,
            level: 1,
            update: [HEAD; MAX_LEVEL],
            cursor: None,
            len: 0,
            rng,
        }
    }

    /// Empties the index and rewinds the node pool.
    pub fn reset(&mut self) {
        self.nodes.truncate(2);
        self.links.truncate(MAX_LEVEL);
        self.links.fill(NIL);
        self.nodes[NIL].prev = HEAD;
        self.update = [HEAD; MAX_LEVEL];
        self.level = 1;
        self.cursor = None;
        self.len = 0;
    }

    /// Inserts `entry` and makes it the cursor.
    ///
    /// An entry with the same key as existing ones goes before them.
    ///
    /// # Panics
    ///
    /// Panics when more than `capacity` entries were inserted since the last
    /// reset.
    pub fn insert(&mut self, entry: MaskEntry) {
        if self.nodes.len() - 2 >= self.capacity {
            error!(capacity = self.capacity, "mask node pool exhausted");
            panic!("mask node pool exhausted ({} nodes)", self.capacity);
        }

        let mut x = HEAD;
        for i in (0..self.level).rev() {
            loop {
                let next = self.forward(x, i);
                if next != NIL && entry.bark > self.nodes[next].entry.bark {
                    x = next;
                } else {
                    break;
                }
            }
            self.update[i] = x;
        }

        let level = self.random_level();
        if level > self.level {
            for slot in &mut self.update[self.level..level] {
                *slot = HEAD;
            }
            self.level = level;
        }

        let id = self.nodes.len();
        let offset = self.links.len();
        for i in 0..level {
            let pred = self.update[i];
            let next = self.forward(pred, i);
            self.links.push(next);
            self.set_forward(pred, i, id);
        }

        let prev = self.update[0];
        let next = self.links[offset];
        self.nodes.push(Node {
            entry,
            links: offset,
            level,
            prev,
        });
        self.nodes[next].prev = id;

        self.cursor = Some(id);
        self.len += 1;
    }

    /// Entry just below the cursor.
    pub fn predecessor(&self) -> Option<&MaskEntry> {
        let prev = self.nodes[self.cursor?].prev;
        (prev != HEAD).then(|| &self.nodes[prev].entry)
    }

    /// Entry just above the cursor.
    pub fn successor(&self) -> Option<&MaskEntry> {
        let next = self.forward(self.cursor?, 0);
        (next != NIL).then(|| &self.nodes[next].entry)
    }

    /// Unlinks the cursor entry. Its pool slot is only reclaimed by `reset`.
    pub fn remove_current(&mut self) -> Option<MaskEntry> {
        let x = self.cursor.take()?;

        for i in 0..self.level {
            let pred = self.update[i];
            if self.forward(pred, i) != x {
                break;
            }
            let next = self.forward(x, i);
            self.set_forward(pred, i, next);
        }

        let next = self.forward(x, 0);
        self.nodes[next].prev = self.nodes[x].prev;

        while self.level > 1 && self.forward(HEAD, self.level - 1) == NIL {
            self.level -= 1;
        }

        self.len -= 1;
        Some(self.nodes[x].entry)
    }

    /// Number of entries currently linked.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &MaskEntry> + '_ {
        let mut x = self.forward(HEAD, 0);
        std::iter::from_fn(move || {
            if x == NIL {
                return None;
            }
            let node = &self.nodes[x];
            x = self.links[node.links];
            Some(&node.entry)
        })
    }

    #[inline]
    fn forward(&self, node: usize, level: usize) -> usize {
        debug_assert!(level < self.nodes[node].level);
        self.links[self.nodes[node].links + level]
    }

    #[inline]
    fn set_forward(&mut self, node: usize, level: usize, to: usize) {
        let offset = self.nodes[node].links + level;
        self.links[offset] = to;
    }

    /// Geometric level with p = 1/2.
    fn random_level(&mut self) -> usize {
        let bits = self.rng.next_u64();
        (bits.trailing_zeros() as usize + 1).min(MAX_LEVEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn index(capacity: usize) -> MaskIndex {
        MaskIndex::new(capacity, StdRng::seed_from_u64(42))
    }

    fn entry(bark: f64) -> MaskEntry {
        MaskEntry {
            bark,
            min_db: -20.0,
            max_db: -10.0,
        }
    }

    fn keys(index: &MaskIndex) -> Vec<f64> {
        index.iter().map(|e| e.bark).collect()
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut idx = index(16);
        for bark in [5.0, 1.0, 9.0, 3.0, 7.0] {
            idx.insert(entry(bark));
        }
        assert_eq!(keys(&idx), vec![1.0, 3.0, 5.0, 7.0, 9.0]);
        assert_eq!(idx.len(), 5);
    }

    #[test]
    fn test_neighbours_of_cursor() {
        let mut idx = index(16);
        idx.insert(entry(2.0));
        assert!(idx.predecessor().is_none());
        assert!(idx.successor().is_none());

        idx.insert(entry(8.0));
        idx.insert(entry(5.0));
        assert_eq!(idx.predecessor().map(|e| e.bark), Some(2.0));
        assert_eq!(idx.successor().map(|e| e.bark), Some(8.0));

        idx.insert(entry(1.0));
        assert!(idx.predecessor().is_none());
        assert_eq!(idx.successor().map(|e| e.bark), Some(2.0));
    }

    #[test]
    fn test_equal_keys_insert_before() {
        let mut idx = index(16);
        idx.insert(MaskEntry {
            bark: 4.0,
            min_db: -1.0,
            max_db: -1.0,
        });
        idx.insert(MaskEntry {
            bark: 4.0,
            min_db: -2.0,
            max_db: -2.0,
        });
        // The newer entry sits first, so the older one is its successor.
        assert!(idx.predecessor().is_none());
        assert_eq!(idx.successor().map(|e| e.min_db), Some(-1.0));
        let order: Vec<f64> = idx.iter().map(|e| e.min_db).collect();
        assert_eq!(order, vec![-2.0, -1.0]);
    }

    #[test]
    fn test_remove_current() {
        let mut idx = index(16);
        for bark in [1.0, 2.0, 3.0] {
            idx.insert(entry(bark));
        }
        idx.insert(entry(2.5));
        let removed = idx.remove_current().unwrap();
        assert_eq!(removed.bark, 2.5);
        assert_eq!(keys(&idx), vec![1.0, 2.0, 3.0]);
        assert!(idx.remove_current().is_none());

        // Backward links survive removal.
        idx.insert(entry(2.7));
        assert_eq!(idx.predecessor().map(|e| e.bark), Some(2.0));
        assert_eq!(idx.successor().map(|e| e.bark), Some(3.0));
    }

    #[test]
    fn test_remove_extremes() {
        let mut idx = index(16);
        idx.insert(entry(5.0));
        idx.insert(entry(10.0));
        idx.remove_current();
        idx.insert(entry(0.5));
        idx.remove_current();
        assert_eq!(keys(&idx), vec![5.0]);
        idx.insert(entry(7.0));
        assert_eq!(idx.predecessor().map(|e| e.bark), Some(5.0));
        assert!(idx.successor().is_none());
    }

    #[test]
    fn test_reset_rewinds_pool() {
        let mut idx = index(4);
        for round in 0..10 {
            idx.reset();
            assert!(idx.is_empty());
            for k in 0..4 {
                idx.insert(entry((round * 4 + k) as f64));
            }
            assert_eq!(idx.len(), 4);
        }
    }

    #[test]
    fn test_many_entries_sorted() {
        let mut idx = index(1000);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let bark = (rng.next_u32() % 2700) as f64 / 100.0;
            idx.insert(entry(bark));
        }
        let k = keys(&idx);
        assert_eq!(k.len(), 1000);
        assert!(k.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    #[should_panic(expected = "mask node pool exhausted")]
    fn test_pool_exhaustion_is_fatal() {
        let mut idx = index(2);
        idx.insert(entry(1.0));
        idx.remove_current();
        idx.insert(entry(2.0));
        idx.insert(entry(3.0));
    }
}
