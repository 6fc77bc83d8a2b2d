//! Deterministic probabilistic skip list used as the order book's side index.
//!
//! Keyed on a numeric sort key chosen by the caller (the book encodes side
//! direction into the key — `+price` for asks, `-price` for bids — so that
//! [`SkipList::first`] always returns the best opposite price for either
//! side). Node promotion uses a caller-supplied [`DeterministicRng`] so the
//! resulting structure — and therefore the iteration order of equal-key
//! ties — is identical across runs given the same seed and call sequence.
//!
//! Negative keys never escape the data structure: callers see only the keys
//! they inserted.

use crate::rng::DeterministicRng;

/// Maximum number of levels a node can be promoted to.
const MAX_LEVEL: usize = 16;
/// Per-level promotion probability.
const PROMOTE_P: f64 = 0.5;

struct Node<K, V> {
    key: K,
    value: V,
    /// `forward[level]` is the arena index of the next node at `level`, or
    /// `None` at the tail.
    forward: Vec<Option<usize>>,
}

/// An ordered `key -> value` index with O(1) best-key access and expected
/// O(log n) insert/delete.
pub struct SkipList<K, V> {
    /// Arena of nodes. Deleted slots are reused via `free`.
    nodes: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    /// Head sentinel's forward pointers, one per level.
    head: Vec<Option<usize>>,
    level: usize,
    len: usize,
    rng: DeterministicRng,
}

impl<K: Ord + Copy, V> SkipList<K, V> {
    /// Construct an empty skip list whose node promotions are driven by
    /// `rng`.
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: vec![None; MAX_LEVEL],
            level: 1,
            len: 0,
            rng,
        }
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Look up the value stored at `key`, if any.
    pub fn get(&self, key: K) -> Option<&V> {
        let idx = self.find_node(key)?;
        self.nodes[idx].as_ref().map(|n| &n.value)
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        let idx = self.find_node(key)?;
        self.nodes[idx].as_mut().map(|n| &mut n.value)
    }

    /// Insert `value` at `key`, replacing any existing value and returning
    /// it.
    pub fn upsert(&mut self, key: K, value: V) -> Option<V> {
        let mut update = [None; MAX_LEVEL];
        let mut cursor_is_head = true;
        let mut cursor_idx: Option<usize> = None;

        for lvl in (0..self.level).rev() {
            loop {
                let next = if cursor_is_head {
                    self.head[lvl]
                } else {
                    self.nodes[cursor_idx.unwrap()].as_ref().unwrap().forward[lvl]
                };
                match next {
                    Some(next_idx) if self.nodes[next_idx].as_ref().unwrap().key < key => {
                        cursor_idx = Some(next_idx);
                        cursor_is_head = false;
                    }
                    _ => break,
                }
            }
            update[lvl] = if cursor_is_head { None } else { cursor_idx };
        }

        // Check if the key already exists immediately after the cursor.
        let next_of_cursor = if let Some(ci) = cursor_idx {
            self.nodes[ci].as_ref().unwrap().forward[0]
        } else {
            self.head[0]
        };
        if let Some(existing_idx) = next_of_cursor {
            if self.nodes[existing_idx].as_ref().unwrap().key == key {
                let node = self.nodes[existing_idx].as_mut().unwrap();
                return Some(std::mem::replace(&mut node.value, value));
            }
        }

        let new_level = self.random_level();
        if new_level > self.level {
            self.level = new_level;
        }
        let mut forward = vec![None; new_level];
        for (lvl, slot) in forward.iter_mut().enumerate() {
            *slot = match update[lvl] {
                Some(pi) => self.nodes[pi].as_ref().unwrap().forward[lvl],
                None => self.head[lvl],
            };
        }

        let new_idx = self.alloc_node(Node { key, value, forward });

        for lvl in 0..new_level {
            match update.get(lvl).copied().flatten() {
                Some(pi) => {
                    self.nodes[pi].as_mut().unwrap().forward[lvl] = Some(new_idx);
                }
                None => {
                    self.head[lvl] = Some(new_idx);
                }
            }
        }
        self.len += 1;
        None
    }

    /// Remove `key`, returning whether it was present.
    pub fn delete(&mut self, key: K) -> bool {
        let mut update: [Option<usize>; MAX_LEVEL] = [None; MAX_LEVEL];
        let mut cursor_is_head = true;
        let mut cursor_idx: Option<usize> = None;

        for lvl in (0..self.level).rev() {
            loop {
                let next = if cursor_is_head {
                    self.head[lvl]
                } else {
                    self.nodes[cursor_idx.unwrap()].as_ref().unwrap().forward[lvl]
                };
                match next {
                    Some(next_idx) if self.nodes[next_idx].as_ref().unwrap().key < key => {
                        cursor_idx = Some(next_idx);
                        cursor_is_head = false;
                    }
                    _ => break,
                }
            }
            update[lvl] = if cursor_is_head { None } else { cursor_idx };
        }

        let target = if let Some(ci) = cursor_idx {
            self.nodes[ci].as_ref().unwrap().forward[0]
        } else {
            self.head[0]
        };
        let target_idx = match target {
            Some(idx) if self.nodes[idx].as_ref().unwrap().key == key => idx,
            _ => return false,
        };

        let target_node_forward = self.nodes[target_idx].as_ref().unwrap().forward.clone();
        for (lvl, next) in target_node_forward.iter().enumerate() {
            match update.get(lvl).copied().flatten() {
                Some(pi) => {
                    if self.nodes[pi].as_ref().unwrap().forward.get(lvl) == Some(&Some(target_idx))
                    {
                        self.nodes[pi].as_mut().unwrap().forward[lvl] = *next;
                    }
                }
                None => {
                    if self.head[lvl] == Some(target_idx) {
                        self.head[lvl] = *next;
                    }
                }
            }
        }

        self.nodes[target_idx] = None;
        self.free.push(target_idx);
        self.len -= 1;

        while self.level > 1 && self.head[self.level - 1].is_none() {
            self.level -= 1;
        }
        true
    }

    /// The entry with the minimum key, if any.
    pub fn first(&self) -> Option<(K, &V)> {
        let idx = self.head[0]?;
        let node = self.nodes[idx].as_ref().unwrap();
        Some((node.key, &node.value))
    }

    pub fn first_mut(&mut self) -> Option<(K, &mut V)> {
        let idx = self.head[0]?;
        let node = self.nodes[idx].as_mut().unwrap();
        Some((node.key, &mut node.value))
    }

    /// Ordered iterator over `(key, value)` pairs, optionally capped at
    /// `limit` entries.
    pub fn entries(&self, limit: Option<usize>) -> Vec<(K, &V)> {
        let mut out = Vec::new();
        let mut cur = self.head[0];
        while let Some(idx) = cur {
            let node = self.nodes[idx].as_ref().unwrap();
            out.push((node.key, &node.value));
            if let Some(l) = limit {
                if out.len() >= l {
                    break;
                }
            }
            cur = node.forward[0];
        }
        out
    }

    fn find_node(&self, key: K) -> Option<usize> {
        let mut cursor_is_head = true;
        let mut cursor_idx: Option<usize> = None;
        for lvl in (0..self.level).rev() {
            loop {
                let next = if cursor_is_head {
                    self.head[lvl]
                } else {
                    self.nodes[cursor_idx.unwrap()].as_ref().unwrap().forward[lvl]
                };
                match next {
                    Some(next_idx) if self.nodes[next_idx].as_ref().unwrap().key < key => {
                        cursor_idx = Some(next_idx);
                        cursor_is_head = false;
                    }
                    _ => break,
                }
            }
        }
        let next = if let Some(ci) = cursor_idx {
            self.nodes[ci].as_ref().unwrap().forward[0]
        } else {
            self.head[0]
        };
        match next {
            Some(idx) if self.nodes[idx].as_ref().unwrap().key == key => Some(idx),
            _ => None,
        }
    }

    fn alloc_node(&mut self, node: Node<K, V>) -> usize {
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = Some(node);
            idx
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn random_level(&mut self) -> usize {
        let mut lvl = 1;
        while lvl < MAX_LEVEL && self.rng.gen_bool(PROMOTE_P) {
            lvl += 1;
        }
        lvl
    }
}
