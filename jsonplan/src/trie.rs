//! Key trie: resolves a raw JSON key to a child index without hashing.
//!
//! Every name is stored with its closing `"` appended, so the key slice the
//! parser already has in hand (everything after the opening quote, up to and
//! including the closing one) can be looked up directly.
//!
//! A state is a 128-entry table indexed by the low seven bits of the current
//! byte. Entries are either empty, a leaf (the name is fully determined, and
//! is verified against the whole key), or a branch to another state. After
//! insertion two compaction passes shrink the table:
//!
//! - skip: a branch to a state with a single live entry is redirected past
//!   it, recording how many bytes to step over unchecked;
//! - zip: a child state whose live entries are disjoint from its parent's is
//!   folded into the parent, and the branch becomes a self loop.
//!
//! Both may admit keys that are not in the set; the final full-name
//! comparison on a leaf rejects them.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

const FANOUT: usize = 128;
const NONE: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TrieNode {
    next: u16,
    idx: u16,
    skip: u16,
}

impl TrieNode {
    const EMPTY: TrieNode = TrieNode {
        next: NONE,
        idx: NONE,
        skip: 0,
    };

    #[inline]
    fn is_leaf(self) -> bool {
        self.idx != NONE
    }

    #[inline]
    fn is_branch(self) -> bool {
        self.next != NONE
    }

    #[inline]
    fn is_live(self) -> bool {
        self.is_leaf() || self.is_branch()
    }
}

type State = [TrieNode; FANOUT];

/// Why a trie could not be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrieError {
    /// The same name was inserted twice.
    Duplicate(String),
    /// Two names differ only in their high bits and cannot share a table.
    Indistinguishable(String, String),
    /// More names or states than the 16-bit indices can address.
    TooLarge,
}

impl fmt::Display for TrieError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrieError::Duplicate(key) => write!(f, "duplicate key: {key}"),
            TrieError::Indistinguishable(a, b) => {
                write!(f, "keys `{a}` and `{b}` cannot be told apart")
            }
            TrieError::TooLarge => f.write_str("too many keys"),
        }
    }
}

/// Compressed trie over a record's field names.
pub struct KeyTrie {
    states: Box<[TrieNode]>,
    names: Box<[Box<str>]>,
}

impl KeyTrie {
    /// Builds the trie for `names`; the index of each name is what
    /// [`KeyTrie::lookup`] returns for it.
    pub fn build<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self, TrieError> {
        let names: Vec<Box<str>> = names.into_iter().map(Box::from).collect();
        if names.len() >= NONE as usize {
            return Err(TrieError::TooLarge);
        }
        let mut builder = Builder {
            states: alloc::vec![[TrieNode::EMPTY; FANOUT]],
            names: &names,
        };
        for idx in 0..names.len() {
            builder.insert(idx as u16)?;
        }
        let _inserted = builder.states.len();
        loop {
            let skipped = builder.skip_pass();
            let zipped = builder.zip_pass();
            if !skipped && !zipped {
                break;
            }
        }
        builder.collect_garbage();
        trace!(
            keys = names.len(),
            inserted = _inserted,
            compacted = builder.states.len(),
            "built key trie"
        );

        let states = builder.states.concat().into_boxed_slice();
        Ok(KeyTrie {
            states,
            names: names.into_boxed_slice(),
        })
    }

    /// Resolves `key`, which must end with the closing quote, to the index of
    /// the matching name.
    #[inline]
    pub fn lookup(&self, key: &[u8]) -> Option<usize> {
        let mut state = 0usize;
        let mut i = 0usize;
        while i < key.len() {
            let node = self.states[state * FANOUT + (key[i] & 0x7f) as usize];
            if node.is_leaf() {
                let idx = node.idx as usize;
                return self.matches(idx, key).then_some(idx);
            }
            if !node.is_branch() {
                return None;
            }
            state = node.next as usize;
            i += 1 + node.skip as usize;
        }
        None
    }

    /// Number of 128-entry tables after compaction.
    pub fn state_count(&self) -> usize {
        self.states.len() / FANOUT
    }

    /// Number of names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true when the trie holds no names.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[inline]
    fn matches(&self, idx: usize, key: &[u8]) -> bool {
        let name = self.names[idx].as_bytes();
        key.len() == name.len() + 1 && key[name.len()] == b'"' && &key[..name.len()] == name
    }
}

impl fmt::Debug for KeyTrie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyTrie")
            .field("names", &self.names)
            .field("states", &self.state_count())
            .finish()
    }
}

struct Builder<'n> {
    states: Vec<State>,
    names: &'n [Box<str>],
}

impl Builder<'_> {
    /// Byte `i` of name `idx` with its sentinel, or `None` past the end.
    fn byte(&self, idx: u16, i: usize) -> Option<u8> {
        let name = self.names[idx as usize].as_bytes();
        match i.cmp(&name.len()) {
            core::cmp::Ordering::Less => Some(name[i]),
            core::cmp::Ordering::Equal => Some(b'"'),
            core::cmp::Ordering::Greater => None,
        }
    }

    fn new_state(&mut self) -> Result<u16, TrieError> {
        let id = self.states.len();
        if id >= NONE as usize {
            return Err(TrieError::TooLarge);
        }
        self.states.push([TrieNode::EMPTY; FANOUT]);
        Ok(id as u16)
    }

    fn insert(&mut self, idx: u16) -> Result<(), TrieError> {
        let mut state = 0usize;
        let mut i = 0usize;
        while let Some(c) = self.byte(idx, i) {
            let k = (c & 0x7f) as usize;
            let node = self.states[state][k];

            if node.is_branch() {
                state = node.next as usize;
                i += 1;
                continue;
            }
            if !node.is_leaf() {
                self.states[state][k].idx = idx;
                return Ok(());
            }

            // occupied by another name's leaf: push it one level down
            let old = node.idx;
            if self.names[old as usize] == self.names[idx as usize] {
                return Err(TrieError::Duplicate(self.names[idx as usize].to_string()));
            }
            let (Some(old_next), Some(_)) = (self.byte(old, i + 1), self.byte(idx, i + 1)) else {
                return Err(TrieError::Indistinguishable(
                    self.names[old as usize].to_string(),
                    self.names[idx as usize].to_string(),
                ));
            };
            let child = self.new_state()?;
            self.states[state][k] = TrieNode {
                next: child,
                idx: NONE,
                skip: 0,
            };
            self.states[child as usize][(old_next & 0x7f) as usize] = node;
            state = child as usize;
            i += 1;
        }
        Err(TrieError::Indistinguishable(
            self.names[idx as usize].to_string(),
            String::from("<prefix>"),
        ))
    }

    /// Redirects branches past states that have a single live entry.
    fn skip_pass(&mut self) -> bool {
        let mut changed = false;
        for s in 0..self.states.len() {
            for k in 0..FANOUT {
                let e = self.states[s][k];
                if !e.is_branch() || e.next as usize == s || e.next == 0 {
                    continue;
                }
                let c = e.next as usize;
                let mut live = self.states[c].iter().filter(|n| n.is_live());
                let (Some(&only), None) = (live.next(), live.next()) else {
                    continue;
                };
                if only.is_branch() && only.next as usize == c {
                    continue;
                }
                let merged = if only.is_leaf() {
                    only
                } else {
                    let Some(skip) = e
                        .skip
                        .checked_add(1)
                        .and_then(|s| s.checked_add(only.skip))
                        .filter(|s| *s < NONE)
                    else {
                        continue;
                    };
                    TrieNode {
                        next: only.next,
                        idx: NONE,
                        skip,
                    }
                };
                self.states[s][k] = merged;
                self.states[c] = [TrieNode::EMPTY; FANOUT];
                changed = true;
            }
        }
        changed
    }

    /// Folds child states into their parent when their live entries are disjoint.
    fn zip_pass(&mut self) -> bool {
        let mut changed = false;
        for s in 0..self.states.len() {
            for k in 0..FANOUT {
                let e = self.states[s][k];
                if !e.is_branch() || e.next as usize == s || e.next == 0 {
                    continue;
                }
                let c = e.next as usize;
                let collides = (0..FANOUT)
                    .any(|j| self.states[c][j].is_live() && self.states[s][j].is_live());
                if collides {
                    continue;
                }
                let child = core::mem::replace(&mut self.states[c], [TrieNode::EMPTY; FANOUT]);
                for (j, node) in child.iter().enumerate() {
                    if node.is_live() {
                        self.states[s][j] = *node;
                    }
                }
                self.states[s][k].next = s as u16;
                changed = true;
            }
        }
        changed
    }

    /// Drops unreachable states and renumbers the rest.
    fn collect_garbage(&mut self) {
        let mut remap = alloc::vec![NONE; self.states.len()];
        let mut order = Vec::with_capacity(self.states.len());
        remap[0] = 0;
        order.push(0usize);
        let mut cursor = 0;
        while cursor < order.len() {
            let s = order[cursor];
            cursor += 1;
            for node in self.states[s] {
                if node.is_branch() && remap[node.next as usize] == NONE {
                    remap[node.next as usize] = order.len() as u16;
                    order.push(node.next as usize);
                }
            }
        }
        let mut states = Vec::with_capacity(order.len());
        for &s in &order {
            let mut state = self.states[s];
            for node in state.iter_mut() {
                if node.is_branch() {
                    node.next = remap[node.next as usize];
                }
            }
            states.push(state);
        }
        self.states = states;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonplan_testhelpers::test;

    fn key(name: &str) -> Vec<u8> {
        let mut k = name.as_bytes().to_vec();
        k.push(b'"');
        k
    }

    #[test]
    fn prefix_names_resolve_independently() {
        let trie = KeyTrie::build(["id", "ids"]).unwrap();
        assert_eq!(trie.lookup(&key("id")), Some(0));
        assert_eq!(trie.lookup(&key("ids")), Some(1));
        assert_eq!(trie.lookup(&key("i")), None);
        assert_eq!(trie.lookup(&key("idx")), None);
        assert_eq!(trie.lookup(&key("idss")), None);
        assert_eq!(trie.lookup(b"id"), None);
        assert_eq!(trie.lookup(b""), None);
    }

    #[test]
    fn every_name_resolves_and_nothing_else_does() {
        let names = [
            "name", "names", "nam", "age", "agent", "a", "", "user_id", "user_ids", "userid",
            "URL", "url", "x", "xy", "xyz", "created_at", "updated_at", "ünïcødé", "日本",
        ];
        let trie = KeyTrie::build(names).unwrap();
        for (i, name) in names.iter().enumerate() {
            assert_eq!(trie.lookup(&key(name)), Some(i), "lookup of {name:?}");
        }
        for probe in ["n", "na", "namex", "ag", "agen", "user", "user_i", "xyzz", "URLs", "日"] {
            assert_eq!(trie.lookup(&key(probe)), None, "probe {probe:?}");
        }
    }

    #[test]
    fn compaction_shrinks_the_table() {
        let trie = KeyTrie::build(["abcdef1", "abcdef2"]).unwrap();
        assert_eq!(trie.state_count(), 1);
        assert_eq!(trie.lookup(&key("abcdef1")), Some(0));
        assert_eq!(trie.lookup(&key("abcdef2")), Some(1));
        assert_eq!(trie.lookup(&key("abcdef3")), None);
        assert_eq!(trie.lookup(&key("zzzzzz1")), None);
    }

    #[test]
    fn many_siblings() {
        let names: Vec<String> = (0..300).map(|i| format!("field_{i}")).collect();
        let trie = KeyTrie::build(names.iter().map(String::as_str)).unwrap();
        for (i, name) in names.iter().enumerate() {
            assert_eq!(trie.lookup(&key(name)), Some(i));
        }
        assert_eq!(trie.lookup(&key("field_300")), None);
        assert_eq!(trie.lookup(&key("field_")), None);
    }

    #[test]
    fn duplicates_are_rejected() {
        assert_eq!(
            KeyTrie::build(["a", "b", "a"]).err(),
            Some(TrieError::Duplicate("a".into()))
        );
    }

    #[test]
    fn empty_trie_matches_nothing() {
        let trie = KeyTrie::build([]).unwrap();
        assert!(trie.is_empty());
        assert_eq!(trie.lookup(&key("a")), None);
    }
}
