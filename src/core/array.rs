//! Ordered hash table
//!
//! ## PHP Semantics
//!
//! PHP arrays are ordered maps from integer or string keys to values:
//! - Iteration follows insertion order until an explicit sort
//! - `$a[] = v` appends at the next free integer index, which never goes
//!   backwards even after the highest key is unset
//! - Arrays are values: assignment shares storage, the first write separates
//!
//! ## Layout
//!
//! Entries live in a dense `Vec` in insertion order. Deleting leaves a hole
//! (`None`) that is compacted by the next rehash; deleting the last slot
//! trims trailing holes immediately. A `HashMap` maps each key to its slot.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_hash.c` - HashTable implementation
//! - Zend: `$PHP_SRC_PATH/Zend/zend_hash.h` - nNextFreeElement, nInternalPointer

use crate::core::value::Val;
use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Array key: integer index or byte-string.
///
/// Numeric strings are NOT folded into integers here; that is the job of
/// `ArrayKey::numeric` and the value-to-key conversion.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum ArrayKey {
    Int(i64),
    Str(Rc<Vec<u8>>),
}

impl ArrayKey {
    pub fn str(s: impl AsRef<[u8]>) -> Self {
        ArrayKey::Str(Rc::new(s.as_ref().to_vec()))
    }

    /// Canonical key for a string offset: decimal integer text becomes an int key.
    /// Reference: $PHP_SRC_PATH/Zend/zend_hash.c - _zend_handle_numeric_str_ex
    pub fn numeric(s: &[u8]) -> Self {
        match parse_canonical_int(s) {
            Some(i) => ArrayKey::Int(i),
            None => ArrayKey::str(s),
        }
    }

    pub fn to_val(&self) -> Val {
        match self {
            ArrayKey::Int(i) => Val::Int(*i),
            ArrayKey::Str(s) => Val::String(s.clone()),
        }
    }

    /// Key rendered as bytes (`5` -> "5")
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ArrayKey::Int(i) => i.to_string().into_bytes(),
            ArrayKey::Str(s) => s.to_vec(),
        }
    }
}

/// "-0", "01", "+1" and out-of-range text stay strings
fn parse_canonical_int(s: &[u8]) -> Option<i64> {
    let digits = match s.first()? {
        b'-' => &s[1..],
        _ => s,
    };
    if digits.is_empty() || digits.len() > 20 || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if digits[0] == b'0' && (digits.len() > 1 || s.len() > 1) {
        return None;
    }
    std::str::from_utf8(s).ok()?.parse::<i64>().ok()
}

impl Ord for ArrayKey {
    /// Integer keys order before string keys
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ArrayKey::Int(a), ArrayKey::Int(b)) => a.cmp(b),
            (ArrayKey::Str(a), ArrayKey::Str(b)) => a.as_slice().cmp(b.as_slice()),
            (ArrayKey::Int(_), ArrayKey::Str(_)) => Ordering::Less,
            (ArrayKey::Str(_), ArrayKey::Int(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for ArrayKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayKey::Int(i) => write!(f, "{}", i),
            ArrayKey::Str(s) => write!(f, "\"{}\"", String::from_utf8_lossy(s)),
        }
    }
}

impl From<i64> for ArrayKey {
    fn from(i: i64) -> Self {
        ArrayKey::Int(i)
    }
}

impl From<&str> for ArrayKey {
    fn from(s: &str) -> Self {
        ArrayKey::str(s)
    }
}

#[derive(Debug, Clone)]
struct Bucket {
    key: ArrayKey,
    val: Val,
}

/// Position value meaning "no element" for the internal pointer
pub const INVALID_POS: usize = usize::MAX;

pub struct ArrayData {
    data: Vec<Option<Bucket>>,
    indexes: HashMap<ArrayKey, usize>,
    count: usize,
    next_free: i64,
    pointer: usize,
    protected: Cell<bool>,
}

impl ArrayData {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            indexes: HashMap::with_capacity(capacity),
            count: 0,
            next_free: 0,
            pointer: 0,
            protected: Cell::new(false),
        }
    }

    /// List array `[v0, v1, ...]`
    pub fn from_values(values: impl IntoIterator<Item = Val>) -> Self {
        let mut arr = Self::new();
        for v in values {
            arr.append(v);
        }
        arr
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Physical slots in use, holes included
    pub fn used(&self) -> usize {
        self.data.len()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Next integer key `append` will use
    pub fn next_free(&self) -> i64 {
        self.next_free
    }

    pub fn find(&self, key: &ArrayKey) -> Option<&Val> {
        let pos = *self.indexes.get(key)?;
        self.data[pos].as_ref().map(|b| &b.val)
    }

    pub fn find_mut(&mut self, key: &ArrayKey) -> Option<&mut Val> {
        let pos = *self.indexes.get(key)?;
        self.data[pos].as_mut().map(|b| &mut b.val)
    }

    pub fn exists(&self, key: &ArrayKey) -> bool {
        self.indexes.contains_key(key)
    }

    /// Insert only when the key is absent
    /// Reference: $PHP_SRC_PATH/Zend/zend_hash.c - zend_hash_add
    pub fn add(&mut self, key: ArrayKey, val: Val) -> bool {
        if self.indexes.contains_key(&key) {
            return false;
        }
        self.append_bucket(key, val);
        true
    }

    /// Insert or overwrite
    /// Reference: $PHP_SRC_PATH/Zend/zend_hash.c - zend_hash_update
    pub fn update(&mut self, key: ArrayKey, val: Val) {
        match self.indexes.get(&key) {
            Some(&pos) => {
                if let Some(bucket) = self.data[pos].as_mut() {
                    bucket.val = val;
                }
            }
            None => self.append_bucket(key, val),
        }
    }

    /// Slot for `key`, inserting `Null` when absent. The flag says whether it was inserted.
    pub fn entry_mut(&mut self, key: ArrayKey) -> (&mut Val, bool) {
        let (pos, inserted) = match self.indexes.get(&key) {
            Some(&pos) => (pos, false),
            None => {
                self.append_bucket(key, Val::Null);
                (self.data.len() - 1, true)
            }
        };
        match self.data[pos].as_mut() {
            Some(bucket) => (&mut bucket.val, inserted),
            None => unreachable!("index points at a hole"),
        }
    }

    pub fn delete(&mut self, key: &ArrayKey) -> bool {
        match self.indexes.get(key) {
            Some(&pos) => {
                self.delete_bucket(pos);
                true
            }
            None => false,
        }
    }

    /// Insert at the next free index and return it.
    ///
    /// `None` when that index is already taken (after `i64::MAX` was used).
    /// Reference: $PHP_SRC_PATH/Zend/zend_hash.c - zend_hash_next_index_insert
    pub fn append(&mut self, val: Val) -> Option<i64> {
        let idx = self.next_free;
        let key = ArrayKey::Int(idx);
        if self.indexes.contains_key(&key) {
            return None;
        }
        self.append_bucket(key, val);
        Some(idx)
    }

    /// Remove every entry and reset the counters
    pub fn clean(&mut self) {
        self.data.clear();
        self.indexes.clear();
        self.count = 0;
        self.next_free = 0;
        self.pointer = 0;
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&ArrayKey, &Val)> {
        self.data
            .iter()
            .filter_map(|slot| slot.as_ref().map(|b| (&b.key, &b.val)))
    }

    pub fn iter_rev(&self) -> impl Iterator<Item = (&ArrayKey, &Val)> {
        self.iter().rev()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ArrayKey, &mut Val)> {
        self.data
            .iter_mut()
            .filter_map(|slot| slot.as_mut().map(|b| (&b.key, &mut b.val)))
    }

    /// Visit entries in insertion order
    pub fn each(&self, mut visit: impl FnMut(&ArrayKey, &Val)) {
        for (k, v) in self.iter() {
            visit(k, v);
        }
    }

    /// Visit entries in reverse insertion order
    pub fn each_reverse(&self, mut visit: impl FnMut(&ArrayKey, &Val)) {
        for (k, v) in self.iter_rev() {
            visit(k, v);
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &ArrayKey> {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Val> {
        self.iter().map(|(_, v)| v)
    }

    /// Last live entry
    pub fn last(&self) -> Option<(&ArrayKey, &Val)> {
        self.iter().next_back()
    }

    /// Stable sort by a three-way comparator over (key, value) pairs.
    ///
    /// With `renumber` the keys become `0..n` in final order.
    /// Reference: $PHP_SRC_PATH/Zend/zend_hash.c - zend_hash_sort_ex
    pub fn sort_by<F>(&mut self, mut cmp: F, renumber: bool)
    where
        F: FnMut((&ArrayKey, &Val), (&ArrayKey, &Val)) -> Ordering,
    {
        if self.count == 0 || (self.count == 1 && !renumber) {
            return;
        }

        self.remove_holes();
        self.pointer = 0;

        self.data.sort_by(|a, b| match (a, b) {
            (Some(a), Some(b)) => cmp((&a.key, &a.val), (&b.key, &b.val)),
            _ => unreachable!("holes removed before sorting"),
        });

        if renumber {
            for (pos, slot) in self.data.iter_mut().enumerate() {
                if let Some(bucket) = slot {
                    bucket.key = ArrayKey::Int(pos as i64);
                }
            }
            self.next_free = self.data.len() as i64;
        }

        self.rehash();
    }

    // Recursion guard

    pub fn protect(&self) {
        self.protected.set(true);
    }

    pub fn unprotect(&self) {
        self.protected.set(false);
    }

    pub fn is_protected(&self) -> bool {
        self.protected.get()
    }

    // Internal pointer (current/next/prev/reset/end)

    /// Entry at a physical position, `None` for holes and out-of-range
    pub fn entry_at(&self, pos: usize) -> Option<(&ArrayKey, &Val)> {
        self.data
            .get(pos)
            .and_then(|slot| slot.as_ref().map(|b| (&b.key, &b.val)))
    }

    pub fn entry_at_mut(&mut self, pos: usize) -> Option<(&ArrayKey, &mut Val)> {
        self.data
            .get_mut(pos)
            .and_then(|slot| slot.as_mut().map(|b| (&b.key, &mut b.val)))
    }

    /// First live position at or after `pos`
    pub fn valid_pos(&self, mut pos: usize) -> Option<usize> {
        while pos < self.data.len() {
            if self.data[pos].is_some() {
                return Some(pos);
            }
            pos += 1;
        }
        None
    }

    fn valid_pos_reverse(&self, pos: usize) -> usize {
        if pos == INVALID_POS {
            return INVALID_POS;
        }
        let mut p = pos.min(self.data.len());
        while p > 0 {
            p -= 1;
            if self.data[p].is_some() {
                return p;
            }
        }
        INVALID_POS
    }

    /// Current element of the internal pointer
    pub fn current(&self) -> Option<(&ArrayKey, &Val)> {
        if self.pointer == INVALID_POS {
            return None;
        }
        let pos = self.valid_pos(self.pointer)?;
        self.entry_at(pos)
    }

    pub fn move_next(&mut self) -> Option<(&ArrayKey, &Val)> {
        if self.pointer != INVALID_POS {
            let from = self.valid_pos(self.pointer).map_or(self.data.len(), |p| p + 1);
            self.pointer = self.valid_pos(from).unwrap_or(self.data.len());
        }
        self.current()
    }

    pub fn move_prev(&mut self) -> Option<(&ArrayKey, &Val)> {
        if self.pointer != INVALID_POS {
            let at = self.valid_pos(self.pointer).unwrap_or(self.data.len());
            self.pointer = self.valid_pos_reverse(at);
        }
        self.current()
    }

    pub fn move_end(&mut self) -> Option<(&ArrayKey, &Val)> {
        self.pointer = self.valid_pos_reverse(self.data.len());
        self.current()
    }

    pub fn reset_pointer(&mut self) -> Option<(&ArrayKey, &Val)> {
        self.pointer = 0;
        self.current()
    }

    // Internals

    fn append_bucket(&mut self, key: ArrayKey, val: Val) {
        self.resize_if_full();

        if let ArrayKey::Int(idx) = key {
            if idx >= self.next_free {
                self.next_free = if idx < i64::MAX { idx + 1 } else { i64::MAX };
            }
        }

        self.count += 1;
        self.indexes.insert(key.clone(), self.data.len());
        self.data.push(Some(Bucket { key, val }));
    }

    /// Compact only when holes exceed 1/32 of the live entries; otherwise let the Vec grow
    fn resize_if_full(&mut self) {
        let used = self.data.len();
        if used == self.data.capacity() && used > self.count + (self.count >> 5) {
            self.rehash();
        }
    }

    fn delete_bucket(&mut self, pos: usize) {
        let Some(bucket) = self.data[pos].take() else {
            return;
        };
        self.count -= 1;
        self.indexes.remove(&bucket.key);

        if self.pointer == pos {
            self.pointer = self.valid_pos(pos + 1).unwrap_or(self.data.len());
        }

        if pos == self.data.len() - 1 {
            let mut new_len = pos;
            while new_len > 0 && self.data[new_len - 1].is_none() {
                new_len -= 1;
            }
            self.data.truncate(new_len);
            if self.pointer != INVALID_POS && self.pointer > new_len {
                self.pointer = new_len;
            }
        }
    }

    /// Drop holes and rebuild the key index, preserving order
    fn rehash(&mut self) {
        tracing::trace!(
            used = self.data.len(),
            count = self.count,
            "array rehash"
        );
        self.indexes.clear();
        if self.count == 0 {
            self.data.clear();
            self.pointer = 0;
            return;
        }
        self.remove_holes();
        for (pos, slot) in self.data.iter().enumerate() {
            if let Some(bucket) = slot {
                self.indexes.insert(bucket.key.clone(), pos);
            }
        }
    }

    fn remove_holes(&mut self) {
        if self.data.len() == self.count {
            return;
        }
        let mut new_pos = 0;
        for pos in 0..self.data.len() {
            if self.data[pos].is_none() {
                continue;
            }
            if new_pos != pos {
                self.data.swap(new_pos, pos);
                if self.pointer == pos {
                    self.pointer = new_pos;
                }
            }
            new_pos += 1;
        }
        self.data.truncate(new_pos);
        if self.pointer != INVALID_POS && self.pointer > new_pos {
            self.pointer = new_pos;
        }
    }
}

impl Default for ArrayData {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ArrayData {
    /// Real copy; the recursion guard is not carried over
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            indexes: self.indexes.clone(),
            count: self.count,
            next_free: self.next_free,
            pointer: self.pointer,
            protected: Cell::new(false),
        }
    }
}

impl fmt::Debug for ArrayData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl PartialEq for ArrayData {
    /// Same entries in the same order
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count && self.iter().eq(other.iter())
    }
}

impl FromIterator<(ArrayKey, Val)> for ArrayData {
    fn from_iter<I: IntoIterator<Item = (ArrayKey, Val)>>(iter: I) -> Self {
        let mut arr = ArrayData::new();
        for (k, v) in iter {
            arr.update(k, v);
        }
        arr
    }
}
