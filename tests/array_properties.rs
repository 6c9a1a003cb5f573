//! Property tests for the ordered hash table
//!
//! Random sequences of inserts, deletes and appends are replayed against a
//! plain vector of entries, which is the obvious model of an insertion-ordered
//! map with PHP's next-index rule.

use php_core::core::array::{ArrayData, ArrayKey};
use php_core::core::value::Val;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Update(ArrayKey, i64),
    Delete(ArrayKey),
    Append(i64),
}

fn key_strategy() -> impl Strategy<Value = ArrayKey> {
    prop_oneof![
        (-3i64..10).prop_map(ArrayKey::Int),
        prop::sample::select(vec!["a", "b", "c", "d"]).prop_map(ArrayKey::str),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (key_strategy(), any::<i64>()).prop_map(|(k, v)| Op::Update(k, v)),
        1 => key_strategy().prop_map(Op::Delete),
        2 => any::<i64>().prop_map(Op::Append),
    ]
}

#[derive(Default)]
struct Model {
    entries: Vec<(ArrayKey, i64)>,
    next_free: i64,
}

impl Model {
    fn bump(&mut self, key: &ArrayKey) {
        if let ArrayKey::Int(k) = key {
            if *k >= self.next_free {
                self.next_free = k + 1;
            }
        }
    }

    fn apply(&mut self, op: &Op) {
        match op {
            Op::Update(key, v) => match self.entries.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1 = *v,
                None => {
                    self.bump(key);
                    self.entries.push((key.clone(), *v));
                }
            },
            Op::Delete(key) => self.entries.retain(|(k, _)| k != key),
            Op::Append(v) => {
                let key = ArrayKey::Int(self.next_free);
                if !self.entries.iter().any(|(k, _)| *k == key) {
                    self.bump(&key);
                    self.entries.push((key, *v));
                }
            }
        }
    }
}

fn apply(arr: &mut ArrayData, op: &Op) {
    match op {
        Op::Update(key, v) => arr.update(key.clone(), Val::Int(*v)),
        Op::Delete(key) => {
            arr.delete(key);
        }
        Op::Append(v) => {
            arr.append(Val::Int(*v));
        }
    }
}

fn entries(arr: &ArrayData) -> Vec<(ArrayKey, i64)> {
    arr.iter()
        .map(|(k, v)| match v {
            Val::Int(i) => (k.clone(), *i),
            other => panic!("unexpected value {:?}", other),
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_matches_ordered_model(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let mut arr = ArrayData::new();
        let mut model = Model::default();
        for op in &ops {
            apply(&mut arr, op);
            model.apply(op);
        }
        prop_assert_eq!(entries(&arr), model.entries.clone());
        prop_assert_eq!(arr.len(), model.entries.len());
        prop_assert_eq!(arr.next_free(), model.next_free);
        for (key, value) in &model.entries {
            prop_assert_eq!(arr.find(key), Some(&Val::Int(*value)));
        }
    }

    #[test]
    fn prop_next_free_never_decreases(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let mut arr = ArrayData::new();
        let mut last = arr.next_free();
        for op in &ops {
            apply(&mut arr, op);
            prop_assert!(arr.next_free() >= last);
            last = arr.next_free();
        }
    }

    #[test]
    fn prop_clone_is_isolated(
        before in prop::collection::vec(op_strategy(), 0..32),
        after in prop::collection::vec(op_strategy(), 1..32),
    ) {
        let mut original = ArrayData::new();
        for op in &before {
            apply(&mut original, op);
        }
        let snapshot = entries(&original);
        let mut copy = original.clone();
        prop_assert_eq!(&copy, &original);
        for op in &after {
            apply(&mut copy, op);
        }
        prop_assert_eq!(entries(&original), snapshot);
    }

    #[test]
    fn prop_numeric_keys_are_canonical(n in -1000i64..1000) {
        let text = n.to_string();
        prop_assert_eq!(ArrayKey::numeric(text.as_bytes()), ArrayKey::Int(n));
        let padded = format!("0{}", n.abs());
        if n.abs() > 0 {
            prop_assert_eq!(ArrayKey::numeric(padded.as_bytes()), ArrayKey::str(&padded));
        }
    }
}
