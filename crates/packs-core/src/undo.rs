//! # Undo Log
//!
//! Remembers the value each key held before a unit of work first touched
//! it, so the owner of a map can put those values back if the unit is
//! abandoned. Nothing is recorded while no unit is open.

use std::collections::HashMap;
use std::hash::Hash;

/// Prior values of the keys changed since [`UndoLog::begin`].
#[derive(Debug, Clone)]
pub struct UndoLog<K, V> {
    open: bool,
    prior: HashMap<K, Option<V>>,
}

impl<K, V> Default for UndoLog<K, V> {
    fn default() -> Self {
        Self {
            open: false,
            prior: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Copy, V: Clone> UndoLog<K, V> {
    /// Open a unit. Opening while one is already open keeps the earlier
    /// start point.
    pub fn begin(&mut self) {
        self.open = true;
    }

    /// Whether a unit is open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Record `current` as the value `key` held before the unit, unless the
    /// key was already recorded.
    pub fn note(&mut self, key: K, current: Option<&V>) {
        if self.open {
            self.prior.entry(key).or_insert_with(|| current.cloned());
        }
    }

    /// Close the unit and keep every change.
    pub fn commit(&mut self) {
        self.open = false;
        self.prior.clear();
    }

    /// Close the unit and restore every recorded key in `map`. Keys that
    /// did not exist before the unit are removed. Returns how many keys
    /// were restored.
    pub fn rollback_into(&mut self, map: &mut HashMap<K, V>) -> usize {
        self.open = false;
        let restored = self.prior.len();
        for (key, value) in self.prior.drain() {
            match value {
                Some(v) => {
                    map.insert(key, v);
                }
                None => {
                    map.remove(&key);
                }
            }
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_restores_first_seen_values() {
        let mut map: HashMap<u32, &str> = HashMap::from([(1, "a")]);
        let mut log = UndoLog::default();
        log.begin();

        log.note(1, map.get(&1));
        map.insert(1, "b");
        log.note(1, map.get(&1));
        map.insert(1, "c");
        log.note(2, map.get(&2));
        map.insert(2, "new");

        assert_eq!(log.rollback_into(&mut map), 2);
        assert_eq!(map, HashMap::from([(1, "a")]));
        assert!(!log.is_open());
    }

    #[test]
    fn nothing_recorded_outside_a_unit() {
        let mut map: HashMap<u32, u32> = HashMap::new();
        let mut log = UndoLog::default();
        log.note(1, None);
        map.insert(1, 1);
        assert_eq!(log.rollback_into(&mut map), 0);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn commit_forgets_prior_values() {
        let mut map: HashMap<u32, u32> = HashMap::new();
        let mut log = UndoLog::default();
        log.begin();
        log.note(7, None);
        map.insert(7, 70);
        log.commit();
        assert_eq!(log.rollback_into(&mut map), 0);
        assert_eq!(map.get(&7), Some(&70));
    }
}
