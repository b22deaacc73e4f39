//! Attribute storage with an original snapshot

use crate::database::{Record, Value};

/// Current and original attribute values of one model instance, plus its
/// existence flag.
///
/// Values are kept in storage form. The original snapshot is only replaced by
/// [`Attributes::sync_original`], or wholesale on hydration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    current: Record,
    original: Record,
    exists: bool,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes loaded from storage or an external payload.
    ///
    /// Both stores start identical; the instance counts as existing when the
    /// payload carries a non-null `primary_key`.
    pub fn hydrate(record: Record, primary_key: &str) -> Self {
        let exists = record.get(primary_key).is_some_and(|v| !v.is_null());
        Self {
            original: record.clone(),
            current: record,
            exists,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.current.get(key)
    }

    pub fn get_original(&self, key: &str) -> Option<&Value> {
        self.original.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.current.contains_key(key)
    }

    /// Store a value in storage form; the original snapshot is untouched
    pub fn set(&mut self, key: &str, value: Value) {
        self.current.insert(key.to_string(), value);
    }

    /// Remove an attribute from the current store
    pub fn forget(&mut self, key: &str) -> Option<Value> {
        self.current.remove(key)
    }

    pub fn current(&self) -> &Record {
        &self.current
    }

    pub fn original(&self) -> &Record {
        &self.original
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn set_exists(&mut self, exists: bool) {
        self.exists = exists;
    }

    /// Attributes whose current value differs from the original snapshot.
    ///
    /// Keys only present in the original (forgotten since) are reported as NULL.
    pub fn dirty(&self) -> Record {
        let mut dirty: Record = self
            .current
            .iter()
            .filter(|(key, value)| self.original.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        for key in self.original.keys() {
            if !self.current.contains_key(key) {
                dirty.insert(key.clone(), Value::Null);
            }
        }
        dirty
    }

    /// Whether `key` (or any attribute when `None`) is dirty
    pub fn is_dirty(&self, key: Option<&str>) -> bool {
        match key {
            Some(key) => self.current.get(key) != self.original.get(key),
            None => !self.dirty().is_empty(),
        }
    }

    /// Make the current values the new original snapshot
    pub fn sync_original(&mut self) {
        self.original = self.current.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn test_hydrate_sets_both_stores() {
        let attrs = Attributes::hydrate(record! { "id" => 7, "name" => "Ann" }, "id");
        assert!(attrs.exists());
        assert_eq!(attrs.current(), attrs.original());
        assert!(!attrs.is_dirty(None));

        let fresh = Attributes::hydrate(record! { "name" => "Ann" }, "id");
        assert!(!fresh.exists());
        let null_id = Attributes::hydrate(record! { "id" => None::<i64>, "name" => "Ann" }, "id");
        assert!(!null_id.exists());
    }

    #[test]
    fn test_dirty_tracking() {
        let mut attrs = Attributes::hydrate(record! { "id" => 1, "name" => "Ann", "age" => 30 }, "id");
        attrs.set("name", Value::from("Anna"));
        attrs.set("age", Value::from(30));
        attrs.set("email", Value::from("a@example.com"));

        let dirty = attrs.dirty();
        assert_eq!(dirty.len(), 2);
        assert!(dirty.contains_key("name"));
        assert!(dirty.contains_key("email"));
        assert!(attrs.is_dirty(Some("name")));
        assert!(!attrs.is_dirty(Some("age")));

        attrs.sync_original();
        assert!(attrs.dirty().is_empty());
    }

    #[test]
    fn test_forgotten_keys_are_dirty() {
        let mut attrs = Attributes::hydrate(record! { "id" => 1, "name" => "Ann" }, "id");
        attrs.forget("name");
        assert_eq!(attrs.dirty().get("name"), Some(&Value::Null));
    }
}
