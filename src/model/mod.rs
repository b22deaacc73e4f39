//! Active-record models
//!
//! A model wraps one table row. Capabilities are split into traits a concrete
//! model implements selectively:
//!
//! - [`Model`]: typed attribute access with casts, mass assignment, dirty
//!   tracking and serialization (required)
//! - [`Persistence`]: local persistence through the query builder
//! - [`RemoteSync`]: push to a remote API through a [`RemoteClient`], and the
//!   combined local/remote save orchestration
//!
//! Hydration is reflection-free: every model supplies a
//! [`Model::from_attributes`] factory.
//!
//! ```rust,ignore
//! use recordkit::model::{Attributes, CastType, Model, Persistence};
//!
//! struct Post {
//!     attributes: Attributes,
//! }
//!
//! impl Model for Post {
//!     const TABLE: &'static str = "posts";
//!     const TIMESTAMPS: bool = true;
//!
//!     fn fillable() -> &'static [&'static str] {
//!         &["title", "published"]
//!     }
//!
//!     fn casts() -> &'static [(&'static str, CastType)] {
//!         &[("published", CastType::Boolean)]
//!     }
//!
//!     fn from_attributes(attributes: Attributes) -> Self {
//!         Self { attributes }
//!     }
//!
//!     fn attributes(&self) -> &Attributes {
//!         &self.attributes
//!     }
//!
//!     fn attributes_mut(&mut self) -> &mut Attributes {
//!         &mut self.attributes
//!     }
//! }
//!
//! impl Persistence for Post {}
//! ```

mod attributes;
mod cast;
mod persistence;

pub use attributes::Attributes;
pub use cast::{
    cast_from_storage, cast_to_storage, format_datetime, parse_datetime, AttributeValue, CastType,
};
pub use persistence::{
    PersistOutcome, Persistence, PersistenceMode, RemoteAction, RemoteClient, RemoteResponse,
    RemoteSync, SaveOutcome,
};

use crate::database::{Record, Value};
use crate::error::DataResult;
use serde_json::{Map, Value as JsonValue};

/// Attribute storage, casting, mass assignment and dirty tracking for one row
pub trait Model: Sized + Send + Sync {
    /// Backing table
    const TABLE: &'static str;

    /// Identity column
    const PRIMARY_KEY: &'static str = "id";

    /// Maintain `created_at` / `updated_at` on save
    const TIMESTAMPS: bool = false;

    /// Attributes `fill` is allowed to set
    fn fillable() -> &'static [&'static str] {
        &[]
    }

    /// Attributes left out of `to_map` / `to_json`
    fn hidden() -> &'static [&'static str] {
        &[]
    }

    /// Per-attribute casts
    fn casts() -> &'static [(&'static str, CastType)] {
        &[]
    }

    /// Where `save` persists this model
    fn persistence() -> PersistenceMode {
        PersistenceMode::Local
    }

    /// Resource name used with the remote API
    fn resource() -> &'static str {
        Self::TABLE
    }

    /// Computed attributes added to `to_map`
    fn appends(&self) -> Map<String, JsonValue> {
        Map::new()
    }

    /// Construct the model around an attribute store
    fn from_attributes(attributes: Attributes) -> Self;

    fn attributes(&self) -> &Attributes;

    fn attributes_mut(&mut self) -> &mut Attributes;

    // =========================================================================
    // Construction
    // =========================================================================

    /// An empty, not yet persisted instance
    fn new_instance() -> Self {
        Self::from_attributes(Attributes::new())
    }

    /// Instance hydrated from a stored row or raw payload
    fn hydrate(record: Record) -> Self {
        Self::from_attributes(Attributes::hydrate(record, Self::PRIMARY_KEY))
    }

    /// Instance hydrated from a JSON object, e.g. an API response.
    ///
    /// Nested objects and arrays are stored as JSON text.
    fn hydrate_json(payload: &Map<String, JsonValue>) -> Self {
        let record = payload
            .iter()
            .map(|(k, v)| (k.clone(), Value::from_json(v)))
            .collect();
        Self::hydrate(record)
    }

    // =========================================================================
    // Attribute access
    // =========================================================================

    fn cast_for(key: &str) -> Option<CastType> {
        Self::casts()
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, cast)| *cast)
    }

    /// Read an attribute through its cast; missing attributes read as Null
    fn get_attribute(&self, key: &str) -> DataResult<AttributeValue> {
        match self.attributes().get(key) {
            Some(value) => cast_from_storage(key, value, Self::cast_for(key)),
            None => Ok(AttributeValue::Null),
        }
    }

    /// Store an attribute in storage form; the original snapshot is untouched
    fn set_attribute(&mut self, key: &str, value: impl Into<AttributeValue>) -> DataResult<()> {
        let stored = cast_to_storage(key, value.into(), Self::cast_for(key))?;
        self.attributes_mut().set(key, stored);
        Ok(())
    }

    fn is_fillable(key: &str) -> bool {
        Self::fillable().contains(&key)
    }

    /// Mass-assign the fillable subset of `values`; other keys are ignored.
    ///
    /// Values are applied in iteration order. A cast failure stops the fill
    /// and is returned; values applied before it stay set.
    fn fill<K, V, I>(&mut self, values: I) -> DataResult<()>
    where
        K: AsRef<str>,
        V: Into<AttributeValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in values {
            let key = key.as_ref();
            if Self::is_fillable(key) {
                self.set_attribute(key, value)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // State
    // =========================================================================

    fn exists(&self) -> bool {
        self.attributes().exists()
    }

    /// Integer identity, when set
    fn id(&self) -> Option<i64> {
        self.attributes().get(Self::PRIMARY_KEY).and_then(Value::as_i64)
    }

    /// Whether `key` differs from the original snapshot.
    ///
    /// Datetime and JSON attributes compare by their cast value, so
    /// `2024-03-01 12:30:00` and `2024-03-01T12:30:00.000Z` are the same instant.
    fn attribute_changed(&self, key: &str) -> bool {
        let attributes = self.attributes();
        let (current, original) = (attributes.get(key), attributes.get_original(key));
        if current == original {
            return false;
        }
        match (Self::cast_for(key), current, original) {
            (Some(cast @ (CastType::DateTime | CastType::Json)), Some(current), Some(original)) => {
                match (
                    cast_from_storage(key, current, Some(cast)),
                    cast_from_storage(key, original, Some(cast)),
                ) {
                    (Ok(current), Ok(original)) => current != original,
                    _ => true,
                }
            }
            _ => true,
        }
    }

    fn is_dirty(&self, key: Option<&str>) -> bool {
        match key {
            Some(key) => self.attribute_changed(key),
            None => !self.get_dirty().is_empty(),
        }
    }

    fn get_dirty(&self) -> Record {
        let mut dirty = self.attributes().dirty();
        dirty.retain(|key, _| self.attribute_changed(key));
        dirty
    }

    fn sync_original(&mut self) {
        self.attributes_mut().sync_original();
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Visible attributes with casts applied, plus appended attributes.
    ///
    /// An attribute whose cast fails is emitted in storage form.
    fn to_map(&self) -> Map<String, JsonValue> {
        let hidden = Self::hidden();
        let mut map: Map<String, JsonValue> = self
            .attributes()
            .current()
            .iter()
            .filter(|(key, _)| !hidden.contains(&key.as_str()))
            .map(|(key, value)| {
                let json = match cast_from_storage(key, value, Self::cast_for(key)) {
                    Ok(cast) => cast.to_json(),
                    Err(_) => value.to_json(),
                };
                (key.clone(), json)
            })
            .collect();
        map.extend(self.appends());
        map
    }

    fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.to_map())
    }
}
