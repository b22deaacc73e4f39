//! Local and remote persistence for models
//!
//! [`Persistence`] saves through the query builder; [`RemoteSync`] pushes the
//! serialized model to a [`RemoteClient`] and orchestrates both according to
//! the model's [`PersistenceMode`]. Local and remote results are reported
//! separately in a [`SaveOutcome`].

use super::{Attributes, Model};
use crate::database::{ConnectionManager, QueryBuilder, Record, Value};
use crate::error::{DataError, DataResult};
use crate::events::LifecycleEvent;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// Where a model is persisted by [`RemoteSync::save`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistenceMode {
    #[default]
    Local,
    Remote,
    Both,
    /// Transient model, never persisted
    None,
}

impl PersistenceMode {
    pub fn is_local(&self) -> bool {
        matches!(self, PersistenceMode::Local | PersistenceMode::Both)
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, PersistenceMode::Remote | PersistenceMode::Both)
    }
}

/// Result of one persistence target
#[derive(Debug)]
pub enum PersistOutcome {
    /// Target not configured for this model
    Skipped,
    Saved,
    Failed(DataError),
}

impl PersistOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, PersistOutcome::Saved)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PersistOutcome::Failed(_))
    }

    pub fn error(&self) -> Option<&DataError> {
        match self {
            PersistOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DataResult<()>> for PersistOutcome {
    fn from(result: DataResult<()>) -> Self {
        match result {
            Ok(()) => PersistOutcome::Saved,
            Err(e) => PersistOutcome::Failed(e),
        }
    }
}

/// Combined result of a save or destroy
#[derive(Debug)]
pub struct SaveOutcome {
    pub local: PersistOutcome,
    pub remote: PersistOutcome,
    /// Payload returned by the remote API, if it answered
    pub response: Option<JsonValue>,
}

impl Default for SaveOutcome {
    fn default() -> Self {
        Self {
            local: PersistOutcome::Skipped,
            remote: PersistOutcome::Skipped,
            response: None,
        }
    }
}

impl SaveOutcome {
    /// No configured target failed
    pub fn is_success(&self) -> bool {
        !self.local.is_failed() && !self.remote.is_failed()
    }

    pub fn saved_locally(&self) -> bool {
        self.local.is_saved()
    }

    /// Stored locally while the remote push failed and still has to happen
    pub fn remote_pending(&self) -> bool {
        self.local.is_saved() && self.remote.is_failed()
    }
}

// =============================================================================
// Local persistence
// =============================================================================

/// Local persistence through the query builder.
///
/// Every method has a default body; implementing the trait is an opt-in:
///
/// ```rust,ignore
/// impl Persistence for Post {}
/// ```
pub trait Persistence: Model {
    /// Query builder on the model's table
    fn query(db: &ConnectionManager) -> QueryBuilder<'_> {
        db.table(Self::TABLE)
    }

    fn find(db: &ConnectionManager, id: i64) -> DataResult<Option<Self>> {
        let row = Self::query(db).where_eq(Self::PRIMARY_KEY, id).first()?;
        Ok(row.map(Self::hydrate))
    }

    fn all(db: &ConnectionManager) -> DataResult<Vec<Self>> {
        Self::get(&Self::query(db))
    }

    /// Run `query` and hydrate every row
    fn get(query: &QueryBuilder<'_>) -> DataResult<Vec<Self>> {
        Ok(query.get()?.into_iter().map(Self::hydrate).collect())
    }

    /// INSERT a new instance or UPDATE the dirty attributes of an existing one.
    ///
    /// An instance that carries an identity without a stored row (hydrated from
    /// an API payload, say) is inserted under that identity. An existing
    /// instance without dirty attributes whose row is present is left alone.
    /// On success the original snapshot is re-synced.
    fn save_local(&mut self, db: &ConnectionManager) -> DataResult<()> {
        let stored = match self.id() {
            Some(id) if self.exists() => Self::query(db)
                .where_eq(Self::PRIMARY_KEY, id)
                .exists()?,
            _ => false,
        };
        if stored {
            update_local(self, db)
        } else {
            insert_local(self, db)
        }
    }

    /// DELETE the row by identity; returns whether a row was removed
    fn delete_local(&mut self, db: &ConnectionManager) -> DataResult<bool> {
        let id = self
            .id()
            .ok_or_else(|| DataError::MissingIdentity(Self::TABLE.to_string()))?;

        let deleted = Self::query(db).where_eq(Self::PRIMARY_KEY, id).delete()?;
        self.attributes_mut().set_exists(false);
        if deleted == 0 {
            return Ok(false);
        }
        db.emit(LifecycleEvent::Deleted {
            table: Self::TABLE.to_string(),
            id,
        });
        Ok(true)
    }

    /// Reload attributes from storage, discarding unsaved changes.
    ///
    /// Returns `false` when the row no longer exists; the instance is then
    /// marked as new.
    fn refresh(&mut self, db: &ConnectionManager) -> DataResult<bool> {
        let id = self
            .id()
            .ok_or_else(|| DataError::MissingIdentity(Self::TABLE.to_string()))?;

        match Self::query(db).where_eq(Self::PRIMARY_KEY, id).first()? {
            Some(row) => {
                *self.attributes_mut() = Attributes::hydrate(row, Self::PRIMARY_KEY);
                Ok(true)
            }
            None => {
                self.attributes_mut().set_exists(false);
                Ok(false)
            }
        }
    }
}

fn touch<M: Model>(model: &mut M, creating: bool) -> DataResult<()> {
    if !M::TIMESTAMPS {
        return Ok(());
    }
    let now = Utc::now();
    if creating && model.attributes().get(CREATED_AT).map_or(true, Value::is_null) {
        model.set_attribute(CREATED_AT, now)?;
    }
    model.set_attribute(UPDATED_AT, now)
}

fn insert_local<M: Persistence>(model: &mut M, db: &ConnectionManager) -> DataResult<()> {
    let table = M::TABLE.to_string();
    db.emit(LifecycleEvent::Saving {
        table: table.clone(),
    });
    touch(model, true)?;
    db.emit(LifecycleEvent::Creating {
        table: table.clone(),
    });

    let mut data: Record = model.attributes().current().clone();
    if data.get(M::PRIMARY_KEY).is_some_and(Value::is_null) {
        data.remove(M::PRIMARY_KEY);
    }
    let rowid = M::query(db).insert(&data)?;

    let id = match model.id() {
        Some(id) => id,
        None => {
            model.attributes_mut().set(M::PRIMARY_KEY, Value::Integer(rowid));
            rowid
        }
    };
    model.attributes_mut().set_exists(true);
    model.sync_original();
    debug!("inserted {} #{}", table, id);

    db.emit(LifecycleEvent::Created {
        table: table.clone(),
        id,
    });
    db.emit(LifecycleEvent::Saved { table });
    Ok(())
}

fn update_local<M: Persistence>(model: &mut M, db: &ConnectionManager) -> DataResult<()> {
    if !model.is_dirty(None) {
        return Ok(());
    }
    let id = model
        .id()
        .ok_or_else(|| DataError::MissingIdentity(M::TABLE.to_string()))?;

    let table = M::TABLE.to_string();
    db.emit(LifecycleEvent::Saving {
        table: table.clone(),
    });
    touch(model, false)?;
    db.emit(LifecycleEvent::Updating {
        table: table.clone(),
        id,
    });

    let mut dirty = model.get_dirty();
    dirty.remove(M::PRIMARY_KEY);
    if !dirty.is_empty() {
        let updated = M::query(db).where_eq(M::PRIMARY_KEY, id).update(&dirty)?;
        if updated == 0 {
            // deleted since the existence check
            return Err(DataError::RowNotFound { table, id });
        }
    }
    model.sync_original();
    debug!("updated {} #{} ({} attributes)", table, id, dirty.len());

    db.emit(LifecycleEvent::Updated {
        table: table.clone(),
        id,
    });
    db.emit(LifecycleEvent::Saved { table });
    Ok(())
}

// =============================================================================
// Remote persistence
// =============================================================================

/// What the remote API is asked to do with a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteAction {
    Create,
    Update,
    Delete,
}

/// Answer of the remote API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<JsonValue>,
    #[serde(default)]
    pub message: Option<String>,
}

impl RemoteResponse {
    pub fn ok(data: JsonValue) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Transport-agnostic remote API client
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn send(
        &self,
        resource: &str,
        action: RemoteAction,
        payload: JsonValue,
    ) -> DataResult<RemoteResponse>;
}

/// Push a model to the remote API and orchestrate local and remote persistence.
///
/// In [`PersistenceMode::Both`] both targets are attempted independently; a
/// local failure does not prevent the remote push and vice versa.
#[async_trait]
pub trait RemoteSync: Persistence {
    /// Send the serialized model; a rejected request becomes [`DataError::Remote`]
    async fn push(
        &self,
        remote: &dyn RemoteClient,
        action: RemoteAction,
    ) -> DataResult<Option<JsonValue>> {
        let payload = match action {
            RemoteAction::Delete => {
                let mut key = Map::new();
                key.insert(
                    Self::PRIMARY_KEY.to_string(),
                    self.id().map_or(JsonValue::Null, JsonValue::from),
                );
                JsonValue::Object(key)
            }
            _ => self.to_json(),
        };

        let response = remote.send(Self::resource(), action, payload).await?;
        if !response.success {
            return Err(DataError::Remote {
                resource: Self::resource().to_string(),
                message: response
                    .message
                    .unwrap_or_else(|| format!("{:?} rejected", action)),
            });
        }
        Ok(response.data)
    }

    /// Save according to [`Model::persistence`]
    async fn save(&mut self, db: &ConnectionManager, remote: &dyn RemoteClient) -> SaveOutcome {
        let mode = Self::persistence();
        let was_new = !self.exists();
        let mut outcome = SaveOutcome::default();

        if mode.is_local() {
            outcome.local = self.save_local(db).into();
        }

        if mode.is_remote() {
            let action = if was_new {
                RemoteAction::Create
            } else {
                RemoteAction::Update
            };
            match self.push(remote, action).await {
                Ok(data) => {
                    // The remote copy is the only one, so its acceptance makes
                    // the instance persisted whether or not a body came back
                    if mode == PersistenceMode::Remote {
                        if let Some(JsonValue::Object(fields)) = &data {
                            if let Err(e) = apply_remote_fields(self, fields) {
                                warn!("{}: remote response not applied: {}", Self::TABLE, e);
                            }
                        }
                        self.attributes_mut().set_exists(true);
                        self.sync_original();
                    }
                    outcome.remote = PersistOutcome::Saved;
                    outcome.response = data;
                }
                Err(e) => outcome.remote = PersistOutcome::Failed(e),
            }
        }

        outcome
    }

    /// Delete according to [`Model::persistence`]
    async fn destroy(&mut self, db: &ConnectionManager, remote: &dyn RemoteClient) -> SaveOutcome {
        let mode = Self::persistence();
        let mut outcome = SaveOutcome::default();

        if self.id().is_none() && mode != PersistenceMode::None {
            let missing = || DataError::MissingIdentity(Self::TABLE.to_string());
            if mode.is_local() {
                outcome.local = PersistOutcome::Failed(missing());
            }
            if mode.is_remote() {
                outcome.remote = PersistOutcome::Failed(missing());
            }
            return outcome;
        }

        if mode.is_local() {
            outcome.local = self.delete_local(db).map(|_| ()).into();
        }
        if mode.is_remote() {
            match self.push(remote, RemoteAction::Delete).await {
                Ok(data) => {
                    self.attributes_mut().set_exists(false);
                    outcome.remote = PersistOutcome::Saved;
                    outcome.response = data;
                }
                Err(e) => outcome.remote = PersistOutcome::Failed(e),
            }
        }
        outcome
    }
}

/// Take the identity from a remote answer and mass-assign the rest.
///
/// Only fillable attributes are applied, the response is an untrusted payload.
fn apply_remote_fields<M: Model>(model: &mut M, fields: &Map<String, JsonValue>) -> DataResult<()> {
    if let Some(id) = fields.get(M::PRIMARY_KEY).and_then(JsonValue::as_i64) {
        model.attributes_mut().set(M::PRIMARY_KEY, Value::Integer(id));
    }
    model.fill(fields.iter().map(|(k, v)| (k.as_str(), v.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Schema;
    use crate::events::RecordingEventSink;
    use crate::model::tests::User;
    use crate::model::{AttributeValue, CastType};
    use crate::record;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    impl Persistence for User {}
    impl RemoteSync for User {}

    macro_rules! synced_model {
        ($name:ident, $table:literal, $mode:expr) => {
            struct $name {
                attributes: Attributes,
            }

            impl Model for $name {
                const TABLE: &'static str = $table;

                fn fillable() -> &'static [&'static str] {
                    &["title", "done"]
                }

                fn casts() -> &'static [(&'static str, CastType)] {
                    &[("done", CastType::Boolean)]
                }

                fn persistence() -> PersistenceMode {
                    $mode
                }

                fn from_attributes(attributes: Attributes) -> Self {
                    Self { attributes }
                }

                fn attributes(&self) -> &Attributes {
                    &self.attributes
                }

                fn attributes_mut(&mut self) -> &mut Attributes {
                    &mut self.attributes
                }
            }

            impl Persistence for $name {}
            impl RemoteSync for $name {}
        };
    }

    synced_model!(Task, "tasks", PersistenceMode::Both);
    synced_model!(Ticket, "tickets", PersistenceMode::Remote);
    synced_model!(Draft, "drafts", PersistenceMode::None);

    #[derive(Default)]
    struct MockRemote {
        reject: bool,
        /// Body of successful answers; `None` answers without data
        reply: Option<JsonValue>,
        calls: Mutex<Vec<(String, RemoteAction, JsonValue)>>,
    }

    impl MockRemote {
        fn replying(reply: JsonValue) -> Self {
            Self {
                reply: Some(reply),
                ..Default::default()
            }
        }

        fn rejecting() -> Self {
            Self {
                reject: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<(String, RemoteAction, JsonValue)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteClient for MockRemote {
        async fn send(
            &self,
            resource: &str,
            action: RemoteAction,
            payload: JsonValue,
        ) -> DataResult<RemoteResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((resource.to_string(), action, payload));
            if self.reject {
                return Ok(RemoteResponse::failed("service unavailable"));
            }
            Ok(RemoteResponse {
                success: true,
                data: self.reply.clone(),
                message: None,
            })
        }
    }

    fn setup() -> ConnectionManager {
        let db = ConnectionManager::open_in_memory().unwrap();
        let schema = Schema::new(&db);
        schema
            .create("users", |t| {
                t.id();
                t.string("name");
                t.string("email").nullable();
                t.integer("age").nullable();
                t.boolean("active").default_value(true);
                t.timestamps();
            })
            .unwrap();
        schema
            .create("tasks", |t| {
                t.id();
                t.string("title");
                t.boolean("done").default_value(false);
            })
            .unwrap();
        db
    }

    #[test]
    fn test_save_local_inserts_then_updates() {
        let sink = Arc::new(RecordingEventSink::new());
        let db = setup().with_events(sink.clone());

        let mut user = User::new_instance();
        user.fill([("name", "Alice"), ("email", "alice@example.com")])
            .unwrap();
        user.save_local(&db).unwrap();

        assert!(user.exists());
        let id = user.id().unwrap();
        assert!(!user.is_dirty(None));
        assert!(user.get_attribute(CREATED_AT).unwrap().as_datetime().is_some());

        user.set_attribute("age", 31).unwrap();
        user.save_local(&db).unwrap();

        let stored = User::find(&db, id).unwrap().unwrap();
        assert_eq!(stored.get_attribute("age").unwrap(), AttributeValue::Integer(31));
        assert_eq!(stored.get_attribute("name").unwrap(), AttributeValue::from("Alice"));
        assert_eq!(stored.get_attribute("active").unwrap(), AttributeValue::Bool(true));

        let events = sink.events();
        assert!(events.contains(&LifecycleEvent::Created {
            table: "users".into(),
            id
        }));
        assert!(events.contains(&LifecycleEvent::Updated {
            table: "users".into(),
            id
        }));
    }

    #[test]
    fn test_clean_model_is_not_updated() {
        let sink = Arc::new(RecordingEventSink::new());
        let db = setup().with_events(sink.clone());
        db.table("users")
            .insert(&record! { "name" => "Bob", "age" => 40 })
            .unwrap();

        let mut bob = User::all(&db).unwrap().pop().unwrap();
        bob.save_local(&db).unwrap();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_delete_and_refresh() {
        let db = setup();
        let mut user = User::new_instance();
        user.fill([("name", "Carol")]).unwrap();
        user.save_local(&db).unwrap();

        user.set_attribute("name", "Changed").unwrap();
        assert!(user.refresh(&db).unwrap());
        assert_eq!(user.get_attribute("name").unwrap(), AttributeValue::from("Carol"));

        assert!(user.delete_local(&db).unwrap());
        assert!(!user.exists());
        assert_eq!(db.table("users").count().unwrap(), 0);

        let mut fresh = User::new_instance();
        assert!(matches!(
            fresh.delete_local(&db),
            Err(DataError::MissingIdentity(_))
        ));
    }

    #[test]
    fn test_identity_without_row_is_inserted() {
        let db = setup();
        let payload = json!({"id": 77, "name": "FromApi"});
        let mut user = User::hydrate_json(payload.as_object().unwrap());
        assert!(user.exists());

        user.set_attribute("name", "Edited").unwrap();
        user.save_local(&db).unwrap();
        assert!(!user.is_dirty(None));
        assert_eq!(db.table("users").count().unwrap(), 1);
        let stored = User::find(&db, 77).unwrap().unwrap();
        assert_eq!(stored.get_attribute("name").unwrap(), AttributeValue::from("Edited"));

        // a clean copy of another remote row is written as well
        let payload = json!({"id": 78, "name": "Untouched"});
        let mut clean = User::hydrate_json(payload.as_object().unwrap());
        clean.save_local(&db).unwrap();
        assert!(User::find(&db, 78).unwrap().is_some());
    }

    #[test]
    fn test_deleting_missing_row_emits_nothing() {
        let sink = Arc::new(RecordingEventSink::new());
        let db = setup().with_events(sink.clone());
        let mut ghost = User::hydrate(record! { "id" => 5, "name" => "Ghost" });

        assert!(!ghost.delete_local(&db).unwrap());
        assert!(!ghost.exists());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_query_helpers_hydrate_models() {
        let db = setup();
        db.table("users")
            .insert_all(&[
                record! { "name" => "Alice", "age" => 25 },
                record! { "name" => "Bob", "age" => 35 },
            ])
            .unwrap();

        let older = User::get(&User::query(&db).where_op(
            "age",
            crate::database::Operator::Gt,
            30,
        ))
        .unwrap();
        assert_eq!(older.len(), 1);
        assert!(older[0].exists());
        assert_eq!(older[0].get_attribute("name").unwrap(), AttributeValue::from("Bob"));
        assert!(User::find(&db, 999).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_both_mode_reports_independent_outcomes() {
        let db = setup();
        let remote = MockRemote::rejecting();

        let mut task = Task::new_instance();
        task.fill([("title", "write docs")]).unwrap();
        let outcome = task.save(&db, &remote).await;

        assert!(outcome.saved_locally());
        assert!(outcome.remote_pending());
        assert!(!outcome.is_success());
        assert!(matches!(
            outcome.remote.error(),
            Some(DataError::Remote { resource, .. }) if resource == "tasks"
        ));
        assert_eq!(db.table("tasks").count().unwrap(), 1);

        let calls = remote.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, RemoteAction::Create);
        assert_eq!(calls[0].2["title"], json!("write docs"));
    }

    #[tokio::test]
    async fn test_both_mode_full_success_then_update() {
        let db = setup();
        let remote = MockRemote::replying(json!({"id": 500, "title": "ignored"}));

        let mut task = Task::new_instance();
        task.fill([("title", "ship")]).unwrap();
        let outcome = task.save(&db, &remote).await;
        assert!(outcome.is_success());
        assert!(!outcome.remote_pending());
        assert_eq!(outcome.response, Some(json!({"id": 500, "title": "ignored"})));
        // local identity wins in Both mode
        assert_ne!(task.id(), Some(500));

        task.set_attribute("done", true).unwrap();
        let outcome = task.save(&db, &remote).await;
        assert!(outcome.is_success());
        assert_eq!(remote.calls()[1].1, RemoteAction::Update);
        assert_eq!(remote.calls()[1].2["done"], json!(true));
    }

    #[tokio::test]
    async fn test_local_failure_still_pushes_remote() {
        let db = ConnectionManager::open_in_memory().unwrap();
        let remote = MockRemote::replying(json!({}));

        let mut task = Task::new_instance();
        task.fill([("title", "no table")]).unwrap();
        let outcome = task.save(&db, &remote).await;

        assert!(outcome.local.is_failed());
        assert!(outcome.remote.is_saved());
        assert!(!outcome.is_success());
        assert!(!outcome.remote_pending());
    }

    #[tokio::test]
    async fn test_remote_mode_applies_response() {
        let db = ConnectionManager::open_in_memory().unwrap();
        let remote = MockRemote::replying(json!({"id": 42, "title": "Filed", "owner": "root"}));

        let mut ticket = Ticket::new_instance();
        ticket.fill([("title", "Broken link")]).unwrap();
        let outcome = ticket.save(&db, &remote).await;

        assert!(matches!(outcome.local, PersistOutcome::Skipped));
        assert!(outcome.is_success());
        assert!(ticket.exists());
        assert_eq!(ticket.id(), Some(42));
        assert_eq!(ticket.get_attribute("title").unwrap(), AttributeValue::from("Filed"));
        assert!(!ticket.attributes().contains("owner"));
        assert!(!ticket.is_dirty(None));

        let outcome = ticket.destroy(&db, &remote).await;
        assert!(outcome.is_success());
        let calls = remote.calls();
        assert_eq!(calls[1].1, RemoteAction::Delete);
        assert_eq!(calls[1].2, json!({"id": 42}));
        assert!(!ticket.exists());
    }

    #[tokio::test]
    async fn test_remote_mode_without_body_marks_persisted() {
        let db = ConnectionManager::open_in_memory().unwrap();
        let remote = MockRemote::default();

        let mut ticket = Ticket::new_instance();
        ticket.fill([("title", "Typo on homepage")]).unwrap();
        let outcome = ticket.save(&db, &remote).await;
        assert!(outcome.is_success());
        assert!(outcome.response.is_none());
        assert!(ticket.exists());
        assert!(!ticket.is_dirty(None));

        ticket.set_attribute("done", true).unwrap();
        ticket.save(&db, &remote).await;
        let actions: Vec<RemoteAction> = remote.calls().iter().map(|c| c.1).collect();
        assert_eq!(actions, vec![RemoteAction::Create, RemoteAction::Update]);
    }

    #[tokio::test]
    async fn test_none_mode_skips_everything() {
        let db = ConnectionManager::open_in_memory().unwrap();
        let remote = MockRemote::default();

        let mut draft = Draft::new_instance();
        draft.fill([("title", "scratch")]).unwrap();
        let outcome = draft.save(&db, &remote).await;

        assert!(outcome.is_success());
        assert!(!outcome.saved_locally());
        assert!(matches!(outcome.remote, PersistOutcome::Skipped));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_destroy_without_identity() {
        let db = setup();
        let remote = MockRemote::default();
        let mut task = Task::new_instance();

        let outcome = task.destroy(&db, &remote).await;
        assert!(matches!(
            outcome.local.error(),
            Some(DataError::MissingIdentity(_))
        ));
        assert!(outcome.remote.is_failed());
        assert!(remote.calls().is_empty());
    }
}
