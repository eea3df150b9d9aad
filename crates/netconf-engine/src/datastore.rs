//! Datastore: lock state machine and edit/copy/get orchestration
//!
//! A datastore is either unlocked or locked by one session. The lock state
//! sits behind a mutex that edits and copies also hold, so a lock cannot be
//! granted halfway through an edit. The config tree sits behind a
//! reader/writer lock: an edit holds the write side while it applies,
//! validates and (on failure) rolls back, so readers only ever see the tree
//! before or after an edit.
//!
//! Edit pipeline: apply → derive change events → group by subsystem →
//! permission check → validate (applying implied edits) → commit or roll
//! back → notify subsystems → publish the config-change notification.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use netconf_core::aggregator::Aggregator;
use netconf_core::cache::ResponseCache;
use netconf_core::change::{derive_change_events, ChangeEvent};
use netconf_core::change_router::{
    refine_config_change_notification, ChangeRouter, ConfigChangeNotification, ConfigChangeSink,
    NotificationMapping,
};
use netconf_core::edit::{DefaultOperation, EditConfigRequest, EditContainmentNode};
use netconf_core::errors::{NetconfError, Result};
use netconf_core::filter::{build_merged_filter, FilterNode};
use netconf_core::schema::{SchemaLookup, SchemaPath};
use netconf_core::state::StateWalker;
use netconf_core::subsystem::SubsystemRegistry;
use netconf_core::validator::Validator;
use netconf_core::xml::{Element, QName, NETCONF_BASE_NS};
use netconf_core_types::{ClientInfo, SessionId};
use parking_lot::{Mutex, RwLock};

use crate::config::DatastoreConfig;

/// Lock owner plus the commit flags that block new locks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockState {
    pub owner: Option<SessionId>,
    pub confirmed_commit_pending: bool,
    pub has_uncommitted_changes: bool,
}

/// Filter fragments and depth of a `get` / `get-config`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataQuery {
    /// Subtree filter content; `None` means no filter (everything)
    pub filter: Option<Vec<Element>>,
    /// Levels to return, counting top-level elements as 1; `None` or 0 is unbounded
    pub depth: Option<u32>,
}

impl DataQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, fragments: Vec<Element>) -> Self {
        self.filter = Some(fragments);
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }
}

/// What an edit did
#[derive(Debug, Clone)]
pub struct EditOutcome {
    /// Edit trees as the aggregator applied them
    pub applied: Vec<EditContainmentNode>,
    pub events: Vec<ChangeEvent>,
    /// Events caused by validator-implied edits
    pub implied_events: Vec<ChangeEvent>,
    pub notifications: NotificationMapping,
}

impl EditOutcome {
    pub fn is_noop(&self) -> bool {
        self.events.is_empty() && self.implied_events.is_empty()
    }
}

pub struct Datastore {
    config: DatastoreConfig,
    lock: Mutex<LockState>,
    tree: RwLock<Box<dyn Aggregator>>,
    schema: Arc<dyn SchemaLookup>,
    router: ChangeRouter,
    validator: Option<Arc<dyn Validator>>,
    sink: Option<Arc<dyn ConfigChangeSink>>,
}

impl Datastore {
    pub fn new(
        config: DatastoreConfig,
        aggregator: Box<dyn Aggregator>,
        schema: Arc<dyn SchemaLookup>,
        registry: Arc<SubsystemRegistry>,
    ) -> Self {
        Self {
            config,
            lock: Mutex::new(LockState::default()),
            tree: RwLock::new(aggregator),
            schema,
            router: ChangeRouter::new(registry),
            validator: None,
            sink: None,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ConfigChangeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &DatastoreConfig {
        &self.config
    }

    pub fn lock_state(&self) -> LockState {
        self.lock.lock().clone()
    }

    pub fn lock_owner(&self) -> Option<SessionId> {
        self.lock.lock().owner
    }

    // ===== Locking =====

    /// Take the lock for `session_id`
    ///
    /// A session already holding the lock may take it again.
    ///
    /// # Errors
    ///
    /// `LockDeniedUncommittedChanges`, `LockDeniedConfirmedCommit`, or
    /// `LockedByOtherSession`, checked in that order.
    pub fn lock(&self, session_id: SessionId) -> Result<()> {
        let mut state = self.lock.lock();
        if state.has_uncommitted_changes {
            return Err(NetconfError::LockDeniedUncommittedChanges {
                datastore: self.name().to_string(),
            });
        }
        if state.confirmed_commit_pending {
            return Err(NetconfError::LockDeniedConfirmedCommit {
                datastore: self.name().to_string(),
            });
        }
        match state.owner {
            Some(owner) if owner != session_id => Err(NetconfError::LockedByOtherSession {
                datastore: self.name().to_string(),
                owner,
                operation: "lock".to_string(),
            }),
            _ => {
                state.owner = Some(session_id);
                tracing::debug!(datastore = self.name(), session_id, "datastore locked");
                Ok(())
            }
        }
    }

    /// Release the lock held by `session_id`
    ///
    /// # Errors
    ///
    /// `LockedByOtherSession` when another session holds the lock,
    /// `NotLockedBySession` when nobody does.
    pub fn unlock(&self, session_id: SessionId) -> Result<()> {
        let mut state = self.lock.lock();
        match state.owner {
            Some(owner) if owner == session_id => {
                state.owner = None;
                tracing::debug!(datastore = self.name(), session_id, "datastore unlocked");
                Ok(())
            }
            Some(owner) => Err(NetconfError::LockedByOtherSession {
                datastore: self.name().to_string(),
                owner,
                operation: "unlock".to_string(),
            }),
            None => Err(NetconfError::NotLockedBySession {
                datastore: self.name().to_string(),
                session_id,
            }),
        }
    }

    /// Drop the lock of a terminated session; returns whether it held one
    pub fn release_session(&self, session_id: SessionId) -> bool {
        let mut state = self.lock.lock();
        if state.owner == Some(session_id) {
            state.owner = None;
            tracing::debug!(
                datastore = self.name(),
                session_id,
                "lock released with session"
            );
            true
        } else {
            false
        }
    }

    // ===== Commit hooks =====

    pub fn set_confirmed_commit_pending(&self, pending: bool) {
        self.lock.lock().confirmed_commit_pending = pending;
    }

    pub fn set_uncommitted_changes(&self, dirty: bool) {
        self.lock.lock().has_uncommitted_changes = dirty;
    }

    /// The datastore's content was committed; new locks are possible again
    pub fn mark_committed(&self) {
        self.lock.lock().has_uncommitted_changes = false;
    }

    // ===== Edit =====

    /// Apply an edit-config
    ///
    /// # Errors
    ///
    /// `LockedByOtherSession` when another session holds the lock, any
    /// edit-model error from the aggregator, `AccessDenied` from a subsystem,
    /// or `Validation` when the validator rejects the result. The tree is
    /// unchanged after any error.
    pub fn edit(&self, request: &EditConfigRequest, client: &ClientInfo) -> Result<EditOutcome> {
        let mut state = self.lock.lock();
        self.check_writable(&state, client.session_id, "edit-config")?;
        let outcome = self.apply_locked(request, client)?;
        if self.config.track_uncommitted_changes && !outcome.is_noop() {
            state.has_uncommitted_changes = true;
        }
        Ok(outcome)
    }

    /// Replace this datastore's content with `source`'s
    ///
    /// # Errors
    ///
    /// The locking errors of [`Self::edit`]; `CopyConfig` carrying the
    /// source's error when reading the source fails.
    pub fn copy_from(&self, client: &ClientInfo, source: &Datastore) -> Result<EditOutcome> {
        let mut state = self.lock.lock();
        self.check_writable(&state, client.session_id, "copy-config")?;
        let content = source
            .get_config(&DataQuery::all())
            .map_err(|err| NetconfError::copy_config(err.into()))?;
        let outcome = self.copy_locked(client, content)?;
        if self.config.track_uncommitted_changes && !outcome.is_noop() {
            state.has_uncommitted_changes = true;
        }
        Ok(outcome)
    }

    /// Replace this datastore's content with inline config
    ///
    /// # Errors
    ///
    /// As [`Self::edit`].
    pub fn copy_from_content(
        &self,
        client: &ClientInfo,
        content: Vec<Element>,
    ) -> Result<EditOutcome> {
        let mut state = self.lock.lock();
        self.check_writable(&state, client.session_id, "copy-config")?;
        let outcome = self.copy_locked(client, content)?;
        if self.config.track_uncommitted_changes && !outcome.is_noop() {
            state.has_uncommitted_changes = true;
        }
        Ok(outcome)
    }

    fn check_writable(&self, state: &LockState, session_id: SessionId, operation: &str) -> Result<()> {
        match state.owner {
            Some(owner) if owner != session_id => Err(NetconfError::LockedByOtherSession {
                datastore: self.name().to_string(),
                owner,
                operation: operation.to_string(),
            }),
            _ => Ok(()),
        }
    }

    // Copy as one edit: replace every source element, delete every current
    // top-level element the source does not have. Subsystems see the copy
    // like any other edit.
    fn copy_locked(&self, client: &ClientInfo, content: Vec<Element>) -> Result<EditOutcome> {
        let current = self.tree.read().get_config(None)?;
        let incoming: Vec<Option<QName>> = content
            .iter()
            .map(|element| self.resolved_qname(element))
            .collect();

        let mut config: Vec<Element> = current
            .into_iter()
            .filter(|existing| {
                !content
                    .iter()
                    .zip(&incoming)
                    .any(|(element, qname)| self.same_top_level(existing, element, qname.as_ref()))
            })
            .map(|existing| existing.with_attribute(Some(NETCONF_BASE_NS), "operation", "delete"))
            .collect();
        config.extend(content);

        let request = EditConfigRequest::new(self.name(), config)
            .with_default_operation(DefaultOperation::Replace);
        self.apply_locked(&request, client)
    }

    fn resolved_qname(&self, element: &Element) -> Option<QName> {
        let namespace = match element.namespace.as_deref().filter(|ns| !ns.is_empty()) {
            Some(namespace) => namespace.to_string(),
            None => self.schema.namespace_for(element.prefix.as_deref()?)?,
        };
        Some(QName::new(namespace, element.name.clone()))
    }

    fn same_top_level(&self, existing: &Element, incoming: &Element, qname: Option<&QName>) -> bool {
        let Some(qname) = qname else {
            return false;
        };
        existing.qname() == *qname
            && self
                .schema
                .list_keys(&SchemaPath::root().child(qname.clone()))
                .iter()
                .all(|key| {
                    let wanted = incoming
                        .children
                        .iter()
                        .find(|child| child.name == key.local_name)
                        .and_then(Element::text_content);
                    existing.child_text(key) == wanted
                })
    }

    // Caller holds the lock-state mutex
    fn apply_locked(&self, request: &EditConfigRequest, client: &ClientInfo) -> Result<EditOutcome> {
        let mut tree = self.tree.write();
        let snapshot = tree.get_config(None)?;

        // A panic in the validator or a subsystem still restores the snapshot
        // before unwinding on to the request boundary
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            self.apply_edit(&mut **tree, request, client)
        }));
        let (outcome, notification) = match attempt {
            Ok(Ok(done)) => done,
            Ok(Err(err)) => {
                self.roll_back(&mut **tree, snapshot);
                tracing::debug!(datastore = self.name(), error = %err, "edit rolled back");
                return Err(err);
            }
            Err(payload) => {
                self.roll_back(&mut **tree, snapshot);
                tracing::debug!(datastore = self.name(), "edit rolled back after panic");
                panic::resume_unwind(payload);
            }
        };
        // Subsystems may read the datastore while handling notifications
        drop(tree);

        if self.config.notify_subsystems {
            self.router.send_notifications(&outcome.notifications);
        }
        if let Some(sink) = &self.sink {
            if !notification.is_empty() {
                sink.publish(&refine_config_change_notification(notification));
            }
        }
        Ok(outcome)
    }

    fn roll_back(&self, tree: &mut dyn Aggregator, snapshot: Vec<Element>) {
        if let Err(rollback) = tree.replace_all(snapshot) {
            tracing::error!(
                datastore = self.name(),
                error = %rollback,
                "rollback after failed edit did not complete"
            );
        }
    }

    fn apply_edit(
        &self,
        tree: &mut dyn Aggregator,
        request: &EditConfigRequest,
        client: &ClientInfo,
    ) -> Result<(EditOutcome, ConfigChangeNotification)> {
        let applied = tree.edit_config(request)?;
        let events = derive_change_events(&applied);
        let mut notifications = self.router.group_by_subsystem(self.name(), &events, request);
        self.router
            .check_permissions(&notifications, client, "edit-config")?;

        let mut notification = ConfigChangeNotification::new(self.name(), client);
        notification.add_edits(&events, request.implied, self.schema.as_ref());

        let mut implied_events = Vec::new();
        if let Some(validator) = self.validator.as_ref().filter(|_| self.config.post_edit_validation) {
            let implied = validator
                .validate(&*tree, &applied, request, client)
                .map_err(NetconfError::validation)?;
            for implied_request in implied {
                let implied_request = implied_request.implied();
                let implied_applied = tree.edit_config(&implied_request)?;
                let events = derive_change_events(&implied_applied);
                notifications.extend(self.router.group_by_subsystem(
                    self.name(),
                    &events,
                    &implied_request,
                ));
                notification.add_edits(&events, true, self.schema.as_ref());
                implied_events.extend(events);
            }
        }

        tracing::debug!(
            datastore = self.name(),
            events = events.len(),
            implied = implied_events.len(),
            subsystems = notifications.batches().len(),
            "edit applied"
        );
        Ok((
            EditOutcome {
                applied,
                events,
                implied_events,
                notifications,
            },
            notification,
        ))
    }

    // ===== Retrieval =====

    /// Config data selected by the query
    ///
    /// # Errors
    ///
    /// `MalformedFilter` (or a filter merge error) for bad filter content;
    /// backend errors from the aggregator.
    pub fn get_config(&self, query: &DataQuery) -> Result<Vec<Element>> {
        let filter = self.resolve_filter(query)?;
        let mut data = self.tree.read().get_config(filter.as_ref())?;
        prune(&mut data, query.depth);
        Ok(data)
    }

    /// Config and state data selected by the query
    ///
    /// State comes from the owning subsystems through `cache`, which must
    /// belong to the current request.
    ///
    /// # Errors
    ///
    /// As [`Self::get_config`], plus `AccessDenied` and `Subsystem` errors
    /// from state retrieval.
    pub fn get(
        &self,
        query: &DataQuery,
        client: &ClientInfo,
        cache: &mut ResponseCache,
    ) -> Result<Vec<Element>> {
        let filter = self.resolve_filter(query)?;
        let mut data = self.tree.read().get_config(filter.as_ref())?;
        StateWalker::new(self.schema.as_ref(), self.router.registry(), client).populate(
            &mut data,
            filter.as_ref(),
            cache,
        )?;
        prune(&mut data, query.depth);
        Ok(data)
    }

    fn resolve_filter(&self, query: &DataQuery) -> Result<Option<FilterNode>> {
        let Some(fragments) = &query.filter else {
            return Ok(None);
        };
        let mut root = FilterNode::root();
        build_merged_filter(&mut root, fragments, self.schema.as_ref())?;
        Ok(Some(root))
    }
}

impl std::fmt::Debug for Datastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datastore")
            .field("config", &self.config)
            .field("lock", &*self.lock.lock())
            .finish()
    }
}

fn prune(data: &mut [Element], depth: Option<u32>) {
    if let Some(depth) = depth {
        for element in data {
            element.prune_depth(depth);
        }
    }
}
