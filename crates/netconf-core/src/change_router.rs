//! Routing committed changes to the subsystems that own them
//!
//! After an edit is applied every [`ChangeEvent`] is attributed to exactly one
//! subsystem. Each subsystem then receives its events in one batch, in edit
//! order. Separately, the whole edit is summarised as a
//! [`ConfigChangeNotification`] for external listeners.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use netconf_core_types::{ClientInfo, SessionId};
use serde::{Deserialize, Serialize};

use crate::change::ChangeEvent;
use crate::edit::{EditConfigRequest, EditOperation};
use crate::errors::Result;
use crate::schema::NamespaceContext;
use crate::subsystem::{Subsystem, SubsystemRegistry};

/// A change event as delivered to a subsystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub datastore: String,
    pub event: ChangeEvent,
    /// Caused by a validator-implied edit
    pub implied: bool,
    pub message_id: Option<String>,
}

/// Notifications for one subsystem
#[derive(Clone)]
pub struct SubsystemBatch {
    pub subsystem: Arc<dyn Subsystem>,
    pub notifications: Vec<ChangeNotification>,
}

/// Subsystem → notifications, subsystems in order of first appearance
#[derive(Clone, Default)]
pub struct NotificationMapping {
    batches: Vec<SubsystemBatch>,
}

impl NotificationMapping {
    pub fn batches(&self) -> &[SubsystemBatch] {
        &self.batches
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn subsystem_ids(&self) -> Vec<&str> {
        self.batches.iter().map(|batch| batch.subsystem.id()).collect()
    }

    pub fn notifications_for(&self, subsystem_id: &str) -> Option<&[ChangeNotification]> {
        self.batches
            .iter()
            .find(|batch| batch.subsystem.id() == subsystem_id)
            .map(|batch| batch.notifications.as_slice())
    }

    /// All notifications, batch by batch
    pub fn notifications(&self) -> impl Iterator<Item = &ChangeNotification> {
        self.batches.iter().flat_map(|batch| batch.notifications.iter())
    }

    /// Append a notification; identical ones for the same subsystem are dropped
    pub fn push(&mut self, subsystem: Arc<dyn Subsystem>, notification: ChangeNotification) {
        match self
            .batches
            .iter_mut()
            .find(|batch| batch.subsystem.id() == subsystem.id())
        {
            Some(batch) => {
                if !batch.notifications.contains(&notification) {
                    batch.notifications.push(notification);
                }
            }
            None => self.batches.push(SubsystemBatch {
                subsystem,
                notifications: vec![notification],
            }),
        }
    }

    /// Fold `other` in after the existing batches
    pub fn extend(&mut self, other: NotificationMapping) {
        for batch in other.batches {
            for notification in batch.notifications {
                self.push(Arc::clone(&batch.subsystem), notification);
            }
        }
    }
}

impl std::fmt::Debug for NotificationMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.batches
                    .iter()
                    .map(|batch| (batch.subsystem.id(), batch.notifications.len())),
            )
            .finish()
    }
}

/// Groups change events by owning subsystem and delivers them
#[derive(Debug, Clone)]
pub struct ChangeRouter {
    registry: Arc<SubsystemRegistry>,
}

impl ChangeRouter {
    pub fn new(registry: Arc<SubsystemRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SubsystemRegistry {
        &self.registry
    }

    /// Attribute each event to its subsystem
    pub fn group_by_subsystem(
        &self,
        datastore: &str,
        events: &[ChangeEvent],
        request: &EditConfigRequest,
    ) -> NotificationMapping {
        let mut mapping = NotificationMapping::default();
        for event in events {
            let subsystem = self.registry.lookup(&event.node_id);
            mapping.push(
                subsystem,
                ChangeNotification {
                    datastore: datastore.to_string(),
                    event: event.clone(),
                    implied: request.implied,
                    message_id: request.message_id.clone(),
                },
            );
        }
        mapping
    }

    /// Ask every subsystem in the mapping whether `client` may proceed
    ///
    /// # Errors
    ///
    /// The first subsystem's refusal.
    pub fn check_permissions(
        &self,
        mapping: &NotificationMapping,
        client: &ClientInfo,
        operation: &str,
    ) -> Result<()> {
        if client.bypass_authorization {
            return Ok(());
        }
        for batch in mapping.batches() {
            batch.subsystem.check_required_permissions(client, operation)?;
        }
        Ok(())
    }

    /// One `notify_changed` call per subsystem
    pub fn send_notifications(&self, mapping: &NotificationMapping) {
        for batch in mapping.batches() {
            tracing::debug!(
                subsystem = batch.subsystem.id(),
                count = batch.notifications.len(),
                "notifying subsystem"
            );
            batch.subsystem.notify_changed(&batch.notifications);
        }
    }
}

/// Session that made a change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedBy {
    pub session_id: SessionId,
    pub username: String,
}

/// One edit in a config-change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditInfo {
    /// Instance identifier of the changed node
    pub target: String,
    /// `None` when the node carried no explicit operation
    pub operation: Option<EditOperation>,
    pub implied: bool,
}

/// Summary of one edit, as published to external listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigChangeNotification {
    pub datastore: String,
    pub changed_by: ChangedBy,
    pub edits: Vec<EditInfo>,
    pub event_time: DateTime<Utc>,
}

impl ConfigChangeNotification {
    pub fn new(datastore: impl Into<String>, client: &ClientInfo) -> Self {
        Self {
            datastore: datastore.into(),
            changed_by: ChangedBy {
                session_id: client.session_id,
                username: client.username.clone(),
            },
            edits: Vec::new(),
            event_time: Utc::now(),
        }
    }

    /// Add one edit per change event
    pub fn add_edits<C: NamespaceContext + ?Sized>(
        &mut self,
        events: &[ChangeEvent],
        implied: bool,
        ctx: &C,
    ) {
        self.edits.extend(events.iter().map(|event| EditInfo {
            target: event.node_id.xpath_string(ctx),
            operation: event
                .edit()
                .explicit_operation
                .then_some(event.edit().operation),
            implied,
        }));
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

/// Give every edit without an explicit operation the effective default
pub fn refine_config_change_notification(
    mut notification: ConfigChangeNotification,
) -> ConfigChangeNotification {
    for edit in &mut notification.edits {
        if edit.operation.is_none() {
            edit.operation = Some(EditOperation::Replace);
        }
    }
    notification
}

/// Receiver of config-change notifications
pub trait ConfigChangeSink: Send + Sync {
    fn publish(&self, notification: &ConfigChangeNotification);
}
