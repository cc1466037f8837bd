//! In-process group registry
//!
//! Maps group name to the members currently joined. A member is a
//! connection id plus the sending half of that connection's bounded inbound
//! queue, so the registry never owns the connection itself. Broadcast
//! snapshots the member list, releases the map lock, then enqueues with
//! `try_send`: a slow member never stalls the producer or its peers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use super::events::Event;
use super::GroupRegistry;
use crate::error::{Error, Result};

/// Identifier of one live connection
pub type ConnectionId = String;

/// Sending half of a connection's inbound queue
pub type MemberSender = mpsc::Sender<Event>;

/// Membership entry handed to the registry on join
#[derive(Debug, Clone)]
pub struct Member {
    pub connection_id: ConnectionId,
    pub sender: MemberSender,
}

impl Member {
    pub fn new(connection_id: impl Into<ConnectionId>, sender: MemberSender) -> Self {
        Self {
            connection_id: connection_id.into(),
            sender,
        }
    }
}

/// Concurrency-safe group registry for a single process
#[derive(Clone, Default)]
pub struct InMemoryRegistry {
    groups: Arc<DashMap<String, HashMap<ConnectionId, MemberSender>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a member. Joining twice replaces the queue handle.
    pub fn add(&self, group: &str, member: Member) {
        let Member {
            connection_id,
            sender,
        } = member;

        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(connection_id.clone(), sender);

        info!(group = %group, connection_id = %connection_id, "Connection joined group");
    }

    /// Remove a member; returns whether it was present
    pub fn remove(&self, group: &str, connection_id: &str) -> bool {
        let removed = match self.groups.get_mut(group) {
            Some(mut members) => members.remove(connection_id).is_some(),
            None => false,
        };

        // Groups exist only while they have members
        if self.groups.remove_if(group, |_, members| members.is_empty()).is_some() {
            debug!(group = %group, "Group has no more members, removed");
        }

        if removed {
            info!(group = %group, connection_id = %connection_id, "Connection left group");
        }
        removed
    }

    /// Enqueue `event` for every current member, returning how many accepted it.
    ///
    /// A member whose queue is closed is dropped from the group; a member
    /// whose queue is full misses this event but stays joined.
    pub fn deliver(&self, group: &str, event: &Event) -> usize {
        let members: Vec<(ConnectionId, MemberSender)> = match self.groups.get(group) {
            Some(members) => members
                .iter()
                .map(|(id, sender)| (id.clone(), sender.clone()))
                .collect(),
            None => return 0,
        };

        let mut delivered = 0;
        let mut failed = Vec::new();

        for (connection_id, sender) in members {
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        group = %group,
                        connection_id = %connection_id,
                        event_type = event.event_type(),
                        "Member queue full, dropping event"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    let err = Error::DeliveryFailure {
                        connection_id: connection_id.clone(),
                        reason: "inbound queue closed".to_string(),
                    };
                    warn!(group = %group, error = %err, "Marking member for cleanup");
                    failed.push(connection_id);
                }
            }
        }

        for connection_id in failed {
            self.remove(group, &connection_id);
        }

        debug!(
            group = %group,
            delivered,
            event_type = event.event_type(),
            "Event broadcast complete"
        );
        delivered
    }

    /// Number of members in `group`
    pub fn member_count(&self, group: &str) -> usize {
        self.groups
            .get(group)
            .map(|members| members.len())
            .unwrap_or(0)
    }

    /// Number of non-empty groups
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_member(&self, group: &str, connection_id: &str) -> bool {
        self.groups
            .get(group)
            .map(|members| members.contains_key(connection_id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl GroupRegistry for InMemoryRegistry {
    async fn join(&self, group: &str, member: Member) -> Result<()> {
        self.add(group, member);
        Ok(())
    }

    async fn leave(&self, group: &str, connection_id: &str) -> Result<()> {
        self.remove(group, connection_id);
        Ok(())
    }

    async fn broadcast(&self, group: &str, event: Event) -> Result<usize> {
        Ok(self.deliver(group, &event))
    }

    fn member_count(&self, group: &str) -> usize {
        InMemoryRegistry::member_count(self, group)
    }
}
