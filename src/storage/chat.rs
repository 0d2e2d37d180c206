use std::collections::BTreeSet;

use uuid::Uuid;

use crate::common::{Message, NO_SLOT, NodeInfos, Slot};

/// One replicated chat room: members plus date-ordered history.
#[derive(Debug, Clone)]
pub struct Chat {
    pub id: Uuid,
    pub name: String,
    members: Vec<NodeInfos>,
    messages: Vec<Message>,
}

impl Chat {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name)
    }

    pub fn with_id(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            members: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn members(&self) -> &[NodeInfos] {
        &self.members
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn member(&self, id: &Uuid) -> Option<&NodeInfos> {
        self.members.iter().find(|member| member.id == *id)
    }

    /// Replaces the member with the same id, or appends a new one.
    pub fn add_or_update_node(&mut self, node: NodeInfos) {
        match self.members.iter_mut().find(|member| member.id == node.id) {
            Some(existing) => *existing = node,
            None => self.members.push(node),
        }
    }

    pub fn contains_message(&self, id: &Uuid) -> bool {
        self.messages.iter().any(|message| message.id == *id)
    }

    /// Inserts `message` after every message with an earlier or equal date.
    /// Returns `false` when a message with the same id is already present.
    pub fn add_message_if_absent(&mut self, message: Message) -> bool {
        if self.contains_message(&message.id) {
            return false;
        }
        let position = self
            .messages
            .partition_point(|existing| existing.date <= message.date);
        self.messages.insert(position, message);
        true
    }

    /// Drops every member reached through `slot`.
    pub fn remove_node_by_slot(&mut self, slot: Slot) -> Vec<NodeInfos> {
        if slot == NO_SLOT {
            return Vec::new();
        }
        let (removed, kept) = self
            .members
            .drain(..)
            .partition(|member| member.slot == Some(slot));
        self.members = kept;
        removed
    }

    pub fn remove_node(&mut self, id: &Uuid) -> Option<NodeInfos> {
        let index = self.members.iter().position(|member| member.id == *id)?;
        Some(self.members.remove(index))
    }

    /// Distinct slots of every member except `excluding`. The excluded
    /// member's own slot is left out too, even if another member shares it.
    pub fn slots(&self, excluding: &Uuid) -> Vec<Slot> {
        let excluded_slot = self.member(excluding).and_then(|member| member.slot);
        self.members
            .iter()
            .filter(|member| member.id != *excluding)
            .filter_map(|member| member.slot)
            .filter(|slot| *slot != NO_SLOT && Some(*slot) != excluded_slot)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
