use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

/// Routing address of one live connection. `0` is never handed out.
pub type Slot = u8;

/// Slot value meaning "no peer identity".
pub const NO_SLOT: Slot = 0;

/// Identity of a node as seen by another node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfos {
    pub id: Uuid,
    pub address: String,
    pub port: u16,
    pub name: String,
    /// Local routing slot; `None` until the registry assigns one.
    pub slot: Option<Slot>,
}

impl NodeInfos {
    pub fn new(address: impl Into<String>, port: u16, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            address: address.into(),
            port,
            name: name.into(),
            slot: None,
        }
    }

    /// Copy of these infos routed through `slot`.
    pub fn with_slot(mut self, slot: Slot) -> Self {
        self.slot = (slot != NO_SLOT).then_some(slot);
        self
    }
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub sender: String,
    pub content: String,
    pub date: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.into(),
            content: content.into(),
            // Dates travel as milliseconds; keep the local copy identical.
            date: Utc::now().trunc_subsecs(3),
        }
    }
}
