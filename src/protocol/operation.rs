use std::fmt;

use uuid::Uuid;

use crate::common::{Message, NodeInfos, Slot, NO_SLOT};

/// Kind of an [`Operation`]. The discriminant is the byte sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Typology {
    CreateChat = 0,
    JoinChatByName = 1,
    AddNode = 2,
    AddMessage = 3,
    LeaveChat = 4,
    ListUsers = 5,
    ListChatsCommand = 6,
    Quit = 7,
}

impl Typology {
    pub const ALL: [Typology; 8] = [
        Typology::CreateChat,
        Typology::JoinChatByName,
        Typology::AddNode,
        Typology::AddMessage,
        Typology::LeaveChat,
        Typology::ListUsers,
        Typology::ListChatsCommand,
        Typology::Quit,
    ];

    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.get(byte as usize).copied()
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Typology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Typed content of `Operation.Data`, chosen by the typology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Empty,
    Node(NodeInfos),
    Message(Message),
    /// Id of the room carried by a `CreateChat` snapshot.
    ChatId(Uuid),
}

/// Unit of replication, and the message every peer speaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub slot: Slot,
    pub typology: Typology,
    pub targeted_chat: String,
    pub payload: Payload,
}

impl Operation {
    pub fn new(typology: Typology, targeted_chat: impl Into<String>, payload: Payload) -> Self {
        Self {
            slot: NO_SLOT,
            typology,
            targeted_chat: targeted_chat.into(),
            payload,
        }
    }

    /// Snapshot of a room sent to a node that just joined it.
    pub fn create_chat_snapshot(chat_id: Uuid, chat_name: &str) -> Self {
        Self::new(Typology::CreateChat, chat_name, Payload::ChatId(chat_id))
    }

    pub fn join_chat_by_name(chat_name: &str, joiner: NodeInfos) -> Self {
        Self::new(Typology::JoinChatByName, chat_name, Payload::Node(joiner))
    }

    pub fn add_node(chat_id: Uuid, node: NodeInfos) -> Self {
        Self::new(Typology::AddNode, chat_id.to_string(), Payload::Node(node))
    }

    pub fn add_message(chat_id: Uuid, message: Message) -> Self {
        Self::new(
            Typology::AddMessage,
            chat_id.to_string(),
            Payload::Message(message),
        )
    }

    pub fn leave_chat(chat_id: Uuid, node: NodeInfos) -> Self {
        Self::new(Typology::LeaveChat, chat_id.to_string(), Payload::Node(node))
    }

    /// Local notice that the connection on `slot` is gone.
    pub fn quit(slot: Slot) -> Self {
        Self {
            slot,
            ..Self::new(Typology::Quit, "", Payload::Empty)
        }
    }

    /// Same operation, addressed to `slot`.
    pub fn to_slot(&self, slot: Slot) -> Self {
        Self {
            slot,
            ..self.clone()
        }
    }

    pub fn node(&self) -> Option<&NodeInfos> {
        match &self.payload {
            Payload::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&Message> {
        match &self.payload {
            Payload::Message(message) => Some(message),
            _ => None,
        }
    }
}
