use super::types::{Message, NodeInfos};

/// Something the orchestrator reports to the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    ChatCreated { chat: String },
    ChatJoined { chat: String },
    MemberJoined { chat: String, member: String },
    MemberLeft { chat: String, member: String },
    MessageReceived { chat: String, message: Message },
    Users { chat: String, members: Vec<NodeInfos> },
    Chats(Vec<ChatSummary>),
    Left { chat: String },
    Info(String),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSummary {
    pub name: String,
    pub members: usize,
    pub messages: usize,
    pub current: bool,
}
