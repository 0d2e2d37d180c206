pub mod commands;
pub mod events;
pub mod types;

pub use commands::{Command, CommandError};
pub use events::{ChatEvent, ChatSummary};
pub use types::{Message, NO_SLOT, NodeInfos, Slot};
