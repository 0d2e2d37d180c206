pub mod chat;
pub mod chat_store;

pub use chat::Chat;
pub use chat_store::ChatStore;
