pub mod common;
pub mod config;
pub mod network;
pub mod node;
pub mod protocol;
pub mod replication;
pub mod storage;
pub mod ui;

pub use node::{MeshNode, NodeError};
