pub mod peer;
pub mod record;
pub mod registry;
pub mod transport;

pub use registry::{ConnectionRegistry, RegistryHandle, RegistryRequest};
pub use transport::TransportError;
