pub mod codec;
pub mod operation;

pub use codec::{CodecError, PayloadError, decode, encode};
pub use operation::{Operation, Payload, Typology};
