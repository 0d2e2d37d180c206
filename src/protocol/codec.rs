//! Binary framing of [`Operation`].
//!
//! ```text
//! [Slot:1][LenTargetedChat:1][TargetedChat][Typology:1][LenData:1][Data]
//! ```
//!
//! Lengths are single bytes, so `TargetedChat` and `Data` never exceed 255
//! bytes. `Data` is interpreted according to the typology:
//!
//! - `NodeInfos`: `[Id:16][Port:2][LenAddress:1][Address][LenName:1][Name]`
//! - `Message`: `[Id:16][DateMillis:8][LenSender:1][Sender][Content...]`
//! - `CreateChat` snapshot: `[ChatId:16]`, empty for a fresh room

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::common::{Message, NodeInfos};

use super::operation::{Operation, Payload, Typology};

/// Largest value a single-byte length can describe.
pub const MAX_FIELD_LEN: usize = u8::MAX as usize;

/// Largest encoded operation.
pub const MAX_FRAME_LEN: usize = 1 + 1 + MAX_FIELD_LEN + 1 + 1 + MAX_FIELD_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(&'static str),
    #[error("Unknown typology byte {0}")]
    UnknownTypology(u8),
    #[error("Field `{field}` is {len} bytes, limit is 255")]
    FieldTooLong { field: &'static str, len: usize },
    #[error("Invalid {typology} payload: {source}")]
    Payload {
        typology: Typology,
        #[source]
        source: PayloadError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("truncated {0}")]
    Truncated(&'static str),
    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),
    #[error("date {0} is out of range")]
    InvalidDate(i64),
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),
}

pub fn encode(operation: &Operation) -> Result<Bytes, CodecError> {
    let target = operation.targeted_chat.as_bytes();
    check_len("targeted_chat", target.len())?;

    let data = encode_payload(operation)?;
    check_len("data", data.len())?;

    let mut buf = BytesMut::with_capacity(4 + target.len() + data.len());
    buf.put_u8(operation.slot);
    buf.put_u8(target.len() as u8);
    buf.put_slice(target);
    buf.put_u8(operation.typology.as_byte());
    buf.put_u8(data.len() as u8);
    buf.put_slice(&data);
    Ok(buf.freeze())
}

pub fn decode(frame: &[u8]) -> Result<Operation, CodecError> {
    let mut reader = Reader::new(frame);
    let malformed = |_| CodecError::MalformedFrame("frame shorter than declared lengths");

    let slot = reader.u8("slot").map_err(malformed)?;
    let target = reader.short_bytes("targeted_chat").map_err(malformed)?;
    let targeted_chat = std::str::from_utf8(target)
        .map_err(|_| CodecError::MalformedFrame("targeted chat is not UTF-8"))?
        .to_string();
    let typology_byte = reader.u8("typology").map_err(malformed)?;
    let typology =
        Typology::from_byte(typology_byte).ok_or(CodecError::UnknownTypology(typology_byte))?;
    let data = reader.short_bytes("data").map_err(malformed)?;
    if !reader.is_empty() {
        return Err(CodecError::MalformedFrame("trailing bytes after data"));
    }

    let payload = decode_payload(typology, data)
        .map_err(|source| CodecError::Payload { typology, source })?;

    Ok(Operation {
        slot,
        typology,
        targeted_chat,
        payload,
    })
}

fn check_len(field: &'static str, len: usize) -> Result<(), CodecError> {
    if len > MAX_FIELD_LEN {
        return Err(CodecError::FieldTooLong { field, len });
    }
    Ok(())
}

fn encode_payload(operation: &Operation) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    match &operation.payload {
        Payload::Empty => {}
        Payload::ChatId(id) => out.extend_from_slice(id.as_bytes()),
        Payload::Node(node) => {
            out.extend_from_slice(node.id.as_bytes());
            out.extend_from_slice(&node.port.to_be_bytes());
            put_short_str(&mut out, "address", &node.address)?;
            put_short_str(&mut out, "name", &node.name)?;
        }
        Payload::Message(message) => {
            out.extend_from_slice(message.id.as_bytes());
            out.extend_from_slice(&message.date.timestamp_millis().to_be_bytes());
            put_short_str(&mut out, "sender", &message.sender)?;
            out.extend_from_slice(message.content.as_bytes());
        }
    }
    Ok(out)
}

fn put_short_str(out: &mut Vec<u8>, field: &'static str, value: &str) -> Result<(), CodecError> {
    check_len(field, value.len())?;
    out.push(value.len() as u8);
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

fn decode_payload(typology: Typology, data: &[u8]) -> Result<Payload, PayloadError> {
    match typology {
        Typology::AddNode | Typology::LeaveChat | Typology::JoinChatByName => {
            decode_node(data).map(Payload::Node)
        }
        Typology::AddMessage => decode_message(data).map(Payload::Message),
        Typology::CreateChat if data.is_empty() => Ok(Payload::Empty),
        Typology::CreateChat => {
            let mut reader = Reader::new(data);
            let id = reader.uuid("chat id")?;
            reader.finish()?;
            Ok(Payload::ChatId(id))
        }
        Typology::ListUsers | Typology::ListChatsCommand | Typology::Quit => Ok(Payload::Empty),
    }
}

fn decode_node(data: &[u8]) -> Result<NodeInfos, PayloadError> {
    let mut reader = Reader::new(data);
    let id = reader.uuid("node id")?;
    let port = u16::from_be_bytes(reader.array::<2>("port")?);
    let address = reader.short_str("address")?;
    let name = reader.short_str("name")?;
    reader.finish()?;
    Ok(NodeInfos {
        id,
        address,
        port,
        name,
        slot: None,
    })
}

fn decode_message(data: &[u8]) -> Result<Message, PayloadError> {
    let mut reader = Reader::new(data);
    let id = reader.uuid("message id")?;
    let millis = i64::from_be_bytes(reader.array::<8>("date")?);
    let date: DateTime<Utc> =
        DateTime::from_timestamp_millis(millis).ok_or(PayloadError::InvalidDate(millis))?;
    let sender = reader.short_str("sender")?;
    let content = std::str::from_utf8(reader.rest())
        .map_err(|_| PayloadError::InvalidUtf8("content"))?
        .to_string();
    Ok(Message {
        id,
        sender,
        content,
        date,
    })
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], PayloadError> {
        if self.buf.len() < len {
            return Err(PayloadError::Truncated(what));
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, PayloadError> {
        Ok(self.take(1, what)?[0])
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], PayloadError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn uuid(&mut self, what: &'static str) -> Result<Uuid, PayloadError> {
        Ok(Uuid::from_bytes(self.array::<16>(what)?))
    }

    fn short_bytes(&mut self, what: &'static str) -> Result<&'a [u8], PayloadError> {
        let len = self.u8(what)? as usize;
        self.take(len, what)
    }

    fn short_str(&mut self, what: &'static str) -> Result<String, PayloadError> {
        let bytes = self.short_bytes(what)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| PayloadError::InvalidUtf8(what))
    }

    fn rest(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.buf)
    }

    fn finish(self) -> Result<(), PayloadError> {
        match self.buf.len() {
            0 => Ok(()),
            n => Err(PayloadError::TrailingBytes(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::NO_SLOT;

    fn node() -> NodeInfos {
        NodeInfos::new("127.0.0.1", 9001, "alice")
    }

    fn sample_operations() -> Vec<Operation> {
        let chat_id = Uuid::new_v4();
        let mut ops = vec![
            Operation::new(Typology::CreateChat, "room", Payload::Empty),
            Operation::create_chat_snapshot(chat_id, "room"),
            Operation::join_chat_by_name("room", node()),
            Operation::add_node(chat_id, node()),
            Operation::add_message(chat_id, Message::new("alice", "hello, world")),
            Operation::add_message(chat_id, Message::new("alice", "")),
            Operation::leave_chat(chat_id, node()),
            Operation::new(Typology::ListUsers, chat_id.to_string(), Payload::Empty),
            Operation::new(Typology::ListChatsCommand, "", Payload::Empty),
            Operation::quit(3),
        ];
        ops[2].slot = 42;
        ops
    }

    #[test]
    fn test_round_trip_every_typology() {
        let ops = sample_operations();
        for typology in Typology::ALL {
            assert!(ops.iter().any(|op| op.typology == typology), "{typology}");
        }
        for op in ops {
            let bytes = encode(&op).unwrap();
            assert_eq!(decode(&bytes).unwrap(), op);
        }
    }

    #[test]
    fn test_envelope_layout() {
        let op = Operation {
            slot: 5,
            ..Operation::new(Typology::ListChatsCommand, "ab", Payload::Empty)
        };
        let bytes = encode(&op).unwrap();
        assert_eq!(&bytes[..], &[5, 2, b'a', b'b', 6, 0]);
    }

    #[test]
    fn test_message_layout() {
        let message = Message::new("bob", "hi");
        let op = Operation::add_message(Uuid::nil(), message.clone());
        let bytes = encode(&op).unwrap();
        let data_start = 1 + 1 + 36 + 1 + 1;
        assert_eq!(bytes[data_start - 1] as usize, 16 + 8 + 1 + 3 + 2);
        assert_eq!(&bytes[data_start..data_start + 16], message.id.as_bytes());
        assert_eq!(&bytes[bytes.len() - 2..], b"hi");
    }

    #[test]
    fn test_truncated_frames_are_malformed() {
        let bytes = encode(&Operation::join_chat_by_name("room", node())).unwrap();
        for len in [0, 1, 3, 6, 7, bytes.len() - 1] {
            assert!(
                matches!(decode(&bytes[..len]), Err(CodecError::MalformedFrame(_))),
                "prefix of {len} bytes"
            );
        }
    }

    #[test]
    fn test_trailing_bytes_are_malformed() {
        let mut bytes = encode(&Operation::quit(NO_SLOT)).unwrap().to_vec();
        bytes.push(0);
        assert!(matches!(decode(&bytes), Err(CodecError::MalformedFrame(_))));
    }

    #[test]
    fn test_unknown_typology() {
        assert_eq!(decode(&[0, 0, 9, 0]), Err(CodecError::UnknownTypology(9)));
    }

    #[test]
    fn test_bad_payload_is_reported() {
        // AddNode with a 3 byte payload cannot hold a node id.
        let frame = [0, 0, Typology::AddNode.as_byte(), 3, 1, 2, 3];
        assert!(matches!(
            decode(&frame),
            Err(CodecError::Payload {
                typology: Typology::AddNode,
                source: PayloadError::Truncated(_)
            })
        ));
    }

    #[test]
    fn test_oversized_fields_are_rejected() {
        let long_name = "x".repeat(256);
        let op = Operation::new(Typology::CreateChat, long_name, Payload::Empty);
        assert!(matches!(
            encode(&op),
            Err(CodecError::FieldTooLong { field: "targeted_chat", len: 256 })
        ));

        let op = Operation::add_message(Uuid::nil(), Message::new("bob", "y".repeat(240)));
        assert!(matches!(
            encode(&op),
            Err(CodecError::FieldTooLong { field: "data", .. })
        ));
    }

    #[test]
    fn test_largest_frame_fits_limit() {
        let op = Operation::new(
            Typology::AddMessage,
            "t".repeat(MAX_FIELD_LEN),
            Payload::Message(Message::new("", "c".repeat(MAX_FIELD_LEN - 25))),
        );
        let bytes = encode(&op).unwrap();
        assert_eq!(bytes.len(), MAX_FRAME_LEN);
        assert_eq!(decode(&bytes).unwrap(), op);
    }
}
