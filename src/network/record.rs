use std::future::ready;

use bytes::BytesMut;
use futures::{Stream, StreamExt};
use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;

use crate::protocol::codec::MAX_FRAME_LEN;

/// Records on the socket carry a 2 byte big-endian length prefix.
pub fn record_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(2)
        .max_frame_length(MAX_FRAME_LEN)
        .new_codec()
}

/// Whole records read from `reader`. The stream ends on EOF, on the first
/// read error, or once `cancel` fires.
pub fn records<R>(reader: R, cancel: CancellationToken) -> impl Stream<Item = BytesMut> + Send
where
    R: AsyncRead + Unpin + Send,
{
    FramedRead::new(reader, record_codec())
        .take_until(cancel.cancelled_owned())
        .scan((), |_, frame| {
            ready(match frame {
                Ok(record) => Some(record),
                Err(err) => {
                    log::debug!("Record stream failed: {err}");
                    None
                }
            })
        })
}

#[cfg(test)]
mod tests {
    use futures::SinkExt;
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::FramedWrite;

    use super::*;

    #[tokio::test]
    async fn test_records_split_stream() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FramedWrite::new(client, record_codec());
        writer.send(bytes::Bytes::from_static(b"one")).await.unwrap();
        writer.send(bytes::Bytes::from_static(b"")).await.unwrap();
        writer.send(bytes::Bytes::from_static(b"three")).await.unwrap();
        drop(writer);

        let collected: Vec<BytesMut> = records(server, CancellationToken::new()).collect().await;
        assert_eq!(collected, vec![&b"one"[..], &b""[..], &b"three"[..]]);
    }

    #[tokio::test]
    async fn test_records_end_on_oversized_length() {
        let (mut client, server) = tokio::io::duplex(1024);
        client.write_all(&[0xff, 0xff, 1, 2, 3]).await.unwrap();

        let collected: Vec<BytesMut> = records(server, CancellationToken::new()).collect().await;
        assert!(collected.is_empty());
    }

    #[tokio::test]
    async fn test_records_end_on_cancel() {
        let (_client, server) = tokio::io::duplex(1024);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let collected: Vec<BytesMut> = records(server, cancel).collect().await;
        assert!(collected.is_empty());
    }
}
