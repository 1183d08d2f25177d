//! 연결별 증분 프레이밍
//!
//! 스트림 소켓의 한 번의 read는 메시지 일부만 담거나 여러 메시지를 담을 수 있다.
//! 읽은 바이트를 연결별 버퍼에 누적하고, 헤더에 선언된 길이만큼 모였을 때만
//! 메시지를 꺼낸다.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::message::Message;
use crate::{Error, Result, DEFAULT_MAX_PAYLOAD, DEFAULT_READ_BUFFER};

/// 버퍼에서 꺼낸 프레임
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// 완전한 메시지
    Message(Message),

    /// 알 수 없는 태그. 경계를 알 수 없으므로 버퍼에 있던 바이트는 버려진다.
    ///
    /// 같은 read로 뒤따라 도착한 정상 메시지도 함께 버려진다. 상대는 그 메시지에
    /// 대한 응답을 받지 못한다.
    Unknown { tag: u16, discarded: usize },
}

/// 연결별 수신 버퍼 (한 연결의 소유자만 접근)
#[derive(Debug)]
pub struct FrameBuffer {
    buf: BytesMut,
    read_size: usize,
    max_payload: usize,
}

impl FrameBuffer {
    pub fn new(read_size: usize, max_payload: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(read_size),
            read_size,
            max_payload,
        }
    }

    /// 버퍼 뒤에 바이트 추가
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// 아직 프레임으로 꺼내지 않은 바이트 수
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// 완전한 프레임 하나를 꺼냄. 바이트가 부족하면 `None`.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match Message::frame_len(&self.buf, self.max_payload) {
            Ok(Some(len)) => {
                let frame = self.buf.split_to(len).freeze();
                Message::decode_frame(frame).map(|m| Some(Frame::Message(m)))
            }
            Ok(None) => Ok(None),
            Err(Error::UnknownMessageType(tag)) => {
                let discarded = self.buf.len();
                self.buf.clear();
                Ok(Some(Frame::Unknown { tag, discarded }))
            }
            Err(e) => Err(e),
        }
    }

    /// 스트림에서 한 번 읽어 버퍼에 추가. 0이면 상대가 연결을 닫은 것.
    pub async fn read_from<R>(&mut self, reader: &mut R) -> Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        self.buf.reserve(self.read_size);
        Ok(reader.read_buf(&mut self.buf).await?)
    }

    /// 완전한 메시지 하나가 모일 때까지 읽음
    ///
    /// 알 수 없는 태그는 `UnknownMessageType`, 메시지 도중 종료는
    /// `ConnectionClosed`로 실패한다.
    pub async fn read_message<R>(&mut self, reader: &mut R) -> Result<Message>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            match self.next_frame()? {
                Some(Frame::Message(message)) => return Ok(message),
                Some(Frame::Unknown { tag, .. }) => return Err(Error::UnknownMessageType(tag)),
                None => {}
            }

            if self.read_from(reader).await? == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_READ_BUFFER, DEFAULT_MAX_PAYLOAD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::io::AsyncWriteExt;

    fn answer(block_no: u32, data: &'static [u8]) -> Message {
        Message::ReverseAnswer {
            block_no,
            data: Bytes::from_static(data),
        }
    }

    #[test]
    fn test_split_reads() {
        let bytes = answer(3, b"split across reads").encode().unwrap();
        let mut frames = FrameBuffer::default();

        for byte in &bytes[..bytes.len() - 1] {
            frames.extend(std::slice::from_ref(byte));
            assert_eq!(frames.next_frame().unwrap(), None);
        }

        frames.extend(&bytes[bytes.len() - 1..]);
        assert_eq!(
            frames.next_frame().unwrap(),
            Some(Frame::Message(answer(3, b"split across reads")))
        );
        assert_eq!(frames.buffered(), 0);
    }

    #[test]
    fn test_coalesced_reads() {
        let mut frames = FrameBuffer::default();
        frames.extend(&Message::Agree.encode().unwrap());
        frames.extend(&answer(1, b"ab").encode().unwrap());
        frames.extend(&Message::Initialization { block_count: 2 }.encode().unwrap()[..3]);

        assert_eq!(frames.next_frame().unwrap(), Some(Frame::Message(Message::Agree)));
        assert_eq!(frames.next_frame().unwrap(), Some(Frame::Message(answer(1, b"ab"))));
        assert_eq!(frames.next_frame().unwrap(), None);
        assert_eq!(frames.buffered(), 3);
    }

    #[test]
    fn test_unknown_tag_discards_buffer() {
        let mut frames = FrameBuffer::default();
        frames.extend(&[0, 99, 1, 2, 3]);

        assert_eq!(
            frames.next_frame().unwrap(),
            Some(Frame::Unknown {
                tag: 99,
                discarded: 5
            })
        );
        assert_eq!(frames.buffered(), 0);

        frames.extend(&Message::Agree.encode().unwrap());
        assert_eq!(frames.next_frame().unwrap(), Some(Frame::Message(Message::Agree)));
    }

    #[test]
    fn test_unknown_tag_drops_following_message_in_same_read() {
        let mut frames = FrameBuffer::default();
        let init = Message::Initialization { block_count: 3 }.encode().unwrap();
        let mut bytes = vec![0, 99];
        bytes.extend_from_slice(&init);
        frames.extend(&bytes);

        assert_eq!(
            frames.next_frame().unwrap(),
            Some(Frame::Unknown {
                tag: 99,
                discarded: 2 + init.len()
            })
        );
        assert_eq!(frames.next_frame().unwrap(), None);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let mut frames = FrameBuffer::new(64, 4);
        frames.extend(&answer(1, b"too long").encode().unwrap());
        assert!(matches!(
            frames.next_frame(),
            Err(Error::PayloadTooLarge { len: 8, max: 4 })
        ));
    }

    #[tokio::test]
    async fn test_read_message_over_stream() {
        let (mut client, mut server) = tokio::io::duplex(8);
        let bytes = answer(2, b"more than eight bytes").encode().unwrap();

        let writer = tokio::spawn(async move {
            client.write_all(&bytes).await.unwrap();
        });

        let mut frames = FrameBuffer::new(4, 1024);
        let message = frames.read_message(&mut server).await.unwrap();
        assert_eq!(message, answer(2, b"more than eight bytes"));

        writer.await.unwrap();
        assert!(matches!(
            frames.read_message(&mut server).await,
            Err(Error::ConnectionClosed)
        ));
    }
}
