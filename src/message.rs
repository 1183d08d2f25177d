//! 프로토콜 메시지 정의
//!
//! 모든 메시지는 2바이트 타입 태그로 시작하며, 다중 바이트 정수는 빅엔디언이다.
//!
//! | 타입 | 이름 | 페이로드 |
//! |---|---|---|
//! | 1 | Initialization | u32 블록 수 |
//! | 2 | Agree | 없음 |
//! | 3 | ReverseRequest | u32 길이, u32 블록 번호, 데이터 |
//! | 4 | ReverseAnswer | u32 길이, u32 블록 번호, 데이터 |

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::block::BlockNo;
use crate::{Error, Result};

/// 타입 태그 길이
pub const TAG_LEN: usize = 2;

/// Initialization 메시지 전체 길이
pub const INITIALIZATION_LEN: usize = TAG_LEN + 4;

/// Agree 메시지 전체 길이
pub const AGREE_LEN: usize = TAG_LEN;

/// ReverseRequest / ReverseAnswer 헤더 길이 (태그 + 길이 + 블록 번호)
pub const BLOCK_HEADER_LEN: usize = TAG_LEN + 4 + 4;

/// 메시지 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MessageType {
    /// 블록 수 알림 (클라이언트 → 서버)
    Initialization = 1,

    /// 전송 허가 (서버 → 클라이언트)
    Agree = 2,

    /// 반전 요청 (클라이언트 → 서버)
    ReverseRequest = 3,

    /// 반전 응답 (서버 → 클라이언트)
    ReverseAnswer = 4,
}

impl MessageType {
    /// 고정 헤더 길이 (가변 페이로드 제외)
    pub fn header_len(self) -> usize {
        match self {
            MessageType::Initialization => INITIALIZATION_LEN,
            MessageType::Agree => AGREE_LEN,
            MessageType::ReverseRequest | MessageType::ReverseAnswer => BLOCK_HEADER_LEN,
        }
    }
}

impl TryFrom<u16> for MessageType {
    type Error = Error;

    fn try_from(tag: u16) -> Result<Self> {
        match tag {
            1 => Ok(MessageType::Initialization),
            2 => Ok(MessageType::Agree),
            3 => Ok(MessageType::ReverseRequest),
            4 => Ok(MessageType::ReverseAnswer),
            other => Err(Error::UnknownMessageType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::Initialization => "Initialization",
            MessageType::Agree => "Agree",
            MessageType::ReverseRequest => "ReverseRequest",
            MessageType::ReverseAnswer => "ReverseAnswer",
        };
        f.write_str(name)
    }
}

/// 통합 메시지 enum
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Initialization { block_count: u32 },
    Agree,
    ReverseRequest { block_no: BlockNo, data: Bytes },
    ReverseAnswer { block_no: BlockNo, data: Bytes },
}

impl Message {
    /// 메시지 타입 반환
    pub fn msg_type(&self) -> MessageType {
        match self {
            Message::Initialization { .. } => MessageType::Initialization,
            Message::Agree => MessageType::Agree,
            Message::ReverseRequest { .. } => MessageType::ReverseRequest,
            Message::ReverseAnswer { .. } => MessageType::ReverseAnswer,
        }
    }

    /// 인코딩 후 전체 길이
    pub fn encoded_len(&self) -> usize {
        match self {
            Message::ReverseRequest { data, .. } | Message::ReverseAnswer { data, .. } => {
                BLOCK_HEADER_LEN + data.len()
            }
            other => other.msg_type().header_len(),
        }
    }

    /// 바이트로 직렬화
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// 기존 버퍼 뒤에 직렬화
    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(self.encoded_len());
        dst.put_u16(self.msg_type() as u16);

        match self {
            Message::Initialization { block_count } => dst.put_u32(*block_count),
            Message::Agree => {}
            Message::ReverseRequest { block_no, data } | Message::ReverseAnswer { block_no, data } => {
                let len = u32::try_from(data.len()).map_err(|_| Error::PayloadTooLarge {
                    len: data.len(),
                    max: u32::MAX as usize,
                })?;
                dst.put_u32(len);
                dst.put_u32(*block_no);
                dst.put_slice(data);
            }
        }
        Ok(())
    }

    /// 정확히 하나의 메시지가 담긴 버퍼에서 역직렬화
    pub fn decode(buf: &[u8]) -> Result<Self> {
        Self::decode_frame(Bytes::copy_from_slice(buf))
    }

    /// 정확히 하나의 메시지가 담긴 프레임에서 역직렬화 (페이로드 복사 없음)
    ///
    /// 선언된 길이보다 데이터가 짧으면 `IncompletePayload`, 남는 바이트가 있으면
    /// `TrailingBytes`로 실패한다.
    pub fn decode_frame(mut frame: Bytes) -> Result<Self> {
        let available = frame.len();
        if available < TAG_LEN {
            return Err(Error::IncompleteHeader {
                needed: TAG_LEN,
                available,
            });
        }

        let kind = MessageType::try_from(frame.get_u16())?;
        if available < kind.header_len() {
            return Err(Error::IncompleteHeader {
                needed: kind.header_len(),
                available,
            });
        }

        let message = match kind {
            MessageType::Initialization => Message::Initialization {
                block_count: frame.get_u32(),
            },
            MessageType::Agree => Message::Agree,
            MessageType::ReverseRequest | MessageType::ReverseAnswer => {
                let declared = frame.get_u32() as usize;
                let block_no = frame.get_u32();
                if frame.len() < declared {
                    return Err(Error::IncompletePayload {
                        declared,
                        available: frame.len(),
                    });
                }
                let data = frame.split_to(declared);
                if kind == MessageType::ReverseRequest {
                    Message::ReverseRequest { block_no, data }
                } else {
                    Message::ReverseAnswer { block_no, data }
                }
            }
        };

        if !frame.is_empty() {
            return Err(Error::TrailingBytes { extra: frame.len() });
        }
        Ok(message)
    }

    /// 버퍼 앞부분의 첫 메시지 전체 길이
    ///
    /// 아직 바이트가 부족하면 `None`. 알 수 없는 태그나 `max_payload`를 넘는
    /// 선언 길이는 에러.
    pub fn frame_len(buf: &[u8], max_payload: usize) -> Result<Option<usize>> {
        if buf.len() < TAG_LEN {
            return Ok(None);
        }

        let kind = MessageType::try_from(u16::from_be_bytes([buf[0], buf[1]]))?;
        let header_len = kind.header_len();
        if buf.len() < header_len {
            return Ok(None);
        }

        let total = match kind {
            MessageType::Initialization | MessageType::Agree => header_len,
            MessageType::ReverseRequest | MessageType::ReverseAnswer => {
                let declared = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]) as usize;
                if declared > max_payload {
                    return Err(Error::PayloadTooLarge {
                        len: declared,
                        max: max_payload,
                    });
                }
                header_len + declared
            }
        };

        Ok((buf.len() >= total).then_some(total))
    }
}
