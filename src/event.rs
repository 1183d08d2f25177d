//! 세션 이벤트
//!
//! UI나 로그 싱크가 세션 진행을 관찰하는 훅. 세션은 특정 싱크에 의존하지 않는다.

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::block::BlockNo;
use crate::stats::TransferStats;

/// 세션 진행 이벤트
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Agree 수신, 블록 전송 시작
    TransferStarted { block_count: u32, file_size: u64 },

    /// ReverseRequest 전송
    BlockSent { block_no: BlockNo, len: u32 },

    /// ReverseAnswer 수신 (반전된 데이터)
    BlockAcknowledged { block_no: BlockNo, data: Bytes },

    /// 모든 블록 응답 완료
    TransferCompleted { stats: TransferStats },

    /// 연결 종료
    ConnectionClosed,

    /// 전송 실패
    Error { message: String },
}

/// 이벤트 수신자
pub trait EventSink {
    fn on_event(&mut self, event: SessionEvent);
}

impl<E: EventSink + ?Sized> EventSink for &mut E {
    fn on_event(&mut self, event: SessionEvent) {
        (**self).on_event(event)
    }
}

impl<E: EventSink + ?Sized> EventSink for Box<E> {
    fn on_event(&mut self, event: SessionEvent) {
        (**self).on_event(event)
    }
}

/// 이벤트를 모두 보관 (테스트/배치 처리용)
impl EventSink for Vec<SessionEvent> {
    fn on_event(&mut self, event: SessionEvent) {
        self.push(event);
    }
}

/// 이벤트 스트림으로 전달. 수신측이 닫혀 있으면 버린다.
impl EventSink for mpsc::UnboundedSender<SessionEvent> {
    fn on_event(&mut self, event: SessionEvent) {
        let _ = self.send(event);
    }
}

/// tracing 로그로 출력하는 기본 싱크
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

/// 로그에 찍을 데이터 미리보기 최대 길이
const PREVIEW_LEN: usize = 64;

impl EventSink for TracingSink {
    fn on_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::TransferStarted {
                block_count,
                file_size,
            } => info!("Transfer started: {} blocks, {} bytes", block_count, file_size),
            SessionEvent::BlockSent { block_no, len } => {
                debug!("ReverseRequest sent: block #{} ({} bytes)", block_no, len)
            }
            SessionEvent::BlockAcknowledged { block_no, data } => {
                let preview = &data[..data.len().min(PREVIEW_LEN)];
                info!(
                    "Block #{}: {}",
                    block_no,
                    String::from_utf8_lossy(preview)
                );
            }
            SessionEvent::TransferCompleted { stats } => {
                info!("Transfer complete: {}", stats.summary())
            }
            SessionEvent::ConnectionClosed => info!("Connection closed"),
            SessionEvent::Error { message } => warn!("Transfer failed: {}", message),
        }
    }
}
