//! # RBP (Reverse Block Protocol)
//!
//! TCP 기반 랜덤 블록 분할 전송 + 바이트 반전 응답 프로토콜
//!
//! ## 핵심 특징
//! - **랜덤 블록 분할**: `[Lmin, Lmax]` 범위에서 블록 크기를 무작위로 결정
//! - **4종 메시지**: Initialization / Agree / ReverseRequest / ReverseAnswer
//! - **증분 프레이밍**: 연결별 버퍼에 누적 후 완전한 메시지만 처리
//! - **단일 스레드 디스패치**: 리액터 기반 readiness 멀티플렉싱
//! - **이벤트 훅**: UI/로그가 세션 진행을 관찰

pub mod block;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod framing;
pub mod message;
pub mod server;
pub mod session;
pub mod stats;

pub use block::{reverse_bytes, segment, segment_with, BlockPlan};
pub use client::{Client, FileReport};
pub use config::{ClientConfig, ServerConfig};
pub use error::{Error, Result};
pub use event::{EventSink, SessionEvent, TracingSink};
pub use framing::FrameBuffer;
pub use message::{Message, MessageType};
pub use server::{respond, Server};
pub use session::{Session, SessionState};
pub use stats::TransferStats;

/// 기본 서버 포트
pub const DEFAULT_PORT: u16 = 8888;

/// 기본 최대 페이로드 크기 (바이트)
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024; // 1MB

/// 기본 읽기 버퍼 크기 (바이트)
pub const DEFAULT_READ_BUFFER: usize = 1024;
