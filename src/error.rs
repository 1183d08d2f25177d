//! 에러 타입 정의

use std::path::PathBuf;

use thiserror::Error;

/// RBP 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    // ── 설정 에러 ───────────────────────────────────────────────
    #[error("유효하지 않은 포트: {0} (0 ~ 65535)")]
    InvalidPort(i64),

    #[error("유효하지 않은 블록 범위: min={min}, max={max}")]
    InvalidBlockRange { min: u32, max: u32 },

    #[error("전송할 파일 없음")]
    NoInputFiles,

    #[error("유효하지 않은 입력 파일 {path:?}: {reason}")]
    InvalidInputFile { path: PathBuf, reason: String },

    #[error("파일이 너무 큼 {path:?}: {size} 바이트")]
    FileTooLarge { path: PathBuf, size: u64 },

    // ── 프로토콜 에러 ─────────────────────────────────────────────
    #[error("연결 종료")]
    ConnectionClosed,

    #[error("알 수 없는 메시지 타입: {0}")]
    UnknownMessageType(u16),

    #[error("메시지 타입 불일치: expected {expected}, got {got}")]
    UnexpectedMessage { expected: String, got: String },

    #[error("블록 불일치: expected #{expected} ({expected_len}B), got #{got} ({got_len}B)")]
    BlockMismatch {
        expected: u32,
        expected_len: u32,
        got: u32,
        got_len: u32,
    },

    #[error("블록 계획과 데이터 크기 불일치: 계획 {planned} 바이트, 데이터 {actual} 바이트")]
    PlanMismatch { planned: u64, actual: u64 },

    #[error("실패한 세션은 재사용할 수 없음")]
    SessionFailed,

    // ── 프레이밍 에러 ─────────────────────────────────────────────
    #[error("헤더 불완전: {needed} 바이트 필요, {available} 바이트 존재")]
    IncompleteHeader { needed: usize, available: usize },

    #[error("페이로드 불완전: 선언 {declared} 바이트, 실제 {available} 바이트")]
    IncompletePayload { declared: usize, available: usize },

    #[error("메시지 뒤 잉여 바이트: {extra}")]
    TrailingBytes { extra: usize },

    #[error("페이로드 크기 초과: {len} 바이트 (최대 {max})")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
