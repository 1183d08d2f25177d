//! 연결 세션 (클라이언트측)
//!
//! 상태 머신: `Idle → AwaitingAgree → Transmitting → Done`, 실패 시 `Failed`
//!
//! - Initialization 전송 후 Agree 대기
//! - 블록을 생성 역순으로 하나씩 전송하고 응답을 받을 때까지 대기 (파이프라이닝 없음)
//! - 재시도/타임아웃 없음: 실패하면 연결을 닫고 세션을 폐기

use std::future::Future;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::block::BlockPlan;
use crate::event::{EventSink, SessionEvent};
use crate::framing::FrameBuffer;
use crate::message::{Message, MessageType};
use crate::stats::TransferStats;
use crate::{Error, Result};

/// 세션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// 전송 전 (또는 다음 파일 대기)
    Idle,

    /// Initialization 전송 완료, Agree 대기
    AwaitingAgree,

    /// 블록 송수신 중
    Transmitting,

    /// 모든 블록 응답 완료
    Done,

    /// 실패 (재사용 불가)
    Failed,
}

/// 한 연결 위의 전송 세션
pub struct Session<S, E> {
    stream: S,
    frames: FrameBuffer,
    write_buf: BytesMut,
    state: SessionState,
    events: E,
}

impl<S, E> Session<S, E>
where
    S: AsyncRead + AsyncWrite + Unpin,
    E: EventSink,
{
    pub fn new(stream: S, events: E) -> Self {
        Self::with_frame_buffer(stream, events, FrameBuffer::default())
    }

    pub fn with_frame_buffer(stream: S, events: E, frames: FrameBuffer) -> Self {
        Self {
            stream,
            frames,
            write_buf: BytesMut::new(),
            state: SessionState::Idle,
            events,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    /// 파일 하나 전송
    ///
    /// 수신한 반전 데이터는 도착 순서대로 `output`에 이어 쓴다. 블록이 파일 끝부터
    /// 전송되므로 결과는 파일 전체를 뒤집은 것과 같다.
    pub async fn transfer<W>(
        &mut self,
        data: Bytes,
        plan: &BlockPlan,
        output: &mut W,
    ) -> Result<TransferStats>
    where
        W: AsyncWrite + Unpin,
    {
        self.transfer_with(data, plan, || async move { Ok(output) })
            .await
    }

    /// 파일 하나 전송, 출력은 Agree 수신 후에 연다
    ///
    /// 서버가 거절하면 `open_output`은 호출되지 않는다. 여는 데 실패하면
    /// 프로토콜 실패와 같이 연결을 닫는다.
    pub async fn transfer_with<W, F, Fut>(
        &mut self,
        data: Bytes,
        plan: &BlockPlan,
        open_output: F,
    ) -> Result<TransferStats>
    where
        W: AsyncWrite + Unpin,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<W>>,
    {
        match self.state {
            SessionState::Idle | SessionState::Done => {}
            // 이전 전송 future가 중간에 취소된 경우도 복구하지 않는다
            _ => return Err(Error::SessionFailed),
        }

        if plan.total() != data.len() as u64 {
            return Err(Error::PlanMismatch {
                planned: plan.total(),
                actual: data.len() as u64,
            });
        }

        self.state = SessionState::Idle;
        match self.run(data, plan, open_output).await {
            Ok(stats) => {
                self.state = SessionState::Done;
                self.events.on_event(SessionEvent::TransferCompleted {
                    stats: stats.clone(),
                });
                Ok(stats)
            }
            Err(e) => {
                self.fail(&e).await;
                Err(e)
            }
        }
    }

    /// 전송 시작 전 에러로 세션 중단 (파일 읽기 실패 등)
    ///
    /// `Error` 이벤트 후 연결을 닫고 `ConnectionClosed`를 알린다. 이미 실패한
    /// 세션에는 아무것도 하지 않는다.
    pub async fn abort(&mut self, err: &Error) {
        if self.state != SessionState::Failed {
            self.fail(err).await;
        }
    }

    async fn run<W, F, Fut>(&mut self, data: Bytes, plan: &BlockPlan, open_output: F) -> Result<TransferStats>
    where
        W: AsyncWrite + Unpin,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<W>>,
    {
        let block_count = plan.len() as u32;
        self.send(&Message::Initialization { block_count }).await?;
        self.state = SessionState::AwaitingAgree;
        debug!("Initialization sent: {} blocks", block_count);

        match self.frames.read_message(&mut self.stream).await? {
            Message::Agree => {}
            other => {
                return Err(Error::UnexpectedMessage {
                    expected: MessageType::Agree.to_string(),
                    got: other.msg_type().to_string(),
                })
            }
        }

        let mut output = open_output().await?;
        self.state = SessionState::Transmitting;
        self.events.on_event(SessionEvent::TransferStarted {
            block_count,
            file_size: data.len() as u64,
        });

        let mut stats = TransferStats::new(plan.len() as u64);

        for (block_no, range) in plan.transmission_order() {
            let block = data.slice(range);
            let len = block.len();

            self.send(&Message::ReverseRequest {
                block_no,
                data: block,
            })
            .await?;
            stats.record_sent(len);
            self.events.on_event(SessionEvent::BlockSent {
                block_no,
                len: len as u32,
            });

            let reversed = match self.frames.read_message(&mut self.stream).await? {
                Message::ReverseAnswer { block_no: got, data } if got == block_no && data.len() == len => {
                    data
                }
                Message::ReverseAnswer { block_no: got, data } => {
                    return Err(Error::BlockMismatch {
                        expected: block_no,
                        expected_len: len as u32,
                        got,
                        got_len: data.len() as u32,
                    })
                }
                other => {
                    return Err(Error::UnexpectedMessage {
                        expected: MessageType::ReverseAnswer.to_string(),
                        got: other.msg_type().to_string(),
                    })
                }
            };

            output.write_all(&reversed).await?;
            stats.record_acknowledged(reversed.len());
            self.events.on_event(SessionEvent::BlockAcknowledged {
                block_no,
                data: reversed,
            });
        }

        output.flush().await?;
        stats.finish();
        Ok(stats)
    }

    async fn send(&mut self, message: &Message) -> Result<()> {
        self.write_buf.clear();
        message.encode_into(&mut self.write_buf)?;
        self.stream.write_all(&self.write_buf).await?;
        Ok(())
    }

    async fn fail(&mut self, err: &Error) {
        self.state = SessionState::Failed;
        self.events.on_event(SessionEvent::Error {
            message: err.to_string(),
        });
        let _ = self.stream.shutdown().await;
        self.events.on_event(SessionEvent::ConnectionClosed);
    }

    /// 연결 종료
    pub async fn close(mut self) -> Result<E> {
        if self.state != SessionState::Failed {
            self.stream.shutdown().await?;
            self.events.on_event(SessionEvent::ConnectionClosed);
        }
        Ok(self.events)
    }
}
