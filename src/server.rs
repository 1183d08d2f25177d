//! 이벤트 구동 디스패처 (서버측)
//!
//! - 리스너 하나 + 연결 여러 개를 리액터의 readiness 알림으로 멀티플렉싱
//! - 바이너리는 `current_thread` 런타임에서 실행: 모든 소켓 처리가 한 스레드
//! - 연결은 각자의 태스크가 소켓과 프레임 버퍼를 독점
//! - 메시지 간 상태 없음 (블록 수도 저장하지 않음)

use std::future::Future;
use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use crate::block::reverse_bytes;
use crate::config::ServerConfig;
use crate::framing::{Frame, FrameBuffer};
use crate::message::Message;
use crate::Result;

/// 메시지 하나에 대한 무상태 응답
///
/// Initialization에는 Agree, ReverseRequest에는 같은 블록 번호의 ReverseAnswer.
/// 서버가 받을 일이 없는 메시지(Agree, ReverseAnswer)에는 응답하지 않는다.
pub fn respond(message: Message) -> Option<Message> {
    match message {
        Message::Initialization { block_count } => {
            info!("Initialization received: {} blocks to follow", block_count);
            Some(Message::Agree)
        }
        Message::ReverseRequest { block_no, data } => Some(Message::ReverseAnswer {
            block_no,
            data: Bytes::from(reverse_bytes(&data)),
        }),
        other => {
            warn!("Unexpected {} from client, ignored", other.msg_type());
            None
        }
    }
}

/// RBP 서버
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
}

impl Server {
    /// 주소 바인딩
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        info!("RBP Server listening on {}", listener.local_addr()?);
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// 영원히 실행
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// `shutdown`이 완료될 때까지 연결 수락
    ///
    /// 수락 에러는 기록만 하고 루프를 계속한다. 이미 열린 연결은 자기 태스크에서
    /// 끝까지 처리된다.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!("Accepted new connection from {}", peer);
                        if self.config.nodelay {
                            if let Err(e) = stream.set_nodelay(true) {
                                warn!("{}: failed to set TCP_NODELAY: {}", peer, e);
                            }
                        }
                        let config = self.config.clone();
                        tokio::spawn(handle_connection(stream, peer, config));
                    }
                    Err(e) => warn!("Accept error: {}", e),
                },
            }
        }
    }
}

/// 연결 하나 처리. 에러는 이 연결 안에서 끝난다.
async fn handle_connection(mut stream: TcpStream, peer: SocketAddr, config: ServerConfig) {
    match serve_connection(&mut stream, peer, &config).await {
        Ok(()) => info!("Connection closed by {}", peer),
        Err(e) => error!("Connection error from {}: {}", peer, e),
    }
}

async fn serve_connection(
    stream: &mut TcpStream,
    peer: SocketAddr,
    config: &ServerConfig,
) -> Result<()> {
    let mut frames = FrameBuffer::new(config.read_buffer_size, config.max_payload_len);
    let mut out = BytesMut::new();

    loop {
        if frames.read_from(stream).await? == 0 {
            return Ok(());
        }

        while let Some(frame) = frames.next_frame()? {
            match frame {
                Frame::Message(message) => {
                    if let Message::ReverseRequest { block_no, data } = &message {
                        info!(
                            "ReverseRequest from {}: block #{} ({} bytes)",
                            peer,
                            block_no,
                            data.len()
                        );
                    }
                    if let Some(reply) = respond(message) {
                        reply.encode_into(&mut out)?;
                    }
                }
                Frame::Unknown { tag, discarded } => {
                    warn!(
                        "Unknown message type {} from {}, discarded {} bytes",
                        tag, peer, discarded
                    );
                }
            }
        }

        if !out.is_empty() {
            stream.write_all(&out).await?;
            out.clear();
        }
    }
}
