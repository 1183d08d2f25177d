//! RBP 서버 - Reverse Block Protocol
//!
//! 단일 스레드 이벤트 루프로 여러 연결을 동시에 처리하며,
//! 받은 블록을 바이트 반전해서 돌려준다.
//!
//! 사용법:
//!   cargo run --release --bin rbp-server -- [OPTIONS]
//!
//! 예시:
//!   # 기본 포트(8888)로 실행
//!   cargo run --release --bin rbp-server
//!
//!   # 주소 지정 + 파일 로그
//!   cargo run --release --bin rbp-server -- --bind 127.0.0.1:9000 --log-file server.log

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rbp::{Server, ServerConfig, DEFAULT_MAX_PAYLOAD, DEFAULT_READ_BUFFER};

/// RBP Server - Reverse Block Protocol 서버
#[derive(Parser, Debug)]
#[command(name = "rbp-server", version, about)]
struct Args {
    /// 바인드 주소
    #[arg(short, long, default_value = "0.0.0.0:8888")]
    bind: SocketAddr,

    /// 허용하는 최대 블록 페이로드 (바이트)
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD)]
    max_payload: usize,

    /// read 한 번에 예약하는 버퍼 크기 (바이트)
    #[arg(long, default_value_t = DEFAULT_READ_BUFFER)]
    read_buffer: usize,

    /// 로그를 덧붙여 쓸 파일 (없으면 표준 출력)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init().map_err(|e| e as Box<dyn std::error::Error>)?;
        }
        None => builder.try_init().map_err(|e| e as Box<dyn std::error::Error>)?,
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let config = ServerConfig {
        bind_addr: args.bind,
        read_buffer_size: args.read_buffer,
        max_payload_len: args.max_payload,
        ..ServerConfig::default()
    };

    info!("RBP Server starting...");
    info!("Max payload: {} bytes", config.max_payload_len);
    info!("Read buffer: {} bytes", config.read_buffer_size);

    let server = Server::bind(config).await?;
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
