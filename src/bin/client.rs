//! RBP 클라이언트 - Reverse Block Protocol
//!
//! 파일을 `[Lmin, Lmax]` 크기의 랜덤 블록으로 나눠 서버에 보내고,
//! 반전되어 돌아온 블록을 결과 파일에 기록한다.
//!
//! 사용법:
//!   cargo run --release --bin rbp-client -- [OPTIONS] --lmin <N> --lmax <N> <FILES>...
//!
//! 예시:
//!   # 파일 두 개를 순서대로 전송
//!   cargo run --release --bin rbp-client -- -s 127.0.0.1 -p 8888 --lmin 3 --lmax 5 a.txt b.txt

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rbp::{Client, ClientConfig, TracingSink, DEFAULT_PORT};

/// RBP Client - Reverse Block Protocol 클라이언트
#[derive(Parser, Debug)]
#[command(name = "rbp-client", version, about)]
struct Args {
    /// 서버 주소 (IP 또는 도메인)
    #[arg(short, long, default_value = "127.0.0.1")]
    server: String,

    /// 서버 포트 (0 ~ 65535)
    #[arg(short, long, default_value_t = DEFAULT_PORT as i64, allow_negative_numbers = true)]
    port: i64,

    /// 최소 블록 크기 (Lmin, 0보다 커야 함)
    #[arg(long = "lmin")]
    l_min: u32,

    /// 최대 블록 크기 (Lmax, 파일보다 크면 파일 크기로 줄임)
    #[arg(long = "lmax")]
    l_max: u32,

    /// 결과 파일 저장 디렉터리
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// 로그를 덧붙여 쓸 파일 (없으면 표준 출력)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// 전송할 파일 (하나 이상)
    #[arg(required = true)]
    files: Vec<PathBuf>,
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

    let client = match ClientConfig::parse_port(args.port).and_then(|port| {
        let mut config = ClientConfig::new(args.server, port, args.l_min, args.l_max);
        config.files = args.files;
        config.output_dir = args.output_dir;
        Client::new(config)
    }) {
        Ok(client) => client,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    info!("RBP Client starting...");
    info!(
        "Server: {}:{}",
        client.config().server_host,
        client.config().server_port
    );
    info!("Block size: [{}, {}]", client.config().l_min, client.config().l_max);

    match client.run(TracingSink).await {
        Ok(reports) => {
            for report in &reports {
                info!(
                    "{} -> {} ({} blocks)",
                    report.source.display(),
                    report.output.display(),
                    report.block_count
                );
            }
            Ok(())
        }
        Err(e) => {
            error!("Transfer aborted: {}", e);
            std::process::exit(1);
        }
    }
}
