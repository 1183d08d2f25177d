//! 클라이언트 (파일 송신측)
//!
//! 서버에 한 번 연결하고 설정된 파일들을 같은 연결로 순서대로 전송한다.
//! 한 파일이라도 실패하면 연결이 닫히므로 나머지 파일도 중단된다.
//! 결과 파일은 서버가 Agree로 수락한 뒤에 만들어지고, 파일마다 새 파일을 만든다.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::block::BlockPlan;
use crate::config::ClientConfig;
use crate::event::EventSink;
use crate::framing::FrameBuffer;
use crate::session::Session;
use crate::stats::TransferStats;
use crate::{Error, Result};

/// 파일 하나의 전송 결과
#[derive(Debug, Clone)]
pub struct FileReport {
    /// 원본 파일
    pub source: PathBuf,

    /// 반전 결과 파일
    pub output: PathBuf,

    /// 블록 수
    pub block_count: usize,

    pub stats: TransferStats,
}

/// 결과 파일 경로: `reverse_<파일 이름>_<유닉스 밀리초>.txt`
pub fn output_path(dir: &Path, source: &Path, at: SystemTime) -> PathBuf {
    output_candidate(dir, source, at, 0)
}

/// `seq`가 0이 아니면 `reverse_<파일 이름>_<유닉스 밀리초>_<seq>.txt`
fn output_candidate(dir: &Path, source: &Path, at: SystemTime, seq: u32) -> PathBuf {
    let millis = at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());

    if seq == 0 {
        dir.join(format!("reverse_{}_{}.txt", name, millis))
    } else {
        dir.join(format!("reverse_{}_{}_{}.txt", name, millis, seq))
    }
}

/// 결과 파일 새로 생성
///
/// 같은 이름이 이미 있으면 (같은 밀리초에 같은 이름의 파일) 번호를 붙여 다시 시도한다.
/// 기존 결과 파일에 이어 쓰는 일은 없다.
pub async fn create_output(dir: &Path, source: &Path, at: SystemTime) -> Result<(PathBuf, File)> {
    let mut seq = 0;
    loop {
        let path = output_candidate(dir, source, at, seq);
        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists && seq < u32::MAX => seq += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

/// RBP 클라이언트
pub struct Client {
    config: ClientConfig,
}

impl Client {
    /// 설정 검증 후 생성 (연결 전에 설정 에러 보고)
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// 연결 후 모든 파일 전송
    pub async fn run<E: EventSink>(&self, events: E) -> Result<Vec<FileReport>> {
        let host = self.config.server_host.as_str();
        let port = self.config.server_port;

        let stream = TcpStream::connect((host, port)).await?;
        if self.config.nodelay {
            stream.set_nodelay(true)?;
        }
        info!("Connected to {}:{}", host, port);

        let frames = FrameBuffer::new(self.config.read_buffer_size, self.config.max_block_len as usize);
        let mut session = Session::with_frame_buffer(stream, events, frames);

        let mut reports = Vec::with_capacity(self.config.files.len());
        for path in &self.config.files {
            info!("{} transfer started", path.display());
            let report = self.transfer_file(&mut session, path).await?;
            info!(
                "{} transfer complete -> {} ({})",
                path.display(),
                report.output.display(),
                report.stats.summary()
            );
            reports.push(report);
        }

        session.close().await?;
        info!("All {} files transferred", reports.len());
        Ok(reports)
    }

    async fn transfer_file<S, E>(&self, session: &mut Session<S, E>, path: &Path) -> Result<FileReport>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        E: EventSink,
    {
        let (data, plan) = match self.prepare(path).await {
            Ok(prepared) => prepared,
            Err(e) => {
                session.abort(&e).await;
                return Err(e);
            }
        };

        let dir = self.config.output_dir.as_path();
        let mut output = None;
        let slot = &mut output;
        let stats = session
            .transfer_with(data, &plan, || async move {
                let (created, file) = create_output(dir, path, SystemTime::now()).await?;
                *slot = Some(created);
                Ok(file)
            })
            .await?;

        Ok(FileReport {
            source: path.to_path_buf(),
            output: output.unwrap_or_default(),
            block_count: plan.len(),
            stats,
        })
    }

    /// 파일 읽기와 블록 계획
    async fn prepare(&self, path: &Path) -> Result<(Bytes, BlockPlan)> {
        let data = Bytes::from(tokio::fs::read(path).await?);
        let file_size = u32::try_from(data.len()).map_err(|_| Error::FileTooLarge {
            path: path.to_path_buf(),
            size: data.len() as u64,
        })?;

        let (l_min, l_max) = self.config.block_range();
        if l_max > file_size {
            warn!(
                "Lmax {} exceeds size of {} ({} bytes), using file size",
                l_max,
                path.display(),
                file_size
            );
        }
        let plan = BlockPlan::new(file_size, l_min, l_max)?;
        Ok((data, plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::reverse_bytes;
    use crate::config::ServerConfig;
    use crate::event::SessionEvent;
    use crate::message::Message;
    use crate::server::Server;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    #[test]
    fn test_output_path() {
        let at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        let path = output_path(Path::new("out"), Path::new("/tmp/notes.md"), at);
        assert_eq!(path, Path::new("out").join("reverse_notes.md_1700000000123.txt"));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ClientConfig::new("127.0.0.1", 8888, 1, 10);
        assert!(matches!(Client::new(config), Err(Error::NoInputFiles)));
    }

    #[tokio::test]
    async fn test_transfers_all_files_over_one_connection() {
        let server = Server::bind(ServerConfig::loopback()).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let dir = tempfile::tempdir().unwrap();
        let contents: [&[u8]; 3] = [b"hello reverse world", b"tiny", b""];
        let mut files = Vec::new();
        for (idx, content) in contents.iter().enumerate() {
            let path = dir.path().join(format!("input{}.txt", idx));
            std::fs::write(&path, content).unwrap();
            files.push(path);
        }

        let mut config = ClientConfig::new("127.0.0.1", addr.port(), 2, 100);
        config.files = files;
        config.output_dir = dir.path().to_path_buf();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let reports = Client::new(config).unwrap().run(tx).await.unwrap();

        assert_eq!(reports.len(), 3);
        for (report, content) in reports.iter().zip(contents) {
            let written = std::fs::read(&report.output).unwrap();
            assert_eq!(written, reverse_bytes(content));
            assert_eq!(report.stats.bytes_received, content.len() as u64);
        }

        let mut completed = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, SessionEvent::TransferCompleted { .. }) {
                completed += 1;
            }
        }
        assert_eq!(completed, 3);
    }

    #[tokio::test]
    async fn test_same_file_names_get_distinct_outputs() {
        let server = Server::bind(ServerConfig::loopback()).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let dir = tempfile::tempdir().unwrap();
        let mut files = Vec::new();
        for (sub, content) in [("a", b"AAAA"), ("b", b"BBBB")] {
            std::fs::create_dir(dir.path().join(sub)).unwrap();
            let path = dir.path().join(sub).join("x.txt");
            std::fs::write(&path, content).unwrap();
            files.push(path);
        }
        // 같은 파일 두 번
        files.push(files[0].clone());

        let mut config = ClientConfig::new("127.0.0.1", addr.port(), 1, 4);
        config.files = files;
        config.output_dir = dir.path().to_path_buf();

        let reports = Client::new(config).unwrap().run(Vec::<SessionEvent>::new()).await.unwrap();

        assert_eq!(reports.len(), 3);
        assert_ne!(reports[0].output, reports[1].output);
        assert_ne!(reports[0].output, reports[2].output);
        assert_ne!(reports[1].output, reports[2].output);
        assert_eq!(std::fs::read(&reports[0].output).unwrap(), b"AAAA");
        assert_eq!(std::fs::read(&reports[1].output).unwrap(), b"BBBB");
        assert_eq!(std::fs::read(&reports[2].output).unwrap(), b"AAAA");
    }

    #[tokio::test]
    async fn test_create_output_adds_counter_on_collision() {
        let dir = tempfile::tempdir().unwrap();
        let at = UNIX_EPOCH + Duration::from_millis(42);
        let source = Path::new("x.txt");

        let (first, _) = create_output(dir.path(), source, at).await.unwrap();
        let (second, _) = create_output(dir.path(), source, at).await.unwrap();
        let (third, _) = create_output(dir.path(), source, at).await.unwrap();

        assert_eq!(first, dir.path().join("reverse_x.txt_42.txt"));
        assert_eq!(second, dir.path().join("reverse_x.txt_42_1.txt"));
        assert_eq!(third, dir.path().join("reverse_x.txt_42_2.txt"));
    }

    #[tokio::test]
    async fn test_refused_transfer_leaves_no_output() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut frames = FrameBuffer::default();
            frames.read_message(&mut stream).await.unwrap();
            let refusal = Message::Initialization { block_count: 0 };
            stream.write_all(&refusal.encode().unwrap()).await.unwrap();
            let _ = stream.read_to_end(&mut Vec::<u8>::new()).await;
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"data").unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();

        let mut config = ClientConfig::new("127.0.0.1", port, 1, 2);
        config.files = vec![path];
        config.output_dir = out.clone();

        let result = Client::new(config).unwrap().run(Vec::<SessionEvent>::new()).await;
        assert!(matches!(result, Err(Error::UnexpectedMessage { .. })));
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_file_closes_session_with_events() {
        let server = Server::bind(ServerConfig::loopback()).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        std::fs::write(&path, b"soon deleted").unwrap();

        let mut config = ClientConfig::new("127.0.0.1", addr.port(), 1, 4);
        config.files = vec![path.clone()];
        config.output_dir = dir.path().to_path_buf();
        let client = Client::new(config).unwrap();

        // 검증 후 실행 전에 삭제
        std::fs::remove_file(&path).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = client.run(tx).await;
        assert!(matches!(result, Err(Error::Io(_))));

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::Error { .. }, SessionEvent::ConnectionClosed]
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"data").unwrap();

        let mut config = ClientConfig::new("127.0.0.1", port, 1, 2);
        config.files = vec![path];
        config.output_dir = dir.path().to_path_buf();

        let result = Client::new(config).unwrap().run(Vec::<SessionEvent>::new()).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
