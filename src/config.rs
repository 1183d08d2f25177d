//! 프로토콜 설정

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::{Error, Result, DEFAULT_MAX_PAYLOAD, DEFAULT_PORT, DEFAULT_READ_BUFFER};

/// 서버 설정
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 바인드 주소
    pub bind_addr: SocketAddr,

    /// 한 번의 read에 예약하는 버퍼 크기
    pub read_buffer_size: usize,

    /// 허용하는 최대 페이로드 길이
    /// 넘는 길이를 선언한 연결은 닫는다
    pub max_payload_len: usize,

    /// TCP_NODELAY 설정 여부
    pub nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            read_buffer_size: DEFAULT_READ_BUFFER,
            max_payload_len: DEFAULT_MAX_PAYLOAD,
            nodelay: true,
        }
    }
}

impl ServerConfig {
    /// 로컬 테스트용: 127.0.0.1의 임의 포트
    pub fn loopback() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            ..Self::default()
        }
    }
}

/// 클라이언트 설정
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 서버 호스트 (IP 또는 도메인)
    pub server_host: String,

    /// 서버 포트
    pub server_port: u16,

    /// 최소 블록 크기 (Lmin, 0보다 커야 함)
    pub l_min: u32,

    /// 최대 블록 크기 (Lmax, 파일 크기보다 크면 파일 크기로 줄임)
    pub l_max: u32,

    /// 전송할 파일 목록 (한 연결에서 순서대로 전송)
    pub files: Vec<PathBuf>,

    /// 결과 파일 저장 디렉터리
    pub output_dir: PathBuf,

    /// 블록 크기 상한 (서버의 최대 페이로드에 맞춤)
    pub max_block_len: u32,

    /// 한 번의 read에 예약하는 버퍼 크기
    pub read_buffer_size: usize,

    /// TCP_NODELAY 설정 여부
    pub nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_host: Ipv4Addr::LOCALHOST.to_string(),
            server_port: DEFAULT_PORT,
            l_min: 1,
            l_max: DEFAULT_READ_BUFFER as u32,
            files: Vec::new(),
            output_dir: PathBuf::from("."),
            max_block_len: DEFAULT_MAX_PAYLOAD as u32,
            read_buffer_size: DEFAULT_READ_BUFFER,
            nodelay: true,
        }
    }
}

impl ClientConfig {
    /// 새 설정 생성
    pub fn new(server_host: impl Into<String>, server_port: u16, l_min: u32, l_max: u32) -> Self {
        Self {
            server_host: server_host.into(),
            server_port,
            l_min,
            l_max,
            ..Self::default()
        }
    }

    /// 포트 범위 검증 (0 ~ 65535)
    pub fn parse_port(port: i64) -> Result<u16> {
        u16::try_from(port).map_err(|_| Error::InvalidPort(port))
    }

    /// 연결 전에 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.l_min == 0 || self.l_max < self.l_min {
            return Err(Error::InvalidBlockRange {
                min: self.l_min,
                max: self.l_max,
            });
        }

        if self.files.is_empty() {
            return Err(Error::NoInputFiles);
        }

        for path in &self.files {
            let metadata = std::fs::metadata(path).map_err(|e| Error::InvalidInputFile {
                path: path.clone(),
                reason: e.to_string(),
            })?;

            if !metadata.is_file() {
                return Err(Error::InvalidInputFile {
                    path: path.clone(),
                    reason: "not a regular file".to_string(),
                });
            }

            if metadata.len() > u32::MAX as u64 {
                return Err(Error::FileTooLarge {
                    path: path.clone(),
                    size: metadata.len(),
                });
            }
        }

        Ok(())
    }

    /// 블록 크기 상한을 적용한 `(Lmin, Lmax)`
    pub fn block_range(&self) -> (u32, u32) {
        let cap = self.max_block_len.max(1);
        (self.l_min.min(cap), self.l_max.min(cap))
    }
}
