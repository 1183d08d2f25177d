//! 전송 통계

use std::time::{Duration, Instant};

/// 파일 하나의 전송 통계
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 완료 시간
    pub finish_time: Option<Instant>,

    /// 총 블록 수
    pub total_blocks: u64,

    /// 응답 받은 블록 수
    pub acknowledged_blocks: u64,

    /// 총 전송 바이트 (페이로드 기준)
    pub bytes_sent: u64,

    /// 총 수신 바이트 (페이로드 기준)
    pub bytes_received: u64,
}

impl TransferStats {
    pub fn new(total_blocks: u64) -> Self {
        Self {
            start_time: Instant::now(),
            finish_time: None,
            total_blocks,
            acknowledged_blocks: 0,
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    /// ReverseRequest 전송 기록
    pub fn record_sent(&mut self, len: usize) {
        self.bytes_sent += len as u64;
    }

    /// ReverseAnswer 수신 기록
    pub fn record_acknowledged(&mut self, len: usize) {
        self.acknowledged_blocks += 1;
        self.bytes_received += len as u64;
    }

    /// 완료 시점 고정
    pub fn finish(&mut self) {
        self.finish_time.get_or_insert_with(Instant::now);
    }

    pub fn is_complete(&self) -> bool {
        self.acknowledged_blocks >= self.total_blocks
    }

    /// 경과 시간 (완료 후에는 고정)
    pub fn elapsed(&self) -> Duration {
        match self.finish_time {
            Some(end) => end.duration_since(self.start_time),
            None => self.start_time.elapsed(),
        }
    }

    /// 처리율 (bytes/sec, 수신 기준)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.bytes_received as f64 / elapsed
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.3}s | Blocks: {}/{} | Sent: {} B | Received: {} B | Throughput: {:.2} KB/s",
            self.elapsed().as_secs_f64(),
            self.acknowledged_blocks,
            self.total_blocks,
            self.bytes_sent,
            self.bytes_received,
            self.throughput() / 1000.0,
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_complete() {
        let mut stats = TransferStats::new(2);
        stats.record_sent(5);
        stats.record_acknowledged(5);
        assert!(!stats.is_complete());

        stats.record_sent(3);
        stats.record_acknowledged(3);
        stats.finish();

        assert!(stats.is_complete());
        assert_eq!(stats.bytes_sent, 8);
        assert_eq!(stats.bytes_received, 8);
        assert_eq!(stats.elapsed(), stats.elapsed());
        assert!(stats.summary().contains("Blocks: 2/2"));
    }
}
