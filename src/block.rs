//! 블록 분할과 바이트 반전
//!
//! - Block: 파일의 연속 구간, 크기는 `[Lmin, Lmax]`에서 무작위 결정
//! - 전송 순서: 마지막에 생성된 블록부터, 번호는 끝에서부터 1, 2, 3...

use std::ops::Range;

use rand::Rng;

use crate::{Error, Result};

/// 블록 번호 (끝에서부터 1부터 시작)
pub type BlockNo = u32;

/// 블록 크기 목록을 무작위로 생성 (thread_rng 사용)
pub fn segment(file_size: u32, l_min: u32, l_max: u32) -> Result<Vec<u32>> {
    segment_with(&mut rand::thread_rng(), file_size, l_min, l_max)
}

/// 주어진 난수 생성기로 블록 크기 목록 생성
///
/// 합계는 항상 `file_size`와 정확히 같고, 마지막 블록을 제외한 모든 블록은
/// `[l_min, l_max]` 범위에 있다. `l_max`가 파일 크기보다 크면 파일 크기로,
/// 파일이 `l_min`보다 작으면 `l_min`도 파일 크기로 줄인다.
pub fn segment_with<R: Rng + ?Sized>(
    rng: &mut R,
    file_size: u32,
    l_min: u32,
    l_max: u32,
) -> Result<Vec<u32>> {
    if l_min == 0 || l_max < l_min {
        return Err(Error::InvalidBlockRange {
            min: l_min,
            max: l_max,
        });
    }

    let l_max = l_max.min(file_size);
    let l_min = l_min.min(l_max);

    let mut blocks = Vec::new();
    let mut sum = 0u32;
    while sum < file_size {
        let remaining = file_size - sum;
        let len = rng.gen_range(l_min..=l_max).min(remaining);
        blocks.push(len);
        sum += len;
    }

    Ok(blocks)
}

/// 바이트 순서를 뒤집은 사본 반환
pub fn reverse_bytes(data: &[u8]) -> Vec<u8> {
    data.iter().rev().copied().collect()
}

/// 한 번의 파일 전송에 쓰이는 블록 계획 (생성 후 불변)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPlan {
    lengths: Vec<u32>,
}

impl BlockPlan {
    /// 무작위 블록 계획 생성
    pub fn new(file_size: u32, l_min: u32, l_max: u32) -> Result<Self> {
        segment(file_size, l_min, l_max).map(Self::from_lengths)
    }

    /// 난수 생성기를 지정해 생성 (재현 가능한 테스트용)
    pub fn with_rng<R: Rng + ?Sized>(
        rng: &mut R,
        file_size: u32,
        l_min: u32,
        l_max: u32,
    ) -> Result<Self> {
        segment_with(rng, file_size, l_min, l_max).map(Self::from_lengths)
    }

    /// 이미 정해진 블록 크기 목록으로 생성
    pub fn from_lengths(lengths: Vec<u32>) -> Self {
        Self { lengths }
    }

    /// 블록 수 (Initialization 메시지의 N)
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// 블록 크기 합계
    pub fn total(&self) -> u64 {
        self.lengths.iter().map(|&len| len as u64).sum()
    }

    /// 생성 순서의 블록 크기
    pub fn lengths(&self) -> &[u32] {
        &self.lengths
    }

    /// 전송 순서로 `(블록 번호, 파일 내 바이트 구간)` 반환
    ///
    /// 마지막 블록(파일 끝)이 1번으로 가장 먼저 나온다.
    pub fn transmission_order(&self) -> impl Iterator<Item = (BlockNo, Range<usize>)> + '_ {
        let mut end = self.total() as usize;
        self.lengths
            .iter()
            .rev()
            .enumerate()
            .map(move |(idx, &len)| {
                let start = end - len as usize;
                let range = start..end;
                end = start;
                ((idx + 1) as BlockNo, range)
            })
    }
}
