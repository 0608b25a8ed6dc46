//! Text Chunking Module
//!
//! 우선순위 구분자(문단 → 줄 → 문장부호 → 쉼표 → 공백 → 문자)로
//! 긴 텍스트를 겹치는 청크로 나눕니다.
//!
//! 모든 청크는 원문의 부분 문자열이므로, 오버랩을 제거하고 이어 붙이면
//! 원문이 그대로 복원됩니다.

use std::ops::Range;

use crate::error::{KnowledgeError, Result};

/// 기본 구분자 (우선순위 순). 빈 문자열은 문자 단위 분할을 의미
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ".", "!", "?", ",", " ", ""];

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정 (단위: 문자 수)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 청크 최대 크기
    pub chunk_size: usize,
    /// 연속 청크가 공유하는 최소 문자 수
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// 오버랩은 청크 크기보다 작아야 진행이 보장됨
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(KnowledgeError::InvalidConfig(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(KnowledgeError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// 한 조각(piece)이 가질 수 있는 최대 문자 수
    fn piece_limit(&self) -> usize {
        self.chunk_size.saturating_sub(self.chunk_overlap).max(1)
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// RecursiveChunker
// ============================================================================

/// 구분자 사이의 원자 조각 (바이트 범위 + 문자 수)
#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    chars: usize,
}

/// 재귀 구분자 청커
///
/// 1. 가장 높은 우선순위 구분자로 텍스트를 나누고, 최대 크기를 넘는 조각만
///    다음 구분자로 다시 나눕니다 (구분자는 조각 끝에 붙어 유지됨).
/// 2. 조각을 `chunk_size` 이내로 탐욕적으로 묶습니다.
/// 3. 다음 청크는 이전 청크 끝에서 `chunk_overlap` 문자 이상 되돌아간
///    위치에서 시작합니다. 가능하면 조각 경계를, 불가능하면 정확한 문자 위치를 씁니다.
pub struct RecursiveChunker {
    config: ChunkConfig,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        Self::with_separators(config, DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect())
    }

    /// 구분자 목록 지정
    pub fn with_separators(config: ChunkConfig, separators: Vec<String>) -> Self {
        Self { config, separators }
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// 청크의 바이트 범위 목록
    pub fn split_spans(&self, text: &str) -> Vec<Range<usize>> {
        if text.is_empty() {
            return vec![];
        }

        let size = self.config.chunk_size.max(1);
        let overlap = self.config.chunk_overlap.min(size - 1);

        if text.chars().count() <= size {
            return vec![0..text.len()];
        }

        let mut pieces = Vec::new();
        split_pieces(
            text,
            0,
            &self.separators,
            self.config.piece_limit(),
            &mut pieces,
        );

        // 조각 경계: (바이트 오프셋, 문자 오프셋)
        let mut bounds = Vec::with_capacity(pieces.len() + 1);
        bounds.push((0usize, 0usize));
        let mut char_pos = 0;
        for piece in &pieces {
            char_pos += piece.chars;
            bounds.push((piece.end, char_pos));
        }
        let last = bounds.len() - 1;

        let mut spans = Vec::new();
        let mut start = bounds[0];
        let mut next = 1;

        loop {
            let mut end = next;
            while end < last && bounds[end + 1].1 - start.1 <= size {
                end += 1;
            }
            spans.push(start.0..bounds[end].0);

            if end == last {
                break;
            }

            let target = bounds[end].1 - overlap;
            let next_end = bounds[end + 1].1;

            // 가장 늦은 경계 중 오버랩과 다음 조각을 모두 담을 수 있는 위치
            let boundary = bounds[..=end]
                .iter()
                .rev()
                .find(|b| b.1 <= target)
                .filter(|b| b.1 > start.1 && next_end - b.1 <= size)
                .copied();

            start = match boundary {
                Some(b) => b,
                None => {
                    let end_byte = bounds[end].0;
                    let byte = if overlap == 0 {
                        end_byte
                    } else {
                        text[..end_byte]
                            .char_indices()
                            .rev()
                            .nth(overlap - 1)
                            .map_or(start.0, |(i, _)| i)
                    };
                    (byte, target)
                }
            };
            next = end + 1;
        }

        spans
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        self.split_spans(text)
            .into_iter()
            .map(|span| text[span].to_string())
            .collect()
    }

    fn name(&self) -> &'static str {
        "RecursiveChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 최대 문자 수 이하가 될 때까지 구분자 우선순위를 따라 재귀 분할
fn split_pieces(
    text: &str,
    offset: usize,
    separators: &[String],
    limit: usize,
    out: &mut Vec<Piece>,
) {
    let chars = text.chars().count();
    if chars <= limit {
        if !text.is_empty() {
            out.push(Piece {
                start: offset,
                end: offset + text.len(),
                chars,
            });
        }
        return;
    }

    let found = separators
        .iter()
        .enumerate()
        .find(|(_, sep)| sep.is_empty() || text.contains(sep.as_str()));

    match found {
        Some((idx, sep)) if !sep.is_empty() => {
            let rest = &separators[idx + 1..];
            let mut pos = 0;
            for part in text.split_inclusive(sep.as_str()) {
                split_pieces(part, offset + pos, rest, limit, out);
                pos += part.len();
            }
        }
        _ => split_chars(text, offset, limit, out),
    }
}

/// 문자 단위 고정 폭 분할 (최후 수단)
fn split_chars(text: &str, offset: usize, limit: usize, out: &mut Vec<Piece>) {
    let mut start = 0;
    let mut count = 0;

    for (i, _) in text.char_indices() {
        if count == limit {
            out.push(Piece {
                start: offset + start,
                end: offset + i,
                chars: count,
            });
            start = i;
            count = 0;
        }
        count += 1;
    }

    if count > 0 {
        out.push(Piece {
            start: offset + start,
            end: offset + text.len(),
            chars: count,
        });
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 설정 지정 청커 생성
pub fn recursive_chunker(config: ChunkConfig) -> Box<dyn Chunker> {
    Box::new(RecursiveChunker::new(config))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// 오버랩을 제거하며 원문 복원
    fn reconstruct(text: &str, spans: &[Range<usize>]) -> String {
        let mut out = String::new();
        let mut covered = 0;
        for span in spans {
            assert!(span.start <= covered, "gap between chunks");
            out.push_str(&text[covered..span.end]);
            covered = span.end;
        }
        out
    }

    fn assert_chunk_invariants(chunker: &RecursiveChunker, text: &str) {
        let config = chunker.config().clone();
        let spans = chunker.split_spans(text);

        assert!(spans.len() > 1);
        for span in &spans {
            assert!(text[span.clone()].chars().count() <= config.chunk_size);
        }
        for pair in spans.windows(2) {
            let shared = text[pair[1].start..pair[0].end].chars().count();
            assert!(shared >= config.chunk_overlap, "overlap {} too small", shared);
            assert!(pair[1].end > pair[0].end, "no progress");
        }
        assert_eq!(reconstruct(text, &spans), text);
    }

    fn paragraph(n: usize) -> String {
        format!(
            "Paragraph {} describes how beams, columns and plates are inserted into the model. \
             Each part has a profile, a material and a pair of points.",
            n
        )
    }

    #[test]
    fn test_chunker_empty() {
        let chunker = RecursiveChunker::new(ChunkConfig::default());
        assert!(chunker.chunk("").is_empty());
    }

    #[test]
    fn test_chunker_small_text() {
        let chunker = RecursiveChunker::new(ChunkConfig::default());
        let text = "# Header\n\nShort paragraph.";
        let chunks = chunker.chunk(text);
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn test_long_text_invariants() {
        let chunker = RecursiveChunker::new(ChunkConfig::new(300, 60));
        let text = (0..12).map(paragraph).collect::<Vec<_>>().join("\n\n");
        assert_chunk_invariants(&chunker, &text);
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let chunker = RecursiveChunker::new(ChunkConfig::new(100, 0));
        let text = format!("{}\n\n{}\n\n{}", "a".repeat(40), "b".repeat(40), "c".repeat(40));
        let chunks = chunker.chunk(&text);

        assert!(chunks.len() > 1);
        assert!(chunks[0].ends_with("\n\n"));
        assert!(!chunks[0].contains('c'));
    }

    #[test]
    fn test_falls_back_to_characters() {
        let chunker = RecursiveChunker::new(ChunkConfig::new(100, 20));
        let text = "x".repeat(250);
        assert_chunk_invariants(&chunker, &text);
    }

    #[test]
    fn test_without_overlap() {
        let chunker = RecursiveChunker::new(ChunkConfig::new(50, 0));
        let text = "word ".repeat(40);
        let spans = chunker.split_spans(&text);
        for pair in spans.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(reconstruct(&text, &spans), text);
    }

    #[test]
    fn test_multibyte_text() {
        let chunker = RecursiveChunker::new(ChunkConfig::new(40, 10));
        let text = "모델에 보를 삽입합니다. 기둥은 시작점과 끝점을 가집니다, 판은 윤곽을 가집니다! "
            .repeat(6);
        assert_chunk_invariants(&chunker, &text);
    }

    #[test]
    fn test_deterministic() {
        let chunker = RecursiveChunker::new(ChunkConfig::new(120, 30));
        let text = (0..5).map(paragraph).collect::<Vec<_>>().join("\n");
        assert_eq!(chunker.chunk(&text), chunker.chunk(&text));
    }

    #[test]
    fn test_config_validation() {
        assert!(ChunkConfig::default().validate().is_ok());
        assert!(ChunkConfig::new(0, 0).validate().is_err());
        assert!(ChunkConfig::new(100, 100).validate().is_err());
    }
}
