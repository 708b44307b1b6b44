#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub ordinal: usize,
    pub words: Vec<String>,
}

impl Chunk {
    pub fn text(&self) -> String {
        self.words.join(" ")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    pub max_words: usize,
    pub max_chunks: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_words: 300,
            max_chunks: 10,
        }
    }
}

pub trait Chunker: Send + Sync {
    fn chunk(&self, content: &str, config: &ChunkConfig) -> Vec<Chunk>;
}

/// Splits on whitespace into non-overlapping windows of `max_words`, keeping
/// only the first `max_chunks` windows.
#[derive(Debug, Default, Clone)]
pub struct WordChunker;

impl Chunker for WordChunker {
    fn chunk(&self, content: &str, config: &ChunkConfig) -> Vec<Chunk> {
        chunk_words(content, config.max_words, config.max_chunks)
    }
}

pub fn chunk_words(content: &str, max_words: usize, max_chunks: usize) -> Vec<Chunk> {
    let max_words = max_words.max(1);
    let max_chunks = max_chunks.max(1);
    let words: Vec<&str> = content.split_whitespace().collect();

    words
        .chunks(max_words)
        .take(max_chunks)
        .enumerate()
        .map(|(ordinal, window)| Chunk {
            ordinal,
            words: window.iter().map(|w| w.to_string()).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn windows_are_bounded_and_ordered() {
        let text = numbered_words(25);
        let chunks = chunk_words(&text, 10, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].words.len(), 10);
        assert_eq!(chunks[2].words.len(), 5);
        assert_eq!(chunks[2].ordinal, 2);
        assert_eq!(chunks[1].words[0], "w10");
    }

    #[test]
    fn tail_beyond_max_chunks_is_dropped() {
        let text = numbered_words(100);
        let chunks = chunk_words(&text, 7, 3);
        assert_eq!(chunks.len(), 3);

        let flattened: Vec<String> = chunks.into_iter().flat_map(|c| c.words).collect();
        let expected: Vec<String> = text
            .split_whitespace()
            .take(21)
            .map(str::to_string)
            .collect();
        assert_eq!(flattened, expected);
    }

    #[test]
    fn collapses_mixed_whitespace() {
        let chunks = WordChunker.chunk(
            "  Lease\tagreement\n\nbetween   parties ",
            &ChunkConfig::default(),
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text(), "Lease agreement between parties");
    }

    #[test]
    fn blank_text_has_no_chunks() {
        assert!(chunk_words(" \n\t ", 300, 10).is_empty());
    }

    #[test]
    fn zero_limits_still_yield_one_chunk() {
        let chunks = chunk_words("lease agreement between parties", 0, 0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].words, vec!["lease"]);
    }
}
