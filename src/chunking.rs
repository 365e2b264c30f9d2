use crate::config::RetrievalConfig;
use crate::error::{RagError, Result};

/// Represents a text chunk with its position in the source text
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// Trimmed text of this chunk
    pub text: String,
    /// Character offset where the window of this chunk starts
    pub start_position: usize,
    /// Character offset one past the end of the window
    pub end_position: usize,
}

/// Splits text into overlapping windows that prefer to end on a sentence or line break.
#[derive(Debug, Clone)]
pub struct Chunker {
    size: usize,
    overlap: usize,
    boundary_ratio: f32,
    min_chunk_chars: usize,
}

impl Chunker {
    /// Create a chunker, failing when the cursor would not advance
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        let config = RetrievalConfig {
            chunk_size: size,
            chunk_overlap: overlap,
            ..Default::default()
        };
        Self::from_config(&config)
    }

    pub fn from_config(config: &RetrievalConfig) -> Result<Self> {
        if config.chunk_size == 0 || config.chunk_overlap >= config.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        if !(0.0..1.0).contains(&config.boundary_ratio)
            || (config.chunk_size as f32 * config.boundary_ratio) < config.chunk_overlap as f32
        {
            return Err(RagError::Config(format!(
                "boundary_ratio ({}) is incompatible with chunk_size {} and chunk_overlap {}",
                config.boundary_ratio, config.chunk_size, config.chunk_overlap
            )));
        }

        Ok(Chunker {
            size: config.chunk_size,
            overlap: config.chunk_overlap,
            boundary_ratio: config.boundary_ratio,
            min_chunk_chars: config.min_chunk_chars,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into chunks.
    ///
    /// Positions are counted in characters. A window that does not reach the
    /// end of the text is shortened to its last `.` or `\n` when that break
    /// lies past `size * boundary_ratio`. Trimmed windows of `min_chunk_chars`
    /// characters or fewer are dropped, and every window starts `overlap`
    /// characters before the previous one ended.
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let min_break = self.size as f32 * self.boundary_ratio;

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < len {
            let mut end = start + self.size;
            let mut window = &chars[start..end.min(len)];

            if end < len {
                let last_break = window.iter().rposition(|&c| c == '.' || c == '\n');
                if let Some(break_point) = last_break {
                    if break_point as f32 > min_break {
                        window = &chars[start..start + break_point + 1];
                        end = start + break_point + 1;
                    }
                }
            }

            let raw: String = window.iter().collect();
            let trimmed = raw.trim();
            if trimmed.chars().count() > self.min_chunk_chars {
                chunks.push(TextChunk {
                    text: trimmed.to_string(),
                    start_position: start,
                    end_position: end.min(len),
                });
            }

            // only break points past the overlap are accepted, so this advances
            start = end - self.overlap;
        }

        chunks
    }
}

impl Default for Chunker {
    fn default() -> Self {
        let config = RetrievalConfig::default();
        Chunker {
            size: config.chunk_size,
            overlap: config.chunk_overlap,
            boundary_ratio: config.boundary_ratio,
            min_chunk_chars: config.min_chunk_chars,
        }
    }
}
