//! Text chunking for the local PDF path
//!
//! Splits page text at semantic boundaries so no chunk exceeds the
//! partitioner's `max_characters`.

use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

/// Split text into chunks of at most `max_characters`, dropping blank ones
pub fn chunk_text(text: &str, max_characters: usize) -> Vec<String> {
    let splitter = TextSplitter::new(ChunkConfig::new(max_characters.max(1)));

    let chunks: Vec<String> = splitter
        .chunks(text)
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_string)
        .collect();

    debug!(
        input_len = text.len(),
        chunk_count = chunks.len(),
        max_characters,
        "Text chunked"
    );

    chunks
}
