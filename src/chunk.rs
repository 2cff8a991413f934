//! Overlapping window text splitter.
//!
//! Splits a page's text into segments no longer than `chunk_size` bytes
//! (cut at UTF-8 character boundaries), preferring paragraph, line, then
//! word boundaries, with `chunk_overlap` trailing bytes carried into the
//! next segment.
//!
//! Each chunk receives a deterministic SHA-256 key over its source path and
//! content. The key is the chunk's identity for sync purposes: the record
//! ledger and the vector store both address chunks by it, and dedup
//! correctness requires that the same source + text hash identically in every
//! process.

use sha2::{Digest, Sha256};

use crate::models::{Chunk, Document};

/// Split `text` into overlapping segments of at most `chunk_size` bytes.
///
/// Cuts prefer `\n\n`, then `\n`, then a space within the window; a window
/// with no such boundary is hard-split at the size limit. Whitespace-only
/// segments are dropped.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut start = 0usize;

    while start < text.len() {
        let mut end = (start + chunk_size).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        if end <= start {
            // A single code point wider than chunk_size; take it whole.
            end = (start + 1..=text.len())
                .find(|&i| text.is_char_boundary(i))
                .unwrap_or(text.len());
        }

        if end < text.len() {
            let window = &text[start..end];
            let cut = window
                .rfind("\n\n")
                .map(|p| p + 2)
                .or_else(|| window.rfind('\n').map(|p| p + 1))
                .or_else(|| window.rfind(' ').map(|p| p + 1));
            // Only honor the boundary if it leaves more than the overlap
            // behind, otherwise the next window would not advance usefully.
            if let Some(cut) = cut {
                if cut > chunk_overlap {
                    end = start + cut;
                }
            }
        }

        let piece = text[start..end].trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }

        if end >= text.len() {
            break;
        }

        let mut next = end.saturating_sub(chunk_overlap).max(start + 1);
        while next < text.len() && !text.is_char_boundary(next) {
            next += 1;
        }
        start = next;
    }

    pieces
}

/// Split one document (a PDF page) into keyed chunks.
pub fn chunk_document(doc: &Document, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    split_text(&doc.content, chunk_size, chunk_overlap)
        .into_iter()
        .map(|content| Chunk {
            key: chunk_key(&doc.source, &content),
            content,
            source: doc.source.clone(),
            page: doc.page,
        })
        .collect()
}

/// Split every document of an indexing pass, preserving corpus order.
pub fn chunk_documents(docs: &[Document], chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    docs.iter()
        .flat_map(|d| chunk_document(d, chunk_size, chunk_overlap))
        .collect()
}

/// Deterministic chunk identity: `sha256(source || 0x00 || content)`.
///
/// The source path is part of the key so identical text appearing in two
/// different documents is indexed for both instead of falsely deduplicated.
pub fn chunk_key(source: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
