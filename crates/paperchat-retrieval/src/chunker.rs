//! Fixed-size text chunking with structural-boundary preference.
//!
//! Splitting tries paragraph breaks first, then line breaks, then spaces,
//! and falls back to hard character cuts when a run of text carries no
//! separator at all. Chunk sizes are measured in characters, never bytes,
//! so multi-byte input can't be cut mid-codepoint.

/// Separators tried in order, coarsest first.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters of trailing context carried into the next chunk.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

/// Split `text` into chunks of at most `chunk_size` characters, with up to
/// `overlap` characters shared between consecutive chunks. Deterministic:
/// the same input and config always produce the same sequence. Empty input
/// produces no chunks, and no produced chunk is empty.
pub fn chunk_text(text: &str, cfg: &ChunkerConfig) -> Vec<String> {
    assert!(
        cfg.overlap < cfg.chunk_size,
        "chunk overlap ({}) must be smaller than chunk size ({})",
        cfg.overlap,
        cfg.chunk_size
    );
    let mut out = Vec::new();
    split_segment(text, &SEPARATORS, cfg, &mut out);
    out
}

fn split_segment(segment: &str, seps: &[&str], cfg: &ChunkerConfig, out: &mut Vec<String>) {
    if segment.is_empty() {
        return;
    }
    if char_len(segment) <= cfg.chunk_size {
        out.push(segment.to_string());
        return;
    }
    let Some((sep, rest)) = seps.split_first() else {
        hard_cut(segment, cfg, out);
        return;
    };
    if !segment.contains(sep) {
        split_segment(segment, rest, cfg, out);
        return;
    }

    // Pack separator-delimited pieces greedily, carrying the tail of the
    // previous chunk into the next one when it still fits.
    let mut current = String::new();
    let mut has_new = false;
    for piece in split_keep_sep(segment, sep) {
        if char_len(&piece) > cfg.chunk_size {
            if has_new {
                out.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
            has_new = false;
            split_segment(&piece, rest, cfg, out);
            if let Some(last) = out.last() {
                current = char_tail(last, cfg.overlap);
            }
            continue;
        }
        if char_len(&current) + char_len(&piece) > cfg.chunk_size {
            if has_new {
                out.push(current.clone());
            }
            has_new = false;
            let tail = out
                .last()
                .map(|c| char_tail(c, cfg.overlap))
                .unwrap_or_default();
            current = if char_len(&tail) + char_len(&piece) <= cfg.chunk_size {
                tail
            } else {
                String::new()
            };
        }
        current.push_str(&piece);
        has_new = true;
    }
    if has_new {
        out.push(current);
    }
}

/// Overlapping fixed-width windows for text with no usable separator.
fn hard_cut(segment: &str, cfg: &ChunkerConfig, out: &mut Vec<String>) {
    let chars: Vec<char> = segment.chars().collect();
    let mut start = 0;
    loop {
        let end = (start + cfg.chunk_size).min(chars.len());
        out.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start = end - cfg.overlap;
    }
}

fn split_keep_sep(segment: &str, sep: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = segment;
    while let Some(pos) = rest.find(sep) {
        let end = pos + sep.len();
        pieces.push(rest[..end].to_string());
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn char_tail(s: &str, n: usize) -> String {
    let len = char_len(s);
    if n >= len {
        return s.to_string();
    }
    s.chars().skip(len - n).collect()
}
