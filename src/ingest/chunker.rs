use std::collections::VecDeque;

/// A token-bounded text segment with its position in the document
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Zero-based, contiguous, order-significant within the document.
    pub index: usize,
    pub text: String,
    pub token_count: usize,
}

/// Pluggable token-length function. The default is a character-count
/// approximation; deployments with a real tokenizer can swap their own in.
pub type TokenLenFn = fn(&str) -> usize;

/// Estimate token count from text: 1 token ~= 4 characters.
///
/// Counts chars rather than bytes so multi-byte scripts are not overcounted.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() + 3) / 4
}

/// Separator hierarchy tried coarsest-first: paragraphs, lines, sentences,
/// words. Text with none of these falls back to a hard character split.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Split text into token-bounded chunks with overlap using the default
/// token estimator.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    chunk_text_with(text, chunk_size, chunk_overlap, estimate_tokens)
}

/// Split text into token-bounded chunks with overlap.
///
/// Splits recursively on semantic separators so chunk boundaries land on
/// paragraph/sentence edges where possible, then merges the pieces into
/// chunks of at most `chunk_size` tokens, carrying `chunk_overlap` tokens of
/// trailing context into the next chunk. Empty or whitespace-only input
/// yields no chunks.
pub fn chunk_text_with(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    token_len: TokenLenFn,
) -> Vec<Chunk> {
    if text.trim().is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let pieces = split_recursive(text, &SEPARATORS, chunk_size, token_len);
    let merged = merge_pieces(&pieces, chunk_size, chunk_overlap, token_len);

    merged
        .into_iter()
        .filter_map(|s| {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .enumerate()
        .map(|(index, text)| {
            let token_count = token_len(&text);
            Chunk {
                index,
                text,
                token_count,
            }
        })
        .collect()
}

/// Break text into pieces no larger than `max_tokens`, preferring the
/// coarsest separator that still appears in the text.
fn split_recursive(
    text: &str,
    seps: &[&str],
    max_tokens: usize,
    token_len: TokenLenFn,
) -> Vec<String> {
    if token_len(text) <= max_tokens {
        return vec![text.to_string()];
    }

    match seps.split_first() {
        Some((sep, rest)) => {
            if text.contains(sep) {
                let mut out = Vec::new();
                for part in split_keep_separator(text, sep) {
                    if token_len(&part) > max_tokens {
                        out.extend(split_recursive(&part, rest, max_tokens, token_len));
                    } else {
                        out.push(part);
                    }
                }
                out
            } else {
                split_recursive(text, rest, max_tokens, token_len)
            }
        }
        None => hard_split(text, max_tokens),
    }
}

/// Split on `sep`, keeping each separator attached to the piece before it so
/// that joining pieces reproduces the original text exactly.
fn split_keep_separator(text: &str, sep: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find(sep) {
        let end = pos + sep.len();
        parts.push(rest[..end].to_string());
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}

/// Last-resort split at character boundaries for separator-free text.
fn hard_split(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = (max_tokens * 4).max(1);
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count >= max_chars {
            pieces.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Merge pieces into chunks of at most `max_tokens`, retaining up to
/// `overlap_tokens` of trailing pieces as the start of the next chunk.
fn merge_pieces(
    pieces: &[String],
    max_tokens: usize,
    overlap_tokens: usize,
    token_len: TokenLenFn,
) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut window_tokens = 0usize;

    for piece in pieces {
        let piece_tokens = token_len(piece);
        if window_tokens + piece_tokens > max_tokens && !window.is_empty() {
            chunks.push(window.iter().copied().collect::<String>());
            // Shrink from the front until the carry-over fits the overlap
            // budget and leaves room for the incoming piece.
            while !window.is_empty()
                && (window_tokens > overlap_tokens || window_tokens + piece_tokens > max_tokens)
            {
                let front = window.pop_front().expect("window not empty");
                window_tokens -= token_len(front).min(window_tokens);
            }
        }
        window.push_back(piece);
        window_tokens += piece_tokens;
    }

    if !window.is_empty() {
        chunks.push(window.iter().copied().collect::<String>());
    }

    chunks
}
