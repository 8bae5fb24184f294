// SPDX-FileCopyrightText: 2026 Corvid Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response-to-thread splitting.
//!
//! The feed caps post length, so long responses go out as a chain of replies.
//! Splitting prefers paragraph breaks, then sentence ends, then word
//! boundaries; a single over-long token is hard-split as a last resort.

/// Maximum characters per post.
pub const MAX_POST_CHARS: usize = 280;

/// Splits `response` into post-sized chunks, in thread order.
///
/// Whitespace-only input yields no chunks (nothing worth posting).
pub fn split_response(response: &str) -> Vec<String> {
    split_with_limit(response, MAX_POST_CHARS)
}

fn split_with_limit(response: &str, limit: usize) -> Vec<String> {
    let text = response.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if fits(&current, paragraph, "\n\n", limit) {
            push_part(&mut current, paragraph, "\n\n");
            continue;
        }
        flush(&mut chunks, &mut current);

        if paragraph.chars().count() <= limit {
            current.push_str(paragraph);
            continue;
        }

        // Paragraph too long on its own: fall back to sentences, then words.
        for sentence in split_sentences(paragraph) {
            if fits(&current, &sentence, " ", limit) {
                push_part(&mut current, &sentence, " ");
                continue;
            }
            flush(&mut chunks, &mut current);

            if sentence.chars().count() <= limit {
                current.push_str(&sentence);
                continue;
            }
            for word in sentence.split_whitespace() {
                if fits(&current, word, " ", limit) {
                    push_part(&mut current, word, " ");
                    continue;
                }
                flush(&mut chunks, &mut current);
                if word.chars().count() <= limit {
                    current.push_str(word);
                } else {
                    hard_split(word, limit, &mut chunks, &mut current);
                }
            }
        }
    }
    flush(&mut chunks, &mut current);
    chunks
}

fn fits(current: &str, part: &str, sep: &str, limit: usize) -> bool {
    if current.is_empty() {
        part.chars().count() <= limit
    } else {
        current.chars().count() + sep.chars().count() + part.chars().count() <= limit
    }
}

fn push_part(current: &mut String, part: &str, sep: &str) {
    if !current.is_empty() {
        current.push_str(sep);
    }
    current.push_str(part);
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
}

fn hard_split(word: &str, limit: usize, chunks: &mut Vec<String>, current: &mut String) {
    let mut buf = String::new();
    for c in word.chars() {
        if buf.chars().count() == limit {
            chunks.push(std::mem::take(&mut buf));
        }
        buf.push(c);
    }
    *current = buf;
}

/// Splits on sentence-ending punctuation, keeping the punctuation attached.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            sentences.push(std::mem::take(&mut current).trim().to_string());
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}
