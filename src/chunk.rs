//! Bounded-size text segmentation for indexing.
//!
//! Tokens are whitespace-separated words. Paragraphs are packed greedily
//! into chunks of at most `max_tokens` tokens; a paragraph larger than the
//! budget is split on token boundaries.

/// One bounded-size text segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk within its source document.
    pub index: usize,
    /// Normalized segment text.
    pub text: String,
}

/// Splits a document into chunks of at most `max_tokens` tokens.
///
/// A budget of zero is treated as one token per chunk.
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<Chunk> {
    let max_tokens = max_tokens.max(1);
    let mut chunks: Vec<String> = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    let mut pending_tokens = 0usize;

    for paragraph in text.split("\n\n") {
        let tokens: Vec<&str> = paragraph.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }

        if tokens.len() > max_tokens {
            flush(&mut chunks, &mut pending, &mut pending_tokens);
            for window in tokens.chunks(max_tokens) {
                chunks.push(window.join(" "));
            }
            continue;
        }

        if pending_tokens + tokens.len() > max_tokens {
            flush(&mut chunks, &mut pending, &mut pending_tokens);
        }
        pending.push(tokens.join(" "));
        pending_tokens += tokens.len();
    }
    flush(&mut chunks, &mut pending, &mut pending_tokens);

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk { index, text })
        .collect()
}

fn flush(chunks: &mut Vec<String>, pending: &mut Vec<String>, pending_tokens: &mut usize) {
    if !pending.is_empty() {
        chunks.push(pending.join("\n\n"));
        pending.clear();
        *pending_tokens = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::chunk_text;

    fn token_count(text: &str) -> usize {
        text.split_whitespace().count()
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_text("", 64).is_empty());
        assert!(chunk_text("   \n\n  \n", 64).is_empty());
    }

    #[test]
    fn short_document_stays_in_one_chunk() {
        let chunks = chunk_text("the somatosensory system mediates touch", 64);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "the somatosensory system mediates touch");
    }

    #[test]
    fn paragraphs_pack_until_the_budget_is_hit() {
        let text = "one two three\n\nfour five\n\nsix seven eight nine";
        let chunks = chunk_text(text, 5);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "one two three\n\nfour five");
        assert_eq!(chunks[1].text, "six seven eight nine");
    }

    #[test]
    fn oversized_paragraph_splits_on_token_boundaries() {
        let words: Vec<String> = (0..23).map(|n| format!("w{n}")).collect();
        let chunks = chunk_text(&words.join(" "), 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(token_count(&chunks[0].text), 10);
        assert_eq!(token_count(&chunks[1].text), 10);
        assert_eq!(token_count(&chunks[2].text), 3);
    }

    #[test]
    fn no_chunk_exceeds_the_budget_and_order_is_preserved() {
        let text = "alpha beta gamma\n\ndelta epsilon zeta eta theta iota kappa\n\nlambda mu";
        let max_tokens = 4;
        let chunks = chunk_text(text, max_tokens);

        for chunk in &chunks {
            assert!(token_count(&chunk.text) <= max_tokens);
        }

        let rejoined: Vec<&str> = chunks
            .iter()
            .flat_map(|chunk| chunk.text.split_whitespace())
            .collect();
        let original: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(rejoined, original);

        let indices: Vec<usize> = chunks.iter().map(|chunk| chunk.index).collect();
        assert_eq!(indices, (0..chunks.len()).collect::<Vec<_>>());
    }

    #[test]
    fn zero_budget_falls_back_to_single_token_chunks() {
        let chunks = chunk_text("a b c", 0);
        assert_eq!(chunks.len(), 3);
    }
}
