//! Keyword ranking over scraped page text.
//!
//! Tokens come from tantivy's `SimpleTokenizer` and are kept verbatim: no case
//! folding, no stemming.

use crate::record::Keyword;
use std::collections::HashMap;
use tantivy::tokenizer::{SimpleTokenizer, TokenStream, Tokenizer};

/// Rank the tokens of `text` by descending frequency.
///
/// Ties keep the order in which tokens first appear.
pub fn rank(text: &str) -> Vec<Keyword> {
    let mut tokenizer = SimpleTokenizer::default();
    let mut stream = tokenizer.token_stream(text);

    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<Keyword> = Vec::new();

    while stream.advance() {
        let token = &stream.token().text;
        match positions.get(token) {
            Some(&idx) => counts[idx].1 += 1,
            None => {
                positions.insert(token.clone(), counts.len());
                counts.push((token.clone(), 1));
            }
        }
    }

    // sort_by is stable, so first-occurrence order survives among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
