//! `[n]` citation markers in a synthesized answer.
//!
//! Markers are 1-based positions in the deduplicated source list. The answer
//! text is never rewritten; markers pointing past the list are only reported.

use regex::Regex;
use std::sync::LazyLock;

static CITATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("Invalid citation regex"));

/// Distinct cited source numbers, in order of first appearance.
pub fn cited_sources(text: &str) -> Vec<usize> {
    let mut seen = Vec::new();
    for caps in CITATION_PATTERN.captures_iter(text) {
        if let Ok(n) = caps[1].parse::<usize>() {
            if !seen.contains(&n) {
                seen.push(n);
            }
        }
    }
    seen
}

/// Cited numbers with no matching source (0 or greater than `source_count`).
pub fn out_of_range(text: &str, source_count: usize) -> Vec<usize> {
    cited_sources(text)
        .into_iter()
        .filter(|n| *n == 0 || *n > source_count)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cited_sources() {
        let text = "Tablets contain 80 mg [1][3]. Storage below 30°C [1]. See also [12].";
        assert_eq!(cited_sources(text), vec![1, 3, 12]);
        assert!(cited_sources("no markers, [a] or [ 2 ]").is_empty());
    }

    #[test]
    fn test_out_of_range() {
        let text = "claim [0] and [2] and [4]";
        assert_eq!(out_of_range(text, 3), vec![0, 4]);
        assert!(out_of_range("[1][2][3]", 3).is_empty());
    }
}
