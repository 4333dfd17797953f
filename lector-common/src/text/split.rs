//! Splitting of text into pieces that fit a per-request character budget

use crate::{Error, Result};

/// Characters after which a request may be cut
const PUNCTUATION: [char; 6] = [',', '?', ';', ':', '!', '.'];

/// Find where the first request piece of `text` ends.
///
/// Returns a byte offset into `text`:
/// - `text.len()` when the text has at most `budget` characters;
/// - just after the latest punctuation mark at or before `budget`;
/// - otherwise just after the latest whitespace at or before
///   `min(budget, len / 2)`.
///
/// Fails with [`Error::TextTooLong`] when none of these exist.
pub fn split_point(text: &str, budget: usize) -> Result<usize> {
    let char_count = text.chars().count();
    if char_count <= budget {
        return Ok(text.len());
    }

    let punctuation: Vec<(usize, usize, char)> = text
        .char_indices()
        .enumerate()
        .filter(|(_, (_, c))| PUNCTUATION.contains(c))
        .map(|(char_idx, (byte_idx, c))| (char_idx, byte_idx, c))
        .collect();
    if let Some(cut) = latest_before(&punctuation, budget as f64) {
        return Ok(cut);
    }

    let whitespace: Vec<(usize, usize, char)> = text
        .char_indices()
        .enumerate()
        .filter(|(_, (_, c))| c.is_whitespace())
        .map(|(char_idx, (byte_idx, c))| (char_idx, byte_idx, c))
        .collect();
    let limit = (budget as f64).min(char_count as f64 / 2.0);
    if let Some(cut) = latest_before(&whitespace, limit) {
        return Ok(cut);
    }

    Err(Error::TextTooLong { budget })
}

/// Byte offset just past the last candidate at or before `limit`
fn latest_before(candidates: &[(usize, usize, char)], limit: f64) -> Option<usize> {
    candidates
        .iter()
        .take_while(|(char_idx, _, _)| *char_idx as f64 <= limit)
        .last()
        .map(|&(_, byte_idx, c)| byte_idx + c.len_utf8())
}

/// Split text into request pieces of at most roughly `budget` characters.
///
/// Whitespace runs are collapsed and a final `.` is appended when missing,
/// so every piece ends on a natural pause where possible.
pub fn split_request(text: &str, budget: usize) -> Result<Vec<String>> {
    let mut normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if !normalized.ends_with('.') {
        normalized.push('.');
    }

    let mut pieces = Vec::new();
    let mut rest = normalized.as_str();
    while !rest.is_empty() {
        let cut = split_point(rest, budget)?;
        let piece = rest[..cut].trim_end();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        rest = rest[cut..].trim_start();
    }
    Ok(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_piece() {
        assert_eq!(split_request("hello   world", 195).unwrap(), vec!["hello world."]);
    }

    #[test]
    fn test_existing_period_is_kept() {
        assert_eq!(split_request("Done.", 195).unwrap(), vec!["Done."]);
    }

    #[test]
    fn test_split_at_punctuation() {
        let text = format!("{}, {}.", "x".repeat(100), "y".repeat(150));
        let pieces = split_request(&text, 195).unwrap();
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0], format!("{},", "x".repeat(100)));
        assert_eq!(pieces[1], format!("{}.", "y".repeat(150)));
    }

    #[test]
    fn test_split_at_whitespace_fallback() {
        let text = vec!["word"; 50].join(" ");
        let pieces = split_request(&text, 195).unwrap();
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0], vec!["word"; 25].join(" "));
        assert_eq!(pieces[1], format!("{}.", vec!["word"; 25].join(" ")));
    }

    #[test]
    fn test_text_of_exactly_budget_is_single_piece() {
        let text = format!("{}, {}.", "x".repeat(100), "y".repeat(92));
        assert_eq!(text.chars().count(), 195);
        assert_eq!(split_request(&text, 195).unwrap(), vec![text]);
    }

    #[test]
    fn test_split_at_only_punctuation_before_budget() {
        let text = format!("{}! {}", "x".repeat(150), "y".repeat(98));
        assert_eq!(split_point(&text, 195).unwrap(), 151);

        let pieces = split_request(&text, 195).unwrap();
        assert_eq!(pieces, vec![format!("{}!", "x".repeat(150)), format!("{}.", "y".repeat(98))]);
    }

    #[test]
    fn test_text_too_long() {
        let result = split_request(&"a".repeat(300), 195);
        assert!(matches!(result, Err(Error::TextTooLong { budget: 195 })));
    }

    #[test]
    fn test_split_point_counts_characters() {
        let text = "é".repeat(10);
        assert_eq!(split_point(&text, 195).unwrap(), text.len());
    }
}
