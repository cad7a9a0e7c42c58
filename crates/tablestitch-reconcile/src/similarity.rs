use tablestitch_core::{Cell, MergeThresholds};

/// Normalized Levenshtein similarity of two strings in `[0, 1]`.
///
/// Both sides are trimmed and lowercased first. Equal strings score 1.0.
/// An empty side scores 0.0, even against another empty string, so blank
/// header cells never count as a match.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let max_len = a.chars().count().max(b.chars().count());
    let distance = rapidfuzz::distance::levenshtein::distance(a.chars(), b.chars());
    1.0 - distance as f64 / max_len as f64
}

/// Whether two header rows name the same columns.
///
/// Lengths must match exactly. A column matches when its cell similarity is
/// above `cell_similarity`; the rows are similar when the fraction of
/// matching columns is above `header_similarity`.
pub fn headers_similar(h1: &[Cell], h2: &[Cell], thresholds: &MergeThresholds) -> bool {
    if h1.len() != h2.len() || h1.is_empty() {
        return false;
    }

    let matching = h1
        .iter()
        .zip(h2)
        .filter(|(a, b)| string_similarity(&a.as_text(), &b.as_text()) > thresholds.cell_similarity)
        .count();

    matching as f64 / h1.len() as f64 > thresholds.header_similarity
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablestitch_core::text_row;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_identical_strings() {
        assert!((string_similarity("Revenue", "Revenue") - 1.0).abs() < EPS);
        // Case and surrounding whitespace are ignored
        assert!((string_similarity("  NAME ", "name") - 1.0).abs() < EPS);
    }

    #[test]
    fn test_empty_side_scores_zero() {
        assert_eq!(string_similarity("", "x"), 0.0);
        assert_eq!(string_similarity("abc", "   "), 0.0);
        assert_eq!(string_similarity("", ""), 0.0);
    }

    #[test]
    fn test_single_edit() {
        // kitten -> sitting is 3 edits over 7 chars
        let s = string_similarity("kitten", "sitting");
        assert!((s - (1.0 - 3.0 / 7.0)).abs() < EPS);
        // One substitution in five characters
        let s = string_similarity("total", "tota1");
        assert!((s - 0.8).abs() < EPS);
    }

    #[test]
    fn test_unicode_counts_chars() {
        let s = string_similarity("café", "cafe");
        assert!((s - 0.75).abs() < EPS);
    }

    #[test]
    fn test_headers_similar_exact() {
        let t = MergeThresholds::default();
        let h = text_row(&["Name", "Age", "City"]);
        assert!(headers_similar(&h, &h, &t));
        assert!(headers_similar(&h, &text_row(&["name", "AGE", " City "]), &t));
    }

    #[test]
    fn test_headers_length_mismatch() {
        let t = MergeThresholds::default();
        let a = text_row(&["Name", "Age", "City"]);
        let b = text_row(&["Name", "Age"]);
        assert!(!headers_similar(&a, &b, &t));
        assert!(!headers_similar(&[], &[], &t));
    }

    #[test]
    fn test_headers_need_majority_above_threshold() {
        let t = MergeThresholds::default();
        let a = text_row(&["Name", "Age", "City"]);
        // 2 of 3 columns match: 0.67 is not above 0.7
        let b = text_row(&["Name", "Age", "Country"]);
        assert!(!headers_similar(&a, &b, &t));
        // Data rows look nothing like headers
        let c = text_row(&["Alice", "30", "Paris"]);
        assert!(!headers_similar(&a, &c, &t));
    }
}
