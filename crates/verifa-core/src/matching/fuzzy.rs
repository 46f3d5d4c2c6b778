//! String similarity tolerant of scan noise.
//!
//! Scores are integers in `[0, 100]`:
//! - exact match after normalization: 100
//! - one string contains the other: 90 to 95, closer lengths score higher
//! - otherwise: `100 * (1 - levenshtein / max_len)`

/// Shortest string that may score through containment.
const MIN_CONTAINMENT_LEN: usize = 3;

/// Lowercase, turn punctuation into spaces and collapse whitespace.
pub fn normalize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity of two strings in `[0, 100]`.
///
/// Empty input on either side scores 0.
pub fn similarity(a: &str, b: &str) -> u8 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    if a == b {
        return 100;
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();
    let (shorter, longer) = if len_a <= len_b { (len_a, len_b) } else { (len_b, len_a) };

    if shorter >= MIN_CONTAINMENT_LEN && (a.contains(&b) || b.contains(&a)) {
        let ratio = shorter as f64 / longer as f64;
        return 90 + (5.0 * ratio).round() as u8;
    }

    let distance = strsim::levenshtein(&a, &b);
    let score = 100.0 * (1.0 - distance as f64 / longer as f64);
    score.round().clamp(0.0, 100.0) as u8
}

/// Pick the candidate whose key scores highest against `needle`, if it
/// reaches `floor`. Ties keep the earlier candidate.
pub fn best_match<T, I, K>(needle: &str, candidates: I, key: K, floor: u8) -> Option<(T, u8)>
where
    I: IntoIterator<Item = T>,
    K: Fn(&T) -> &str,
{
    let mut best: Option<(T, u8)> = None;
    for candidate in candidates {
        let score = similarity(needle, key(&candidate));
        if score < floor {
            continue;
        }
        let better = best.as_ref().map_or(true, |(_, top)| score > *top);
        if better {
            best = Some((candidate, score));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  S.Kom,  Teknik-Informatika "), "s kom teknik informatika");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_edit_distance_counts_chars_not_bytes() {
        // 'é' is two bytes but one edit.
        assert_eq!(similarity("Jose Rizal", "José Rizal"), 90);
    }

    #[test]
    fn test_identical_strings_score_100() {
        for s in ["a", "Budi Santoso", "3201234567890123", "AKUNTANSI"] {
            assert_eq!(similarity(s, s), 100);
        }
        assert_eq!(similarity("Budi  Santoso", "budi santoso."), 100);
    }

    #[test]
    fn test_containment_range() {
        let score = similarity("Akuntansi Syariah", "Akuntansi");
        assert!((90..=95).contains(&score));
        assert_eq!(score, similarity("Akuntansi", "Akuntansi Syariah"));
        assert_eq!(score, 93);
    }

    #[test]
    fn test_short_fragments_do_not_use_containment() {
        assert!(similarity("ak", "akuntansi") < 90);
    }

    #[test]
    fn test_edit_distance_symmetry() {
        let pairs = [
            ("3201234567890123", "3201234567890128"),
            ("Budi Santoso", "Budi Santosa"),
            ("Teknik Sipil", "Hukum"),
        ];
        for (a, b) in pairs {
            assert_eq!(similarity(a, b), similarity(b, a));
        }
        assert_eq!(similarity("3201234567890123", "3201234567890128"), 94);
    }

    #[test]
    fn test_empty_scores_zero() {
        assert_eq!(similarity("", "abc"), 0);
        assert_eq!(similarity("...", "abc"), 0);
    }

    #[test]
    fn test_best_match() {
        let keys = vec!["3201234567890999", "3201234567890124", "1111111111111111"];
        let (found, score) = best_match("3201234567890123", keys, |k| *k, 80).unwrap();
        assert_eq!(found, "3201234567890124");
        assert!(score >= 80);

        let none = best_match("3201234567890123", vec!["9999999999999999"], |k| *k, 80);
        assert!(none.is_none());
    }
}
