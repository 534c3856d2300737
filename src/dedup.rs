//! Near-duplicate detection for topic strings.
//!
//! Similarity is the Ratcliff/Obershelp ratio `2·M / T`, where `M` is the
//! number of characters in the matching blocks found by repeatedly taking
//! the longest common substring and recursing on both sides, and `T` is the
//! combined length. Comparison is case-insensitive.

use std::collections::HashMap;

/// Ratio at or above which two topics count as the same topic.
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]` as `(i, j, len)`.
/// Ties go to the earliest position in `a`, then in `b`.
fn longest_match(
    a: &[char],
    b2j: &HashMap<char, Vec<usize>>,
    (alo, ahi): (usize, usize),
    (blo, bhi): (usize, usize),
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_len) = (alo, blo, 0);
    // j2len[j] = length of the match ending at a[i-1], b[j]
    let mut j2len: HashMap<usize, usize> = HashMap::new();
    for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next: HashMap<usize, usize> = HashMap::new();
        if let Some(positions) = b2j.get(c) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j.checked_sub(1).and_then(|p| j2len.get(&p)).copied().unwrap_or(0) + 1;
                next.insert(j, k);
                if k > best_len {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_len = k;
                }
            }
        }
        j2len = next;
    }
    (best_i, best_j, best_len)
}

/// Total size of all matching blocks between `a` and `b`.
fn matched_chars(a: &[char], b: &[char]) -> usize {
    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, c) in b.iter().enumerate() {
        b2j.entry(*c).or_default().push(j);
    }

    let mut total = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, &b2j, (alo, ahi), (blo, bhi));
        if k == 0 {
            continue;
        }
        total += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }
    total
}

/// Case-insensitive similarity in `[0, 1]`. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_chars(&a, &b) as f64 / total as f64
}

/// The most similar entry of `existing` and its ratio.
pub fn closest_match<'a, S: AsRef<str>>(candidate: &str, existing: &'a [S]) -> Option<(&'a str, f64)> {
    existing
        .iter()
        .map(|s| (s.as_ref(), similarity(candidate, s.as_ref())))
        .max_by(|x, y| x.1.total_cmp(&y.1))
}

/// True when any entry of `existing` is at least `threshold` similar.
pub fn is_duplicate<S: AsRef<str>>(candidate: &str, existing: &[S], threshold: f64) -> bool {
    closest_match(candidate, existing).is_some_and(|(_, ratio)| ratio >= threshold)
}
