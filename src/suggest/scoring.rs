pub const EXACT_MATCH: i64 = 1000;
pub const PREFIX_MATCH: i64 = 500;
pub const CONTAINS_MATCH: i64 = 200;

const FUZZY_BASE: i64 = 100;
const FUZZY_PENALTY: i64 = 20;
const WORD_FUZZY_BASE: i64 = 80;
const WORD_FUZZY_PENALTY: i64 = 15;

/// Queries shorter than this only match literally.
const MIN_FUZZY_QUERY_CHARS: usize = 3;

/// Match score of `name` against `query`, ignoring case.
///
/// `None` means the candidate does not match at all. Fuzzy matches may
/// produce a zero or negative score and still count as matches.
pub fn score_match(name: &str, query: &str) -> Option<i64> {
    let name = name.to_lowercase();
    let query = query.to_lowercase();

    if name == query {
        return Some(EXACT_MATCH);
    }
    if name.starts_with(&query) {
        return Some(PREFIX_MATCH);
    }
    if name.contains(&query) {
        return Some(CONTAINS_MATCH);
    }

    let query_chars = query.chars().count();
    if query_chars < MIN_FUZZY_QUERY_CHARS {
        return None;
    }
    let max_distance = query_chars / 2;

    let distance = levenshtein(&name, &query);
    if distance <= max_distance {
        return Some(FUZZY_BASE - distance as i64 * FUZZY_PENALTY);
    }

    // First qualifying word wins, not the closest one.
    name.split_whitespace()
        .map(|word| levenshtein(word, &query))
        .find(|&word_distance| word_distance <= max_distance)
        .map(|word_distance| WORD_FUZZY_BASE - word_distance as i64 * WORD_FUZZY_PENALTY)
}

pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1)
                .min(curr[j - 1] + 1)
                .min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
