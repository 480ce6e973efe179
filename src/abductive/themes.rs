//! Observation analysis used to enrich generation prompts.
//!
//! Nothing here affects scoring.

use std::collections::{HashMap, HashSet};

use crate::abductive::Observation;

const MAX_THEMES: usize = 5;
const MAX_DOMAIN_TERMS: usize = 3;
const FALLBACK_THEME: &str = "underlying mechanism";

/// Gaps with a coefficient of variation below this count as regular.
pub const TEMPORAL_CV_THRESHOLD: f64 = 0.5;

const STOP_WORDS: &[&str] = &[
    // articles and determiners
    "the", "a", "an", "this", "that", "these", "those", "my", "your", "his", "her", "its", "our",
    "their", "some", "any", "no", "every", "each", "all", "both",
    // pronouns
    "i", "you", "he", "she", "it", "we", "they", "me", "him", "us", "them", "who", "whom", "what",
    "which", "whose", "myself", "yourself", "itself",
    // auxiliaries and modals
    "is", "are", "was", "were", "be", "been", "being", "am", "have", "has", "had", "having", "do",
    "does", "did", "doing", "done", "will", "would", "shall", "should", "can", "could", "may",
    "might", "must",
    // prepositions
    "in", "on", "at", "to", "for", "of", "with", "by", "from", "up", "about", "into", "over",
    "after", "beneath", "under", "above", "between", "among", "through", "during", "before",
    "behind", "below", "against",
    // conjunctions
    "and", "or", "but", "nor", "so", "yet", "because", "although", "unless", "since", "while",
    "if", "then", "than", "when", "where", "whether",
    // adverbs
    "very", "really", "quite", "rather", "too", "also", "just", "only", "even", "still",
    "already", "always", "never", "often", "sometimes", "usually", "now", "here", "there", "how",
    "why", "well", "more", "most", "less", "least",
    // non-descriptive adjectives
    "other", "another", "such", "own", "same", "different", "new", "old", "good", "bad", "great",
    "small", "large", "big", "little", "high", "low", "long", "first", "last", "next", "many",
    "much", "few",
    // numbers
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "several",
    "none",
    // generic nouns
    "thing", "things", "stuff", "way", "ways", "time", "times", "year", "years", "day", "days",
    "part", "parts", "place", "places", "case", "cases", "point", "points", "fact", "facts",
    "kind", "kinds", "type", "types", "form", "forms", "number", "numbers", "amount", "level",
    "levels", "area", "areas", "side", "sides", "end", "ends", "matter", "matters", "issue",
    "issues", "question", "questions", "problem", "problems", "result", "results", "example",
    "examples", "reason", "reasons", "idea", "ideas", "situation", "state", "states",
    // domain-generic terms
    "research", "study", "studies", "data", "information", "system", "systems", "process",
    "processes", "method", "methods", "approach", "approaches", "analysis", "work", "works",
    "effect", "effects", "impact", "change", "changes", "factor", "factors", "aspect", "aspects",
    // common verbs
    "make", "made", "get", "got", "go", "went", "come", "came", "take", "took", "give", "gave",
    "find", "found", "know", "knew", "think", "thought", "see", "saw", "want", "use", "used",
    "try", "need", "seem", "help", "show", "shows", "shown", "lead", "leads", "led", "cause",
    "causes", "caused",
];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

fn trim_token(word: &str) -> &str {
    word.trim_matches(|c: char| "\"'()[]{}*-_".contains(c))
}

fn is_content_word(word: &str) -> bool {
    word.chars().count() >= 3 && !is_stop_word(word)
}

fn tokenize(description: &str) -> Vec<String> {
    let lowered: String = description
        .to_lowercase()
        .chars()
        .map(|c| if ".,:;!?".contains(c) { ' ' } else { c })
        .collect();
    lowered
        .split_whitespace()
        .map(|w| trim_token(w).to_string())
        .collect()
}

/// Extracts terms shared across observation descriptions.
///
/// Adjacent content-word bigrams are preferred over single words. Returns at
/// most five themes, longest first, and never an empty list.
#[must_use]
pub fn find_common_themes(observations: &[Observation]) -> Vec<String> {
    let mut word_count: HashMap<String, usize> = HashMap::new();
    let mut bigram_count: HashMap<String, usize> = HashMap::new();

    for obs in observations {
        let words = tokenize(&obs.description);

        let mut seen = HashSet::new();
        for word in words.iter().filter(|w| is_content_word(w)) {
            if seen.insert(word.as_str()) {
                *word_count.entry(word.clone()).or_default() += 1;
            }
        }

        for pair in words.windows(2) {
            if is_content_word(&pair[0]) && is_content_word(&pair[1]) {
                *bigram_count.entry(format!("{} {}", pair[0], pair[1])).or_default() += 1;
            }
        }
    }

    let threshold = if observations.len() < 3 {
        1
    } else {
        (observations.len() / 3).max(2)
    };

    let mut themes: Vec<String> = bigram_count
        .iter()
        .filter(|(_, &count)| count >= threshold)
        .map(|(bigram, _)| bigram.clone())
        .collect();

    let mut words: Vec<&String> = word_count
        .iter()
        .filter(|(word, &count)| count >= threshold && word.chars().count() > 3)
        .map(|(word, _)| word)
        .collect();
    words.sort();
    for word in words {
        if !themes.iter().any(|t| t.contains(word.as_str())) {
            themes.push(word.clone());
        }
    }

    themes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    themes.truncate(MAX_THEMES);

    if themes.is_empty() {
        themes = extract_domain_terms(observations);
    }

    if themes.is_empty() {
        let longest = word_count
            .keys()
            .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| b.cmp(a)));
        themes = vec![longest.map_or_else(|| FALLBACK_THEME.to_string(), Clone::clone)];
    }

    themes
}

/// Capitalized words and acronyms, most frequent first.
#[must_use]
pub fn extract_domain_terms(observations: &[Observation]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();

    for obs in observations {
        for word in obs.description.split_whitespace() {
            if !word.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
                continue;
            }
            let clean = word.trim_matches(|c: char| "\"'()[]{}*-_.,;:!?".contains(c));
            if clean.chars().count() >= 2 && !is_stop_word(&clean.to_lowercase()) {
                *counts.entry(clean.to_string()).or_default() += 1;
            }
        }
    }

    let mut terms: Vec<(String, usize)> = counts.into_iter().collect();
    terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    terms.truncate(MAX_DOMAIN_TERMS);
    terms.into_iter().map(|(t, _)| t).collect()
}

/// Detects regularly spaced observations.
///
/// Needs at least three observations. Observations are ordered by timestamp;
/// the gaps form a pattern when their mean is positive and their coefficient
/// of variation is below [`TEMPORAL_CV_THRESHOLD`].
#[must_use]
pub fn has_temporal_pattern(observations: &[Observation]) -> bool {
    if observations.len() < 3 {
        return false;
    }

    let mut times: Vec<i64> = observations
        .iter()
        .map(|o| o.timestamp.timestamp_millis())
        .collect();
    times.sort_unstable();

    #[allow(clippy::cast_precision_loss)]
    let gaps: Vec<f64> = times.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
    #[allow(clippy::cast_precision_loss)]
    let n = gaps.len() as f64;

    let mean = gaps.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return false;
    }
    let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / n;
    let cv = variance.sqrt() / mean;

    cv < TEMPORAL_CV_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn obs(description: &str) -> Observation {
        Observation::new(description, 0.9)
    }

    #[test]
    fn shared_bigram_is_a_theme() {
        let observations = vec![
            obs("Server latency spiked after deploy."),
            obs("Users report server latency during checkout."),
            obs("Server latency alarms fired overnight."),
        ];
        let themes = find_common_themes(&observations);
        assert_eq!(themes, vec!["server latency".to_string()]);
        // Words covered by the bigram are not repeated.
        assert!(!themes.iter().any(|t| t == "latency"));
    }

    #[test]
    fn stop_words_never_become_themes() {
        let observations = vec![
            obs("The system shows the problem"),
            obs("The system shows the problem again"),
            obs("The system shows the problem today"),
        ];
        let themes = find_common_themes(&observations);
        assert!(themes.iter().all(|t| !t.contains("system") && !t.contains("problem")));
    }

    #[test]
    fn falls_back_to_domain_terms_then_placeholder() {
        let observations = vec![
            obs("NASA radar went dark"),
            obs("Ground crews saw flicker"),
            obs("Telemetry was lost"),
        ];
        // Threshold is 2 with three observations; no shared words.
        let themes = find_common_themes(&observations);
        assert!(themes.contains(&"NASA".to_string()));

        let themes = find_common_themes(&[obs("a b"), obs("c d"), obs("e f")]);
        assert_eq!(themes, vec![FALLBACK_THEME.to_string()]);
    }

    #[test]
    fn themes_are_bounded() {
        let text = "alpha beta gamma delta epsilon zeta theta kappa lambda sigma";
        let themes = find_common_themes(&[obs(text), obs(text)]);
        assert!(themes.len() <= MAX_THEMES);
        assert!(!themes.is_empty());
    }

    #[test]
    fn temporal_pattern_requires_three_observations() {
        let now = Utc::now();
        let two = vec![
            obs("a").at(now),
            obs("b").at(now + Duration::minutes(5)),
        ];
        assert!(!has_temporal_pattern(&two));
    }

    #[test]
    fn regular_gaps_form_a_pattern() {
        let now = Utc::now();
        let regular = vec![
            obs("c").at(now + Duration::minutes(20)),
            obs("a").at(now),
            obs("b").at(now + Duration::minutes(10)),
            obs("d").at(now + Duration::minutes(31)),
        ];
        assert!(has_temporal_pattern(&regular));

        let irregular = vec![
            obs("a").at(now),
            obs("b").at(now + Duration::minutes(1)),
            obs("c").at(now + Duration::minutes(60)),
        ];
        assert!(!has_temporal_pattern(&irregular));

        let simultaneous = vec![obs("a").at(now), obs("b").at(now), obs("c").at(now)];
        assert!(!has_temporal_pattern(&simultaneous));
    }
}
