//! Snippet extraction and highlighting
//!
//! A snippet is a window of tokens around the first occurrence of the
//! rarest query lemma, with every token matching any query lemma wrapped
//! in emphasis markup.

use crate::morph::Morphology;
use regex::Regex;
use std::sync::OnceLock;

/// Words are Cyrillic or digit runs; everything between them is separator
fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[А-Яа-яЁё0-9]+").expect("static regex"))
}

/// Build a highlighted snippet from `text`. `query_lemmas` is ordered
/// rarest-first; the first entry anchors the window. Returns an empty
/// string when no word in the text maps to the anchor lemma.
pub fn build_snippet(
    text: &str,
    query_lemmas: &[String],
    morph: &dyn Morphology,
    window: usize,
) -> String {
    let Some(anchor_lemma) = query_lemmas.first() else {
        return String::new();
    };

    let tokens: Vec<(usize, usize, &str)> = word_pattern()
        .find_iter(text)
        .map(|m| (m.start(), m.end(), m.as_str()))
        .collect();

    let anchor = tokens.iter().position(|(_, _, word)| {
        morph
            .normal_forms(&word.to_lowercase())
            .iter()
            .any(|form| form == anchor_lemma)
    });
    let Some(anchor) = anchor else {
        return String::new();
    };

    let first = anchor.saturating_sub(window);
    let last = (anchor + window).min(tokens.len() - 1);

    let mut snippet = String::new();
    let mut cursor = tokens[first].0;
    for (start, end, word) in &tokens[first..=last] {
        snippet.push_str(&text[cursor..*start]);
        if matches_any_lemma(word, query_lemmas, morph) {
            snippet.push_str("<b>");
            snippet.push_str(word);
            snippet.push_str("</b>");
        } else {
            snippet.push_str(word);
        }
        cursor = *end;
    }

    collapse_markup(&snippet)
}

fn matches_any_lemma(word: &str, query_lemmas: &[String], morph: &dyn Morphology) -> bool {
    morph
        .normal_forms(&word.to_lowercase())
        .iter()
        .any(|form| query_lemmas.contains(form))
}

/// Merge directly adjacent emphasis runs
fn collapse_markup(snippet: &str) -> String {
    let mut out = snippet.replace("</b><b>", "");
    while out.contains("<b><b>") || out.contains("</b></b>") {
        out = out.replace("<b><b>", "<b>").replace("</b></b>", "</b>");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morph::DictionaryMorphology;

    fn morph() -> DictionaryMorphology {
        DictionaryMorphology::from_entries([
            ("кот", "кот", "С мр"),
            ("кота", "кот", "С мр рд"),
            ("сидел", "сидеть", "Г"),
            ("окне", "окно", "С ср"),
            ("смотрел", "смотреть", "Г"),
            ("улицу", "улица", "С жр"),
        ])
    }

    #[test]
    fn test_anchor_word_is_emphasized() {
        let text = "Кот сидел на окне и смотрел на улицу";
        let snippet = build_snippet(text, &["кот".to_string()], &morph(), 15);
        assert!(snippet.contains("<b>Кот</b>"), "snippet was: {}", snippet);
        assert!(snippet.contains("окне"));
    }

    #[test]
    fn test_all_query_lemmas_highlighted() {
        let text = "Кот сидел на окне";
        let snippet = build_snippet(
            text,
            &["окно".to_string(), "кот".to_string()],
            &morph(),
            15,
        );
        // Window anchored on the rarest lemma, both matches emphasized
        assert!(snippet.contains("<b>Кот</b>"));
        assert!(snippet.contains("<b>окне</b>"));
    }

    #[test]
    fn test_no_occurrence_yields_empty_snippet() {
        let snippet = build_snippet("сидел на окне", &["кот".to_string()], &morph(), 15);
        assert!(snippet.is_empty());
    }

    #[test]
    fn test_window_bounds_the_context() {
        let mut words = vec!["сидел"; 40];
        words.push("кот");
        words.extend(vec!["сидел"; 40]);
        let text = words.join(" ");

        let snippet = build_snippet(&text, &["кот".to_string()], &morph(), 15);
        let count = snippet.matches("сидел").count();
        assert_eq!(count, 30);
        assert!(snippet.contains("<b>кот</b>"));
    }

    #[test]
    fn test_inflected_match_through_normal_form() {
        let text = "хвост кота виден";
        let snippet = build_snippet(text, &["кот".to_string()], &morph(), 15);
        assert!(snippet.contains("<b>кота</b>"));
    }

    #[test]
    fn test_collapse_adjacent_markup() {
        assert_eq!(collapse_markup("<b>кот</b><b>ы</b>"), "<b>коты</b>");
        assert_eq!(collapse_markup("<b><b>кот</b></b>"), "<b>кот</b>");
    }
}
