//! Text lemmatization
//!
//! Turns raw text into a lemma -> occurrence count map. Tokens are split on
//! whitespace, stripped of punctuation, lowercased and filtered down to
//! Cyrillic words; service parts of speech (conjunctions, prepositions,
//! interjections, particles) are discarded. Each surviving token counts
//! once toward every normal form the analyzer returns for it.

use crate::morph::Morphology;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

/// Tag markers of service parts of speech
const SERVICE_POS_MARKERS: [&str; 4] = ["СОЮЗ", "ПРЕДЛ", "МЕЖД", "ЧАСТ"];

/// Lemmatizer over a shared analyzer handle
#[derive(Clone)]
pub struct Lemmatizer {
    morph: Arc<dyn Morphology>,
    word_pattern: Regex,
    punct_pattern: Regex,
}

impl Lemmatizer {
    pub fn new(morph: Arc<dyn Morphology>) -> Self {
        Self {
            morph,
            word_pattern: Regex::new(r"^[а-яё]+$").expect("static regex"),
            punct_pattern: Regex::new(r"[[:punct:]«»–—…]+").expect("static regex"),
        }
    }

    /// Shared analyzer handle, also used by the snippet builder
    pub fn morphology(&self) -> &Arc<dyn Morphology> {
        &self.morph
    }

    /// Map every lemma occurring in `text` to its occurrence count
    pub fn lemmas_of(&self, text: &str) -> HashMap<String, u32> {
        let mut lemmas: HashMap<String, u32> = HashMap::new();

        for token in text.split_whitespace() {
            let word = self.punct_pattern.replace_all(token, "").to_lowercase();
            if !self.word_pattern.is_match(&word) {
                continue;
            }
            if self.is_service_word(&word) {
                continue;
            }
            // Unknown words produce no forms and are skipped silently
            for form in self.morph.normal_forms(&word) {
                *lemmas.entry(form).or_insert(0) += 1;
            }
        }

        lemmas
    }

    /// True when any analyzer tag marks the word as a service part of speech
    pub fn is_service_word(&self, word: &str) -> bool {
        self.morph
            .morph_info(word)
            .iter()
            .any(|info| SERVICE_POS_MARKERS.iter().any(|m| info.contains(m)))
    }
}
