//! Morphological analysis seam
//!
//! The engine only needs two capabilities from an analyzer: the dictionary
//! (normal) forms of a word and its grammatical tags. `DictionaryMorphology`
//! backs them with a tab-separated dictionary file; tests build one from
//! in-memory entries.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use tracing::info;

/// Analyzer capability consumed by the lemmatizer and the snippet builder
pub trait Morphology: Send + Sync {
    /// Dictionary (normal) forms of a surface word. A word may map to
    /// several forms; unknown words map to none.
    fn normal_forms(&self, word: &str) -> Vec<String>;

    /// Grammatical tag strings for a surface word
    fn morph_info(&self, word: &str) -> Vec<String>;
}

/// One dictionary reading: normal form plus its tag string
#[derive(Debug, Clone)]
struct Reading {
    lemma: String,
    tags: String,
}

/// File-backed morphology: each line is `surface<TAB>lemma<TAB>tags`.
/// A surface form may appear on multiple lines.
pub struct DictionaryMorphology {
    readings: HashMap<String, Vec<Reading>>,
}

impl DictionaryMorphology {
    /// Load the dictionary file. Failure here is a fatal startup condition:
    /// lemmatization-dependent operations cannot run without an analyzer.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            Error::Morphology(format!("cannot open dictionary {}: {}", path.display(), e))
        })?;

        let mut readings: HashMap<String, Vec<Reading>> = HashMap::new();
        for (lineno, line) in std::io::BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.splitn(3, '\t');
            let (surface, lemma) = match (parts.next(), parts.next()) {
                (Some(s), Some(l)) => (s, l),
                _ => {
                    return Err(Error::Morphology(format!(
                        "malformed dictionary line {}: {:?}",
                        lineno + 1,
                        line
                    )))
                }
            };
            let tags = parts.next().unwrap_or("").to_string();
            readings
                .entry(surface.to_lowercase())
                .or_default()
                .push(Reading {
                    lemma: lemma.to_lowercase(),
                    tags,
                });
        }

        info!(
            "Loaded morphology dictionary: {} surface forms",
            readings.len()
        );
        Ok(Self { readings })
    }

    /// Build an analyzer from (surface, lemma, tags) triples
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, S, S)>,
        S: Into<String>,
    {
        let mut readings: HashMap<String, Vec<Reading>> = HashMap::new();
        for (surface, lemma, tags) in entries {
            readings
                .entry(surface.into().to_lowercase())
                .or_default()
                .push(Reading {
                    lemma: lemma.into().to_lowercase(),
                    tags: tags.into(),
                });
        }
        Self { readings }
    }
}

impl Morphology for DictionaryMorphology {
    fn normal_forms(&self, word: &str) -> Vec<String> {
        let mut forms = Vec::new();
        if let Some(readings) = self.readings.get(word) {
            for reading in readings {
                if !forms.contains(&reading.lemma) {
                    forms.push(reading.lemma.clone());
                }
            }
        }
        forms
    }

    fn morph_info(&self, word: &str) -> Vec<String> {
        self.readings
            .get(word)
            .map(|rs| rs.iter().map(|r| r.tags.clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_entries_lookup() {
        let morph = DictionaryMorphology::from_entries([
            ("коты", "кот", "С мр"),
            ("кот", "кот", "С мр"),
            ("и", "и", "СОЮЗ"),
        ]);

        assert_eq!(morph.normal_forms("коты"), vec!["кот"]);
        assert_eq!(morph.morph_info("и"), vec!["СОЮЗ"]);
        assert!(morph.normal_forms("собака").is_empty());
    }

    #[test]
    fn test_multiple_readings_dedupe() {
        let morph = DictionaryMorphology::from_entries([
            ("стали", "сталь", "С жр"),
            ("стали", "стать", "Г"),
            ("стали", "сталь", "С жр мн"),
        ]);

        let forms = morph.normal_forms("стали");
        assert_eq!(forms, vec!["сталь", "стать"]);
        assert_eq!(morph.morph_info("стали").len(), 3);
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("dict.tsv");
        std::fs::write(&path, "# comment\nКоты\tкот\tС мр\n\nна\tна\tПРЕДЛ\n").unwrap();

        let morph = DictionaryMorphology::load(&path).unwrap();
        assert_eq!(morph.normal_forms("коты"), vec!["кот"]);
        assert_eq!(morph.morph_info("на"), vec!["ПРЕДЛ"]);
    }

    #[test]
    fn test_load_missing_file_is_fatal() {
        let result = DictionaryMorphology::load(Path::new("/nonexistent/dict.tsv"));
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_line_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("dict.tsv");
        std::fs::write(&path, "single-column-line\n").unwrap();
        assert!(DictionaryMorphology::load(&path).is_err());
    }
}
