//! Rule-based keyword extraction over paper titles, and the word-cloud
//! artifact built from the counts.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::config::ConferenceSpec;
use crate::paper::PaperRecord;

const MIN_WORD_LENGTH: usize = 3;
const MAX_WORD_LENGTH: usize = 30;
pub const DEFAULT_MIN_FREQUENCY: u32 = 2;
pub const DEFAULT_MAX_KEYWORDS: usize = 200;

/// Generic academic vocabulary that says nothing about a paper's topic.
const ACADEMIC_STOPWORDS: &[&str] = &[
    "paper", "study", "research", "approach", "method", "methods", "novel", "new", "proposed",
    "using", "based", "via", "toward", "towards", "analysis", "framework", "system", "technique",
    "model", "application", "applications", "case", "efficient", "effective", "improved",
    "improving", "improvement", "enhanced", "enhancing", "algorithm", "algorithms", "evaluation",
    "experimental", "results", "performance", "comparison", "survey", "review", "overview",
    "introduction", "conclusion", "future", "work", "works", "problem", "problems", "solution",
    "solutions", "issue", "issues", "challenge", "challenges", "general", "specific", "particular",
    "various", "different", "large", "small", "scale", "high", "low", "fast", "slow", "better",
    "best", "optimal", "optimized", "optimization", "scalable", "robust",
];

/// Terms that look generic but are load-bearing in this domain; they are
/// carved back out of the stopword set.
const KEEP_TERMS: &[&str] = &[
    "learning", "network", "networks", "data", "mining", "graph", "graphs", "neural", "deep",
    "machine", "detection", "classification", "clustering", "prediction", "recommendation",
    "knowledge", "information", "social", "time", "series", "temporal", "spatial", "visual",
    "text", "image", "video", "language", "natural", "processing", "understanding", "generation",
    "privacy", "security", "adversarial", "reinforcement", "supervised", "unsupervised", "semi",
    "federated", "distributed", "online", "offline", "real", "anomaly", "outlier", "attention",
    "transformer", "embedding",
];

#[derive(Debug, Clone, Default)]
pub struct KeywordStats {
    pub overall: HashMap<String, u32>,
    pub by_year: BTreeMap<u16, HashMap<String, u32>>,
    pub total_papers: usize,
}

pub struct KeywordExtractor {
    stopwords: HashSet<String>,
}

impl KeywordExtractor {
    pub fn new() -> Self {
        let mut stopwords: HashSet<String> =
            stop_words::get(stop_words::LANGUAGE::English).into_iter().collect();
        stopwords.extend(ACADEMIC_STOPWORDS.iter().map(|s| s.to_string()));
        for term in KEEP_TERMS {
            stopwords.remove(*term);
        }
        Self { stopwords }
    }

    /// Count unigram and bigram keywords across all titles, overall and per
    /// year.
    pub fn extract(&self, papers: &[PaperRecord]) -> KeywordStats {
        let mut stats = KeywordStats {
            total_papers: papers.len(),
            ..Default::default()
        };
        for paper in papers {
            if paper.title.is_empty() {
                continue;
            }
            let year_counts = stats.by_year.entry(paper.year).or_default();
            for keyword in self.title_keywords(&paper.title) {
                *stats.overall.entry(keyword.clone()).or_insert(0) += 1;
                *year_counts.entry(keyword).or_insert(0) += 1;
            }
        }
        stats
    }

    fn title_keywords(&self, title: &str) -> Vec<String> {
        let cleaned: String = title
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c.is_whitespace() {
                    c
                } else {
                    ' '
                }
            })
            .collect();
        let words: Vec<&str> = cleaned
            .split_whitespace()
            .map(|w| w.trim_matches('-'))
            .collect();

        let mut keywords = Vec::new();
        for word in &words {
            if self.is_valid(word) {
                keywords.push(word.to_string());
            }
        }
        for pair in words.windows(2) {
            if self.is_valid(pair[0]) && self.is_valid(pair[1]) {
                keywords.push(format!("{} {}", pair[0], pair[1]));
            }
        }
        keywords
    }

    fn is_valid(&self, word: &str) -> bool {
        word.len() >= MIN_WORD_LENGTH
            && word.len() <= MAX_WORD_LENGTH
            && !self.stopwords.contains(word)
            && word.chars().any(|c| c.is_alphabetic())
            && !word.chars().all(|c| c.is_ascii_digit())
    }
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop keywords under the frequency floor; per-year counts follow the
/// overall cut so the breakdowns stay consistent.
pub fn filter_by_frequency(mut stats: KeywordStats, min_frequency: u32) -> KeywordStats {
    stats.overall.retain(|_, count| *count >= min_frequency);
    for counts in stats.by_year.values_mut() {
        counts.retain(|keyword, _| stats.overall.contains_key(keyword));
    }
    stats
}

/// Keep the N most frequent keywords (ties broken alphabetically so output
/// is deterministic).
pub fn top_keywords(mut stats: KeywordStats, max_keywords: usize) -> KeywordStats {
    let mut ranked: Vec<(String, u32)> = stats.overall.iter().map(|(k, v)| (k.clone(), *v)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(max_keywords);
    let kept: HashSet<String> = ranked.into_iter().map(|(k, _)| k).collect();

    stats.overall.retain(|keyword, _| kept.contains(keyword));
    for counts in stats.by_year.values_mut() {
        counts.retain(|keyword, _| kept.contains(keyword));
    }
    stats
}

#[derive(Debug, Serialize)]
pub struct WordCloudData {
    pub metadata: WordCloudMetadata,
    pub words: Vec<WordEntry>,
}

#[derive(Debug, Serialize)]
pub struct WordCloudMetadata {
    pub conference: String,
    pub full_name: String,
    pub years: Vec<u16>,
    pub total_papers: usize,
    pub total_keywords: usize,
    pub last_updated: String,
}

#[derive(Debug, Serialize)]
pub struct WordEntry {
    pub text: String,
    pub value: u32,
    pub years: BTreeMap<String, u32>,
}

/// Reshape the counts into the frontend word-cloud document, sorted by
/// weight descending.
pub fn build_wordcloud(spec: &ConferenceSpec, stats: &KeywordStats) -> WordCloudData {
    let mut words: Vec<WordEntry> = stats
        .overall
        .iter()
        .map(|(keyword, &count)| {
            let mut years = BTreeMap::new();
            for (year, counts) in &stats.by_year {
                if let Some(&year_count) = counts.get(keyword) {
                    if year_count > 0 {
                        years.insert(year.to_string(), year_count);
                    }
                }
            }
            WordEntry {
                text: keyword.clone(),
                value: count,
                years,
            }
        })
        .collect();
    words.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.text.cmp(&b.text)));

    WordCloudData {
        metadata: WordCloudMetadata {
            conference: spec.name.to_string(),
            full_name: spec.full_name.to_string(),
            years: spec.years.clone(),
            total_papers: stats.total_papers,
            total_keywords: words.len(),
            last_updated: chrono::Local::now().format("%Y-%m-%d").to_string(),
        },
        words,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(title: &str, year: u16) -> PaperRecord {
        PaperRecord::new(title, year)
    }

    #[test]
    fn unigrams_and_bigrams_are_counted() {
        let extractor = KeywordExtractor::new();
        let stats = extractor.extract(&[
            paper("Graph Neural Networks for Fraud Detection", 2021),
            paper("Fraud Detection with Graph Embeddings", 2022),
        ]);
        assert_eq!(stats.overall.get("fraud"), Some(&2));
        assert_eq!(stats.overall.get("fraud detection"), Some(&2));
        assert_eq!(stats.overall.get("graph"), Some(&2));
        assert_eq!(stats.by_year[&2021].get("neural networks"), Some(&1));
        // "for" and "with" are stopwords and never surface.
        assert!(stats.overall.get("for").is_none());
    }

    #[test]
    fn stopwords_do_not_bridge_bigrams() {
        let extractor = KeywordExtractor::new();
        let stats = extractor.extract(&[paper("Clustering of Streams", 2021)]);
        // "of" is invalid, so no bigram spans it.
        assert!(stats.overall.keys().all(|k| !k.contains(' ')));
        assert_eq!(stats.overall.get("clustering"), Some(&1));
        assert_eq!(stats.overall.get("streams"), Some(&1));
    }

    #[test]
    fn keep_terms_survive_the_academic_stoplist() {
        let extractor = KeywordExtractor::new();
        let stats = extractor.extract(&[paper("Deep Learning for Data Mining", 2020)]);
        assert!(stats.overall.contains_key("learning"));
        assert!(stats.overall.contains_key("mining"));
        // Plain academic filler is still dropped.
        assert!(!extractor.is_valid("novel"));
        assert!(!extractor.is_valid("framework"));
    }

    #[test]
    fn word_validity_rules() {
        let extractor = KeywordExtractor::new();
        assert!(!extractor.is_valid("ml")); // too short
        assert!(!extractor.is_valid("2024")); // all digits
        assert!(!extractor.is_valid(&"x".repeat(31))); // too long
        assert!(extractor.is_valid("gpt-4o")); // mixed is fine
    }

    #[test]
    fn frequency_filter_prunes_year_breakdowns_too() {
        let extractor = KeywordExtractor::new();
        let stats = extractor.extract(&[
            paper("Federated Learning at the Edge", 2021),
            paper("Federated Learning for Healthcare", 2022),
            paper("Quantum Annealing Basics", 2022),
        ]);
        let filtered = filter_by_frequency(stats, 2);
        assert!(filtered.overall.contains_key("federated"));
        assert!(!filtered.overall.contains_key("quantum"));
        assert!(!filtered.by_year[&2022].contains_key("quantum"));
    }

    #[test]
    fn top_keywords_is_deterministic() {
        let mut stats = KeywordStats::default();
        stats.overall.insert("alpha".into(), 5);
        stats.overall.insert("beta".into(), 5);
        stats.overall.insert("gamma".into(), 1);
        let top = top_keywords(stats, 2);
        assert!(top.overall.contains_key("alpha"));
        assert!(top.overall.contains_key("beta"));
        assert!(!top.overall.contains_key("gamma"));
    }

    #[test]
    fn wordcloud_entries_sort_by_weight() {
        let spec = ConferenceSpec {
            key: "kdd",
            name: "KDD",
            full_name: "ACM SIGKDD Conference on Knowledge Discovery and Data Mining",
            dblp_venue: "kdd",
            dblp_page_prefix: "kdd",
            years: vec![2021, 2022],
            multi_part_years: &[],
            openreview_venue: None,
            proceedings_abstracts: false,
        };
        let extractor = KeywordExtractor::new();
        let stats = extractor.extract(&[
            paper("Graph Mining in Practice", 2021),
            paper("Graph Mining at Scale", 2022),
            paper("Streaming Joins", 2022),
        ]);
        let cloud = build_wordcloud(&spec, &stats);
        assert_eq!(cloud.metadata.total_papers, 3);
        assert_eq!(cloud.words[0].value, 2);
        let graph = cloud.words.iter().find(|w| w.text == "graph").unwrap();
        assert_eq!(graph.years.get("2021"), Some(&1));
        assert_eq!(graph.years.get("2022"), Some(&1));
    }
}
