use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::sources::EnrichmentResult;

/// Which enrichment tier supplied a paper's abstract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbstractSource {
    Openreview,
    Openalex,
    OpenalexTitleSearch,
    SemanticScholar,
    NeuripsProceedings,
}

impl AbstractSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbstractSource::Openreview => "openreview",
            AbstractSource::Openalex => "openalex",
            AbstractSource::OpenalexTitleSearch => "openalex_title_search",
            AbstractSource::SemanticScholar => "semantic_scholar",
            AbstractSource::NeuripsProceedings => "neurips_proceedings",
        }
    }
}

impl std::fmt::Display for AbstractSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scholarly work, as harvested from the conference listing and
/// progressively enriched by the abstract tiers.
///
/// Lookup keys are optional; the harvesting stage fills in whichever ones the
/// listing exposes and every tier tolerates their absence. Enrichment fields
/// are always present (nullable) so the checkpoint format round-trips without
/// conditionally-absent keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub title: String,
    pub year: u16,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub openreview_id: Option<String>,
    #[serde(default)]
    pub openreview_url: Option<String>,
    #[serde(default)]
    pub proceedings_url: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub citation_count: Option<u32>,
    #[serde(default)]
    pub abstract_source: Option<AbstractSource>,
    #[serde(default)]
    pub source_id: Option<String>,
}

impl PaperRecord {
    pub fn new(title: impl Into<String>, year: u16) -> Self {
        Self {
            title: title.into(),
            year,
            authors: Vec::new(),
            venue: String::new(),
            doi: None,
            openreview_id: None,
            openreview_url: None,
            proceedings_url: None,
            abstract_text: None,
            citation_count: None,
            abstract_source: None,
            source_id: None,
        }
    }

    pub fn has_abstract(&self) -> bool {
        self.abstract_text.is_some()
    }

    /// Merge a successful tier result into the record.
    ///
    /// This is the only mutation path for the enrichment fields. It refuses
    /// to overwrite an existing abstract, and it sets `abstract_source`
    /// together with `abstract` so the two stay in lockstep. Returns whether
    /// the merge happened.
    pub fn apply_enrichment(&mut self, source: AbstractSource, result: &EnrichmentResult) -> bool {
        if self.abstract_text.is_some() {
            return false;
        }
        let Some(ref text) = result.abstract_text else {
            return false;
        };
        self.abstract_text = Some(text.clone());
        self.abstract_source = Some(source);
        if result.citation_count.is_some() {
            self.citation_count = result.citation_count;
        }
        self.source_id = result.source_id.clone();
        true
    }
}

/// Read-only coverage summary, recomputed from the collection on demand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageStats {
    pub total: usize,
    pub with_abstract: usize,
    pub by_source: BTreeMap<String, usize>,
}

impl CoverageStats {
    pub fn compute(papers: &[PaperRecord]) -> Self {
        let mut by_source = BTreeMap::new();
        let mut with_abstract = 0;
        for paper in papers {
            if let Some(source) = paper.abstract_source {
                with_abstract += 1;
                *by_source.entry(source.as_str().to_string()).or_insert(0) += 1;
            }
        }
        Self {
            total: papers.len(),
            with_abstract,
            by_source,
        }
    }

    /// Fraction of papers carrying an abstract, in `[0, 1]`.
    pub fn coverage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.with_abstract as f64 / self.total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(text: &str, citations: Option<u32>) -> EnrichmentResult {
        EnrichmentResult {
            abstract_text: Some(text.to_string()),
            citation_count: citations,
            source_id: Some("w123".to_string()),
        }
    }

    #[test]
    fn apply_enrichment_sets_abstract_and_source_together() {
        let mut paper = PaperRecord::new("Graph Learning", 2022);
        assert!(paper.apply_enrichment(AbstractSource::Openalex, &found("An abstract.", Some(7))));
        assert_eq!(paper.abstract_text.as_deref(), Some("An abstract."));
        assert_eq!(paper.abstract_source, Some(AbstractSource::Openalex));
        assert_eq!(paper.citation_count, Some(7));
        assert_eq!(paper.source_id.as_deref(), Some("w123"));
    }

    #[test]
    fn apply_enrichment_refuses_second_merge() {
        let mut paper = PaperRecord::new("Graph Learning", 2022);
        paper.apply_enrichment(AbstractSource::Openreview, &found("First.", None));
        assert!(!paper.apply_enrichment(AbstractSource::SemanticScholar, &found("Second.", Some(3))));
        assert_eq!(paper.abstract_text.as_deref(), Some("First."));
        assert_eq!(paper.abstract_source, Some(AbstractSource::Openreview));
        // The losing tier must not leak its citation count either.
        assert_eq!(paper.citation_count, None);
    }

    #[test]
    fn apply_enrichment_ignores_not_found() {
        let mut paper = PaperRecord::new("Graph Learning", 2022);
        assert!(!paper.apply_enrichment(AbstractSource::Openalex, &EnrichmentResult::not_found()));
        assert!(paper.abstract_text.is_none());
        assert!(paper.abstract_source.is_none());
    }

    #[test]
    fn abstract_and_source_stay_in_lockstep() {
        let mut papers = vec![
            PaperRecord::new("A", 2020),
            PaperRecord::new("B", 2021),
            PaperRecord::new("C", 2022),
        ];
        papers[0].apply_enrichment(AbstractSource::Openreview, &found("x", None));
        papers[2].apply_enrichment(AbstractSource::NeuripsProceedings, &found("y", None));
        for paper in &papers {
            assert_eq!(paper.abstract_text.is_some(), paper.abstract_source.is_some());
        }
    }

    #[test]
    fn coverage_stats_break_down_by_source() {
        let mut papers = vec![
            PaperRecord::new("A", 2020),
            PaperRecord::new("B", 2021),
            PaperRecord::new("C", 2022),
            PaperRecord::new("D", 2022),
        ];
        papers[0].apply_enrichment(AbstractSource::Openalex, &found("x", Some(1)));
        papers[1].apply_enrichment(AbstractSource::Openalex, &found("y", None));
        papers[2].apply_enrichment(AbstractSource::SemanticScholar, &found("z", None));

        let stats = CoverageStats::compute(&papers);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.with_abstract, 3);
        assert_eq!(stats.by_source.get("openalex"), Some(&2));
        assert_eq!(stats.by_source.get("semantic_scholar"), Some(&1));
        assert!((stats.coverage() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn checkpoint_fields_round_trip() {
        let mut paper = PaperRecord::new("Attention Mechanisms", 2023);
        paper.doi = Some("10.1145/3580305".to_string());
        paper.apply_enrichment(AbstractSource::SemanticScholar, &found("Round trip.", Some(42)));

        let json = serde_json::to_string(&paper).unwrap();
        assert!(json.contains("\"abstract\":\"Round trip.\""));
        assert!(json.contains("\"abstract_source\":\"semantic_scholar\""));
        let back: PaperRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, paper);
    }
}
