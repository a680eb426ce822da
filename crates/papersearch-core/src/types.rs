//! Wire types exchanged with the Paper Search backend.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAccessPdf {
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
}

/// A paper as returned by `/search`. Immutable once fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub authors: Vec<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#abstract: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub influential_citation_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_count: Option<u64>,
    /// ISO date (`YYYY-MM-DD`) when the backend knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields_of_study: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_open_access: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_access_pdf: Option<OpenAccessPdf>,
}

impl Paper {
    /// The abstract, if present and not blank. Whitespace-only counts as missing.
    pub fn abstract_text(&self) -> Option<&str> {
        self.r#abstract
            .as_deref()
            .filter(|a| !a.trim().is_empty())
    }

    pub fn has_abstract(&self) -> bool {
        self.abstract_text().is_some()
    }

    pub fn first_author(&self) -> Option<&str> {
        self.authors.first().map(|a| a.name.as_str())
    }
}

/// The backend sends `null` for some fields; treat it like an absent value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Response body of `GET /search`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub papers: Vec<Paper>,
    #[serde(default)]
    pub total: Option<u64>,
    /// Server-side search time in seconds.
    #[serde(default)]
    pub time: Option<f64>,
}

/// Japanese/English label pair produced by the analysis model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    #[serde(default)]
    pub ja: String,
    #[serde(default)]
    pub en: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldScore {
    pub name: String,
    pub score: f64,
}

/// Per-paper classification returned by `POST /analyze`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldScore>,
    #[serde(default)]
    pub target: Label,
    #[serde(default)]
    pub methods: Vec<Label>,
    #[serde(default)]
    pub factors: Vec<Label>,
    #[serde(default)]
    pub metrics: Vec<Label>,
    #[serde(default)]
    pub search_keywords: Vec<Label>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportanceLevel {
    High,
    #[default]
    Medium,
    Low,
}

impl ImportanceLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub what_they_did: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub results: String,
    #[serde(default)]
    pub conclusion: String,
    #[serde(default)]
    pub importance_level: ImportanceLevel,
}

/// Detailed summary returned by `POST /summarize`: a flat summary, a
/// structured one, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<StructuredSummary>,
}

/// One-line summary plus keywords from `POST /quick-summary`.
///
/// Older backends name the sentence `summary`; both spellings deserialize
/// into `what_they_did`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickSummary {
    #[serde(default, alias = "summary")]
    pub what_they_did: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Per-function model selection held by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub analysis_model: String,
    pub translation_model: String,
    pub quick_summary_model: String,
    pub detailed_summary_model: String,
}

impl ModelConfig {
    pub fn model_for(&self, function: ModelFunction) -> &str {
        match function {
            ModelFunction::Analysis => &self.analysis_model,
            ModelFunction::Translation => &self.translation_model,
            ModelFunction::QuickSummary => &self.quick_summary_model,
            ModelFunction::DetailedSummary => &self.detailed_summary_model,
        }
    }
}

/// A backend function whose model can be chosen independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFunction {
    Analysis,
    Translation,
    QuickSummary,
    DetailedSummary,
}

impl ModelFunction {
    pub const ALL: [ModelFunction; 4] = [
        Self::Analysis,
        Self::Translation,
        Self::QuickSummary,
        Self::DetailedSummary,
    ];

    /// The `function_name` expected by `POST /models/config`.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Translation => "translation",
            Self::QuickSummary => "quick_summary",
            Self::DetailedSummary => "detailed_summary",
        }
    }

    pub fn from_wire_name(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.wire_name().eq_ignore_ascii_case(s.trim()))
    }
}

impl std::fmt::Display for ModelFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A model installed on the backend's inference server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableModel {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_at: String,
    #[serde(default)]
    pub digest: String,
}

impl AvailableModel {
    pub fn size_gb(&self) -> f64 {
        self.size as f64 / 1024.0 / 1024.0 / 1024.0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub models: Vec<AvailableModel>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TitleAbstractRequest<'a> {
    pub title: &'a str,
    pub r#abstract: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TranslateRequest<'a> {
    pub text: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct UpdateModelRequest<'a> {
    pub function_name: &'a str,
    pub model_name: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paper_deserializes_camel_case_and_nulls() {
        let json = r#"{
            "paperId": "abc",
            "title": "Attention Is All You Need",
            "authors": [{"name": "Ashish Vaswani"}],
            "abstract": "The dominant sequence transduction models...",
            "citationCount": 100000,
            "fieldsOfStudy": null,
            "openAccessPdf": null,
            "isOpenAccess": true
        }"#;
        let paper: Paper = serde_json::from_str(json).unwrap();
        assert_eq!(paper.paper_id.as_deref(), Some("abc"));
        assert_eq!(paper.first_author(), Some("Ashish Vaswani"));
        assert_eq!(paper.citation_count, Some(100000));
        assert!(paper.fields_of_study.is_empty());
        assert!(paper.open_access_pdf.is_none());
        assert!(paper.has_abstract());
    }

    #[test]
    fn blank_abstract_is_not_an_abstract() {
        let paper = Paper {
            title: "T".into(),
            r#abstract: Some("   ".into()),
            ..Default::default()
        };
        assert!(!paper.has_abstract());
    }

    #[test]
    fn null_strings_do_not_sink_the_response() {
        let json = r#"{"papers": [
            {"title": "A", "abstract": "x"},
            {"title": null, "authors": [{"name": null}], "openAccessPdf": {"url": "", "status": null}}
        ]}"#;
        let resp: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.papers.len(), 2);
        let second = &resp.papers[1];
        assert_eq!(second.title, "");
        assert_eq!(second.first_author(), Some(""));
        assert_eq!(second.open_access_pdf.as_ref().unwrap().status, "");
    }

    #[test]
    fn search_response_without_papers_is_empty() {
        let resp: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.papers.is_empty());
    }

    #[test]
    fn quick_summary_accepts_legacy_field_name() {
        let legacy: QuickSummary =
            serde_json::from_str(r#"{"summary": "did X", "keywords": ["a"]}"#).unwrap();
        let current: QuickSummary =
            serde_json::from_str(r#"{"what_they_did": "did X", "keywords": ["a"]}"#).unwrap();
        assert_eq!(legacy, current);
    }

    #[test]
    fn summary_data_with_structured_part() {
        let json = r#"{
            "summary": "short",
            "structured": {
                "keywords": ["BERT"],
                "what_they_did": "w",
                "background": "b",
                "method": "m",
                "results": "r",
                "conclusion": "c",
                "importance_level": "high"
            }
        }"#;
        let data: SummaryData = serde_json::from_str(json).unwrap();
        let structured = data.structured.unwrap();
        assert_eq!(structured.importance_level, ImportanceLevel::High);
        assert_eq!(structured.keywords, vec!["BERT".to_string()]);
    }

    #[test]
    fn model_function_wire_names() {
        assert_eq!(ModelFunction::QuickSummary.wire_name(), "quick_summary");
        assert_eq!(
            ModelFunction::from_wire_name("Detailed_Summary"),
            Some(ModelFunction::DetailedSummary)
        );
        assert_eq!(ModelFunction::from_wire_name("chat"), None);
    }

    #[test]
    fn model_size_in_gb() {
        let m = AvailableModel {
            name: "gemma".into(),
            size: 3 * 1024 * 1024 * 1024,
            modified_at: String::new(),
            digest: String::new(),
        };
        assert!((m.size_gb() - 3.0).abs() < f64::EPSILON);
    }
}
