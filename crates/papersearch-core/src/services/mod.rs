//! Per-feature services over a shared [`PaperApi`](crate::api::PaperApi).
//!
//! Each service owns its cache and busy flag. The per-paper services also
//! share the priority gate so the auto-summarize queue can yield to them.

pub mod analysis;
pub mod models;
pub mod search;
pub mod summary;
pub mod translation;

pub use analysis::AnalysisService;
pub use models::ModelSettingsService;
pub use search::{
    DEFAULT_RESULT_LIMIT, RESULT_LIMIT_OPTIONS, SearchOutcome, SearchParams, SearchService,
    SearchState, SortOrder, normalize_limit,
};
pub use summary::{SummaryService, Trigger};
pub use translation::TranslationService;
