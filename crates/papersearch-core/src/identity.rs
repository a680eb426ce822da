//! Derived paper identity used to key every per-paper cache.
//!
//! The backend does not guarantee a stable id, so identity falls back from
//! `paperId` to `url` to `"{title}_{first author}"`. Two untracked papers with
//! the same title and first author therefore share one identity.

use std::fmt;

use crate::types::Paper;

const UNKNOWN_AUTHOR: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaperId(String);

impl PaperId {
    pub fn of(paper: &Paper) -> Self {
        if let Some(id) = non_empty(paper.paper_id.as_deref()) {
            return Self(id.to_string());
        }
        if let Some(url) = non_empty(paper.url.as_deref()) {
            return Self(url.to_string());
        }
        let author = non_empty(paper.first_author()).unwrap_or(UNKNOWN_AUTHOR);
        Self(format!("{}_{}", paper.title, author))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.is_empty())
}

impl From<&Paper> for PaperId {
    fn from(paper: &Paper) -> Self {
        Self::of(paper)
    }
}

impl From<&str> for PaperId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Author;

    fn paper(title: &str, author: Option<&str>) -> Paper {
        Paper {
            title: title.into(),
            authors: author
                .map(|a| vec![Author { name: a.into() }])
                .unwrap_or_default(),
            ..Default::default()
        }
    }

    #[test]
    fn prefers_paper_id() {
        let mut p = paper("T", Some("A"));
        p.paper_id = Some("s2:123".into());
        p.url = Some("https://example.org/p".into());
        assert_eq!(PaperId::of(&p).as_str(), "s2:123");
    }

    #[test]
    fn falls_back_to_url() {
        let mut p = paper("T", Some("A"));
        p.url = Some("https://example.org/p".into());
        assert_eq!(PaperId::of(&p).as_str(), "https://example.org/p");
    }

    #[test]
    fn empty_id_is_skipped() {
        let mut p = paper("T", Some("A"));
        p.paper_id = Some(String::new());
        p.url = Some("https://example.org/p".into());
        assert_eq!(PaperId::of(&p).as_str(), "https://example.org/p");
    }

    #[test]
    fn title_and_first_author() {
        let p = paper("Deep Residual Learning", Some("Kaiming He"));
        assert_eq!(PaperId::of(&p).as_str(), "Deep Residual Learning_Kaiming He");
    }

    #[test]
    fn missing_author_is_unknown() {
        let p = paper("Untracked", None);
        assert_eq!(PaperId::of(&p).as_str(), "Untracked_unknown");
    }

    #[test]
    fn same_title_and_author_collide() {
        let mut a = paper("Same", Some("Ada"));
        let mut b = paper("Same", Some("Ada"));
        a.r#abstract = Some("first".into());
        b.r#abstract = Some("second".into());
        b.year = Some(2020);
        assert_eq!(PaperId::of(&a), PaperId::of(&b));
    }
}
