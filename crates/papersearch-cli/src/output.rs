use std::io::Write;

use owo_colors::OwoColorize;
use papersearch_core::QueueEvent;
use papersearch_core::services::SearchState;
use papersearch_core::types::{
    AnalysisResult, AvailableModel, ImportanceLevel, Label, ModelConfig, ModelFunction, Paper,
    QuickSummary, SummaryData,
};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

const WRAP_WIDTH: usize = 88;
const INDENT: &str = "    ";

/// Word-wrap `text` to `width` columns and keep at most `max_lines` lines.
/// Returns the kept lines and whether anything was cut. `max_lines == 0`
/// keeps everything.
pub fn clamp_lines(text: &str, width: usize, max_lines: usize) -> (Vec<String>, bool) {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if max_lines == 0 || lines.len() <= max_lines {
        return (lines, false);
    }
    lines.truncate(max_lines);
    if let Some(last) = lines.last_mut() {
        last.push_str(" ...");
    }
    (lines, true)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}

fn authors_line(paper: &Paper) -> Option<String> {
    if paper.authors.is_empty() {
        return None;
    }
    let names: Vec<&str> = paper
        .authors
        .iter()
        .take(3)
        .map(|a| a.name.as_str())
        .collect();
    let mut line = names.join(", ");
    if paper.authors.len() > 3 {
        line.push_str(" et al.");
    }
    Some(line)
}

fn heading(w: &mut dyn Write, text: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{}", text.bold())
    } else {
        writeln!(w, "{}", text)
    }
}

/// Print the current result list with clamped abstracts and a shareable link.
pub fn print_results(
    w: &mut dyn Write,
    state: &SearchState,
    abstract_lines: usize,
    color: ColorMode,
) -> std::io::Result<()> {
    let elapsed = state
        .elapsed
        .map(|d| format!(" in {:.2}s", d.as_secs_f64()))
        .unwrap_or_default();
    let header = format!(
        "{} results for \"{}\"{} (sorted by {})",
        state.results.len(),
        state.params.query,
        elapsed,
        state.sort
    );
    heading(w, &header, color)?;
    writeln!(w)?;

    for (i, paper) in state.results.iter().enumerate() {
        let mut meta = Vec::new();
        if let Some(year) = paper.year {
            meta.push(year.to_string());
        }
        if let Some(venue) = paper.venue.as_deref().filter(|v| !v.is_empty()) {
            meta.push(venue.to_string());
        }
        if let Some(cites) = paper.citation_count {
            meta.push(format!("{} citations", cites));
        }
        let meta = if meta.is_empty() {
            String::new()
        } else {
            format!(" ({})", meta.join(", "))
        };

        if color.enabled() {
            writeln!(w, "[{}] {}{}", i, paper.title.bold().cyan(), meta.dimmed())?;
        } else {
            writeln!(w, "[{}] {}{}", i, paper.title, meta)?;
        }
        if let Some(authors) = authors_line(paper) {
            writeln!(w, "{}{}", INDENT, authors)?;
        }
        match paper.abstract_text() {
            Some(text) => {
                let (lines, _) = clamp_lines(text, WRAP_WIDTH, abstract_lines);
                for line in lines {
                    writeln!(w, "{}{}", INDENT, line)?;
                }
            }
            None => {
                if color.enabled() {
                    writeln!(w, "{}{}", INDENT, "(no abstract)".dimmed())?;
                } else {
                    writeln!(w, "{}(no abstract)", INDENT)?;
                }
            }
        }
        if let Some(url) = paper.url.as_deref().filter(|u| !u.is_empty()) {
            if color.enabled() {
                writeln!(w, "{}{}", INDENT, url.blue())?;
            } else {
                writeln!(w, "{}{}", INDENT, url)?;
            }
        }
        writeln!(w)?;
    }

    let link = format!("Share: ?{}", state.params.to_query_string());
    if color.enabled() {
        writeln!(w, "{}", link.dimmed())?;
    } else {
        writeln!(w, "{}", link)?;
    }
    Ok(())
}

fn label_line(label: &Label) -> String {
    match (label.en.is_empty(), label.ja.is_empty()) {
        (false, false) => format!("{} / {}", label.en, label.ja),
        (false, true) => label.en.clone(),
        (true, false) => label.ja.clone(),
        (true, true) => String::new(),
    }
}

fn print_labels(
    w: &mut dyn Write,
    name: &str,
    labels: &[Label],
    color: ColorMode,
) -> std::io::Result<()> {
    if labels.is_empty() {
        return Ok(());
    }
    heading(w, &format!("{}:", name), color)?;
    for label in labels {
        writeln!(w, "  • {}", label_line(label))?;
    }
    Ok(())
}

pub fn print_analysis(
    w: &mut dyn Write,
    paper: &Paper,
    analysis: &AnalysisResult,
    color: ColorMode,
) -> std::io::Result<()> {
    heading(w, &format!("Analysis: {}", truncate(&paper.title, 70)), color)?;
    writeln!(w)?;

    if !analysis.fields.is_empty() {
        heading(w, "Fields:", color)?;
        for field in &analysis.fields {
            let pct = format!("{:>3.0}%", field.score * 100.0);
            if color.enabled() {
                writeln!(w, "  {} {}", pct.green(), field.name)?;
            } else {
                writeln!(w, "  {} {}", pct, field.name)?;
            }
        }
    }
    let target = label_line(&analysis.target);
    if !target.is_empty() {
        heading(w, "Target:", color)?;
        writeln!(w, "  {}", target)?;
    }
    print_labels(w, "Methods", &analysis.methods, color)?;
    print_labels(w, "Factors", &analysis.factors, color)?;
    print_labels(w, "Metrics", &analysis.metrics, color)?;
    print_labels(w, "Search keywords", &analysis.search_keywords, color)?;
    Ok(())
}

fn importance(level: ImportanceLevel, color: ColorMode) -> String {
    if !color.enabled() {
        return level.label().to_string();
    }
    match level {
        ImportanceLevel::High => level.label().red().bold().to_string(),
        ImportanceLevel::Medium => level.label().yellow().to_string(),
        ImportanceLevel::Low => level.label().dimmed().to_string(),
    }
}

pub fn print_summary(
    w: &mut dyn Write,
    paper: &Paper,
    data: &SummaryData,
    color: ColorMode,
) -> std::io::Result<()> {
    heading(w, &format!("Summary: {}", truncate(&paper.title, 70)), color)?;
    writeln!(w)?;

    if let Some(s) = &data.structured {
        writeln!(w, "Importance: {}", importance(s.importance_level, color))?;
        if !s.keywords.is_empty() {
            writeln!(w, "Keywords: {}", s.keywords.join(", "))?;
        }
        for (name, body) in [
            ("What they did", &s.what_they_did),
            ("Background", &s.background),
            ("Method", &s.method),
            ("Results", &s.results),
            ("Conclusion", &s.conclusion),
        ] {
            if body.trim().is_empty() {
                continue;
            }
            writeln!(w)?;
            heading(w, name, color)?;
            let (lines, _) = clamp_lines(body, WRAP_WIDTH, 0);
            for line in lines {
                writeln!(w, "  {}", line)?;
            }
        }
    } else if let Some(summary) = &data.summary {
        let (lines, _) = clamp_lines(summary, WRAP_WIDTH, 0);
        for line in lines {
            writeln!(w, "{}", line)?;
        }
    } else if color.enabled() {
        writeln!(w, "{}", "(empty summary)".dimmed())?;
    } else {
        writeln!(w, "(empty summary)")?;
    }
    Ok(())
}

/// Print the part of a streamed translation not yet on screen. Each update
/// carries the whole text so far; `shown` tracks what has been written.
pub fn write_stream_update(
    w: &mut dyn Write,
    shown: &mut String,
    visible: &str,
) -> std::io::Result<()> {
    match visible.strip_prefix(shown.as_str()) {
        Some(rest) => write!(w, "{}", rest)?,
        None => write!(w, "\n{}", visible)?,
    }
    w.flush()?;
    *shown = visible.to_string();
    Ok(())
}

pub fn format_quick_summary(title: &str, summary: &QuickSummary, color: ColorMode) -> String {
    let title = truncate(title, 60);
    let keywords = if summary.keywords.is_empty() {
        String::new()
    } else {
        format!(" [{}]", summary.keywords.join(", "))
    };
    if color.enabled() {
        format!(
            "{} {}{}",
            format!("{}:", title).bold(),
            summary.what_they_did,
            keywords.dimmed()
        )
    } else {
        format!("{}: {}{}", title, summary.what_they_did, keywords)
    }
}

/// One line per finished queue item; skipped items print nothing.
pub fn format_queue_event(event: &QueueEvent, color: ColorMode) -> Option<String> {
    match event {
        QueueEvent::Summarized { title, summary, .. } => {
            Some(format_quick_summary(title, summary, color))
        }
        QueueEvent::Failed { title, error, .. } => {
            let line = format!("{}: {}", truncate(title, 60), error);
            if color.enabled() {
                Some(format!("{} {}", "FAILED".red(), line))
            } else {
                Some(format!("FAILED {}", line))
            }
        }
        QueueEvent::Skipped { .. } => None,
    }
}

pub fn print_model_config(
    w: &mut dyn Write,
    config: &ModelConfig,
    color: ColorMode,
) -> std::io::Result<()> {
    for function in ModelFunction::ALL {
        let name = format!("{:<17}", function.wire_name());
        if color.enabled() {
            writeln!(w, "  {} {}", name.bold(), config.model_for(function).cyan())?;
        } else {
            writeln!(w, "  {} {}", name, config.model_for(function))?;
        }
    }
    Ok(())
}

pub fn print_models(
    w: &mut dyn Write,
    models: &[AvailableModel],
    config: Option<&ModelConfig>,
    color: ColorMode,
) -> std::io::Result<()> {
    if models.is_empty() {
        writeln!(w, "No models installed on the backend.")?;
        return Ok(());
    }
    for model in models {
        let used_by: Vec<&str> = config
            .map(|c| {
                ModelFunction::ALL
                    .into_iter()
                    .filter(|f| c.model_for(*f) == model.name)
                    .map(|f| f.wire_name())
                    .collect()
            })
            .unwrap_or_default();
        let size = format!("{:>6.1} GB", model.size_gb());
        let used = if used_by.is_empty() {
            String::new()
        } else {
            format!("  ({})", used_by.join(", "))
        };
        if color.enabled() {
            writeln!(w, "  {:<32} {}{}", model.name, size.dimmed(), used.green())?;
        } else {
            writeln!(w, "  {:<32} {}{}", model.name, size, used)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use papersearch_core::PaperId;
    use papersearch_core::SearchParams;
    use papersearch_core::types::Author;
    use std::sync::Arc;
    use std::time::Duration;

    const PLAIN: ColorMode = ColorMode(false);

    fn render(f: impl FnOnce(&mut dyn Write) -> std::io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn clamp_wraps_and_cuts() {
        let text = "one two three four five six seven eight nine ten";
        let (lines, cut) = clamp_lines(text, 10, 2);
        assert!(cut);
        assert_eq!(lines, vec!["one two", "three four ..."]);

        let (all, cut) = clamp_lines(text, 10, 0);
        assert!(!cut);
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn clamp_keeps_long_words_whole() {
        let (lines, cut) = clamp_lines("supercalifragilistic yes", 5, 3);
        assert!(!cut);
        assert_eq!(lines, vec!["supercalifragilistic", "yes"]);
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("日本語のタイトル", 3), "日本語...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn results_listing() {
        let state = SearchState {
            params: SearchParams::new("graph nets", 10),
            results: vec![
                Paper {
                    title: "GAT".into(),
                    year: Some(2018),
                    citation_count: Some(9000),
                    authors: ["A", "B", "C", "D"]
                        .iter()
                        .map(|n| Author { name: n.to_string() })
                        .collect(),
                    r#abstract: Some("We present graph attention networks.".into()),
                    ..Default::default()
                },
                Paper {
                    title: "Untitled".into(),
                    ..Default::default()
                },
            ],
            elapsed: Some(Duration::from_millis(420)),
            ..Default::default()
        };
        let out = render(|w| print_results(w, &state, 3, PLAIN));
        assert!(out.starts_with("2 results for \"graph nets\" in 0.42s (sorted by relevance)"));
        assert!(out.contains("[0] GAT (2018, 9000 citations)"));
        assert!(out.contains("A, B, C et al."));
        assert!(out.contains("(no abstract)"));
        assert!(out.contains("Share: ?q=graph%20nets&limit=10"));
    }

    #[test]
    fn queue_events() {
        let summarized = QueueEvent::Summarized {
            paper_id: PaperId::from("p"),
            title: "Paper".into(),
            summary: Arc::new(QuickSummary {
                what_they_did: "Built a thing.".into(),
                keywords: vec!["x".into()],
            }),
        };
        assert_eq!(
            format_queue_event(&summarized, PLAIN).unwrap(),
            "Paper: Built a thing. [x]"
        );
        let skipped = QueueEvent::Skipped {
            paper_id: PaperId::from("p"),
        };
        assert!(format_queue_event(&skipped, PLAIN).is_none());
    }

    #[test]
    fn models_mark_active_functions() {
        let models = vec![AvailableModel {
            name: "llama3.2:3b".into(),
            size: 2 * 1024 * 1024 * 1024,
            modified_at: String::new(),
            digest: String::new(),
        }];
        let config = ModelConfig {
            quick_summary_model: "llama3.2:3b".into(),
            ..Default::default()
        };
        let out = render(|w| print_models(w, &models, Some(&config), PLAIN));
        assert!(out.contains("2.0 GB"));
        assert!(out.contains("(quick_summary)"));
    }

    #[test]
    fn stream_updates_print_only_new_text() {
        let mut shown = String::new();
        let out = render(|w| {
            write_stream_update(w, &mut shown, "Hi")?;
            write_stream_update(w, &mut shown, "Hi there")?;
            write_stream_update(w, &mut shown, "Hello")
        });
        assert_eq!(out, "Hi there\nHello");
        assert_eq!(shown, "Hello");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stream_update_reports_write_failure() {
        let mut shown = String::new();
        let err = write_stream_update(&mut BrokenPipe, &mut shown, "Hi").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
        assert!(shown.is_empty());
    }
}
