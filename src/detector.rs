//! Research Detector (C6): a heuristic classifier deciding whether a task
//! needs research, and if so, what queries to run.

use regex::RegexSet;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::config::DetectorConfig;
use crate::domain::{QueryType, ResearchRequirement, Task};

const UNCERTAINTY_PHRASES: &[&str] = &[
    "not sure",
    "unclear",
    "unknown",
    "need to find",
    "need to research",
    "don't know",
    "looking for",
    "trying to understand",
    "explain",
    "research",
];

const COMPARISON_PHRASES: &[&str] = &[
    "compare",
    "versus",
    " vs ",
    "difference between",
    "pros and cons",
    "advantages",
    "better than",
    "alternative",
    "choose between",
];

const TECHNICAL_PHRASES: &[&str] = &[
    "api",
    "library",
    "framework",
    "implement",
    "algorithm",
    "documentation",
    "architecture",
    "integration",
    "best practices",
    "code example",
    "tutorial",
    "guide",
    "specification",
    "how to implement",
    "setup",
    "configuration",
];

const TREND_PHRASES: &[&str] = &["latest", "recent", "current", "new", "trending"];
const EXPLANATORY_PHRASES: &[&str] = &["how", "why", "explain", "understand"];
const FILLER_PREFIXES: &[&str] = &[
    "please",
    "could you",
    "can you",
    "i need",
    "we need",
    "help me",
];

fn question_patterns() -> &'static RegexSet {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RegexSet::new([
            r"(?i)\b(what|how|why|when|where|who|which)\b.*\?",
            r"(?i)\b(can|should|is there|are there)\b.*\?",
            r"\?",
        ])
        .expect("question patterns are valid regexes")
    })
}

pub struct ResearchDetector {
    config: DetectorConfig,
}

impl ResearchDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Classify whether `task` needs research. Returns `None` when the
    /// resulting confidence falls below `min_confidence`.
    pub fn detect(&self, task: &Task) -> Option<ResearchRequirement> {
        let text = format!(
            "{} {}",
            task.description,
            task.metadata.get("prompt").cloned().unwrap_or_default()
        )
        .to_lowercase();

        let has_questions = self.config.enable_question_detection && has_question(&text);
        let has_uncertainty =
            self.config.enable_uncertainty_detection && contains_any(&text, UNCERTAINTY_PHRASES);
        let needs_comparison =
            self.config.enable_comparison_detection && contains_any(&text, COMPARISON_PHRASES);
        let requires_technical_info =
            self.config.enable_technical_detection && contains_any(&text, TECHNICAL_PHRASES);
        let requires_fact_checking = self.config.enable_fact_checking_detection
            && matches!(task.task_type.as_str(), "analysis" | "research" | "validation");

        let mut indicators = HashMap::new();
        indicators.insert("has_questions".to_string(), has_questions);
        indicators.insert("has_uncertainty".to_string(), has_uncertainty);
        indicators.insert("needs_comparison".to_string(), needs_comparison);
        indicators.insert("requires_technical_info".to_string(), requires_technical_info);
        indicators.insert("requires_fact_checking".to_string(), requires_fact_checking);

        // Observed behavior: confidence jumps to 1.0 the moment any enabled
        // indicator fires, rather than accumulating a true weighted sum.
        let any_fired = indicators.values().any(|fired| *fired);
        let confidence = if any_fired { 1.0 } else { 0.0 };

        if confidence < self.config.min_confidence {
            return None;
        }

        let query_type = infer_query_type(&text, requires_technical_info, needs_comparison);
        let suggested_queries =
            generate_queries(&task.description, needs_comparison, requires_technical_info, self.config.max_queries);

        Some(ResearchRequirement {
            required: true,
            confidence,
            query_type,
            suggested_queries,
            indicators: indicators.clone(),
            reason: build_reason(&indicators, confidence),
        })
    }
}

fn has_question(text: &str) -> bool {
    question_patterns().matches(text).matched_any()
}

fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| text.contains(phrase))
}

fn infer_query_type(text: &str, requires_technical_info: bool, needs_comparison: bool) -> QueryType {
    if requires_technical_info {
        QueryType::Technical
    } else if needs_comparison {
        QueryType::Comparative
    } else if contains_any(text, TREND_PHRASES) {
        QueryType::Trend
    } else if contains_any(text, EXPLANATORY_PHRASES) {
        QueryType::Explanatory
    } else {
        QueryType::Factual
    }
}

fn generate_queries(
    description: &str,
    needs_comparison: bool,
    requires_technical_info: bool,
    max_queries: usize,
) -> Vec<String> {
    let mut queries = Vec::new();

    for sentence in split_sentences(description) {
        let trimmed = sentence.trim();
        if trimmed.ends_with('?') {
            queries.push(trimmed.to_string());
        }
    }

    let cleaned = strip_filler(description);
    if !cleaned.is_empty() {
        queries.push(truncate_chars(&cleaned, 100));
    }

    let subject: String = description
        .split_whitespace()
        .take(5)
        .collect::<Vec<_>>()
        .join(" ");

    if needs_comparison {
        queries.push(format!("Compare {subject}"));
    }
    if requires_technical_info {
        queries.push(format!("{subject} documentation"));
    }

    let mut seen = std::collections::HashSet::new();
    queries.retain(|q| seen.insert(q.clone()));
    queries.truncate(max_queries);
    queries
}

/// Splits on sentence-terminating punctuation followed by whitespace or
/// end of string, so abbreviation- or domain-like dots (`Express.js`)
/// don't fracture a sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if matches!(ch, '.' | '?' | '!' | '\n') {
            let next_is_boundary = chars
                .peek()
                .map(|(_, c)| c.is_whitespace())
                .unwrap_or(true);
            if next_is_boundary {
                let end = idx + ch.len_utf8();
                sentences.push(std::str::from_utf8(&bytes[start..end]).unwrap_or(""));
                start = end;
            }
        }
    }
    if start < bytes.len() {
        sentences.push(std::str::from_utf8(&bytes[start..]).unwrap_or(""));
    }
    sentences
}

fn strip_filler(description: &str) -> String {
    let lower = description.to_lowercase();
    for prefix in FILLER_PREFIXES {
        if let Some(stripped) = lower.strip_prefix(prefix) {
            let offset = description.len() - stripped.len();
            return description[offset..].trim().to_string();
        }
    }
    description.trim().to_string()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn build_reason(indicators: &HashMap<String, bool>, confidence: f64) -> String {
    let mut fired: Vec<&str> = indicators
        .iter()
        .filter(|(_, v)| **v)
        .map(|(k, _)| k.as_str())
        .collect();
    fired.sort();
    if fired.is_empty() {
        return format!("no research indicators fired (confidence: {:.0}%)", confidence * 100.0);
    }
    format!(
        "triggered by {} (confidence: {:.0}%)",
        fired.join(", "),
        confidence * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn task(description: &str, task_type: &str) -> Task {
        Task {
            id: "t1".into(),
            description: description.to_string(),
            task_type: task_type.to_string(),
            metadata: StdHashMap::new(),
        }
    }

    #[test]
    fn detects_technical_question() {
        let detector = ResearchDetector::new(DetectorConfig::default());
        let requirement = detector
            .detect(&task("How do I implement OAuth2 in Express.js?", "general"))
            .expect("should require research");
        assert!(requirement.required);
        assert_eq!(requirement.confidence, 1.0);
        assert_eq!(requirement.query_type, QueryType::Technical);
    }

    #[test]
    fn does_not_flag_plain_instructions() {
        let detector = ResearchDetector::new(DetectorConfig::default());
        let result = detector.detect(&task(
            "Update the README file with installation instructions.",
            "general",
        ));
        assert!(result.is_none());
    }

    #[test]
    fn disabling_all_indicators_never_flags() {
        let config = DetectorConfig {
            enable_question_detection: false,
            enable_uncertainty_detection: false,
            enable_comparison_detection: false,
            enable_technical_detection: false,
            enable_fact_checking_detection: false,
            ..DetectorConfig::default()
        };
        let detector = ResearchDetector::new(config);
        let result = detector.detect(&task("What is the best API framework?", "general"));
        assert!(result.is_none());
    }

    #[test]
    fn comparison_phrase_infers_comparative_type() {
        let detector = ResearchDetector::new(DetectorConfig::default());
        let requirement = detector
            .detect(&task("Compare Rust versus Go for backend services", "general"))
            .unwrap();
        assert_eq!(requirement.query_type, QueryType::Comparative);
    }

    #[test]
    fn suggested_queries_keep_question_intact_despite_embedded_dot() {
        let detector = ResearchDetector::new(DetectorConfig::default());
        let requirement = detector
            .detect(&task("How do I implement OAuth2 in Express.js?", "general"))
            .unwrap();
        assert!(requirement
            .suggested_queries
            .iter()
            .any(|q| q == "How do I implement OAuth2 in Express.js?"));
        assert!(requirement
            .suggested_queries
            .iter()
            .any(|q| q.contains("documentation")));
    }
}
