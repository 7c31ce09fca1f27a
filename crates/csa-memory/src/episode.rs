//! The Episode type (spec §3) and the pure helpers that derive its
//! keywords, title, and type from free text.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Basic English stopwords filtered out of extracted keywords.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "been", "be", "have", "has", "had", "do", "does", "did",
    "will", "would", "should", "could", "may", "might", "can", "must", "shall", "need", "dare",
];

fn word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[a-z]+\b").expect("static regex"))
}

/// Tokenize, drop stopwords and words of length ≤2, dedup preserving order,
/// keep the first 20.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut seen = HashSet::new();
    let mut keywords = Vec::new();
    for word in word_regex().find_iter(&lower) {
        let word = word.as_str();
        if word.len() <= 2 || STOPWORDS.contains(&word) {
            continue;
        }
        if seen.insert(word.to_string()) {
            keywords.push(word.to_string());
            if keywords.len() == 20 {
                break;
            }
        }
    }
    keywords
}

/// First 60 characters of the text, cut at the first `.` if one appears
/// before that boundary.
pub fn generate_title(text: &str) -> String {
    let candidate = match text.split_once('.') {
        Some((head, _)) if !head.is_empty() => head,
        _ => text,
    };
    if candidate.chars().count() > 60 {
        let truncated: String = candidate.chars().take(60).collect();
        format!("{truncated}...")
    } else {
        candidate.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeType {
    Deployment,
    Troubleshooting,
    Creation,
    Modification,
    Validation,
    Deletion,
    General,
}

impl EpisodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployment => "deployment",
            Self::Troubleshooting => "troubleshooting",
            Self::Creation => "creation",
            Self::Modification => "modification",
            Self::Validation => "validation",
            Self::Deletion => "deletion",
            Self::General => "general",
        }
    }
}

/// Keyword-family heuristic, tried in this order: deployment,
/// troubleshooting, creation, modification, validation, deletion; the
/// first family with a hit wins, else `General`.
pub fn determine_type(prompt: &str) -> EpisodeType {
    let lower = prompt.to_lowercase();
    let families: &[(EpisodeType, &[&str])] = &[
        (EpisodeType::Deployment, &["deploy", "apply", "push", "release"]),
        (
            EpisodeType::Troubleshooting,
            &["fix", "error", "issue", "problem", "debug"],
        ),
        (EpisodeType::Creation, &["create", "add", "new", "setup", "init"]),
        (EpisodeType::Modification, &["update", "modify", "change", "edit"]),
        (EpisodeType::Validation, &["check", "verify", "test", "validate"]),
        (EpisodeType::Deletion, &["delete", "remove", "clean"]),
    ];
    for (kind, words) in families {
        if words.iter().any(|w| lower.contains(w)) {
            return *kind;
        }
    }
    EpisodeType::General
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Partial,
    Failed,
    Abandoned,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Solves,
    Causes,
    DependsOn,
    RelatedTo,
    Supersedes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub source_id: String,
    pub target_id: String,
    pub kind: RelationshipKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub agent_id: String,
    pub agent_name: String,
    pub phases: Vec<String>,
    pub duration_seconds: Option<f64>,
    pub success: Option<bool>,
}

/// A persisted record of one user request's lifecycle, updatable across
/// phases. See spec §3 for the full field list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub episode_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub original_prompt: String,
    pub enriched_prompt: String,
    #[serde(default)]
    pub clarifications: HashMap<String, String>,
    /// Open map; MUST contain a `workflow` sub-object with
    /// `phase_X_timestamp` keys and an ordered `phases_completed` list.
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub episode_type: EpisodeType,
    pub title: String,
    pub outcome: Outcome,
    pub success: Option<bool>,
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub commands_executed: Vec<String>,
    #[serde(default)]
    pub agents: Vec<AgentRecord>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default = "default_relevance_score")]
    pub relevance_score: f64,
}

fn default_relevance_score() -> f64 {
    1.0
}

impl Episode {
    /// Build a fresh episode from request inputs. `context` is taken as-is;
    /// callers are responsible for seeding `context.workflow` before the
    /// store persists it.
    pub fn new(
        episode_id: String,
        original_prompt: String,
        enriched_prompt: Option<String>,
        clarifications: HashMap<String, String>,
        context: Map<String, Value>,
        tags: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        let enriched = enriched_prompt.unwrap_or_else(|| original_prompt.clone());

        let mut all_text = original_prompt.clone();
        all_text.push(' ');
        all_text.push_str(&enriched);
        let mut keywords = extract_keywords(&all_text);
        for tag in &tags {
            let lowered = tag.to_lowercase();
            if !keywords.contains(&lowered) {
                keywords.push(lowered);
            }
        }

        let episode_type = determine_type(&original_prompt);
        let title = generate_title(&enriched);

        Self {
            episode_id,
            created_at: now,
            updated_at: now,
            original_prompt,
            enriched_prompt: enriched,
            clarifications,
            context,
            keywords,
            tags,
            episode_type,
            title,
            outcome: Outcome::Unknown,
            success: None,
            duration_seconds: None,
            commands_executed: Vec::new(),
            agents: Vec::new(),
            relationships: Vec::new(),
            relevance_score: 1.0,
        }
    }
}
