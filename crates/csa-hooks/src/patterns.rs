//! Pattern matching shared by deny/ask/allow lists. A single list mixes
//! literal prefixes, globs (`*`, `?`), and regexes; the kind is detected
//! from the leading character class of the pattern string rather than
//! requiring a separate `kind` field in config.

use glob::Pattern as GlobPattern;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Literal,
    Glob,
    Regex,
}

/// One compiled pattern from a deny/ask/allow list.
pub struct CompiledPattern {
    pub source: String,
    pub kind: PatternKind,
    glob: Option<GlobPattern>,
    regex: Option<Regex>,
}

impl CompiledPattern {
    pub fn compile(source: &str) -> Self {
        let kind = detect_kind(source);
        match kind {
            PatternKind::Literal => Self {
                source: source.to_string(),
                kind,
                glob: None,
                regex: None,
            },
            PatternKind::Glob => Self {
                source: source.to_string(),
                kind,
                glob: GlobPattern::new(source).ok(),
                regex: None,
            },
            PatternKind::Regex => Self {
                source: source.to_string(),
                kind,
                glob: None,
                regex: Regex::new(source).ok(),
            },
        }
    }

    pub fn matches(&self, command: &str) -> bool {
        match self.kind {
            PatternKind::Literal => {
                command == self.source || command.starts_with(&format!("{} ", self.source))
            }
            PatternKind::Glob => self
                .glob
                .as_ref()
                .map(|g| g.matches(command))
                .unwrap_or(false),
            PatternKind::Regex => self
                .regex
                .as_ref()
                .map(|re| re.is_match(command))
                .unwrap_or(false),
        }
    }
}

/// Detect pattern kind from its leading character class: a leading `^`,
/// `\`, or a bracket/anchor construct implies regex; a bare `*`/`?` implies
/// glob; anything else is treated as a literal prefix.
fn detect_kind(pattern: &str) -> PatternKind {
    if pattern.starts_with('^')
        || pattern.starts_with('\\')
        || pattern.contains("(?")
        || pattern.contains('|')
        || pattern.contains(r"\b")
        || pattern.contains('+')
    {
        return PatternKind::Regex;
    }
    if pattern.contains('*') || pattern.contains('?') {
        return PatternKind::Glob;
    }
    PatternKind::Literal
}

/// A named list of compiled patterns (deny, ask, or allow).
pub struct PatternList {
    patterns: Vec<CompiledPattern>,
}

impl PatternList {
    pub fn compile(sources: &[String]) -> Self {
        Self {
            patterns: sources.iter().map(|s| CompiledPattern::compile(s)).collect(),
        }
    }

    pub fn find_match(&self, command: &str) -> Option<&CompiledPattern> {
        self.patterns.iter().find(|p| p.matches(command))
    }

    pub fn any_match(&self, command: &str) -> bool {
        self.find_match(command).is_some()
    }
}
