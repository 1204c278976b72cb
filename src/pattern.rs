//! Four-clause patterns and the flexiarg-style library format.
//!
//! A pattern is an argument with up to four free-text clauses (condition,
//! fallback, action, justification), an optional 8-bit code, optional inline
//! parameters and a preservation tag. Only the tag and the parameters steer
//! compilation; the clause text is carried into the diagram's interpretation.
//!
//! # Library format
//!
//! ```text
//! @flexiarg software/adapter
//! @title Adapter
//! @bits 01101010
//! @preservation full
//! @param mix-mode xor-neighbor
//!   + IF: two interfaces disagree
//!     and neither can change
//!   + HOWEVER: ...
//!   + THEN: ...
//!   + BECAUSE: ...
//!   + evidence: (ignored)
//! ```
//!
//! Clause text continues over following lines until the next clause or
//! directive; any other `+` line (such as `+ evidence:`) ends the clause.
//! Unknown directives are ignored.

use crate::params::{with_line, ExoCode, ParameterOverrides, Preservation, TableError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// One of the four argument clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Clause {
    /// `IF`
    Condition,
    /// `HOWEVER`
    Fallback,
    /// `THEN`
    Action,
    /// `BECAUSE`
    Justification,
}

impl Clause {
    pub const ALL: [Clause; 4] = [Clause::Condition, Clause::Fallback, Clause::Action, Clause::Justification];

    pub fn keyword(self) -> &'static str {
        match self {
            Clause::Condition => "IF",
            Clause::Fallback => "HOWEVER",
            Clause::Action => "THEN",
            Clause::Justification => "BECAUSE",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Clause> {
        Self::ALL.into_iter().find(|c| c.keyword().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A parsed pattern.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Pattern {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    /// The pattern's own 8-bit code, or one cached from a bridge lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ExoCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<ParameterOverrides>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preservation: Option<Preservation>,
}

impl Pattern {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: ExoCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_inline(mut self, params: ParameterOverrides) -> Self {
        self.inline = Some(params);
        self
    }

    pub fn with_preservation(mut self, tag: Preservation) -> Self {
        self.preservation = Some(tag);
        self
    }

    pub fn with_clause(mut self, clause: Clause, text: impl Into<String>) -> Self {
        *self.clause_mut(clause) = Some(text.into());
        self
    }

    /// The preservation tag, defaulting to partial.
    pub fn preservation(&self) -> Preservation {
        self.preservation.unwrap_or_default()
    }

    pub fn clause(&self, clause: Clause) -> Option<&str> {
        match clause {
            Clause::Condition => self.condition.as_deref(),
            Clause::Fallback => self.fallback.as_deref(),
            Clause::Action => self.action.as_deref(),
            Clause::Justification => self.justification.as_deref(),
        }
    }

    fn clause_mut(&mut self, clause: Clause) -> &mut Option<String> {
        match clause {
            Clause::Condition => &mut self.condition,
            Clause::Fallback => &mut self.fallback,
            Clause::Action => &mut self.action,
            Clause::Justification => &mut self.justification,
        }
    }
}

/// Errors raised while parsing a pattern library.
#[derive(Debug, Error)]
pub enum PatternParseError {
    #[error("line {line}: `{text}` appears before any @flexiarg header")]
    Orphan { line: usize, text: String },
    #[error("line {line}: @flexiarg needs a pattern id")]
    MissingId { line: usize },
    #[error("line {line}: duplicate pattern `{id}`")]
    Duplicate { line: usize, id: String },
    #[error("line {line}: {source}")]
    Value {
        line: usize,
        #[source]
        source: TableError,
    },
    #[error("cannot read pattern library: {0}")]
    Io(#[from] std::io::Error),
}

/// An ordered collection of patterns indexed by id.
#[derive(Debug, Clone, Default)]
pub struct PatternLibrary {
    patterns: Vec<Pattern>,
    index: HashMap<String, usize>,
}

struct OpenClause {
    clause: Clause,
    lines: Vec<String>,
}

impl PatternLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self, PatternParseError> {
        let mut lib = Self::new();
        let mut current: Option<Pattern> = None;
        let mut open: Option<OpenClause> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();

            if let Some(directive) = line.strip_prefix('@') {
                close_clause(&mut current, &mut open);
                let (name, rest) = split_word(directive);
                if name == "flexiarg" {
                    if rest.is_empty() {
                        return Err(PatternParseError::MissingId { line: line_no });
                    }
                    if let Some(done) = current.take() {
                        lib.push(done, line_no)?;
                    }
                    current = Some(Pattern::new(rest));
                    continue;
                }
                let pattern = current.as_mut().ok_or_else(|| PatternParseError::Orphan {
                    line: line_no,
                    text: line.to_string(),
                })?;
                apply_directive(pattern, name, rest).map_err(|source| PatternParseError::Value {
                    line: line_no,
                    source: with_line(source, line_no),
                })?;
            } else if let Some(item) = line.strip_prefix('+') {
                close_clause(&mut current, &mut open);
                let Some((key, rest)) = item.split_once(':') else {
                    continue;
                };
                if let Some(clause) = Clause::from_keyword(key) {
                    if current.is_none() {
                        return Err(PatternParseError::Orphan {
                            line: line_no,
                            text: line.to_string(),
                        });
                    }
                    let first = rest.trim();
                    open = Some(OpenClause {
                        clause,
                        lines: if first.is_empty() { Vec::new() } else { vec![first.to_string()] },
                    });
                }
            } else if let Some(o) = open.as_mut() {
                if !line.is_empty() {
                    o.lines.push(line.to_string());
                }
            }
        }
        close_clause(&mut current, &mut open);
        if let Some(done) = current {
            lib.push(done, text.lines().count())?;
        }
        debug!(patterns = lib.len(), "pattern library parsed");
        Ok(lib)
    }

    pub fn load(path: &Path) -> Result<Self, PatternParseError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    fn push(&mut self, pattern: Pattern, line: usize) -> Result<(), PatternParseError> {
        if self.index.contains_key(&pattern.id) {
            return Err(PatternParseError::Duplicate { line, id: pattern.id });
        }
        self.index.insert(pattern.id.clone(), self.patterns.len());
        self.patterns.push(pattern);
        Ok(())
    }

    pub fn insert(&mut self, pattern: Pattern) {
        match self.index.get(&pattern.id) {
            Some(&i) => self.patterns[i] = pattern,
            None => {
                self.index.insert(pattern.id.clone(), self.patterns.len());
                self.patterns.push(pattern);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Pattern> {
        self.index.get(id).map(|&i| &self.patterns[i])
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.id.as_str())
    }
}

fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim()),
        None => (s, ""),
    }
}

fn apply_directive(pattern: &mut Pattern, name: &str, value: &str) -> Result<(), TableError> {
    match name {
        "title" => pattern.title = Some(value.trim_matches('"').to_string()),
        "bits" => pattern.code = Some(value.parse()?),
        "preservation" => pattern.preservation = Some(value.parse()?),
        "param" => {
            let (key, v) = split_word(value);
            pattern.inline.get_or_insert_with(ParameterOverrides::default).set(key, v)?;
        }
        other => debug!(directive = other, pattern = %pattern.id, "ignoring directive"),
    }
    Ok(())
}

fn close_clause(current: &mut Option<Pattern>, open: &mut Option<OpenClause>) {
    if let (Some(pattern), Some(o)) = (current.as_mut(), open.take()) {
        let text = o.lines.join(" ");
        if !text.is_empty() {
            *pattern.clause_mut(o.clause) = Some(text);
        }
    }
}
