//! Capture-group templates.
//!
//! A template mixes literal text with numbered placeholders: `@1` expands
//! to capture group 1, `@0` to the whole match and `@@` to a literal `@`.
//! Pattern and template are compiled once per batch by [`TemplateEngine`]
//! and then evaluated against each candidate's name stem.

use regex::{Captures, Regex};

use crate::error::TemplateError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Group(usize),
}

/// A parsed replacement template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
    max_group: usize,
}

impl Template {
    pub fn parse(input: &str) -> Result<Self, TemplateError> {
        let bytes = input.as_bytes();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut max_group = 0;
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] != b'@' {
                let ch = input[i..].chars().next().unwrap_or_default();
                literal.push(ch);
                i += ch.len_utf8();
                continue;
            }

            match bytes.get(i + 1) {
                None => return Err(TemplateError::DanglingAt),
                Some(b'@') => {
                    literal.push('@');
                    i += 2;
                }
                Some(next) if next.is_ascii_digit() => {
                    let mut j = i + 1;
                    while j < bytes.len() && bytes[j].is_ascii_digit() {
                        j += 1;
                    }
                    let digits = &input[i + 1..j];
                    let index: usize = digits
                        .parse()
                        .map_err(|_| TemplateError::InvalidIndex(digits.to_string()))?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Group(index));
                    max_group = max_group.max(index);
                    i = j;
                }
                Some(_) => return Err(TemplateError::InvalidPlaceholder(i)),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            segments,
            max_group,
        })
    }

    /// Highest group index referenced (0 when only literals are present).
    pub fn max_group(&self) -> usize {
        self.max_group
    }

    /// Render against a successful match. A referenced group that did not
    /// participate in the match is an error.
    pub fn render(&self, captures: &Captures<'_>) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Group(index) => {
                    let group = captures
                        .get(*index)
                        .ok_or(TemplateError::UndefinedPlaceholder(*index))?;
                    out.push_str(group.as_str());
                }
            }
        }
        Ok(out)
    }
}

/// Result of a successful [`TemplateEngine::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMatch {
    pub rendered: String,
    /// Capture groups 1..N; non-participating groups are empty strings.
    pub groups: Vec<String>,
}

/// Compiled pattern + template pair.
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    regex: Regex,
    template: Template,
}

impl TemplateEngine {
    /// Compile both halves and reject templates referencing groups the
    /// pattern does not declare.
    pub fn compile(pattern: &str, template: &str) -> Result<Self, TemplateError> {
        let regex = Regex::new(pattern).map_err(|e| TemplateError::Pattern(e.to_string()))?;
        let template = Template::parse(template)?;
        let available = regex.captures_len() - 1;
        if template.max_group() > available {
            return Err(TemplateError::GroupOutOfRange {
                group: template.max_group(),
                available,
            });
        }
        Ok(Self { regex, template })
    }

    /// Evaluate against a name stem. `Ok(None)` means the pattern did not match.
    pub fn apply(&self, stem: &str) -> Result<Option<TemplateMatch>, TemplateError> {
        let Some(captures) = self.regex.captures(stem) else {
            return Ok(None);
        };
        let rendered = self.template.render(&captures)?;
        let groups = (1..captures.len())
            .map(|idx| {
                captures
                    .get(idx)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default()
            })
            .collect();
        Ok(Some(TemplateMatch { rendered, groups }))
    }
}
