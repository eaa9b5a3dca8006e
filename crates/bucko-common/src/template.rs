//! Named-placeholder substitution.
//!
//! Templates use the `%(name)s` placeholder syntax; `%%` produces a literal
//! percent sign. Only fields supplied by the caller may appear in a template:
//! an unknown placeholder is an error, never silently left in place.

use std::collections::BTreeMap;

use crate::error::{BuckoError, Result};

/// One lexical piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Percent,
    Field(&'a str),
}

/// A parsed `%(name)s` template.
#[derive(Debug, Clone)]
pub struct Template<'a> {
    source: &'a str,
    segments: Vec<Segment<'a>>,
}

impl<'a> Template<'a> {
    /// Parses a template string.
    ///
    /// # Errors
    ///
    /// Returns [`BuckoError::Template`] on a dangling `%`, an unterminated
    /// `%(`, an empty field name, or a conversion other than `s`.
    pub fn parse(source: &'a str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(pos) = rest.find('%') {
            if pos > 0 {
                segments.push(Segment::Literal(&rest[..pos]));
            }
            let after = &rest[pos + 1..];
            if let Some(tail) = after.strip_prefix('%') {
                segments.push(Segment::Percent);
                rest = tail;
            } else if let Some(body) = after.strip_prefix('(') {
                let close = body
                    .find(')')
                    .ok_or_else(|| template_error(source, "unterminated placeholder"))?;
                let name = &body[..close];
                if name.is_empty() {
                    return Err(template_error(source, "empty placeholder name"));
                }
                rest = body[close + 1..]
                    .strip_prefix('s')
                    .ok_or_else(|| {
                        template_error(source, &format!("placeholder %({name}) must end in 's'"))
                    })?;
                segments.push(Segment::Field(name));
            } else {
                return Err(template_error(source, "dangling '%'"));
            }
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest));
        }

        Ok(Self { source, segments })
    }

    /// Returns the distinct placeholder names in order of first appearance.
    pub fn fields(&self) -> Vec<&'a str> {
        let mut names: Vec<&'a str> = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Field(name) if !names.contains(name) => names.push(*name),
                _ => {}
            }
        }
        names
    }

    /// Substitutes every placeholder with its value from `values`.
    ///
    /// # Errors
    ///
    /// Returns [`BuckoError::Template`] if the template names a field that
    /// `values` does not provide.
    pub fn render(&self, values: &BTreeMap<&str, String>) -> Result<String> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Percent => out.push('%'),
                Segment::Field(name) => {
                    let value = values.get(name).ok_or_else(|| {
                        template_error(self.source, &format!("unknown placeholder %({name})s"))
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// Parses and renders `template` in one step.
///
/// # Errors
///
/// Returns [`BuckoError::Template`] if the template is malformed or names a
/// field missing from `values`.
pub fn expand(template: &str, values: &BTreeMap<&str, String>) -> Result<String> {
    Template::parse(template)?.render(values)
}

fn template_error(template: &str, message: &str) -> BuckoError {
    BuckoError::Template {
        template: template.to_string(),
        message: message.to_string(),
    }
}
