//! Compiled path patterns.
//!
//! A template such as `/users/{id}/posts/{post}` compiles to the anchored
//! expression `^/users/([^/]+)/posts/([^/]+)$`. Each `{name}` matches one or
//! more non-slash characters; everything else is matched literally.

use mochi_core::{PathParams, RegistrationError};
use regex::Regex;
use std::fmt;

const SEGMENT_EXPR: &str = "([^/]+)";

/// A path template compiled into an anchored matcher.
///
/// # Example
///
/// ```rust
/// use mochi_router::RoutePattern;
///
/// let pattern = RoutePattern::compile("/files/{name}.txt").unwrap();
/// let params = pattern.captures("/files/notes.txt").unwrap();
/// assert_eq!(params.get("name"), Some("notes"));
/// assert!(pattern.captures("/files/notesXtxt").is_none());
/// ```
#[derive(Clone)]
pub struct RoutePattern {
    template: String,
    regex: Regex,
    names: Vec<String>,
}

impl RoutePattern {
    /// Compiles a template.
    ///
    /// Segment names must be non-empty, made of ASCII letters, digits and
    /// underscores, and unique within the template.
    pub fn compile(template: &str) -> Result<Self, RegistrationError> {
        let invalid = |reason: String| RegistrationError::InvalidTemplate {
            template: template.to_string(),
            reason,
        };

        let mut expr = String::with_capacity(template.len() + 16);
        expr.push('^');
        let mut names: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    expr.push_str(&regex::escape(&literal));
                    literal.clear();

                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }

                    if !closed {
                        return Err(invalid("unclosed `{`".to_string()));
                    }
                    if name.is_empty() {
                        return Err(invalid("empty segment name".to_string()));
                    }
                    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                        return Err(invalid(format!("invalid segment name `{name}`")));
                    }
                    if names.contains(&name) {
                        return Err(RegistrationError::DuplicateSegment {
                            template: template.to_string(),
                            name,
                        });
                    }

                    names.push(name);
                    expr.push_str(SEGMENT_EXPR);
                }
                '}' => return Err(invalid("unmatched `}`".to_string())),
                other => literal.push(other),
            }
        }

        expr.push_str(&regex::escape(&literal));
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|source| RegistrationError::Pattern {
            template: template.to_string(),
            source,
        })?;

        Ok(Self {
            template: template.to_string(),
            regex,
            names,
        })
    }

    /// Returns the source template.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Returns the compiled expression.
    #[must_use]
    pub fn as_regex(&self) -> &str {
        self.regex.as_str()
    }

    /// Returns the segment names in template order.
    #[must_use]
    pub fn segment_names(&self) -> &[String] {
        &self.names
    }

    /// Returns `true` if the whole path matches.
    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Matches the whole path and returns the captured segments by name.
    #[must_use]
    pub fn captures(&self, path: &str) -> Option<PathParams> {
        let caps = self.regex.captures(path)?;
        let mut params = PathParams::with_capacity(self.names.len());
        for (index, name) in self.names.iter().enumerate() {
            if let Some(value) = caps.get(index + 1) {
                params.push(name.as_str(), value.as_str());
            }
        }
        Some(params)
    }
}

impl fmt::Debug for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutePattern")
            .field("template", &self.template)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}
