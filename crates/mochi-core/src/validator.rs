//! Rule-based validation of request data.
//!
//! Rules are attached to field names. Every rule of every field is checked
//! and all failures are collected; validation never stops at the first error.
//!
//! # Example
//!
//! ```rust
//! use mochi_core::validator::{DataType, Rule, Rules, Validator};
//! use serde_json::json;
//!
//! let rules = Rules::new()
//!     .field("name", [Rule::Required, Rule::min(3)])
//!     .field("age", [Rule::DataType(DataType::Integer), Rule::Between(18, 99)])
//!     .message("name", "required", "Tell us your name.");
//!
//! let mut validator = Validator::new();
//! assert!(!validator.validate(&json!({"age": 12}), &rules));
//! assert_eq!(
//!     validator.errors(),
//!     vec!["Tell us your name.", "The age must be at least 18."]
//! );
//! ```

use crate::error::{FieldErrors, MochiError};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Date format used by [`Rule::date`].
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Suffix marking a custom-message block in a declarative rule document.
const MESSAGES_SUFFIX: &str = ".messages";

static ABSENT: Value = Value::Null;

/// Error in a declarative rule document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    /// The document (or a field entry) is not a JSON object.
    #[error("rules for `{0}` must be an object")]
    NotAnObject(String),

    /// `dataType` names an unknown type.
    #[error("unknown data type: {0}")]
    UnknownDataType(String),

    /// A rule argument has the wrong shape.
    #[error("invalid argument for rule `{rule}` on `{field}`: {reason}")]
    InvalidArgument {
        /// Field the rule belongs to.
        field: String,
        /// Rule name.
        rule: String,
        /// What is wrong.
        reason: String,
    },
}

/// JSON types checked by [`Rule::DataType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Integral number.
    Integer,
    /// Non-integral number.
    Float,
    /// String.
    String,
    /// Boolean.
    Boolean,
    /// Array.
    Array,
    /// Object.
    Object,
    /// Null or absent.
    Null,
}

impl DataType {
    /// Returns `true` if `value` is of this type.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_f64(),
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Null => value.is_null(),
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Null => "null",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integer" => Ok(Self::Integer),
            "float" => Ok(Self::Float),
            "string" => Ok(Self::String),
            "boolean" => Ok(Self::Boolean),
            "array" => Ok(Self::Array),
            "object" => Ok(Self::Object),
            "null" => Ok(Self::Null),
            other => Err(RuleError::UnknownDataType(other.to_string())),
        }
    }
}

/// A single validation rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Value must not be empty (`null`, `false`, `0`, `""`, `"0"`, `[]`, `{}`).
    Required,
    /// Numeric values must be at least this; strings at least this many characters.
    Min(f64),
    /// Numeric values must be at most this; strings at most this many characters.
    Max(f64),
    /// Inclusive integral range; strings are measured in characters.
    Between(i64, i64),
    /// Value must be an email address.
    Email,
    /// Value must be an absolute URL with a host.
    Url,
    /// Value must be of the given JSON type.
    DataType(DataType),
    /// Value must be a date in the given `chrono` format.
    ///
    /// Rule documents may write the format with letter tokens such as
    /// `Y-m-d`; they are converted when the document is read.
    Date(String),
}

impl Rule {
    /// Shorthand for [`Rule::Min`].
    pub fn min(min: impl Into<f64>) -> Self {
        Self::Min(min.into())
    }

    /// Shorthand for [`Rule::Max`].
    pub fn max(max: impl Into<f64>) -> Self {
        Self::Max(max.into())
    }

    /// A date rule using [`DEFAULT_DATE_FORMAT`].
    #[must_use]
    pub fn date() -> Self {
        Self::Date(DEFAULT_DATE_FORMAT.to_string())
    }

    /// Returns the rule name used for custom messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::Between(..) => "between",
            Self::Email => "email",
            Self::Url => "url",
            Self::DataType(_) => "dataType",
            Self::Date(_) => "date",
        }
    }

    fn from_entry(field: &str, name: &str, argument: &Value) -> Result<Option<Self>, RuleError> {
        let invalid = |reason: &str| RuleError::InvalidArgument {
            field: field.to_string(),
            rule: name.to_string(),
            reason: reason.to_string(),
        };

        let rule = match name {
            "required" | "email" | "url" => {
                if argument == &Value::Bool(false) {
                    return Ok(None);
                }
                match name {
                    "required" => Self::Required,
                    "email" => Self::Email,
                    _ => Self::Url,
                }
            }
            "min" | "max" => {
                let bound = numeric(argument).ok_or_else(|| invalid("expected a number"))?;
                if name == "min" {
                    Self::Min(bound)
                } else {
                    Self::Max(bound)
                }
            }
            "between" => {
                let spec = argument
                    .as_str()
                    .ok_or_else(|| invalid("expected \"min|max\""))?;
                let (min, max) = spec
                    .split_once('|')
                    .ok_or_else(|| invalid("expected \"min|max\""))?;
                let parse = |s: &str| {
                    s.trim()
                        .parse::<i64>()
                        .map_err(|_| invalid("bounds must be integers"))
                };
                Self::Between(parse(min)?, parse(max)?)
            }
            "dataType" => {
                let name = argument
                    .as_str()
                    .ok_or_else(|| invalid("expected a type name"))?;
                Self::DataType(name.parse()?)
            }
            "date" => match argument {
                Value::String(format) => Self::Date(date_format(format).map_err(|c| {
                    invalid(&format!("unsupported date format character `{c}`"))
                })?),
                _ => Self::date(),
            },
            other => {
                tracing::warn!(field, rule = other, "ignoring unknown validation rule");
                return Ok(None);
            }
        };

        Ok(Some(rule))
    }
}

#[derive(Debug, Clone, Default)]
struct FieldRules {
    rules: Vec<Rule>,
    messages: HashMap<String, String>,
}

/// Rules for a set of fields, checked in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Rules {
    fields: IndexMap<String, FieldRules>,
}

impl Rules {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends rules for a field.
    pub fn field(mut self, name: impl Into<String>, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.fields
            .entry(name.into())
            .or_default()
            .rules
            .extend(rules);
        self
    }

    /// Overrides the message of one rule on one field.
    pub fn message(
        mut self,
        field: impl Into<String>,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.fields
            .entry(field.into())
            .or_default()
            .messages
            .insert(rule.into(), message.into());
        self
    }

    /// Builds rules from a declarative document.
    ///
    /// Each key maps a field to an object of `rule: argument` pairs; a key
    /// `field.messages` maps rule names to custom messages:
    ///
    /// ```json
    /// {
    ///   "age": {"required": true, "dataType": "integer", "between": "18|99"},
    ///   "age.messages": {"between": "Age is out of range."}
    /// }
    /// ```
    ///
    /// Unknown rule names are skipped.
    pub fn from_value(document: &Value) -> Result<Self, RuleError> {
        let entries = document
            .as_object()
            .ok_or_else(|| RuleError::NotAnObject("<root>".to_string()))?;

        let mut rules = Self::new();
        for (key, entry) in entries {
            let object = entry
                .as_object()
                .ok_or_else(|| RuleError::NotAnObject(key.clone()))?;

            if let Some(field) = key.strip_suffix(MESSAGES_SUFFIX) {
                for (rule, message) in object {
                    if let Some(message) = message.as_str() {
                        rules = rules.message(field, rule.as_str(), message);
                    }
                }
                continue;
            }

            let mut parsed = Vec::with_capacity(object.len());
            for (name, argument) in object {
                if let Some(rule) = Rule::from_entry(key, name, argument)? {
                    parsed.push(rule);
                }
            }
            rules = rules.field(key.as_str(), parsed);
        }
        Ok(rules)
    }

    /// Returns the number of fields with rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.values().filter(|f| !f.rules.is_empty()).count()
    }

    /// Returns `true` if no field has rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collects validation errors across one or more [`Validator::validate`] calls.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    /// Creates a validator with no errors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `data` against `rules`; returns `true` if no errors have been recorded.
    pub fn validate(&mut self, data: &Value, rules: &Rules) -> bool {
        for (field, field_rules) in &rules.fields {
            let value = data.get(field).unwrap_or(&ABSENT);
            for rule in &field_rules.rules {
                let custom = field_rules.messages.get(rule.name()).map(String::as_str);
                self.check(field, value, rule, custom);
            }
        }
        self.errors.is_empty()
    }

    /// Validates raw input, read as JSON or else as a url-encoded form.
    ///
    /// Returns the flat list of error messages.
    pub fn validate_input(input: &str, rules: &Rules) -> Vec<String> {
        let data = serde_json::from_str::<Value>(input).unwrap_or_else(|_| {
            let pairs: Vec<(String, String)> =
                serde_urlencoded::from_str(input).unwrap_or_default();
            Value::Object(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect::<Map<_, _>>(),
            )
        });

        let mut validator = Self::new();
        validator.validate(&data, rules);
        validator.errors()
    }

    /// Returns every error message, field by field.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.errors.messages()
    }

    /// Returns errors grouped by field.
    #[must_use]
    pub fn field_errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// Returns `true` if any rule failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Converts the collected errors into a validation [`MochiError`].
    #[must_use]
    pub fn into_error(self) -> MochiError {
        MochiError::validation_with_fields("The given data was invalid.", self.errors)
    }

    fn check(&mut self, field: &str, value: &Value, rule: &Rule, custom: Option<&str>) {
        let mut fail = |default: String| {
            let message = custom.map_or(default, ToString::to_string);
            self.errors.add(field, message);
        };

        match rule {
            Rule::Required => {
                if is_empty(value) {
                    fail(format!("The {field} must be filled."));
                }
            }
            Rule::Min(min) => {
                if let Some(number) = numeric(value) {
                    if number < *min {
                        fail(format!("The {field} must be at least {min}."));
                    }
                } else if let Some(text) = value.as_str() {
                    if (text.chars().count() as f64) < *min {
                        fail(format!("The {field} must be at least {min} characters."));
                    }
                }
            }
            Rule::Max(max) => {
                if let Some(number) = numeric(value) {
                    if number > *max {
                        fail(format!("The {field} must be no more than {max}."));
                    }
                } else if let Some(text) = value.as_str() {
                    if text.chars().count() as f64 > *max {
                        fail(format!("The {field} must be no more than {max} characters."));
                    }
                }
            }
            Rule::Between(min, max) => {
                if let Some(number) = numeric(value) {
                    #[allow(clippy::cast_possible_truncation)]
                    let number = number.trunc() as i64;
                    if number < *min {
                        fail(format!("The {field} must be at least {min}."));
                    }
                    if number > *max {
                        fail(format!("The {field} must be no more than {max}."));
                    }
                } else if let Some(text) = value.as_str() {
                    let length = i64::try_from(text.chars().count()).unwrap_or(i64::MAX);
                    if length < *min {
                        fail(format!("The {field} must be at least {min} characters."));
                    }
                    if length > *max {
                        fail(format!("The {field} must be no more than {max} characters."));
                    }
                }
            }
            Rule::Email => {
                if !value.as_str().is_some_and(is_email) {
                    fail(format!("The {field} must be a valid email address."));
                }
            }
            Rule::Url => {
                if !value.as_str().is_some_and(is_url) {
                    fail(format!("The {field} must be a valid URL."));
                }
            }
            Rule::DataType(data_type) => {
                if !data_type.matches(value) {
                    fail(format!("The {field} must be of type {data_type}."));
                }
            }
            Rule::Date(format) => {
                if !value.as_str().is_some_and(|text| is_date(text, format)) {
                    fail(format!(
                        "The {field} must be a valid date in the format {format}."
                    ));
                }
            }
        }
    }
}

/// Numbers and numeric strings, as a float.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text
            .trim_start()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite()),
        _ => None,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty() || text == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

fn is_email(text: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| {
            Regex::new(
                r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
            )
            .expect("valid regex")
        })
        .is_match(text)
}

fn is_url(text: &str) -> bool {
    url::Url::parse(text).is_ok_and(|url| url.has_host())
}

/// Converts a rule-document date format into a `chrono` format.
///
/// Documents use single-letter tokens (`Y-m-d H:i:s`); a backslash makes the
/// next character literal. A format already containing `%` is taken as a
/// `chrono` format unchanged. Unknown letters are returned as the error.
fn date_format(format: &str) -> Result<String, char> {
    if format.contains('%') {
        return Ok(format.to_string());
    }

    let mut converted = String::with_capacity(format.len() * 2);
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        let token = match c {
            '\\' => {
                if let Some(literal) = chars.next() {
                    converted.push(literal);
                }
                continue;
            }
            'd' => "%d",
            'j' => "%-d",
            'D' => "%a",
            'l' => "%A",
            'N' => "%u",
            'z' => "%j",
            'm' => "%m",
            'n' => "%-m",
            'M' => "%b",
            'F' => "%B",
            'Y' => "%Y",
            'y' => "%y",
            'H' => "%H",
            'G' => "%-H",
            'h' => "%I",
            'g' => "%-I",
            'i' => "%M",
            's' => "%S",
            'v' => "%3f",
            'u' => "%6f",
            'A' => "%p",
            'a' => "%P",
            'O' => "%z",
            'P' => "%:z",
            'U' => "%s",
            c if c.is_ascii_alphabetic() => return Err(c),
            c => {
                converted.push(c);
                continue;
            }
        };
        converted.push_str(token);
    }
    Ok(converted)
}

fn is_date(text: &str, format: &str) -> bool {
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    let round_trips = |formatted: String| formatted == text;

    if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
        return round_trips(parsed.format(format).to_string());
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(text, format) {
        return round_trips(parsed.format(format).to_string());
    }
    if let Ok(parsed) = NaiveTime::parse_from_str(text, format) {
        return round_trips(parsed.format(format).to_string());
    }
    false
}
