//! Schedule entity, its field table and validation rules.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use cadence_core::ScheduleId;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// A cron- or timestamp-triggered REST callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[serde(default)]
    pub id: ScheduleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj_id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub obj_type: Option<String>,
    pub schedule: Trigger,
    pub rest: Rest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_timestamp: Option<serde_json::Number>,
}

impl Schedule {
    /// Build from an already validated payload, applying defaults
    /// (generated `id`, `rest.method = GET`, empty `rest.headers`).
    pub fn from_payload(payload: &Map<String, Value>) -> serde_json::Result<Self> {
        serde_json::from_value(Value::Object(payload.clone()))
    }
}

/// When a schedule fires: a cron expression or a Unix timestamp in
/// milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Trigger {
    Cron(String),
    Timestamp(i64),
}

/// Callback fired when the schedule triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rest {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

// ---------------------------------------------------------------------------
// Field table
// ---------------------------------------------------------------------------

/// Accepted JSON shape of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Non-empty string.
    Identifier,
    String,
    Number,
    Boolean,
    Object,
    /// Checked by [`validate_schedule`], not by the generic pass.
    Schedule,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::Identifier => "identifier",
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Schedule => "schedule",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldType,
    pub optional: bool,
    /// Nested fields of an `Object`. Empty means any object.
    pub items: Vec<FieldSpec>,
}

impl FieldSpec {
    fn new(name: &'static str, kind: FieldType) -> Self {
        Self {
            name,
            kind,
            optional: false,
            items: Vec::new(),
        }
    }

    fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    fn items(mut self, items: Vec<FieldSpec>) -> Self {
        self.items = items;
        self
    }
}

/// Ordered set of field rules. Validation reports the first failing field
/// in this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTable {
    fields: Vec<FieldSpec>,
}

impl FieldTable {
    /// Every Schedule field, with its required/optional flag.
    pub fn keys() -> Self {
        Self {
            fields: vec![
                FieldSpec::new("id", FieldType::Identifier),
                FieldSpec::new("objId", FieldType::String).optional(),
                FieldSpec::new("type", FieldType::String).optional(),
                FieldSpec::new("schedule", FieldType::Schedule),
                FieldSpec::new("rest", FieldType::Object).items(vec![
                    FieldSpec::new("url", FieldType::String),
                    FieldSpec::new("method", FieldType::String).optional(),
                    FieldSpec::new("headers", FieldType::Object).optional(),
                    FieldSpec::new("body", FieldType::Object).optional(),
                ]),
                FieldSpec::new("enabled", FieldType::Boolean).optional(),
                FieldSpec::new("scheduledBy", FieldType::String).optional(),
                FieldSpec::new("scheduledTimestamp", FieldType::Number).optional(),
            ],
        }
    }

    /// [`keys`](Self::keys) with every top-level field optional, for
    /// handlers that accept partial input.
    pub fn query_keys() -> Self {
        let mut table = Self::keys();
        for field in &mut table.fields {
            field.optional = true;
        }
        table
    }

    /// Keep only the named fields, in table order.
    pub fn only(mut self, names: &[&str]) -> Self {
        self.fields.retain(|f| names.contains(&f.name));
        self
    }

    pub fn require(self, names: &[&str]) -> Self {
        self.set_optional(names, false)
    }

    pub fn relax(self, names: &[&str]) -> Self {
        self.set_optional(names, true)
    }

    /// Append an extra optional field.
    pub fn with_optional(mut self, name: &'static str, kind: FieldType) -> Self {
        self.fields.push(FieldSpec::new(name, kind).optional());
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn set_optional(mut self, names: &[&str], optional: bool) -> Self {
        for field in &mut self.fields {
            if names.contains(&field.name) {
                field.optional = optional;
            }
        }
        self
    }
}

/// Per-field result of a successful [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    fields: Vec<(&'static str, bool)>,
}

impl ValidationReport {
    /// Whether `name` was supplied (non-null) in the candidate.
    pub fn is_present(&self, name: &str) -> bool {
        self.fields.iter().any(|(f, present)| *f == name && *present)
    }

    /// Supplied fields, in table order.
    pub fn present(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|(_, present)| *present)
            .map(|(f, _)| *f)
    }
}

/// Structural validation of `candidate` against `table`.
///
/// `null` counts as absent. Fields outside the table are ignored.
pub fn validate(candidate: &Value, table: &FieldTable) -> Result<ValidationReport, ValidationError> {
    let object = candidate
        .as_object()
        .ok_or(ValidationError::MissingPayload)?;

    let mut fields = Vec::with_capacity(table.fields.len());
    for spec in &table.fields {
        match object.get(spec.name).filter(|v| !v.is_null()) {
            None if spec.optional => fields.push((spec.name, false)),
            None => return Err(ValidationError::field(spec.name, "missing required value")),
            Some(value) => {
                check(spec, value).map_err(|cause| ValidationError::field(spec.name, cause))?;
                fields.push((spec.name, true));
            }
        }
    }
    Ok(ValidationReport { fields })
}

fn check(spec: &FieldSpec, value: &Value) -> Result<(), String> {
    let ok = match spec.kind {
        FieldType::Identifier => value.as_str().is_some_and(|s| !s.is_empty()),
        FieldType::String => value.is_string(),
        FieldType::Number => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::Object => value.is_object(),
        FieldType::Schedule => true,
    };
    if !ok {
        return Err(format!(
            "invalid type for value {value}, expected \"{}\"",
            spec.kind
        ));
    }

    if let Some(object) = value.as_object() {
        for item in &spec.items {
            match object.get(item.name).filter(|v| !v.is_null()) {
                None if item.optional => {}
                None => return Err(format!("'{}': missing required value", item.name)),
                Some(v) => check(item, v).map_err(|cause| format!("'{}': {cause}", item.name))?,
            }
        }
    }
    Ok(())
}

/// Validate a `schedule` value: a cron expression (5 fields, or 6 with a
/// leading seconds field) or a strictly future timestamp in milliseconds.
pub fn validate_schedule(value: &Value) -> Result<Trigger, ValidationError> {
    match value {
        Value::String(expression) => {
            parse_cron(expression)
                .ok_or_else(|| ValidationError::field("schedule", "bad cron format"))?;
            Ok(Trigger::Cron(expression.clone()))
        }
        Value::Number(n) => {
            let Some(at) = n.as_i64() else {
                return Err(ValidationError::field(
                    "schedule",
                    "timestamp must be whole milliseconds",
                ));
            };
            if at <= Utc::now().timestamp_millis() {
                return Err(ValidationError::field("schedule", "timestamp already passed"));
            }
            Ok(Trigger::Timestamp(at))
        }
        _ => Err(ValidationError::field(
            "schedule",
            "schedule must be string or number",
        )),
    }
}

/// Parse a crontab expression. Five fields get a leading `0` seconds field.
/// Day-of-week follows crontab numbering (0-7, Sunday as 0 or 7).
fn parse_cron(expression: &str) -> Option<cron::Schedule> {
    let mut fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() == 5 {
        fields.insert(0, "0");
    }
    if fields.len() != 6 {
        return None;
    }
    let weekdays = crontab_weekdays(fields[5])?;
    let normalized = format!("{} {weekdays}", fields[..5].join(" "));
    cron::Schedule::from_str(&normalized).ok()
}

/// Rewrite a numeric crontab day-of-week field into the `cron` crate's
/// numbering (1-7, Sunday as 1) as an explicit list. Day names pass through.
fn crontab_weekdays(field: &str) -> Option<String> {
    if field.chars().any(|c| c.is_ascii_alphabetic() || c == '?') {
        return Some(field.to_string());
    }

    let mut days = BTreeSet::new();
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, step.parse::<usize>().ok().filter(|&s| s > 0)?),
            None => (item, 1),
        };
        let (first, last) = match range.split_once('-') {
            _ if range == "*" => (0, 6),
            Some((first, last)) => (weekday(first)?, weekday(last)?),
            // `n/step` runs from n to the end of the week
            None if item.contains('/') => (weekday(range)?, 7),
            None => {
                let day = weekday(range)?;
                (day, day)
            }
        };
        if first > last {
            return None;
        }
        days.extend((first..=last).step_by(step).map(|day| day % 7 + 1));
    }

    let days: Vec<String> = days.into_iter().map(|day| day.to_string()).collect();
    Some(days.join(","))
}

fn weekday(value: &str) -> Option<u8> {
    value.parse::<u8>().ok().filter(|&day| day <= 7)
}
