//! Response interpretation.
//!
//! A GraphQL server reports two very different kinds of error in the same
//! top-level `errors` list:
//!
//! - *attributed* errors, `{"query": "getFoo", "error": {...}}`, which belong to
//!   one field of an otherwise successful response and are folded back into
//!   `data.getFoo.error`;
//! - everything else, which fails the whole response with a classified
//!   [`DispatchError`].
//!
//! Attribution is all-or-nothing: one unattributed entry in a list of several
//! fails the response with [`DispatchError::Multi`], even if the other entries
//! could be attributed.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::SourceLocation;
use crate::{DispatchError, Result};

/// Message prefix the server uses for document parse failures.
pub const SYNTAX_ERROR_PREFIX: &str = "Syntax Error GraphQL";

/// Message used when an unattributed error carries no message of its own.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown GraphQL error";

static LOCATION_RE: OnceLock<Regex> = OnceLock::new();

fn location_re() -> &'static Regex {
    LOCATION_RE.get_or_init(|| Regex::new(r"\((\d+):(\d+)\)").unwrap())
}

/// Interpret one decoded response object.
///
/// Returns the object (with attributed errors attached under `data`) or the
/// classified failure.
pub fn interpret(mut response: Value) -> Result<Value> {
    let errors = match response.get("errors") {
        Some(Value::Array(errors)) if !errors.is_empty() => errors,
        _ => return Ok(response),
    };

    let attributed: Option<Vec<(String, Value)>> = errors
        .iter()
        .map(|entry| attribution(entry).map(|(query, error)| (query.to_string(), error.clone())))
        .collect();

    if let Some(attributed) = attributed {
        for (query, error) in attributed {
            attach(&mut response, &query, error);
        }
        return Ok(response);
    }

    if let [only] = errors.as_slice() {
        return Err(classify(only));
    }

    Err(DispatchError::Multi(errors.clone()))
}

/// Interpret a response body that may be a single object or an array of
/// objects. The first failing element fails the whole body.
pub fn interpret_body(body: Value) -> Result<Value> {
    match body {
        Value::Array(items) => items
            .into_iter()
            .map(interpret)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        other => interpret(other),
    }
}

/// Interpret the body returned for a batched request: one element per
/// submitted request, in submission order.
pub fn interpret_batch(body: Value) -> Result<Vec<Value>> {
    match interpret_body(body)? {
        Value::Array(items) => Ok(items),
        _ => Err(DispatchError::Protocol {
            message: "batched request returned a non-array response".into(),
        }),
    }
}

/// `(query, error)` if the entry names the field it belongs to.
fn attribution(entry: &Value) -> Option<(&str, &Value)> {
    let query = entry
        .get("query")
        .and_then(Value::as_str)
        .filter(|q| !q.is_empty())?;
    let error = entry.get("error").filter(|e| is_present(e))?;
    Some((query, error))
}

/// `null`, `false`, `0` and `""` do not count as an error payload.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Place `error` at `data.<query>.error`. Dotted query names nest.
fn attach(response: &mut Value, query: &str, error: Value) {
    let mut node = response;
    for segment in std::iter::once("data").chain(query.split('.')) {
        node = object_mut(node)
            .entry(segment.to_string())
            .or_insert(Value::Null);
    }
    object_mut(node).insert("error".to_string(), error);
}

/// Borrow `value` as an object, replacing it with an empty one first if it
/// is anything else.
fn object_mut(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

fn classify(entry: &Value) -> DispatchError {
    let message = entry
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or(UNKNOWN_ERROR_MESSAGE);

    if message.starts_with(SYNTAX_ERROR_PREFIX) {
        DispatchError::Syntax {
            locations: locations(entry, message),
        }
    } else {
        DispatchError::Protocol {
            message: message.to_string(),
        }
    }
}

/// Locations from the entry's `locations` list, falling back to the
/// `(line:column)` positions embedded in the message.
fn locations(entry: &Value, message: &str) -> Vec<SourceLocation> {
    if let Some(listed) = entry
        .get("locations")
        .and_then(|l| serde_json::from_value::<Vec<SourceLocation>>(l.clone()).ok())
    {
        return listed;
    }
    location_re()
        .captures_iter(message)
        .filter_map(|c| {
            Some(SourceLocation {
                line: c[1].parse().ok()?,
                column: c[2].parse().ok()?,
            })
        })
        .collect()
}
