//! Translation of Siren actions into request descriptors.
//!
//! Everything here is pure: the output is handed to the HTTP client in
//! `client.rs`, which performs the actual I/O.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;

use super::types::Action;

pub const AUTHORIZATION: &str = "authorization";
pub const CONTENT_TYPE: &str = "content-type";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Characters left unescaped by JavaScript's `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
  .remove(b'-')
  .remove(b'_')
  .remove(b'.')
  .remove(b'!')
  .remove(b'~')
  .remove(b'*')
  .remove(b'\'')
  .remove(b'(')
  .remove(b')');

/// A fully specified outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
  /// Uppercased HTTP method
  pub method: String,
  pub url: String,
  /// Lowercase header names, in insertion order
  pub headers: Vec<(String, String)>,
  pub body: Option<String>,
}

impl RequestSpec {
  #[cfg(test)]
  fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

/// Ordered field name → value mapping; a repeated name keeps its first
/// position and takes the last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldData(Vec<(String, Value)>);

impl FieldData {
  pub fn from_action(action: &Action) -> Self {
    let mut data = FieldData::default();
    for field in &action.fields {
      data.insert(&field.name, field.value.clone().unwrap_or(Value::Null));
    }
    data
  }

  fn insert(&mut self, name: &str, value: Value) {
    match self.0.iter_mut().find(|(k, _)| k == name) {
      Some(entry) => entry.1 = value,
      None => self.0.push((name.to_string(), value)),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v))
  }

  /// `key=value` pairs joined by `&`, each side percent-encoded.
  pub fn urlencode(&self) -> String {
    self
      .iter()
      .map(|(k, v)| {
        format!(
          "{}={}",
          utf8_percent_encode(k, COMPONENT),
          utf8_percent_encode(&value_text(v), COMPONENT)
        )
      })
      .collect::<Vec<_>>()
      .join("&")
  }

  pub fn to_json(&self) -> Value {
    Value::Object(
      self
        .0
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect(),
    )
  }
}

/// Text form of a field value for query strings and form bodies.
fn value_text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    _ => value.to_string(),
  }
}

/// Build the request for `action`, authorized with `token` if present.
pub fn build_request(action: &Action, token: Option<&str>) -> RequestSpec {
  let method = action
    .method
    .as_deref()
    .map(str::trim)
    .filter(|m| !m.is_empty())
    .unwrap_or("GET")
    .to_uppercase();

  let mut headers = Vec::new();
  if let Some(token) = token {
    headers.push((AUTHORIZATION.to_string(), format!("Bearer {}", token)));
  }
  let media_type = action.media_type.as_deref().filter(|t| !t.is_empty());
  if let Some(media_type) = media_type {
    headers.push((CONTENT_TYPE.to_string(), media_type.to_string()));
  }

  let data = FieldData::from_action(action);
  let mut url = action.href.clone();
  let mut body = None;

  if !data.is_empty() {
    if method == "GET" || method == "HEAD" {
      let separator = if url.contains('?') { '&' } else { '?' };
      url = format!("{}{}{}", url, separator, data.urlencode());
    } else if media_type.is_some_and(|t| t.contains("json")) {
      body = Some(data.to_json().to_string());
    } else {
      if media_type.is_none() {
        headers.push((CONTENT_TYPE.to_string(), FORM_URLENCODED.to_string()));
      }
      body = Some(data.urlencode());
    }
  }

  RequestSpec {
    method,
    url,
    headers,
    body,
  }
}
