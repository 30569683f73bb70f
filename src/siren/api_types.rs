//! Serde-deserializable types matching the Siren wire format.
//!
//! These types are separate from domain types to allow lenient
//! deserialization (absent or `null` collections become empty) while the
//! domain types stay immutable and focused on lookups.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::types::{Action, Entity, Field, Link, SubEntity};

/// Treat `null` the same as an absent member.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Links, actions and fields
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiLink {
  #[serde(default, deserialize_with = "nullable")]
  pub rel: Vec<String>,
  pub href: String,
  pub title: Option<String>,
  #[serde(default, deserialize_with = "nullable")]
  pub class: Vec<String>,
  #[serde(rename = "type")]
  pub media_type: Option<String>,
}

impl From<ApiLink> for Link {
  fn from(link: ApiLink) -> Self {
    Link {
      rel: link.rel,
      href: link.href,
      title: link.title,
      class: link.class,
      media_type: link.media_type,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiField {
  pub name: String,
  #[serde(rename = "type")]
  pub field_type: Option<String>,
  pub value: Option<Value>,
  pub title: Option<String>,
}

impl From<ApiField> for Field {
  fn from(field: ApiField) -> Self {
    Field {
      name: field.name,
      field_type: field
        .field_type
        .unwrap_or_else(|| Field::DEFAULT_TYPE.to_string()),
      value: field.value,
      title: field.title,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiAction {
  pub name: Option<String>,
  pub href: String,
  pub method: Option<String>,
  #[serde(rename = "type")]
  pub media_type: Option<String>,
  pub title: Option<String>,
  #[serde(default, deserialize_with = "nullable")]
  pub class: Vec<String>,
  #[serde(default, deserialize_with = "nullable")]
  pub fields: Vec<ApiField>,
}

impl From<ApiAction> for Action {
  fn from(action: ApiAction) -> Self {
    Action {
      name: action.name,
      href: action.href,
      method: action.method,
      media_type: action.media_type,
      title: action.title,
      class: action.class,
      fields: action.fields.into_iter().map(Field::from).collect(),
    }
  }
}

// ============================================================================
// Entities
// ============================================================================

/// Top-level entity document, also used for embedded representations.
///
/// Sub-entities are kept as raw JSON here: whether each one is an embedded
/// link or an embedded representation is decided during conversion.
#[derive(Debug, Deserialize)]
pub struct ApiEntity {
  #[serde(default, deserialize_with = "nullable")]
  pub class: Vec<String>,
  #[serde(default, deserialize_with = "nullable")]
  pub rel: Vec<String>,
  pub title: Option<String>,
  #[serde(default, deserialize_with = "nullable")]
  pub properties: Map<String, Value>,
  #[serde(default, deserialize_with = "nullable")]
  pub links: Vec<ApiLink>,
  #[serde(default, deserialize_with = "nullable")]
  pub actions: Vec<ApiAction>,
  #[serde(default, deserialize_with = "nullable")]
  pub entities: Vec<Value>,
}

impl ApiEntity {
  /// Convert into a domain entity, keeping `raw` as the source document.
  pub fn into_entity(self, raw: Value) -> serde_json::Result<Entity> {
    let entities = self
      .entities
      .into_iter()
      .map(parse_sub_entity)
      .collect::<serde_json::Result<Vec<_>>>()?;

    Ok(Entity::from_parts(
      self.class,
      self.title,
      self.properties,
      self.links.into_iter().map(Link::from).collect(),
      self.actions.into_iter().map(Action::from).collect(),
      entities,
      raw,
    ))
  }
}

/// A sub-entity carrying an `href` member is an embedded link; anything
/// else is an embedded representation.
fn parse_sub_entity(value: Value) -> serde_json::Result<SubEntity> {
  let obj = value
    .as_object()
    .ok_or_else(|| serde_json::Error::custom("sub-entity must be a JSON object"))?;

  if obj.contains_key("href") {
    let link: ApiLink = serde_json::from_value(value)?;
    return Ok(SubEntity::Link(link.into()));
  }

  let api: ApiEntity = serde_json::from_value(value.clone())?;
  let rel = api.rel.clone();
  let entity = api.into_entity(value)?;
  Ok(SubEntity::Embedded { rel, entity })
}
