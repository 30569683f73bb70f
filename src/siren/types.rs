use serde_json::{Map, Value};

use super::api_types::ApiEntity;
use crate::error::{StoreError, StoreResult};

/// Relation name marking an entity's canonical address.
pub const REL_SELF: &str = "self";

/// A navigational link
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
  pub rel: Vec<String>,
  pub href: String,
  pub title: Option<String>,
  pub class: Vec<String>,
  pub media_type: Option<String>,
}

impl Link {
  pub fn new(rel: &str, href: impl Into<String>) -> Self {
    Self {
      rel: vec![rel.to_string()],
      href: href.into(),
      title: None,
      class: Vec::new(),
      media_type: None,
    }
  }

  pub fn has_rel(&self, rel: &str) -> bool {
    self.rel.iter().any(|r| r == rel)
  }
}

/// An input parameter of an action
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
  pub name: String,
  pub field_type: String, // "hidden", "text", "number", ...
  pub value: Option<Value>,
  pub title: Option<String>,
}

impl Field {
  pub const DEFAULT_TYPE: &'static str = "text";

  pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
    Self {
      name: name.into(),
      field_type: Self::DEFAULT_TYPE.to_string(),
      value: Some(value.into()),
      title: None,
    }
  }
}

/// A declarative HTTP operation exposed by an entity
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
  pub name: Option<String>,
  pub href: String,
  /// HTTP method; GET when absent
  pub method: Option<String>,
  /// Content-type hint for the request body
  pub media_type: Option<String>,
  pub title: Option<String>,
  pub class: Vec<String>,
  pub fields: Vec<Field>,
}

impl Action {
  /// A plain read of `href`: implicit GET, no fields.
  pub fn get(href: impl Into<String>) -> Self {
    Self {
      name: None,
      href: href.into(),
      method: None,
      media_type: None,
      title: None,
      class: Vec::new(),
      fields: Vec::new(),
    }
  }

  pub fn with_method(mut self, method: impl Into<String>) -> Self {
    self.method = Some(method.into());
    self
  }

  pub fn with_type(mut self, media_type: impl Into<String>) -> Self {
    self.media_type = Some(media_type.into());
    self
  }

  /// Set the value of every field called `name`, appending a new text
  /// field if the action has none.
  pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
    let value = value.into();
    let mut found = false;
    for field in self.fields.iter_mut().filter(|f| f.name == name) {
      field.value = Some(value.clone());
      found = true;
    }
    if !found {
      self.fields.push(Field::new(name, value));
    }
    self
  }

  pub fn field(&self, name: &str) -> Option<&Field> {
    self.fields.iter().find(|f| f.name == name)
  }
}

/// A nested resource: either a reference or a full representation
#[derive(Debug, Clone, PartialEq)]
pub enum SubEntity {
  /// Embedded link: relations and an address, no body
  Link(Link),
  /// Embedded representation
  Embedded { rel: Vec<String>, entity: Entity },
}

impl SubEntity {
  pub fn rel(&self) -> &[String] {
    match self {
      SubEntity::Link(link) => &link.rel,
      SubEntity::Embedded { rel, .. } => rel,
    }
  }

  pub fn has_rel(&self, rel: &str) -> bool {
    self.rel().iter().any(|r| r == rel)
  }

  /// The embedded representation, if this is not a bare link.
  pub fn entity(&self) -> Option<&Entity> {
    match self {
      SubEntity::Embedded { entity, .. } => Some(entity),
      SubEntity::Link(_) => None,
    }
  }

  /// The sub-entity's address: the link href, or the embedded self link.
  pub fn href(&self) -> Option<&str> {
    match self {
      SubEntity::Link(link) => Some(&link.href),
      SubEntity::Embedded { entity, .. } => entity.self_href(),
    }
  }
}

/// A parsed Siren document.
///
/// Immutable once constructed; collections are exposed as slices.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
  class: Vec<String>,
  title: Option<String>,
  properties: Map<String, Value>,
  links: Vec<Link>,
  actions: Vec<Action>,
  entities: Vec<SubEntity>,
  raw: Value,
}

impl Entity {
  /// Parse a JSON document into an entity.
  pub fn from_json(raw: Value) -> StoreResult<Self> {
    if !raw.is_object() {
      return Err(StoreError::parse("expected a JSON object"));
    }
    let api: ApiEntity = serde_json::from_value(raw.clone()).map_err(StoreError::parse)?;
    api.into_entity(raw).map_err(StoreError::parse)
  }

  /// Parse an entity from response bytes.
  pub fn from_slice(bytes: &[u8]) -> StoreResult<Self> {
    let raw: Value = serde_json::from_slice(bytes).map_err(StoreError::parse)?;
    Self::from_json(raw)
  }

  pub(crate) fn from_parts(
    class: Vec<String>,
    title: Option<String>,
    properties: Map<String, Value>,
    links: Vec<Link>,
    actions: Vec<Action>,
    entities: Vec<SubEntity>,
    raw: Value,
  ) -> Self {
    Self {
      class,
      title,
      properties,
      links,
      actions,
      entities,
      raw,
    }
  }

  pub fn class(&self) -> &[String] {
    &self.class
  }

  pub fn has_class(&self, class: &str) -> bool {
    self.class.iter().any(|c| c == class)
  }

  pub fn title(&self) -> Option<&str> {
    self.title.as_deref()
  }

  pub fn properties(&self) -> &Map<String, Value> {
    &self.properties
  }

  pub fn property(&self, name: &str) -> Option<&Value> {
    self.properties.get(name)
  }

  pub fn links(&self) -> &[Link] {
    &self.links
  }

  pub fn actions(&self) -> &[Action] {
    &self.actions
  }

  pub fn entities(&self) -> &[SubEntity] {
    &self.entities
  }

  /// The original JSON document
  pub fn raw(&self) -> &Value {
    &self.raw
  }

  /// First link carrying `rel`
  pub fn link(&self, rel: &str) -> Option<&Link> {
    self.links.iter().find(|l| l.has_rel(rel))
  }

  pub fn self_href(&self) -> Option<&str> {
    self.link(REL_SELF).map(|l| l.href.as_str())
  }

  pub fn action(&self, name: &str) -> Option<&Action> {
    self
      .actions
      .iter()
      .find(|a| a.name.as_deref() == Some(name))
  }

  pub fn sub_entities<'a>(&'a self, rel: &'a str) -> impl Iterator<Item = &'a SubEntity> + 'a {
    self.entities.iter().filter(move |e| e.has_rel(rel))
  }

  /// Embedded representations that declare their own self link.
  pub fn embedded_with_self(&self) -> impl Iterator<Item = (&str, &Entity)> {
    self.entities.iter().filter_map(|sub| {
      let entity = sub.entity()?;
      Some((entity.self_href()?, entity))
    })
  }
}
