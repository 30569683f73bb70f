use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Method;
use tracing::{debug, warn};
use url::Url;

use super::request::RequestSpec;
use super::types::Entity;
use crate::config::EndpointConfig;
use crate::error::{StoreError, StoreResult};

const USER_AGENT_VALUE: &str = concat!("siren-cache/", env!("CARGO_PKG_VERSION"));

/// HTTP transport for Siren requests
#[derive(Debug, Clone)]
pub struct SirenClient {
  client: reqwest::Client,
  /// Relative hrefs are resolved against this
  base_url: Option<Url>,
}

impl SirenClient {
  pub fn new(config: &EndpointConfig) -> StoreResult<Self> {
    let base_url = config
      .base_url
      .as_deref()
      .map(Url::parse)
      .transpose()
      .map_err(|e| StoreError::invalid_request(format!("invalid base url: {}", e)))?;

    let mut default_headers = HeaderMap::new();
    default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    default_headers.insert(
      ACCEPT,
      HeaderValue::from_str(&config.accept)
        .map_err(|e| StoreError::invalid_request(format!("invalid accept header: {}", e)))?,
    );

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .default_headers(default_headers)
      .build()
      .map_err(|e| StoreError::transport(format!("failed to create HTTP client: {}", e)))?;

    Ok(Self { client, base_url })
  }

  /// Resolve `href` to an absolute URL.
  pub fn resolve(&self, href: &str) -> StoreResult<Url> {
    match Url::parse(href) {
      Ok(url) => Ok(url),
      Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
        Some(base) => base.join(href).map_err(StoreError::invalid_request),
        None => Err(StoreError::invalid_request(format!(
          "relative href {} with no base url configured",
          href
        ))),
      },
      Err(e) => Err(StoreError::invalid_request(e)),
    }
  }

  /// Issue the request and parse the response body into an entity.
  ///
  /// The body of a non-success response is never read.
  pub async fn execute(&self, spec: &RequestSpec) -> StoreResult<Entity> {
    let method = Method::from_bytes(spec.method.as_bytes()).map_err(StoreError::invalid_request)?;
    let url = self.resolve(&spec.url)?;

    let mut headers = HeaderMap::new();
    for (name, value) in &spec.headers {
      let name = HeaderName::from_bytes(name.as_bytes()).map_err(StoreError::invalid_request)?;
      let value = HeaderValue::from_str(value).map_err(StoreError::invalid_request)?;
      headers.insert(name, value);
    }

    debug!(method = %method, url = %url, "sending request");

    let mut request = self.client.request(method, url.clone()).headers(headers);
    if let Some(body) = &spec.body {
      request = request.body(body.clone());
    }

    let response = request.send().await.map_err(|e| {
      warn!(url = %url, error = %e, "request failed");
      StoreError::transport(e)
    })?;

    let status = response.status();
    if !status.is_success() {
      warn!(url = %url, status = status.as_u16(), "non-success status");
      return Err(StoreError::HttpStatus {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
      });
    }

    let bytes = response.bytes().await.map_err(StoreError::transport)?;
    Entity::from_slice(&bytes).map_err(|e| {
      warn!(url = %url, error = %e, "unparseable response body");
      e
    })
  }
}
