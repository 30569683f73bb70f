//! Entity store that orchestrates caching, request execution and events.

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use super::namespace::{CachedEntity, Namespace, NamespaceKey};
use super::result::CacheResult;
use crate::config::{CacheConfig, Config};
use crate::error::StoreResult;
use crate::event::{EventNotifier, EventReceiver, StoreEvent};
use crate::siren::{build_request, Action, Entity, SirenClient};

type FetchFuture = BoxFuture<'static, StoreResult<Arc<Entity>>>;

/// Options recognized by `get` and `submit_action`.
#[derive(Debug, Clone)]
pub struct FetchOptions {
  /// Bearer credential; `None` is anonymous
  pub token: Option<String>,
  /// Read from and write to the credential's namespace
  pub use_cache: bool,
}

impl Default for FetchOptions {
  fn default() -> Self {
    Self {
      token: None,
      use_cache: true,
    }
  }
}

impl FetchOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_token(mut self, token: impl Into<String>) -> Self {
    self.token = Some(token.into());
    self
  }

  pub fn no_cache(mut self) -> Self {
    self.use_cache = false;
    self
  }
}

/// A read that concurrent callers for the same address can join.
struct Flight {
  id: u64,
  fetch: WeakShared<FetchFuture>,
}

#[derive(Default)]
struct StoreState {
  namespaces: HashMap<NamespaceKey, Namespace>,
  inflight: usize,
  flights: HashMap<(NamespaceKey, String), Flight>,
  next_flight: u64,
}

struct Inner {
  client: SirenClient,
  coalesce_reads: bool,
  state: Mutex<StoreState>,
  notifier: EventNotifier,
}

impl Inner {
  fn state(&self) -> MutexGuard<'_, StoreState> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Count a request as in flight until the returned guard drops.
  fn begin_request(&self) -> InflightGuard<'_> {
    let mut state = self.state();
    state.inflight += 1;
    // Emitted under the lock so subscribers see counts in order
    self.notifier.emit(StoreEvent::Inflight {
      count: state.inflight,
    });
    InflightGuard { inner: self }
  }
}

/// Decrements the inflight counter on drop, including when the request
/// future is dropped before completing.
struct InflightGuard<'a> {
  inner: &'a Inner,
}

impl Drop for InflightGuard<'_> {
  fn drop(&mut self) {
    let mut state = self.inner.state();
    state.inflight = state.inflight.saturating_sub(1);
    self.inner.notifier.emit(StoreEvent::Inflight {
      count: state.inflight,
    });
  }
}

/// Removes a finished (or abandoned) flight from the coalescing table.
struct FlightLanding {
  inner: Arc<Inner>,
  key: (NamespaceKey, String),
  id: u64,
}

impl Drop for FlightLanding {
  fn drop(&mut self) {
    let mut state = self.inner.state();
    if state.flights.get(&self.key).map(|f| f.id) == Some(self.id) {
      state.flights.remove(&self.key);
    }
  }
}

/// Client-side cache of Siren entities, partitioned by credential.
///
/// Cheap to clone; clones share namespaces, the inflight counter and
/// subscribers.
#[derive(Clone)]
pub struct EntityStore {
  inner: Arc<Inner>,
}

impl EntityStore {
  /// Create a store using the endpoint and cache settings from `config`.
  pub fn new(config: &Config) -> StoreResult<Self> {
    let client = SirenClient::new(&config.endpoint)?;
    Ok(Self::with_client(client, &config.cache))
  }

  pub fn with_client(client: SirenClient, cache: &CacheConfig) -> Self {
    Self {
      inner: Arc::new(Inner {
        client,
        coalesce_reads: cache.coalesce_reads,
        state: Mutex::new(StoreState::default()),
        notifier: EventNotifier::new(),
      }),
    }
  }

  /// Subscribe to inflight, update and error events.
  pub fn subscribe(&self) -> EventReceiver {
    self.inner.notifier.subscribe()
  }

  /// Number of requests currently in flight.
  pub fn inflight(&self) -> usize {
    self.inner.state().inflight
  }

  /// Snapshot of the namespace for `token`, creating it if absent.
  pub fn get_cache(&self, token: Option<&str>) -> Namespace {
    let key = NamespaceKey::for_token(token);
    self
      .inner
      .state()
      .namespaces
      .entry(key)
      .or_default()
      .clone()
  }

  /// Drop the whole namespace for `token`.
  ///
  /// Returns whether a namespace existed. Emits no events.
  pub fn clear(&self, token: Option<&str>) -> bool {
    let key = NamespaceKey::for_token(token);
    let removed = self.inner.state().namespaces.remove(&key).is_some();
    debug!(namespace = %key, removed, "cleared namespace");
    removed
  }

  /// Remove the single entry at `href`.
  ///
  /// An entity cached under both a requested href and its self href keeps
  /// its other entry.
  pub fn evict(&self, href: &str, token: Option<&str>) -> bool {
    let key = NamespaceKey::for_token(token);
    self
      .inner
      .state()
      .namespaces
      .get_mut(&key)
      .and_then(|ns| ns.remove(href))
      .is_some()
  }

  /// Submit an action, returning the resulting entity.
  ///
  /// Failures are reported through an `Error` event and a `None` result.
  pub async fn submit_action(&self, action: &Action, options: &FetchOptions) -> Option<Arc<Entity>> {
    self
      .try_submit_action(action, options)
      .await
      .ok()
      .map(|r| r.data)
  }

  /// Like `submit_action`, but also hands the failure to the caller.
  ///
  /// The `Error` event is emitted either way.
  pub async fn try_submit_action(
    &self,
    action: &Action,
    options: &FetchOptions,
  ) -> StoreResult<CacheResult<Arc<Entity>>> {
    let _guard = self.inner.begin_request();
    let token = options.token.as_deref();
    let spec = build_request(action, token);

    match self.inner.client.execute(&spec).await {
      Ok(entity) => {
        let entity = Arc::new(entity);
        if options.use_cache {
          if let Some(href) = entity.self_href() {
            self.store_self(NamespaceKey::for_token(token), href, &entity);
          }
        }
        Ok(CacheResult::from_network(entity))
      }
      Err(e) => {
        warn!(method = %spec.method, url = %spec.url, error = %e, "action failed");
        self.inner.notifier.emit(StoreEvent::Error {
          kind: e.kind(),
          message: e.to_string(),
        });
        Err(e)
      }
    }
  }

  /// Fetch the entity at `href`, from the cache when possible.
  pub async fn get(&self, href: &str, options: &FetchOptions) -> Option<Arc<Entity>> {
    self.try_get(href, options).await.ok().map(|r| r.data)
  }

  /// Like `get`, but also reports the failure and where the data came from.
  pub async fn try_get(
    &self,
    href: &str,
    options: &FetchOptions,
  ) -> StoreResult<CacheResult<Arc<Entity>>> {
    let key = NamespaceKey::for_token(options.token.as_deref());

    if !options.use_cache {
      return self
        .read_through(&key, href, options)
        .await
        .map(CacheResult::from_network);
    }

    if let Some(hit) = self.lookup(&key, href) {
      debug!(namespace = %key, href, "cache hit");
      return Ok(CacheResult::from_cache(hit.entity, hit.cached_at));
    }
    debug!(namespace = %key, href, "cache miss");

    if self.inner.coalesce_reads {
      self.coalesced_read(key, href, options).await
    } else {
      self
        .read_through(&key, href, options)
        .await
        .map(CacheResult::from_network)
    }
  }

  /// Look up `href`, creating the namespace if this is its first use.
  fn lookup(&self, key: &NamespaceKey, href: &str) -> Option<CachedEntity> {
    let mut state = self.inner.state();
    state
      .namespaces
      .entry(key.clone())
      .or_default()
      .get(href)
      .cloned()
  }

  fn store_self(&self, key: NamespaceKey, href: &str, entity: &Arc<Entity>) {
    {
      let mut state = self.inner.state();
      state
        .namespaces
        .entry(key)
        .or_default()
        .insert(href, Arc::clone(entity));
    }
    self.inner.notifier.emit(StoreEvent::Update {
      href: href.to_string(),
      entity: Arc::clone(entity),
    });
  }

  /// Cache under the requested href and promote embedded sub-entities
  /// that carry a self link.
  fn store_read(&self, key: &NamespaceKey, href: &str, entity: &Arc<Entity>) {
    let mut state = self.inner.state();
    let ns = state.namespaces.entry(key.clone()).or_default();
    ns.insert(href, Arc::clone(entity));
    for (self_href, sub) in entity.embedded_with_self() {
      ns.insert(self_href, Arc::new(sub.clone()));
    }
  }

  async fn read_through(
    &self,
    key: &NamespaceKey,
    href: &str,
    options: &FetchOptions,
  ) -> StoreResult<Arc<Entity>> {
    let entity = self
      .try_submit_action(&Action::get(href), options)
      .await?
      .data;
    if options.use_cache {
      self.store_read(key, href, &entity);
    }
    Ok(entity)
  }

  /// Join the in-flight read of `href` in this namespace, or start one.
  async fn coalesced_read(
    &self,
    key: NamespaceKey,
    href: &str,
    options: &FetchOptions,
  ) -> StoreResult<CacheResult<Arc<Entity>>> {
    let flight_key = (key, href.to_string());

    let (fetch, leader) = {
      let mut state = self.inner.state();
      let existing = state
        .flights
        .get(&flight_key)
        .and_then(|f| f.fetch.upgrade());

      match existing {
        Some(fetch) => (fetch, false),
        None => {
          state.next_flight += 1;
          let id = state.next_flight;
          let fetch = self.start_flight(flight_key.clone(), id, options.clone());
          if let Some(weak) = fetch.downgrade() {
            state.flights.insert(flight_key.clone(), Flight { id, fetch: weak });
          }
          (fetch, true)
        }
      }
    };

    if !leader {
      debug!(namespace = %flight_key.0, href, "joining in-flight read");
    }

    let entity = fetch.await?;
    Ok(if leader {
      CacheResult::from_network(entity)
    } else {
      CacheResult::coalesced(entity)
    })
  }

  fn start_flight(
    &self,
    flight_key: (NamespaceKey, String),
    id: u64,
    options: FetchOptions,
  ) -> Shared<FetchFuture> {
    let store = self.clone();
    let landing = FlightLanding {
      inner: Arc::clone(&self.inner),
      key: flight_key.clone(),
      id,
    };
    let (key, href) = flight_key;

    async move {
      let _landing = landing;
      store.read_through(&key, &href, &options).await
    }
    .boxed()
    .shared()
  }
}

impl std::fmt::Debug for EntityStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let state = self.inner.state();
    f.debug_struct("EntityStore")
      .field("namespaces", &state.namespaces.len())
      .field("inflight", &state.inflight)
      .field("coalesce_reads", &self.inner.coalesce_reads)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::EndpointConfig;
  use crate::error::ErrorKind;

  /// A store whose requests fail before reaching the network.
  fn offline_store() -> EntityStore {
    let client = SirenClient::new(&EndpointConfig::default()).unwrap();
    EntityStore::with_client(client, &CacheConfig::default())
  }

  #[test]
  fn test_get_cache_creates_namespace() {
    let store = offline_store();
    assert!(!store.clear(Some("A")));

    let ns = store.get_cache(Some("A"));
    assert!(ns.is_empty());
    assert!(store.clear(Some("A")));
    assert!(!store.clear(Some("A")));
  }

  #[test]
  fn test_clear_emits_nothing() {
    let store = offline_store();
    let mut events = store.subscribe();
    store.get_cache(None);
    store.clear(None);
    store.clear(Some("unknown"));
    assert!(events.drain().is_empty());
  }

  #[tokio::test]
  async fn test_failed_request_restores_inflight() {
    let store = offline_store();
    let mut events = store.subscribe();

    // Relative href with no base url is rejected before any I/O
    let result = store.get("/orders/1", &FetchOptions::new()).await;

    assert!(result.is_none());
    assert_eq!(store.inflight(), 0);
    let events = events.drain();
    assert_eq!(events.len(), 3);
    assert!(matches!(events[0], StoreEvent::Inflight { count: 1 }));
    assert!(matches!(
      events[1],
      StoreEvent::Error {
        kind: ErrorKind::InvalidRequest,
        ..
      }
    ));
    assert!(matches!(events[2], StoreEvent::Inflight { count: 0 }));
  }

  #[tokio::test]
  async fn test_failed_get_caches_nothing() {
    let store = offline_store();
    let err = store
      .try_get("/orders/1", &FetchOptions::new().with_token("A"))
      .await
      .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert!(store.get_cache(Some("A")).is_empty());
  }

  #[test]
  fn test_fetch_options_defaults() {
    let options = FetchOptions::new();
    assert!(options.use_cache);
    assert!(options.token.is_none());

    let options = FetchOptions::new().with_token("t").no_cache();
    assert!(!options.use_cache);
    assert_eq!(options.token.as_deref(), Some("t"));
  }
}
