//! Per-session "seen" tracking.
//!
//! The tracker owns the load / mutate / save discipline; persistence is left
//! to a [`SessionStore`] backend (in-process moka cache or Redis). Sessions
//! expire after a period of inactivity, taking their seen-set with them.

use crate::models::file::FileId;
use async_trait::async_trait;
use moka::future::Cache;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::{collections::VecDeque, fmt, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

pub const DEFAULT_SEEN_CAPACITY: usize = 50;

/// Prefix of every session key written to Redis.
pub const REDIS_KEY_PREFIX: &str = "filedrop:session:";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session backend error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("session payload could not be decoded: {0}")]
    Codec(#[from] serde_json::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Opaque browser-session identifier carried in the session cookie.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accepts only well-formed ids so arbitrary cookie values never become
    /// backend keys.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(|id| Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bounded, insertion-ordered set of viewed file ids.
///
/// Inserting an id that is already present is a no-op. Once `capacity` is
/// reached the oldest id is evicted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeenFiles {
    ids: VecDeque<FileId>,
    capacity: usize,
}

impl SeenFiles {
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Rebuild from a persisted list, oldest first. Duplicates are dropped and
    /// only the newest `capacity` ids are kept.
    pub fn from_ids(ids: impl IntoIterator<Item = FileId>, capacity: usize) -> Self {
        let mut seen = Self::new(capacity);
        for id in ids {
            seen.insert(id);
        }
        seen
    }

    pub fn contains(&self, id: FileId) -> bool {
        self.ids.contains(&id)
    }

    /// Returns `true` when the id was not already present.
    pub fn insert(&mut self, id: FileId) -> bool {
        if self.contains(id) {
            return false;
        }
        if self.ids.len() == self.capacity {
            self.ids.pop_front();
        }
        self.ids.push_back(id);
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ids oldest first.
    pub fn ids(&self) -> Vec<FileId> {
        self.ids.iter().copied().collect()
    }
}

/// Session persistence backend for seen-sets.
#[async_trait]
pub trait SessionStore: Send + Sync + fmt::Debug + 'static {
    fn backend(&self) -> &str;

    /// Load the stored ids, oldest first. `None` for an unknown or expired
    /// session.
    async fn load(&self, session: &SessionId) -> SessionResult<Option<Vec<FileId>>>;

    /// Persist the ids, resetting the session's idle timer.
    async fn save(&self, session: &SessionId, ids: &[FileId]) -> SessionResult<()>;
}

/// In-process sessions using moka; entries expire after `ttl` without access.
#[derive(Clone, Debug)]
pub struct MemorySessionStore {
    cache: Cache<String, Arc<Vec<FileId>>>,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration, max_sessions: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_sessions)
            .time_to_idle(ttl)
            .build();
        Self { cache }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn load(&self, session: &SessionId) -> SessionResult<Option<Vec<FileId>>> {
        Ok(self
            .cache
            .get(session.as_str())
            .await
            .map(|ids| ids.as_ref().clone()))
    }

    async fn save(&self, session: &SessionId, ids: &[FileId]) -> SessionResult<()> {
        self.cache
            .insert(session.as_str().to_string(), Arc::new(ids.to_vec()))
            .await;
        Ok(())
    }
}

/// Sessions kept in Redis as JSON id lists with an expiry.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
    key_prefix: String,
    ttl: Duration,
}

impl RedisSessionStore {
    pub async fn connect(url: &str, ttl: Duration) -> SessionResult<Self> {
        info!(url = %mask_redis_url(url), "Connecting to Redis session backend");
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            key_prefix: REDIS_KEY_PREFIX.to_string(),
            ttl,
        })
    }

    fn key(&self, session: &SessionId) -> String {
        session_key(&self.key_prefix, session)
    }
}

fn session_key(prefix: &str, session: &SessionId) -> String {
    format!("{}{}", prefix, session)
}

/// Seen ids are stored as a JSON array, oldest first.
fn encode_ids(ids: &[FileId]) -> SessionResult<String> {
    Ok(serde_json::to_string(ids)?)
}

fn decode_ids(raw: &str) -> SessionResult<Vec<FileId>> {
    Ok(serde_json::from_str(raw)?)
}

impl fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSessionStore")
            .field("key_prefix", &self.key_prefix)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    fn backend(&self) -> &str {
        "redis"
    }

    async fn load(&self, session: &SessionId) -> SessionResult<Option<Vec<FileId>>> {
        let key = self.key(session);
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&key).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let _: bool = conn.expire(&key, self.ttl.as_secs() as i64).await?;
        decode_ids(&raw).map(Some)
    }

    async fn save(&self, session: &SessionId, ids: &[FileId]) -> SessionResult<()> {
        let payload = encode_ids(ids)?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(self.key(session), payload, self.ttl.as_secs())
            .await?;
        Ok(())
    }
}

/// Mask the password in a Redis URL for logging.
fn mask_redis_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
            if colon_pos > scheme_end {
                return format!("{}:****@{}", &url[..colon_pos], &url[at_pos + 1..]);
            }
        }
    }
    url.to_string()
}

/// Reads and records which catalog files a session has viewed.
#[derive(Clone, Debug)]
pub struct SeenTracker {
    store: Arc<dyn SessionStore>,
    capacity: usize,
}

impl SeenTracker {
    pub fn new(store: Arc<dyn SessionStore>, capacity: usize) -> Self {
        Self { store, capacity }
    }

    pub fn backend(&self) -> &str {
        self.store.backend()
    }

    pub async fn get_seen(&self, session: &SessionId) -> SessionResult<SeenFiles> {
        let ids = self.store.load(session).await?.unwrap_or_default();
        Ok(SeenFiles::from_ids(ids, self.capacity))
    }

    /// Add `id` to the session's seen-set and save it before returning.
    ///
    /// Marking an id twice leaves the set as it was after the first call.
    pub async fn mark_seen(&self, session: &SessionId, id: FileId) -> SessionResult<SeenFiles> {
        let mut seen = self.get_seen(session).await?;
        self.record_view(session, &mut seen, id).await?;
        Ok(seen)
    }

    /// Insert `id` into a seen-set already loaded by [`Self::get_seen`] and
    /// save it, without loading the session again. Returns whether the id
    /// was new.
    pub async fn record_view(
        &self,
        session: &SessionId,
        seen: &mut SeenFiles,
        id: FileId,
    ) -> SessionResult<bool> {
        let added = seen.insert(id);
        if added {
            debug!(session = %session, id, "marking file as seen");
        }
        self.store.save(session, &seen.ids()).await?;
        Ok(added)
    }
}
