//! Key-value backends: a process-local map and a REST Redis client.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

/// The handful of Redis commands the stores need.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// `ttl = None` keeps the key forever.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Returns `true` when the key existed.
    async fn del(&self, key: &str) -> Result<bool>;
    async fn lpush(&self, key: &str, value: &str) -> Result<()>;
    async fn rpush(&self, key: &str, values: &[String]) -> Result<()>;
    /// Redis semantics: inclusive bounds, negative indexes count from the end.
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>>;
    /// Remove every occurrence of `value` from the list.
    async fn lrem(&self, key: &str, value: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// MemoryKv
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Slot {
    Str(String),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    slot: Slot,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.map(|t| now >= t).unwrap_or(false)
    }
}

/// Process-local map with per-key expiry. Expired keys are evicted on access.
#[derive(Debug, Default)]
pub struct MemoryKv {
    inner: Mutex<HashMap<String, Entry>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_map<T>(&self, f: impl FnOnce(&mut HashMap<String, Entry>) -> Result<T>) -> Result<T> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| anyhow!("memory kv lock poisoned"))?;
        let now = Instant::now();
        map.retain(|_, e| !e.expired(now));
        f(&mut map)
    }
}

/// Map Redis-style inclusive `[start, stop]` onto `0..len`.
fn range_bounds(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let norm = |i: i64| if i < 0 { len + i } else { i };
    let s = norm(start).max(0);
    let e = norm(stop).min(len - 1);
    if len == 0 || s > e {
        return None;
    }
    Some((s as usize, e as usize))
}

#[async_trait]
impl KvBackend for MemoryKv {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.with_map(|m| {
            m.insert(
                key.to_string(),
                Entry {
                    slot: Slot::Str(value.to_string()),
                    expires_at: ttl.map(|d| Instant::now() + d),
                },
            );
            Ok(())
        })
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_map(|m| match m.get(key) {
            None => Ok(None),
            Some(Entry {
                slot: Slot::Str(s), ..
            }) => Ok(Some(s.clone())),
            Some(_) => bail!("WRONGTYPE key '{key}' holds a list"),
        })
    }

    async fn del(&self, key: &str) -> Result<bool> {
        self.with_map(|m| Ok(m.remove(key).is_some()))
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<()> {
        self.with_map(|m| {
            let entry = m.entry(key.to_string()).or_insert_with(|| Entry {
                slot: Slot::List(VecDeque::new()),
                expires_at: None,
            });
            match &mut entry.slot {
                Slot::List(l) => {
                    l.push_front(value.to_string());
                    Ok(())
                }
                Slot::Str(_) => bail!("WRONGTYPE key '{key}' holds a string"),
            }
        })
    }

    async fn rpush(&self, key: &str, values: &[String]) -> Result<()> {
        self.with_map(|m| {
            let entry = m.entry(key.to_string()).or_insert_with(|| Entry {
                slot: Slot::List(VecDeque::new()),
                expires_at: None,
            });
            match &mut entry.slot {
                Slot::List(l) => {
                    l.extend(values.iter().cloned());
                    Ok(())
                }
                Slot::Str(_) => bail!("WRONGTYPE key '{key}' holds a string"),
            }
        })
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.with_map(|m| match m.get(key) {
            None => Ok(Vec::new()),
            Some(Entry {
                slot: Slot::List(l), ..
            }) => Ok(match range_bounds(l.len(), start, stop) {
                Some((s, e)) => l.range(s..=e).cloned().collect(),
                None => Vec::new(),
            }),
            Some(_) => bail!("WRONGTYPE key '{key}' holds a string"),
        })
    }

    async fn lrem(&self, key: &str, value: &str) -> Result<()> {
        self.with_map(|m| {
            if let Some(Entry {
                slot: Slot::List(l), ..
            }) = m.get_mut(key)
            {
                l.retain(|v| v != value);
            }
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// RestKv
// ---------------------------------------------------------------------------

/// REST Redis client (Vercel KV / Upstash).
///
/// Short commands travel in the path (`{url}/SET/<key>/<value>/PX/<ms>`);
/// multi-value pushes go as a JSON command array in a POST body. Every
/// response is a `{"result": ...}` envelope.
#[derive(Clone)]
pub struct RestKv {
    http: reqwest::Client,
    base: Url,
    token: String,
}

impl std::fmt::Debug for RestKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestKv")
            .field("base", &self.base.as_str())
            .field("token", &"<REDACTED>")
            .finish()
    }
}

impl RestKv {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let base = Url::parse(base_url.trim_end_matches('/'))
            .with_context(|| format!("invalid KV REST url: {base_url}"))?;
        if base.cannot_be_a_base() {
            bail!("invalid KV REST url: {base_url}");
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base,
            token: token.to_string(),
        })
    }

    fn command_url(&self, parts: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("KV REST url cannot carry a path"))?
            .pop_if_empty()
            .extend(parts);
        Ok(url)
    }

    async fn envelope(resp: reqwest::Response) -> Result<Value> {
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("KV error: {} {}", status.as_u16(), text);
        }
        let body: Value = resp.json().await.context("KV response was not JSON")?;
        if let Some(err) = body.get("error").and_then(Value::as_str) {
            bail!("KV error: {err}");
        }
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn command(&self, parts: &[&str]) -> Result<Value> {
        let url = self.command_url(parts)?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("KV {} request failed", parts.first().unwrap_or(&"")))?;
        Self::envelope(resp).await
    }

    async fn command_body(&self, parts: Vec<&str>) -> Result<Value> {
        let name = parts.first().copied().unwrap_or("").to_string();
        let resp = self
            .http
            .post(self.base.clone())
            .bearer_auth(&self.token)
            .json(&parts)
            .send()
            .await
            .with_context(|| format!("KV {name} request failed"))?;
        Self::envelope(resp).await
    }
}

#[async_trait]
impl KvBackend for RestKv {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        match ttl {
            Some(d) => {
                let ms = d.as_millis().max(1).to_string();
                self.command(&["SET", key, value, "PX", &ms]).await?;
            }
            None => {
                self.command(&["SET", key, value]).await?;
            }
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.command(&["GET", key]).await? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Ok(Some(other.to_string())),
        }
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let n = self.command(&["DEL", key]).await?;
        Ok(n.as_i64().unwrap_or(0) > 0)
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<()> {
        self.command(&["LPUSH", key, value]).await?;
        Ok(())
    }

    async fn rpush(&self, key: &str, values: &[String]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let mut parts: Vec<&str> = Vec::with_capacity(values.len() + 2);
        parts.push("RPUSH");
        parts.push(key);
        parts.extend(values.iter().map(String::as_str));
        self.command_body(parts).await?;
        Ok(())
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let (s, e) = (start.to_string(), stop.to_string());
        let v = self.command(&["LRANGE", key, &s, &e]).await?;
        match v {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => Ok(items
                .into_iter()
                .map(|i| match i {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect()),
            other => bail!("KV LRANGE returned unexpected result: {other}"),
        }
    }

    async fn lrem(&self, key: &str, value: &str) -> Result<()> {
        self.command(&["LREM", key, "0", value]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_bounds_follow_redis() {
        assert_eq!(range_bounds(5, 0, -1), Some((0, 4)));
        assert_eq!(range_bounds(5, 0, 99), Some((0, 4)));
        assert_eq!(range_bounds(5, -2, -1), Some((3, 4)));
        assert_eq!(range_bounds(5, 3, 1), None);
        assert_eq!(range_bounds(0, 0, -1), None);
    }

    #[tokio::test]
    async fn memory_ttl_zero_expires_immediately() {
        let kv = MemoryKv::new();
        kv.set("a", "1", Some(Duration::ZERO)).await.unwrap();
        kv.set("b", "2", None).await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), None);
        assert_eq!(kv.get("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn memory_lists() {
        let kv = MemoryKv::new();
        kv.lpush("l", "x").await.unwrap();
        kv.lpush("l", "y").await.unwrap();
        kv.rpush("l", &["z".to_string()]).await.unwrap();
        assert_eq!(kv.lrange("l", 0, -1).await.unwrap(), vec!["y", "x", "z"]);
        kv.lrem("l", "x").await.unwrap();
        assert_eq!(kv.lrange("l", 0, -1).await.unwrap(), vec!["y", "z"]);
        assert!(kv.get("l").await.is_err());
    }

    #[test]
    fn command_url_encodes_segments() {
        let kv = RestKv::new("https://kv.example/", "t").unwrap();
        let url = kv.command_url(&["SET", "order:AZFC-1", "{\"a\":\"b/c\"}"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://kv.example/SET/order:AZFC-1/%7B%22a%22:%22b%2Fc%22%7D"
        );
    }
}
