//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 进程内后端存储，遵循Redis的过期与glob匹配语义。
//!
//! 用于本地开发（`store.mode = "memory"`）、测试和基准测试，不是缓存层级。

use super::CacheStore;
use crate::error::{StoreFault, StoreResult};
use async_trait::async_trait;
use dashmap::DashMap;
use regex::Regex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    /// `None` 表示TTL超出时钟范围，视为永不过期
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    max_memory: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置容量上限（字节），体现在 `memory_info` 的 `maxmemory` 中
    pub fn with_max_memory(mut self, bytes: u64) -> Self {
        self.max_memory = Some(bytes);
        self
    }

    /// 未过期条目的数量
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 未过期条目占用的字节数
    fn used_memory(&self) -> u64 {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|e| !e.is_expired(now))
            .map(|e| (e.key().len() + e.value.len()) as u64)
            .sum()
    }

    /// 删除所有已过期的条目
    fn purge_expired(&self, now: Instant) {
        self.entries.retain(|_, e| !e.is_expired(now));
    }
}

/// 将Redis glob模式转换为锚定的正则表达式
///
/// 支持 `*`、`?`、`[...]`（含 `[^...]`）和 `\` 转义
pub(crate) fn glob_to_regex(pattern: &str) -> StoreResult<Regex> {
    let mut re = String::with_capacity(pattern.len() * 2 + 2);
    re.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '\\' => {
                if let Some(next) = chars.next() {
                    re.push_str(&regex::escape(&next.to_string()));
                }
            }
            '[' => {
                re.push('[');
                if chars.peek() == Some(&'^') {
                    chars.next();
                    re.push('^');
                }
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == ']' {
                        closed = true;
                        break;
                    }
                    match inner {
                        '-' => re.push('-'),
                        other => re.push_str(&regex::escape(&other.to_string())),
                    }
                }
                if !closed {
                    return Err(StoreFault::Command(format!(
                        "unterminated character class in pattern '{}'",
                        pattern
                    )));
                }
                re.push(']');
            }
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| StoreFault::Command(format!("invalid pattern: {}", e)))
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, e| e.is_expired(now));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .map(|(_, e)| !e.is_expired(now))
            .unwrap_or(false))
    }

    async fn scan(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let matcher = glob_to_regex(pattern)?;
        let now = Instant::now();
        self.purge_expired(now);
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| !e.is_expired(now) && matcher.is_match(e.key()))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete_many(&self, keys: &[String]) -> StoreResult<usize> {
        let now = Instant::now();
        Ok(keys
            .iter()
            .filter_map(|k| self.entries.remove(k))
            .filter(|(_, e)| !e.is_expired(now))
            .count())
    }

    async fn memory_info(&self) -> StoreResult<String> {
        Ok(format!(
            "# Memory\r\nused_memory:{}\r\nmaxmemory:{}\r\nmaxmemory_policy:noeviction\r\n",
            self.used_memory(),
            self.max_memory.unwrap_or(0)
        ))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
