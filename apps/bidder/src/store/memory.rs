#![allow(dead_code)]

//! In-process [`DataStore`] used by unit tests and local runs.
//!
//! One mutex guards the whole keyspace, so the debit primitive is atomic the
//! same way the Redis script is. Expirations are checked lazily on access.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::store::{DataStore, DebitResult, StoreError};

#[derive(Debug, Clone)]
enum Entry {
    Counter {
        value: i64,
        expires_at: Option<DateTime<Utc>>,
    },
    Hash(HashMap<String, i64>),
    Set(HashSet<String>),
    SortedSet(HashMap<String, i64>),
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.inner.lock().expect("memory store lock poisoned")
    }

    /// Drops the entry if it is an expired counter. Non-counter entries do
    /// not expire.
    fn purge_expired(map: &mut HashMap<String, Entry>, key: &str, now: DateTime<Utc>) {
        if let Some(Entry::Counter {
            expires_at: Some(at),
            ..
        }) = map.get(key)
        {
            if *at <= now {
                map.remove(key);
            }
        }
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn debit_if_sufficient(
        &self,
        key: &str,
        amount: i64,
        init_value: i64,
        init_expiration: DateTime<Utc>,
    ) -> Result<DebitResult, StoreError> {
        let now = Utc::now();
        let mut map = self.locked();
        Self::purge_expired(&mut map, key, now);

        let entry = map.entry(key.to_string()).or_insert(Entry::Counter {
            value: init_value,
            expires_at: Some(init_expiration),
        });

        match entry {
            Entry::Counter { value, .. } => {
                if *value >= amount {
                    *value -= amount;
                    Ok(DebitResult::Debited { remaining: *value })
                } else {
                    Ok(DebitResult::Insufficient { remaining: *value })
                }
            }
            _ => Err(StoreError::Reply(format!(
                "key {key} holds a non-counter value"
            ))),
        }
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let now = Utc::now();
        let mut map = self.locked();
        Self::purge_expired(&mut map, key, now);

        match map.get(key) {
            Some(Entry::Counter { value, .. }) => Ok(Some(*value)),
            Some(_) => Err(StoreError::Reply(format!(
                "key {key} holds a non-counter value"
            ))),
            None => Ok(None),
        }
    }

    async fn set_i64(
        &self,
        key: &str,
        value: i64,
        expiration: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut map = self.locked();
        map.insert(
            key.to_string(),
            Entry::Counter {
                value,
                expires_at: Some(expiration),
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        let mut map = self.locked();
        for key in keys {
            map.remove(key);
        }
        Ok(())
    }

    async fn hash_get_i64(&self, key: &str, field: &str) -> Result<Option<i64>, StoreError> {
        let map = self.locked();
        match map.get(key) {
            Some(Entry::Hash(fields)) => Ok(fields.get(field).copied()),
            Some(_) => Err(StoreError::Reply(format!("key {key} is not a hash"))),
            None => Ok(None),
        }
    }

    async fn hash_set_i64(&self, key: &str, field: &str, value: i64) -> Result<(), StoreError> {
        let mut map = self.locked();
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(HashMap::new()));
        match entry {
            Entry::Hash(fields) => {
                fields.insert(field.to_string(), value);
                Ok(())
            }
            _ => Err(StoreError::Reply(format!("key {key} is not a hash"))),
        }
    }

    async fn set_add(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        let mut map = self.locked();
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(HashSet::new()));
        match entry {
            Entry::Set(set) => {
                set.extend(members.iter().cloned());
                Ok(())
            }
            _ => Err(StoreError::Reply(format!("key {key} is not a set"))),
        }
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let map = self.locked();
        match map.get(key) {
            Some(Entry::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(StoreError::Reply(format!("key {key} is not a set"))),
            None => Ok(Vec::new()),
        }
    }

    async fn sorted_set_add(
        &self,
        key: &str,
        member: &str,
        score: i64,
    ) -> Result<(), StoreError> {
        let mut map = self.locked();
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Entry::SortedSet(HashMap::new()));
        match entry {
            Entry::SortedSet(scores) => {
                scores.insert(member.to_string(), score);
                Ok(())
            }
            _ => Err(StoreError::Reply(format!("key {key} is not a sorted set"))),
        }
    }

    async fn sorted_set_union_max(
        &self,
        keys: &[String],
    ) -> Result<Vec<(String, i64)>, StoreError> {
        let map = self.locked();
        let mut union: HashMap<String, i64> = HashMap::new();

        for key in keys {
            if let Some(Entry::SortedSet(scores)) = map.get(key) {
                for (member, score) in scores {
                    union
                        .entry(member.clone())
                        .and_modify(|s| *s = (*s).max(*score))
                        .or_insert(*score);
                }
            }
        }

        Ok(union.into_iter().collect())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let map = self.locked();
        let matches: Vec<String> = match pattern.strip_suffix('*') {
            Some(prefix) => map
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect(),
            None => map.keys().filter(|k| *k == pattern).cloned().collect(),
        };
        Ok(matches)
    }
}
