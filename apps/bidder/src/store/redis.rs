//! Redis-backed [`DataStore`].
//!
//! All keys are namespaced as `{namespace}:{key}` so several deployments can
//! share one Redis. The debit primitive runs as a single Lua script, which
//! Redis executes without interleaving other commands; that script is the
//! only place budget values are read and written in one step.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::info;

use crate::store::{DataStore, DebitResult, StoreError};

/// KEYS[1] budget key; ARGV[1] debit amount, ARGV[2] initial value,
/// ARGV[3] expiration (unix seconds). Returns {flag, remaining} where flag
/// is 1 when the debit was applied and 0 when funds were insufficient.
const DEBIT_IF_SUFFICIENT: &str = r#"
if redis.call('EXISTS', KEYS[1]) ~= 1 then
  redis.call('SET', KEYS[1], ARGV[2])
  redis.call('EXPIREAT', KEYS[1], ARGV[3])
end
local current = tonumber(redis.call('GET', KEYS[1]))
if current >= tonumber(ARGV[1]) then
  return {1, redis.call('DECRBY', KEYS[1], ARGV[1])}
else
  return {0, current}
end
"#;

pub struct RedisStore {
    conn: ConnectionManager,
    namespace: String,
    debit_script: Script,
}

impl RedisStore {
    /// Connects and hands back a store whose connection manager multiplexes
    /// all callers. Lifecycle is owned by whoever constructed it.
    pub async fn connect(url: &str, namespace: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!(namespace, "redis store connected");

        Ok(Self {
            conn,
            namespace: namespace.to_string(),
            debit_script: Script::new(DEBIT_IF_SUFFICIENT),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }
}

#[async_trait]
impl DataStore for RedisStore {
    async fn debit_if_sufficient(
        &self,
        key: &str,
        amount: i64,
        init_value: i64,
        init_expiration: DateTime<Utc>,
    ) -> Result<DebitResult, StoreError> {
        let mut conn = self.conn.clone();
        let (applied, remaining): (i64, i64) = self
            .debit_script
            .key(self.namespaced(key))
            .arg(amount)
            .arg(init_value)
            .arg(init_expiration.timestamp())
            .invoke_async(&mut conn)
            .await?;

        match applied {
            1 => Ok(DebitResult::Debited { remaining }),
            0 => Ok(DebitResult::Insufficient { remaining }),
            other => Err(StoreError::Reply(format!(
                "debit script returned flag {other}"
            ))),
        }
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(self.namespaced(key)).await?)
    }

    async fn set_i64(
        &self,
        key: &str,
        value: i64,
        expiration: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let key = self.namespaced(key);
        redis::pipe()
            .atomic()
            .set(&key, value)
            .ignore()
            .cmd("EXPIREAT")
            .arg(&key)
            .arg(expiration.timestamp())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let namespaced: Vec<String> = keys.iter().map(|k| self.namespaced(k)).collect();
        conn.del::<_, ()>(namespaced).await?;
        Ok(())
    }

    async fn hash_get_i64(&self, key: &str, field: &str) -> Result<Option<i64>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.hget(self.namespaced(key), field).await?)
    }

    async fn hash_set_i64(&self, key: &str, field: &str, value: i64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(self.namespaced(key), field, value)
            .await?;
        Ok(())
    }

    async fn set_add(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(self.namespaced(key), members.to_vec())
            .await?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.smembers(self.namespaced(key)).await?)
    }

    async fn sorted_set_add(
        &self,
        key: &str,
        member: &str,
        score: i64,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.zadd::<_, _, _, ()>(self.namespaced(key), member, score)
            .await?;
        Ok(())
    }

    async fn sorted_set_union_max(
        &self,
        keys: &[String],
    ) -> Result<Vec<(String, i64)>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();

        // ZUNION computes the union inline; no scratch key is shared between
        // concurrent requests.
        let mut cmd = redis::cmd("ZUNION");
        cmd.arg(keys.len());
        for key in keys {
            cmd.arg(self.namespaced(key));
        }
        cmd.arg("AGGREGATE").arg("MAX").arg("WITHSCORES");

        Ok(cmd.query_async(&mut conn).await?)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.keys(self.namespaced(pattern)).await?;

        let prefix = format!("{}:", self.namespace);
        Ok(raw
            .into_iter()
            .map(|k| k.strip_prefix(&prefix).map(str::to_string).unwrap_or(k))
            .collect())
    }
}
