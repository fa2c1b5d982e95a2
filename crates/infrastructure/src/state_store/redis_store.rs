use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisResult, Script};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use pipeline_core::{config::StateStoreConfig, PipelineError, PipelineResult, StateStore};

/// 值匹配时才删除，保证只释放自己持有的锁
const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// 基于 Redis 的状态存储
///
/// 连接在首次成功的命令时建立，之后由 `ConnectionManager` 负责断线重连。Redis 不可达时
/// 仍可创建实例，每条命令在超时内拿不到结果统一映射为 [`PipelineError::StoreUnavailable`]。
#[derive(Clone)]
pub struct RedisStateStore {
    client: Client,
    connection: Arc<OnceCell<ConnectionManager>>,
    command_timeout: Duration,
    compare_and_delete: Script,
}

impl RedisStateStore {
    /// 只有地址格式错误会失败；连接失败时记录告警并在后续命令中重试
    pub async fn connect(config: &StateStoreConfig) -> PipelineResult<Self> {
        let client = Client::open(config.url.as_str()).map_err(|e| {
            PipelineError::Configuration(format!("Failed to create Redis client: {e}"))
        })?;

        let store = Self {
            client,
            connection: Arc::new(OnceCell::new()),
            command_timeout: Duration::from_millis(config.command_timeout_ms),
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
        };
        match store.ping().await {
            Ok(()) => debug!("Successfully connected to Redis at {}", config.url),
            Err(e) => warn!(
                "Redis at {} is unreachable, will retry on demand: {}",
                config.url, e
            ),
        }

        Ok(store)
    }

    async fn connection(&self) -> RedisResult<ConnectionManager> {
        self.connection
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await
            .cloned()
    }

    async fn run<T, F, Fut>(&self, operation: &str, command: F) -> PipelineResult<T>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let attempt = async {
            match self.connection().await {
                Ok(conn) => command(conn).await,
                Err(e) => Err(e),
            }
        };

        match tokio::time::timeout(self.command_timeout, attempt).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!("Redis command {} failed: {}", operation, e);
                Err(PipelineError::StoreUnavailable(format!(
                    "Redis command {operation} failed: {e}"
                )))
            }
            Err(_) => {
                warn!(
                    "Redis command {} timed out after {:?}",
                    operation, self.command_timeout
                );
                Err(PipelineError::StoreUnavailable(format!(
                    "Redis command {operation} timed out"
                )))
            }
        }
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    // PX 0 会被 Redis 拒绝
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn get(&self, key: &str) -> PipelineResult<Option<String>> {
        self.run("GET", |mut conn| async move {
            let reply = redis::cmd("GET")
                .arg(key)
                .query_async::<Option<String>>(&mut conn)
                .await;
            reply
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> PipelineResult<()> {
        self.run("SET", |mut conn| async move {
            let reply = redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("PX")
                .arg(ttl_millis(ttl))
                .query_async::<()>(&mut conn)
                .await;
            reply
        })
        .await
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> PipelineResult<bool> {
        let reply = self
            .run("SET NX", |mut conn| async move {
                let reply = redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("PX")
                    .arg(ttl_millis(ttl))
                    .query_async::<Option<String>>(&mut conn)
                    .await;
                reply
            })
            .await?;
        Ok(reply.is_some())
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> PipelineResult<bool> {
        let script = &self.compare_and_delete;
        let deleted = self
            .run("EVALSHA", |mut conn| async move {
                let mut invocation = script.key(key);
                invocation.arg(expected);
                let reply = invocation.invoke_async::<i64>(&mut conn).await;
                reply
            })
            .await?;
        Ok(deleted > 0)
    }

    async fn delete(&self, key: &str) -> PipelineResult<bool> {
        let deleted = self
            .run("DEL", |mut conn| async move {
                let reply = redis::cmd("DEL").arg(key).query_async::<i64>(&mut conn).await;
                reply
            })
            .await?;
        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> PipelineResult<bool> {
        let count = self
            .run("EXISTS", |mut conn| async move {
                let reply = redis::cmd("EXISTS").arg(key).query_async::<i64>(&mut conn).await;
                reply
            })
            .await?;
        Ok(count > 0)
    }

    async fn ping(&self) -> PipelineResult<()> {
        let response = self
            .run("PING", |mut conn| async move {
                let reply = redis::cmd("PING").query_async::<String>(&mut conn).await;
                reply
            })
            .await?;
        if response == "PONG" {
            Ok(())
        } else {
            Err(PipelineError::StoreUnavailable(format!(
                "Unexpected PING response: {response}"
            )))
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
