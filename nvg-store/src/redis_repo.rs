use redis::RedisResult;

/// Outcome of one rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Requests counted in the current window, this one included.
    pub count: i64,
}

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter keyed by client. The key expires with its window.
    pub async fn check_rate_limit(
        &self,
        client_key: &str,
        limit: i64,
        window_seconds: i64,
    ) -> RedisResult<RateDecision> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let window = chrono::Utc::now().timestamp() / window_seconds.max(1);
        let key = format!("ratelimit:{}:{}", client_key, window);

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .expire(&key, window_seconds)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(RateDecision {
            allowed: count <= limit,
            count,
        })
    }
}
