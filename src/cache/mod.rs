use redis::Script;

use crate::redis_client::RedisClient;

pub mod seats;

/// Кеш снимка мест для отображения. Без Redis все вызовы идут мимо кеша.
/// Подбор мест и бронирование кеш никогда не читают.
#[derive(Clone)]
pub struct CacheService {
    redis: Option<RedisClient>,
    seats_ttl_seconds: u64,
    save_if_current: Script,
}

impl CacheService {
    pub fn new(redis: Option<RedisClient>, seats_ttl_seconds: u64) -> Self {
        Self {
            redis,
            seats_ttl_seconds,
            save_if_current: Script::new(seats::SAVE_IF_CURRENT),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, 0)
    }

    pub fn is_enabled(&self) -> bool {
        self.redis.is_some()
    }
}
