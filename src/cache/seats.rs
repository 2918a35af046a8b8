use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::cache::CacheService;
use crate::error::BookingError;
use crate::models::Seat;
use crate::services::booking::BookingCoordinator;

const SEATS_KEY: &str = "seats:snapshot";
// Растёт на каждой инвалидации; снимок пишется только под тем поколением, при котором читался
const GENERATION_KEY: &str = "seats:gen";

// KEYS[1] - снимок, KEYS[2] - поколение; ARGV: поколение читателя, данные, TTL
pub(crate) const SAVE_IF_CURRENT: &str = r#"
local current = redis.call('GET', KEYS[2]) or '0'
if current ~= ARGV[1] then
    return 0
end
redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
return 1
"#;

impl CacheService {
    /// Снимок мест: сначала кеш, при промахе или сбое Redis - хранилище.
    pub async fn get_seats(&self, bookings: &BookingCoordinator) -> Result<Vec<Seat>, BookingError> {
        if let Some(seats) = self.get_seats_from_cache().await {
            return Ok(seats);
        }

        // Поколение снимаем до чтения хранилища: бронь, закоммиченная после,
        // сдвинет его, и устаревший снимок в кеш уже не попадёт
        let generation = self.snapshot_generation().await;
        let seats = bookings.list_all().await?;
        if let Some(generation) = generation {
            self.save_seats_if_current(generation, &seats).await;
        }
        Ok(seats)
    }

    /// Сдвигает поколение и удаляет снимок одной транзакцией.
    pub async fn invalidate_seats(&self) {
        let Some(redis) = &self.redis else { return };
        let mut conn = redis.conn.clone();
        let result: redis::RedisResult<()> = redis::pipe()
            .atomic()
            .incr(GENERATION_KEY, 1)
            .ignore()
            .del(SEATS_KEY)
            .ignore()
            .query_async(&mut conn)
            .await;
        match result {
            Ok(()) => debug!("Invalidated seats cache"),
            Err(e) => warn!("Failed to invalidate seats cache: {:?}", e),
        }
    }

    async fn snapshot_generation(&self) -> Option<u64> {
        let redis = self.redis.as_ref()?;
        let mut conn = redis.conn.clone();
        let generation: redis::RedisResult<Option<u64>> = conn.get(GENERATION_KEY).await;
        match generation {
            Ok(generation) => Some(generation.unwrap_or(0)),
            Err(e) => {
                warn!("Seats cache generation read failed: {:?}", e);
                None
            }
        }
    }

    async fn get_seats_from_cache(&self) -> Option<Vec<Seat>> {
        let redis = self.redis.as_ref()?;
        let mut conn = redis.conn.clone();
        let data: Option<String> = match conn.get(SEATS_KEY).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Seats cache read failed: {:?}", e);
                return None;
            }
        };
        serde_json::from_str(&data?)
            .map_err(|e| warn!("Seats cache holds malformed data: {:?}", e))
            .ok()
    }

    /// `true`, если снимок записан; `false`, если поколение уже ушло вперёд или Redis недоступен.
    async fn save_seats_if_current(&self, generation: u64, seats: &[Seat]) -> bool {
        let Some(redis) = &self.redis else { return false };
        let data = match serde_json::to_string(seats) {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to serialize seats snapshot: {:?}", e);
                return false;
            }
        };
        let mut conn = redis.conn.clone();
        let written: redis::RedisResult<i32> = self
            .save_if_current
            .key(SEATS_KEY)
            .key(GENERATION_KEY)
            .arg(generation)
            .arg(data)
            .arg(self.seats_ttl_seconds)
            .invoke_async(&mut conn)
            .await;
        match written {
            Ok(1) => true,
            Ok(_) => {
                debug!(generation, "Seats snapshot is stale, not cached");
                false
            }
            Err(e) => {
                warn!("Failed to cache seats snapshot: {:?}", e);
                false
            }
        }
    }
}
