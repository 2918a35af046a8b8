pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod store;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use services::auth::{AuthService, CapabilityResolver, JwtSessions};
use services::booking::BookingCoordinator;
use store::{MemoryStore, PgStore, SeatStore, UserStore};

// Shared state для всего приложения
pub struct AppState {
    pub config: config::Config,
    pub bookings: BookingCoordinator,
    pub auth: AuthService,
    pub sessions: Arc<dyn CapabilityResolver>,
    pub cache: cache::CacheService,
}

impl AppState {
    /// Поднимает хранилища по конфигурации, прогоняет миграции и засевает места.
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let (seats, users): (Arc<dyn SeatStore>, Arc<dyn UserStore>) = match &config.database.url {
            Some(url) => {
                let db = database::Database::new(url, &config.database)
                    .await
                    .context("failed to connect to database")?;
                info!("Database connected");
                db.run_migrations().await.context("failed to run migrations")?;
                let store = Arc::new(PgStore::new(db));
                let seats: Arc<dyn SeatStore> = store.clone();
                let users: Arc<dyn UserStore> = store;
                (seats, users)
            }
            None => {
                warn!("DATABASE_URL is not set, using in-memory storage; data will not survive a restart");
                let store = Arc::new(MemoryStore::new());
                let seats: Arc<dyn SeatStore> = store.clone();
                let users: Arc<dyn UserStore> = store;
                (seats, users)
            }
        };

        let cache = match &config.redis.url {
            Some(url) => {
                let redis = redis_client::RedisClient::new(url)
                    .await
                    .context("failed to connect to Redis")?;
                info!("Redis connected");
                cache::CacheService::new(Some(redis), config.redis.seats_ttl_seconds)
            }
            None => {
                info!("REDIS_URL is not set, seats cache disabled");
                cache::CacheService::disabled()
            }
        };

        let state = Self::with_stores(config, seats, users, cache);
        state
            .bookings
            .initialize()
            .await
            .context("failed to initialize seats")?;
        Ok(state)
    }

    pub fn with_stores(
        config: config::Config,
        seats: Arc<dyn SeatStore>,
        users: Arc<dyn UserStore>,
        cache: cache::CacheService,
    ) -> Arc<Self> {
        let sessions = Arc::new(JwtSessions::from_config(&config.jwt));
        let auth = AuthService::new(users, sessions.clone(), config.jwt.bcrypt_cost);

        Arc::new(Self {
            bookings: BookingCoordinator::with_cache(seats, cache.clone()),
            auth,
            sessions,
            cache,
            config,
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Train Booking API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes(&state.config.features))
        .with_state(state.clone())
        .layer(cors_layer(&state.config.cors.allowed_origin))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    match origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!("CORS_ALLOWED_ORIGIN {:?} is not a valid header value, cross-origin requests disabled", origin);
            layer
        }
    }
}
