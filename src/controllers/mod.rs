pub mod analytics;
pub mod auth;
pub mod seats;

use axum::Router;
use std::sync::Arc;

use crate::config::FeatureFlags;

pub fn routes(features: &FeatureFlags) -> Router<Arc<crate::AppState>> {
    let router = Router::new()
        .merge(auth::routes())
        .merge(seats::routes())
        .merge(analytics::routes());

    if features.enable_reset {
        router.merge(seats::reset_route())
    } else {
        router
    }
}
