use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::BookingError;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
}

/// Достаёт токен из заголовка Authorization. Принимаются и `Bearer <token>`, и голый токен.
pub fn extract_capability(header_value: &str) -> Option<&str> {
    let value = header_value.trim();
    let token = match value.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ if value.eq_ignore_ascii_case("bearer") => "",
        _ => value,
    };
    (!token.is_empty()).then_some(token)
}

// Bearer/JWT extractor
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = BookingError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let capability = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(extract_capability)
            .ok_or(BookingError::Unauthenticated)?;

        let identity = state.sessions.resolve(capability)?;

        Ok(AuthUser {
            user_id: identity.user_id,
            username: identity.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bearer_and_raw_tokens() {
        assert_eq!(extract_capability("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(extract_capability("bearer   abc.def.ghi "), Some("abc.def.ghi"));
        assert_eq!(extract_capability("abc.def.ghi"), Some("abc.def.ghi"));
    }

    #[test]
    fn rejects_empty_values() {
        assert_eq!(extract_capability(""), None);
        assert_eq!(extract_capability("Bearer "), None);
        assert_eq!(extract_capability("   "), None);
    }
}
