//! Caller extraction from pre-authenticated request headers.

use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use loremaster_core::identity::{CampaignRole, Caller};
use uuid::Uuid;

use crate::error::ErrorBody;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the user's role in the addressed campaign.
pub const CAMPAIGN_ROLE_HEADER: &str = "x-campaign-role";

/// The caller of the current request.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedCaller(pub Caller);

/// Rejection for requests without a usable identity.
#[derive(Debug)]
pub struct Unauthenticated(String);

impl IntoResponse for Unauthenticated {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody::new("unauthenticated", self.0)),
        )
            .into_response()
    }
}

impl<S> FromRequestParts<S> for AuthenticatedCaller
where
    S: Send + Sync,
{
    type Rejection = Unauthenticated;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| Unauthenticated(format!("missing or unreadable {name} header")))
        };

        let user_id: Uuid = header(USER_ID_HEADER)?
            .parse()
            .map_err(|_| Unauthenticated(format!("{USER_ID_HEADER} is not a valid UUID")))?;
        let role: CampaignRole = header(CAMPAIGN_ROLE_HEADER)?
            .parse()
            .map_err(|e| Unauthenticated(format!("{CAMPAIGN_ROLE_HEADER}: {e}")))?;

        Ok(Self(Caller { user_id, role }))
    }
}
