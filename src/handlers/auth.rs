use crate::auth::Identity;
use crate::middleware::auth::require_authenticated;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};

/// GET /auth/whoami - Identity carried by the bearer token
pub async fn whoami(user: CurrentUser) -> ApiResult<Identity> {
    let identity = require_authenticated(user.identity())?;
    Ok(ApiResponse::success(identity.clone()))
}
