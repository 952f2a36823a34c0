use serde::{Deserialize, Serialize};

use crate::db::types::Permissions;
use crate::schemas::user::UserResponse;

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    pub(crate) login: String,
    pub(crate) password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) token_type: String,
    pub(crate) user: UserResponse,
}

#[derive(Debug, Serialize)]
pub(crate) struct MeResponse {
    pub(crate) id: String,
    pub(crate) login: String,
    pub(crate) full_name: String,
    pub(crate) user_type: crate::db::types::UserType,
    pub(crate) permissions: Permissions,
}
