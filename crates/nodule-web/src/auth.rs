//! 用户登录

use axum::{extract::State, response::Json};
use nodule_core::{NewActivityLog, NoduleError, User, UserStatus};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::ApiResult;
use crate::state::AppState;

/// 登录请求
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// 登录成功后返回给前端的用户信息
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub specialization: Option<String>,
    pub department: Option<String>,
    pub hospital: Option<String>,
    pub license_number: Option<String>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.full_name(),
            role: user.role.as_str().to_string(),
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            specialization: user.specialization,
            department: user.department,
            hospital: user.hospital,
            license_number: user.license_number,
        }
    }
}

/// 登录处理器：校验用户名、密码和账户状态
pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let queries = state.queries();

    let credentials = match queries.get_user_credentials(&request.username).await? {
        Some(credentials) => credentials,
        None => {
            warn!("Login failed: unknown user {}", request.username);
            return Err(NoduleError::Unauthorized("User not found".to_string()).into());
        }
    };

    if credentials.password != request.password {
        warn!("Login failed: wrong password for {}", request.username);
        return Err(NoduleError::Unauthorized("Invalid password".to_string()).into());
    }

    if credentials.user.status != UserStatus::Active {
        warn!("Login failed: inactive account {}", request.username);
        return Err(NoduleError::Unauthorized("Account is inactive".to_string()).into());
    }

    let user = credentials.user;
    queries.update_user_last_login(user.id).await?;
    queries
        .create_activity_log(&NewActivityLog {
            user_id: Some(user.id),
            username: Some(user.username.clone()),
            action: "Logged into system".to_string(),
            action_type: "login".to_string(),
            details: None,
        })
        .await?;

    info!("User {} logged in", user.username);
    Ok(Json(json!({ "success": true, "user": UserInfo::from(user) })))
}
