//! 会话上下文查询

use crate::{
    auth::middleware::AuthContext, error::AppError, middleware::AppState,
    models::auth::SessionContextQuery,
};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

/// `GET /api/session/context?user=&company=`
///
/// 查询自己的上下文无需额外权限，查询他人需要 `read:sessions`
pub async fn get_context(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Query(query): Query<SessionContextQuery>,
) -> Result<impl IntoResponse, AppError> {
    if query.user != auth_context.user_id {
        auth_context.require("read:sessions")?;
    }

    let context = state.auth_service.me(query.user, query.company).await?;
    Ok(Json(context))
}
