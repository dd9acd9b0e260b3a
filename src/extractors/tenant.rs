//! Request context from headers: `X-Tenant-ID` (required), `X-User-Id` and `X-Username`.

use crate::error::AppError;
use crate::service::RequestContext;
use crate::tenant::Tenant;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

pub const TENANT_ID_HEADER: &str = "X-Tenant-ID";
pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USERNAME_HEADER: &str = "X-Username";

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant: Tenant = header(parts, TENANT_ID_HEADER)
            .ok_or_else(|| AppError::BadRequest(format!("missing {} header", TENANT_ID_HEADER)))?
            .parse()?;
        let ctx = RequestContext::new(tenant);
        Ok(match header(parts, USER_ID_HEADER) {
            Some(user_id) => ctx.with_user(user_id, header(parts, USERNAME_HEADER)),
            None => ctx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Result<RequestContext, AppError> {
        let (mut parts, _) = req.into_parts();
        RequestContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_tenant_and_user() {
        let req = Request::builder()
            .header(TENANT_ID_HEADER, "Diku")
            .header(USER_ID_HEADER, "u1")
            .header(USERNAME_HEADER, "admin")
            .body(())
            .unwrap();
        let ctx = extract(req).await.unwrap();
        assert_eq!(ctx.tenant.as_str(), "diku");
        assert_eq!(ctx.user_id.as_deref(), Some("u1"));
        assert_eq!(ctx.username.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn missing_or_invalid_tenant_is_bad_request() {
        let err = extract(Request::builder().body(()).unwrap()).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let req = Request::builder().header(TENANT_ID_HEADER, "a;b").body(()).unwrap();
        assert!(matches!(extract(req).await.unwrap_err(), AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn user_is_optional() {
        let req = Request::builder().header(TENANT_ID_HEADER, "diku").body(()).unwrap();
        let ctx = extract(req).await.unwrap();
        assert!(ctx.user_id.is_none());
    }
}
