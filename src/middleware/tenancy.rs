// src/middleware/tenancy.rs

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use uuid::Uuid;

use crate::common::error::ApiError;

// O nome do nosso cabeçalho HTTP customizado
const TENANT_ID_HEADER: &str = "x-tenant-id";

/// Tenant da requisição, lido do cabeçalho `x-tenant-id`.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext(pub Uuid);

fn bad_request(message: &str) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        error: message.to_string(),
        details: None,
    }
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(TENANT_ID_HEADER)
            .ok_or_else(|| bad_request("O cabeçalho X-Tenant-ID é obrigatório."))?;

        let value_str = value
            .to_str()
            .map_err(|_| bad_request("Cabeçalho X-Tenant-ID contém caracteres inválidos."))?;

        let tenant_id = Uuid::parse_str(value_str.trim())
            .map_err(|_| bad_request("Cabeçalho X-Tenant-ID inválido (não é um UUID)."))?;

        Ok(TenantContext(tenant_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<TenantContext, ApiError> {
        let mut builder = Request::builder().uri("/api/sla/rules");
        if let Some(value) = header {
            builder = builder.header(TENANT_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        TenantContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_tenant_from_header() {
        let id = Uuid::new_v4();
        let ctx = extract(Some(&id.to_string())).await.unwrap();
        assert_eq!(ctx.0, id);
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_rejected() {
        let missing = extract(None).await.unwrap_err();
        assert_eq!(missing.status, StatusCode::BAD_REQUEST);

        let malformed = extract(Some("loja-1")).await.unwrap_err();
        assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
        assert!(malformed.error.contains("UUID"));
    }
}
