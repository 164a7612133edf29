use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

// Erro único dos serviços e repositórios.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Lead não encontrado")]
    LeadNotFound,

    #[error("Vendedor não encontrado")]
    SalesmanNotFound,

    #[error("Regra de SLA não encontrada")]
    SlaRuleNotFound,

    #[error("O responsável do lead mudou durante a operação; tente novamente")]
    AssignmentConflict,

    #[error("Falha no gateway de IA: {0}")]
    AiGatewayError(String),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::LeadNotFound | AppError::SalesmanNotFound | AppError::SlaRuleNotFound => {
                StatusCode::NOT_FOUND
            }
            AppError::AssignmentConflict => StatusCode::CONFLICT,
            AppError::AiGatewayError(_) => StatusCode::BAD_GATEWAY,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// Rejeição dos extratores customizados (ex.: cabeçalho do tenant).
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = err.status();
        match err {
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), json!(messages));
                }
                ApiError {
                    status,
                    error: "Um ou mais campos são inválidos.".to_string(),
                    details: Some(Value::Object(details)),
                }
            }
            AppError::AiGatewayError(ref reason) => {
                tracing::error!(reason = %reason, "Gateway de IA indisponível");
                ApiError {
                    status,
                    error: "O serviço de IA está indisponível.".to_string(),
                    details: None,
                }
            }
            // Erros de banco e internos viram 500; o detalhe fica só no log.
            ref e if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!("Erro Interno do Servidor: {:?}", e);
                ApiError {
                    status,
                    error: "Ocorreu um erro inesperado.".to_string(),
                    details: None,
                }
            }
            other => ApiError {
                status,
                error: other.to_string(),
                details: None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
