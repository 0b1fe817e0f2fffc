use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

use crate::domain::order::OrderError;

impl ResponseError for OrderError {
    fn status_code(&self) -> StatusCode {
        match self {
            OrderError::Validation(_) => StatusCode::BAD_REQUEST,
            OrderError::NotFound(_) => StatusCode::NOT_FOUND,
            OrderError::InvalidStatusTransition { .. } | OrderError::ConcurrentModification(_) => {
                StatusCode::CONFLICT
            }
            OrderError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            OrderError::Validation(errors) => {
                let fields: Vec<_> = errors
                    .violations()
                    .iter()
                    .map(|v| json!({ "field": v.field, "message": v.kind.to_string() }))
                    .collect();
                json!({ "error": self.to_string(), "fields": fields })
            }
            // Detail is already in the logs
            OrderError::Storage(_) => json!({ "error": "Internal server error" }),
            other => json!({ "error": other.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
