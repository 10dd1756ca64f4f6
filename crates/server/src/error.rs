use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("carrier error: {0}")]
    Carrier(String),

    #[error("call not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let status: axum::http::StatusCode = (&self).into();
        (status, self.to_string()).into_response()
    }
}

impl From<&ServerError> for axum::http::StatusCode {
    fn from(err: &ServerError) -> Self {
        match err {
            ServerError::Carrier(_) => axum::http::StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
            ServerError::InvalidRequest(_) => axum::http::StatusCode::BAD_REQUEST,
            ServerError::Persistence(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn not_found_maps_to_404() {
        let err = ServerError::NotFound("call-1".to_string());
        assert_eq!(StatusCode::from(&err), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_request_maps_to_400() {
        let err = ServerError::InvalidRequest("bad agent id".to_string());
        assert_eq!(StatusCode::from(&err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn persistence_and_internal_map_to_500() {
        assert_eq!(
            StatusCode::from(&ServerError::Persistence("timeout".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            StatusCode::from(&ServerError::Internal("unreachable".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
