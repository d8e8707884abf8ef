use crate::domain::models::CreatePreviewError;

use axum::{
    Json,
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

const PREVIEW_ID_HEADER: HeaderName = HeaderName::from_static("x-citymap-preview-id");

#[derive(Debug, Clone)]
pub struct ApiSuccess<T: Serialize + PartialEq>(StatusCode, Json<ApiResponseBody<T>>);

impl<T> PartialEq for ApiSuccess<T>
where
    T: Serialize + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 && self.1.0 == other.1.0
    }
}

impl<T: Serialize + PartialEq> ApiSuccess<T> {
    pub(super) fn new(status: StatusCode, data: T) -> Self {
        ApiSuccess(status, Json(ApiResponseBody::new(status, data)))
    }
}

impl<T: Serialize + PartialEq> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

/// A rendered PNG returned as the raw response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPng {
    status: StatusCode,
    id: String,
    png: Vec<u8>,
}

impl ApiPng {
    pub(super) fn new(status: StatusCode, id: String, png: Vec<u8>) -> Self {
        ApiPng { status, id, png }
    }
}

impl IntoResponse for ApiPng {
    fn into_response(self) -> Response {
        (
            self.status,
            [
                (header::CONTENT_TYPE, "image/png".to_string()),
                (PREVIEW_ID_HEADER, self.id),
            ],
            self.png,
        )
            .into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    InternalServerError(String),
    UnprocessableEntity(String),
    NotFound(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::InternalServerError(e.to_string())
    }
}

impl From<CreatePreviewError> for ApiError {
    fn from(e: CreatePreviewError) -> Self {
        match e {
            CreatePreviewError::Rejected(message) => Self::UnprocessableEntity(message),
            CreatePreviewError::NoData(message) => Self::NotFound(message),
            CreatePreviewError::Unknown(cause) => {
                tracing::error!("{:?}", cause);
                Self::InternalServerError("Internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use ApiError::*;

        match self {
            InternalServerError(e) => {
                tracing::error!("{}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponseBody::new_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )),
                )
                    .into_response()
            }
            UnprocessableEntity(message) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiResponseBody::new_error(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    message,
                )),
            )
                .into_response(),
            NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(ApiResponseBody::new_error(StatusCode::NOT_FOUND, message)),
            )
                .into_response(),
        }
    }
}

/// Generic response structure shared by all JSON API responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponseBody<T: Serialize + PartialEq> {
    status_code: u16,
    data: T,
}

impl<T: Serialize + PartialEq> ApiResponseBody<T> {
    pub fn new(status_code: StatusCode, data: T) -> Self {
        Self {
            status_code: status_code.as_u16(),
            data,
        }
    }
}

impl ApiResponseBody<ApiErrorData> {
    pub fn new_error(status_code: StatusCode, message: String) -> Self {
        Self {
            status_code: status_code.as_u16(),
            data: ApiErrorData { message },
        }
    }
}

/// The response data format for all error responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiErrorData {
    pub message: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn png_responses_carry_the_preview_id() {
        let response =
            ApiPng::new(StatusCode::CREATED, "abc".to_string(), vec![0x89, b'P']).into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(response.headers()[PREVIEW_ID_HEADER], "abc");
    }

    #[test]
    fn domain_errors_pick_the_status() {
        let rejected = ApiError::from(CreatePreviewError::Rejected("too small".to_string()));
        assert_eq!(rejected.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);

        let no_data = ApiError::from(CreatePreviewError::NoData("open ocean".to_string()));
        assert_eq!(no_data.into_response().status(), StatusCode::NOT_FOUND);

        let unknown = ApiError::from(CreatePreviewError::Unknown(anyhow::anyhow!("boom")));
        assert_eq!(
            unknown,
            ApiError::InternalServerError("Internal server error".to_string())
        );
    }
}
