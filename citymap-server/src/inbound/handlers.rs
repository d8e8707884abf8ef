use super::api::{ApiError, ApiPng, ApiSuccess};
use crate::domain::models::{
    Center, CreatePreviewRequest, Extent, ExtentMustBePositiveError, InvalidCenterError,
    MapStyleNotKnownError, SizeKey, SizeKeyNotKnownError,
};
use crate::domain::ports::PreviewService;
use crate::inbound::AppState;

use citymap_core::MapStyle;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleData {
    name: &'static str,
    identity: String,
}

/// The response body data field for the style listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListStylesResponseData {
    styles: Vec<StyleData>,
}

#[derive(Debug, Clone, Error)]
pub(super) enum ParseCreatePreviewHttpRequestError {
    #[error(transparent)]
    Center(#[from] InvalidCenterError),
    #[error(transparent)]
    SizeKey(#[from] SizeKeyNotKnownError),
    #[error(transparent)]
    Extent(#[from] ExtentMustBePositiveError),
    #[error(transparent)]
    Style(#[from] MapStyleNotKnownError),
}

impl From<ParseCreatePreviewHttpRequestError> for ApiError {
    fn from(e: ParseCreatePreviewHttpRequestError) -> Self {
        ApiError::UnprocessableEntity(e.to_string())
    }
}

/// The body of a preview request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatePreviewHttpRequestBody {
    lat: f64,
    lon: f64,
    size_key: String,
    extent_m: f64,
    style: String,
    #[serde(default)]
    seed: Option<u64>,
}

impl CreatePreviewHttpRequestBody {
    /// Converts the HTTP request body into a domain request.
    fn try_into_domain(self) -> Result<CreatePreviewRequest, ParseCreatePreviewHttpRequestError> {
        let center = Center::new(self.lat, self.lon)?;
        let size_key = SizeKey::new(&self.size_key)?;
        let extent = Extent::new(self.extent_m)?;
        let style = MapStyle::try_from_str(&self.style).map_err(|_| MapStyleNotKnownError)?;

        Ok(CreatePreviewRequest::new(
            center,
            size_key,
            extent,
            style,
            self.seed.unwrap_or_default(),
        ))
    }
}

/// Render a low resolution preview of a map layer.
///
/// # Responses
///
/// - 201 Created: the PNG body, with the preview id in the `x-citymap-preview-id` header.
/// - 404 Not found: the requested area has no map data.
/// - 422 Unprocessable entity: the request had invalid parameters.
pub(super) async fn create_preview_handler<PS: PreviewService>(
    State(state): State<AppState<PS>>,
    Json(body): Json<CreatePreviewHttpRequestBody>,
) -> Result<ApiPng, ApiError> {
    let domain_req = body.try_into_domain()?;
    state
        .preview_service
        .create_preview(&domain_req)
        .await
        .map_err(ApiError::from)
        .map(|preview| {
            ApiPng::new(
                StatusCode::CREATED,
                preview.id().to_string(),
                preview.png().to_vec(),
            )
        })
}

/// List the available styles.
pub(super) async fn list_styles_handler() -> ApiSuccess<ListStylesResponseData> {
    let styles = MapStyle::ALL
        .iter()
        .map(|style| {
            let config = style.config();
            StyleData {
                name: config.name,
                identity: config.identity(),
            }
        })
        .collect();

    ApiSuccess::new(StatusCode::OK, ListStylesResponseData { styles })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::domain::models::{CreatePreviewError, Preview};

    use std::sync::Arc;

    use axum::response::IntoResponse;
    use uuid::Uuid;

    #[derive(Clone)]
    struct StubService {
        result: Arc<dyn Fn() -> Result<Vec<u8>, CreatePreviewError> + Send + Sync>,
    }

    impl PreviewService for StubService {
        async fn create_preview(
            &self,
            req: &CreatePreviewRequest,
        ) -> Result<Preview, CreatePreviewError> {
            (self.result)().map(|png| Preview::new(Uuid::nil(), req.clone(), png))
        }
    }

    fn state(
        result: impl Fn() -> Result<Vec<u8>, CreatePreviewError> + Send + Sync + 'static,
    ) -> State<AppState<StubService>> {
        State(AppState {
            preview_service: Arc::new(StubService {
                result: Arc::new(result),
            }),
        })
    }

    fn body() -> CreatePreviewHttpRequestBody {
        CreatePreviewHttpRequestBody {
            lat: 47.4979,
            lon: 19.0402,
            size_key: "50x70".to_string(),
            extent_m: 3000.0,
            style: "urban-modern".to_string(),
            seed: Some(42),
        }
    }

    #[test]
    fn bodies_convert_to_domain_requests() {
        let req = body().try_into_domain().unwrap();

        assert_eq!(req.style(), MapStyle::UrbanModern);
        assert_eq!(req.seed(), 42);
        assert_eq!(req.size_key().as_str(), "50x70");

        let no_seed = CreatePreviewHttpRequestBody { seed: None, ..body() };
        assert_eq!(no_seed.try_into_domain().unwrap().seed(), 0);
    }

    #[test]
    fn invalid_bodies_are_rejected() {
        let cases = [
            CreatePreviewHttpRequestBody { lat: 91.0, ..body() },
            CreatePreviewHttpRequestBody {
                size_key: "A7".to_string(),
                ..body()
            },
            CreatePreviewHttpRequestBody {
                extent_m: -1.0,
                ..body()
            },
            CreatePreviewHttpRequestBody {
                style: "neon".to_string(),
                ..body()
            },
        ];

        for case in cases {
            assert!(case.try_into_domain().is_err());
        }
    }

    #[tokio::test]
    async fn previews_are_created() {
        let response = create_preview_handler(state(|| Ok(b"\x89PNG".to_vec())), Json(body()))
            .await
            .unwrap();

        assert_eq!(
            response,
            ApiPng::new(
                StatusCode::CREATED,
                Uuid::nil().to_string(),
                b"\x89PNG".to_vec()
            )
        );
    }

    #[tokio::test]
    async fn missing_data_is_not_found() {
        let err = create_preview_handler(
            state(|| Err(CreatePreviewError::NoData("empty".to_string()))),
            Json(body()),
        )
        .await
        .unwrap_err();

        assert_eq!(err, ApiError::NotFound("empty".to_string()));
    }

    #[tokio::test]
    async fn styles_are_listed() {
        let response = list_styles_handler().await.into_response();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
