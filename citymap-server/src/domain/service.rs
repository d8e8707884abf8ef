/*!
   Module `service` provides the canonical implementation of the [PreviewService] port.
*/

use citymap_core::{CitymapError, CitymapRequest, GeometrySource, MapLayer, create_map_layer};

use std::sync::Arc;

use anyhow::Context;

use super::{
    models::{CreatePreviewError, CreatePreviewRequest, Preview},
    ports::{PreviewMetrics, PreviewNotifier, PreviewRepository, PreviewService},
};

/// Geometry shared by every request the server handles.
pub type SharedSource = Arc<dyn GeometrySource + Send + Sync>;

/// Canonical implementation of the [PreviewService] port, through which the preview domain API
/// is consumed.
#[derive(Clone)]
pub struct Service<R, M, N>
where
    R: PreviewRepository,
    M: PreviewMetrics,
    N: PreviewNotifier,
{
    source: SharedSource,
    preview_dpi: u32,
    repository: R,
    metrics: M,
    notifier: N,
}

impl<R, M, N> Service<R, M, N>
where
    R: PreviewRepository,
    M: PreviewMetrics,
    N: PreviewNotifier,
{
    pub fn new(source: SharedSource, preview_dpi: u32, repo: R, metrics: M, notifier: N) -> Self {
        Self {
            source,
            preview_dpi,
            repository: repo,
            metrics,
            notifier,
        }
    }

    async fn render(&self, req: &CreatePreviewRequest) -> Result<Vec<u8>, CreatePreviewError> {
        let source = Arc::clone(&self.source);
        let request = CitymapRequest {
            style: req.style(),
            seed: req.seed(),
            ..CitymapRequest::new(req.center(), req.size_request(self.preview_dpi))
        };

        // Rendering is CPU bound, keep it off the async workers.
        tokio::task::spawn_blocking(move || -> Result<Vec<u8>, CreatePreviewError> {
            let MapLayer { layer, warnings } = create_map_layer(&request, source.as_ref())?;

            if !warnings.is_empty() {
                tracing::debug!("Preview dropped {} polygons", warnings.len());
            }

            Ok(layer.to_png().map_err(CitymapError::from)?)
        })
        .await
        .context("preview render task failed")?
    }
}

impl<R, M, N> PreviewService for Service<R, M, N>
where
    R: PreviewRepository,
    M: PreviewMetrics,
    N: PreviewNotifier,
{
    /// Render the [Preview] specified in `req` and trigger notifications.
    ///
    /// # Errors
    ///
    /// - Propagates any [CreatePreviewError] from the core or the [PreviewRepository].
    async fn create_preview(&self, req: &CreatePreviewRequest) -> Result<Preview, CreatePreviewError> {
        let result = match self.render(req).await {
            Ok(png) => self.repository.persist_preview(req, png).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(ref preview) => {
                self.metrics.record_preview_success().await;
                self.notifier.preview_created(preview).await;
            }
            Err(_) => self.metrics.record_preview_failure().await,
        }

        result
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        domain::models::{Center, Extent, SizeKey},
        outbound::{metrics::NullMetrics, notifiers::NullNotifier, repositories::NullRepository},
    };

    use citymap_core::{
        GeoPoint, MapStyle,
        source::{MemorySource, RawEdge},
    };

    // Two crossing avenues through the center, a few hundred meters long.
    fn source() -> SharedSource {
        let edges = vec![
            RawEdge::new(
                "primary",
                vec![GeoPoint::new(47.4979, 19.0350), GeoPoint::new(47.4979, 19.0450)],
            ),
            RawEdge::new(
                "residential",
                vec![GeoPoint::new(47.4940, 19.0402), GeoPoint::new(47.5020, 19.0402)],
            ),
        ];

        Arc::new(MemorySource::new(edges, vec![]))
    }

    fn service() -> Service<NullRepository, NullMetrics, NullNotifier> {
        Service::new(source(), 10, NullRepository, NullMetrics, NullNotifier)
    }

    fn request(lat: f64, lon: f64) -> CreatePreviewRequest {
        CreatePreviewRequest::new(
            Center::new(lat, lon).unwrap(),
            SizeKey::new("30x40").unwrap(),
            Extent::new(200.0).unwrap(),
            MapStyle::BlackMinimal,
            7,
        )
    }

    #[tokio::test]
    async fn previews_are_png_images() {
        let preview = service()
            .create_preview(&request(47.4979, 19.0402))
            .await
            .unwrap();

        assert_eq!(&preview.png()[..4], b"\x89PNG");
        assert_eq!(preview.request().size_key().as_str(), "30x40");
    }

    #[tokio::test]
    async fn empty_areas_are_no_data() {
        let err = service()
            .create_preview(&request(-40.0, -20.0))
            .await
            .unwrap_err();

        assert!(matches!(err, CreatePreviewError::NoData(_)));
    }
}
