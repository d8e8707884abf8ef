/*
   Module `ports` specifies the API by which external modules interact with the preview domain.

   All traits are bounded by `Send + Sync + 'static`, since their implementations must be shareable
   between request-handling threads.

   Trait methods are explicitly asynchronous, including `Send` bounds on response types,
   since the application is expected to always run in a multithreaded environment.
*/

use std::future::Future;

use crate::domain::models::*;

/// `PreviewService` is the public API for the preview domain.
///
/// External modules must conform to this contract – the domain is not concerned with the
/// implementation details or underlying technology of any external code.
pub trait PreviewService: Clone + Send + Sync + 'static {
    /// Asynchronously render a new [Preview].
    ///
    /// # Errors
    ///
    /// - [CreatePreviewError::Rejected] if the core rejects the size or style.
    /// - [CreatePreviewError::NoData] if there is nothing to draw around the center.
    fn create_preview(
        &self,
        req: &CreatePreviewRequest,
    ) -> impl Future<Output = Result<Preview, CreatePreviewError>> + Send;
}

/// `PreviewRepository` represents a store of the rendered previews.
pub trait PreviewRepository: Send + Sync + Clone + 'static {
    /// Asynchronously persist a new [Preview].
    fn persist_preview(
        &self,
        req: &CreatePreviewRequest,
        png: Vec<u8>,
    ) -> impl Future<Output = Result<Preview, CreatePreviewError>> + Send;
}

/// `PreviewMetrics` describes an aggregator of preview related metrics, such as a time-series
/// database.
pub trait PreviewMetrics: Send + Sync + Clone + 'static {
    /// Record a successful preview render.
    fn record_preview_success(&self) -> impl Future<Output = ()> + Send;

    /// Record a preview failure.
    fn record_preview_failure(&self) -> impl Future<Output = ()> + Send;
}

/// `PreviewNotifier` triggers notifications once a preview is ready.
pub trait PreviewNotifier: Send + Sync + Clone + 'static {
    fn preview_created(&self, preview: &Preview) -> impl Future<Output = ()> + Send;
}
