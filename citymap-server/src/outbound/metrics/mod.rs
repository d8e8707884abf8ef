use crate::domain::ports::PreviewMetrics;

#[derive(Debug, Clone)]
pub struct NullMetrics;

impl PreviewMetrics for NullMetrics {
    async fn record_preview_success(&self) {}

    async fn record_preview_failure(&self) {}
}
