use crate::domain::{models::Preview, ports::PreviewNotifier};

/// Logs created previews instead of notifying anyone.
#[derive(Debug, Clone)]
pub struct NullNotifier;

impl PreviewNotifier for NullNotifier {
    async fn preview_created(&self, preview: &Preview) {
        tracing::debug!(
            "Preview {} created ({} bytes)",
            preview.id(),
            preview.png().len()
        );
    }
}
