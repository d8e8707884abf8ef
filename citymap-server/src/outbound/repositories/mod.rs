use crate::domain::{
    models::{CreatePreviewError, CreatePreviewRequest, Preview},
    ports::PreviewRepository,
};

/// Keeps nothing; every preview only lives for the response that carries it.
#[derive(Debug, Clone)]
pub struct NullRepository;

impl PreviewRepository for NullRepository {
    async fn persist_preview(
        &self,
        req: &CreatePreviewRequest,
        png: Vec<u8>,
    ) -> Result<Preview, CreatePreviewError> {
        let id = uuid::Uuid::new_v4();

        Ok(Preview::new(id, req.clone(), png))
    }
}
