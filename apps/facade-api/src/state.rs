use std::sync::Arc;

use facade_service::FacadeService;

/// Room for multipart framing and the text fields that travel with the photo.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1_024;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<FacadeService>,
}
impl AppState {
	pub async fn new(config: facade_config::Config) -> color_eyre::Result<Self> {
		let service = FacadeService::from_config(config).await?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: FacadeService) -> Self {
		Self { service: Arc::new(service) }
	}

	pub fn body_limit(&self) -> usize {
		let photo_limit = self.service.cfg.service.max_photo_bytes;
		let limit = photo_limit.saturating_add(MULTIPART_OVERHEAD_BYTES);

		usize::try_from(limit).unwrap_or(usize::MAX)
	}
}
