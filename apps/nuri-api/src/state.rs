use std::sync::Arc;

use nuri_service::NuriService;
use nuri_storage::{db::Db, qdrant::QdrantStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<NuriService>,
}
impl AppState {
	pub async fn new(config: nuri_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let qdrant = QdrantStore::new(&config.storage.qdrant)?;
		let service = Arc::new(NuriService::new(config, db, qdrant));

		Ok(Self { service })
	}

	pub fn from_service(service: Arc<NuriService>) -> Self {
		Self { service }
	}
}
