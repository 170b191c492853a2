use std::sync::Arc;

use matcher_service::MatcherService;
use matcher_storage::{PgRoundStore, RoundStore, db::Db};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<MatcherService>,
}
impl AppState {
	pub async fn new(config: matcher_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let store: Arc<dyn RoundStore> = Arc::new(PgRoundStore::new(db));

		Ok(Self::with_store(config, store))
	}

	pub fn with_store(config: matcher_config::Config, store: Arc<dyn RoundStore>) -> Self {
		Self { service: Arc::new(MatcherService::new(config, store)) }
	}
}
