pub mod resolver;
pub mod storage;
pub mod v1;

use axum::routing::get;
use color_eyre::eyre::Context as _;
use tower_http::trace::TraceLayer;

pub use crate::storage::MigratedDbPool;

/// Main router of API
#[derive(Debug)]
pub struct RouterConfig {
	pub v1: crate::v1::RouterConfig,
}

impl RouterConfig {
	pub async fn build(self) -> color_eyre::Result<axum::Router<()>> {
		let v1 = self
			.v1
			.build()
			.await
			.wrap_err("failed to build v1 router")?;
		Ok(axum::Router::new()
			.route("/", get(root))
			.nest("/api/v1", v1)
			.layer(TraceLayer::new_for_http()))
	}
}

async fn root() -> &'static str {
	"did:peer:3 resolver. see /api/v1/identifiers/{did}"
}
