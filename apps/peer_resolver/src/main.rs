use std::{
	net::{Ipv6Addr, SocketAddr},
	path::PathBuf,
	sync::Arc,
};

use clap::Parser as _;
use color_eyre::eyre::Context as _;
use peer_resolver::{storage::SqliteStorage, MigratedDbPool};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(clap::Parser, Debug)]
struct Cli {
	#[clap(long, short, default_value = "0")]
	port: u16,
	/// Where derived did:peer:3 documents are kept.
	#[clap(long, env, default_value = "peer_dids.db")]
	db_path: PathBuf,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or("info".into()))
		.with(tracing_subscriber::fmt::layer())
		.init();

	let cli = Cli::parse();

	let db_pool = {
		let connect_opts = sqlx::sqlite::SqliteConnectOptions::new()
			.create_if_missing(true)
			.filename(&cli.db_path);
		let pool_opts = sqlx::sqlite::SqlitePoolOptions::new();
		let pool = pool_opts
			.connect_with(connect_opts.clone())
			.await
			.wrap_err_with(|| {
				format!(
					"failed to connect to database with path {}",
					connect_opts.get_filename().display()
				)
			})?;
		MigratedDbPool::new(pool)
			.await
			.wrap_err("failed to migrate db pool")?
	};

	let router = peer_resolver::RouterConfig {
		v1: peer_resolver::v1::RouterConfig {
			storage: Arc::new(SqliteStorage::new(db_pool)),
		},
	}
	.build()
	.await
	.wrap_err("failed to build router")?;

	let listener = tokio::net::TcpListener::bind(SocketAddr::new(
		Ipv6Addr::UNSPECIFIED.into(),
		cli.port,
	))
	.await
	.wrap_err("failed to bind listener")?;
	info!("listening on {}", listener.local_addr()?);
	axum::serve(listener, router).await.map_err(|e| e.into())
}
