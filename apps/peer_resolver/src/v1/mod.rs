//! V1 of the API. This is subject to change until we commit to stability, after
//! which point any breaking changes will go in a V2 api.

use std::{convert::Infallible, sync::Arc};

use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::IntoResponse,
	routing::{get, post},
	Json, Router,
};
use did_peer::{
	derive_peer3, methods::peer::DidPeer2, DeriveError, Document, DocumentError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::{
	resolver::{store_peer3, PeerDid3Resolver, ResolveError, ResolverRegistry},
	storage::{RecordStorage, StorageError},
};

#[derive(Debug, Clone)]
struct RouterState {
	storage: Arc<dyn RecordStorage>,
	registry: Arc<ResolverRegistry>,
}

/// Configuration for the V1 api's router.
#[derive(Debug)]
pub struct RouterConfig {
	pub storage: Arc<dyn RecordStorage>,
}

impl RouterConfig {
	pub async fn build(self) -> color_eyre::Result<Router> {
		let registry = ResolverRegistry::default()
			.with(PeerDid3Resolver::new(Arc::clone(&self.storage)));
		Ok(Router::new()
			.route("/identifiers/:did", get(resolve))
			.route("/peer3", post(create_peer3))
			.with_state(RouterState {
				storage: self.storage,
				registry: Arc::new(registry),
			}))
	}
}

#[derive(thiserror::Error, Debug)]
enum ApiErr {
	#[error(transparent)]
	Resolve(#[from] ResolveError),
	#[error(transparent)]
	Derive(#[from] DeriveError),
	#[error("invalid did document")]
	Document(#[from] DocumentError),
	#[error(transparent)]
	Storage(#[from] StorageError),
}

impl IntoResponse for ApiErr {
	fn into_response(self) -> axum::response::Response {
		let status = match &self {
			Self::Resolve(ResolveError::UnsupportedIdentifierKind(_))
			| Self::Derive(_)
			| Self::Document(_) => StatusCode::BAD_REQUEST,
			Self::Resolve(ResolveError::NotFound(_)) => StatusCode::NOT_FOUND,
			Self::Resolve(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
		};
		if status.is_server_error() {
			error!("{self:?}");
		} else {
			warn!("{self}");
		}
		(status, self.to_string()).into_response()
	}
}

#[tracing::instrument(skip(state))]
#[axum_macros::debug_handler]
async fn resolve(
	State(state): State<RouterState>,
	Path(did): Path<String>,
) -> Result<Json<Value>, ApiErr> {
	Ok(Json(state.registry.resolve(&did).await?))
}

#[derive(Debug, Deserialize)]
struct Peer3Request {
	/// The did:peer:2 to derive from.
	did: String,
	/// Its expanded document.
	document: Value,
}

#[derive(Debug, Serialize)]
struct Peer3Response {
	did: String,
	document: Value,
}

#[tracing::instrument(skip_all)]
#[axum_macros::debug_handler]
async fn create_peer3(
	State(state): State<RouterState>,
	Json(req): Json<Peer3Request>,
) -> Result<Json<Peer3Response>, ApiErr> {
	let supplied = Document::from_value(req.document)?;
	let expand =
		|_: &DidPeer2| -> Result<Document, Infallible> { Ok(supplied.clone()) };
	let (peer3, doc) = derive_peer3(&req.did, &expand)?;
	store_peer3(state.storage.as_ref(), &peer3, &doc).await?;
	info!(peer2 = %req.did, %peer3, "created did:peer:3");

	Ok(Json(Peer3Response {
		did: peer3.to_string(),
		document: doc.to_value(),
	}))
}
