//! Resolving did:peer:3 identifiers from storage.

use std::{str::FromStr, sync::Arc};

use axum::async_trait;
use did_peer::{methods::peer::DidPeer3, Document, DocumentError};
use serde_json::Value;
use tracing::{debug, info};

use crate::storage::{
	Record, RecordStorage, StorageError, TagFilter, RECORD_TYPE_DID_DOCUMENT,
};

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
	#[error("{0} is not supported by any registered resolver")]
	UnsupportedIdentifierKind(String),
	#[error("no did document is stored for {0}")]
	NotFound(String),
	#[error("stored did document for {did} is invalid")]
	InvalidDocument {
		did: String,
		#[source]
		source: DocumentError,
	},
	#[error(transparent)]
	Storage(#[from] StorageError),
}

/// Whether a resolver answers from local state or has to ask someone else.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
pub enum ResolverType {
	Native,
	NonNative,
}

/// Resolves identifiers that start with [`DidResolver::supported_prefix`].
#[async_trait]
pub trait DidResolver: std::fmt::Debug + Send + Sync + 'static {
	fn resolver_type(&self) -> ResolverType;

	fn supported_prefix(&self) -> &'static str;

	fn supports(&self, did: &str) -> bool {
		did.starts_with(self.supported_prefix())
	}

	/// Resolves `did` into its document, as json.
	async fn resolve(&self, did: &str) -> Result<Value, ResolveError>;
}

fn did_filter(did: &DidPeer3) -> TagFilter {
	TagFilter::from([("did".to_owned(), did.as_str().to_owned())])
}

/// Resolves `did:peer:3` identifiers by looking up the document that was
/// stored when the identifier was derived.
#[derive(Debug, Clone)]
pub struct PeerDid3Resolver {
	storage: Arc<dyn RecordStorage>,
}

impl PeerDid3Resolver {
	pub fn new(storage: Arc<dyn RecordStorage>) -> Self {
		Self { storage }
	}

	/// Looks up the stored document for `did`.
	pub async fn resolve_document(
		&self,
		did: &DidPeer3,
	) -> Result<Document, ResolveError> {
		let found = {
			let mut session = self.storage.session().await?;
			session
				.find_record(RECORD_TYPE_DID_DOCUMENT, &did_filter(did))
				.await
		};
		let record = match found {
			Ok(record) => record,
			Err(StorageError::NotFound { .. }) => {
				return Err(ResolveError::NotFound(did.to_string()))
			}
			Err(err) => return Err(err.into()),
		};
		Document::from_json(&record.value).map_err(|source| {
			ResolveError::InvalidDocument {
				did: did.to_string(),
				source,
			}
		})
	}
}

#[async_trait]
impl DidResolver for PeerDid3Resolver {
	fn resolver_type(&self) -> ResolverType {
		ResolverType::Native
	}

	fn supported_prefix(&self) -> &'static str {
		DidPeer3::PREFIX
	}

	/// Only bare did:peer:3 identifiers are accepted. DID urls such as
	/// `did:peer:3z...#key-1` are [`ResolveError::UnsupportedIdentifierKind`].
	#[tracing::instrument(skip(self))]
	async fn resolve(&self, did: &str) -> Result<Value, ResolveError> {
		let did = DidPeer3::from_str(did)
			.map_err(|_| ResolveError::UnsupportedIdentifierKind(did.to_owned()))?;
		let doc = self.resolve_document(&did).await?;
		Ok(doc.to_value())
	}
}

/// Persists `doc` as the document of `did`, so that [`PeerDid3Resolver`] can
/// find it later. Storing the same identifier twice is a no-op, since a
/// did:peer:3 always derives the same document. This holds for concurrent
/// stores as well.
pub async fn store_peer3(
	storage: &dyn RecordStorage,
	did: &DidPeer3,
	doc: &Document,
) -> Result<(), StorageError> {
	let mut session = storage.session().await?;
	let added = session
		.add_record_if_absent(Record {
			record_type: RECORD_TYPE_DID_DOCUMENT.to_owned(),
			value: doc.to_json(),
			tags: did_filter(did),
		})
		.await?;
	if added {
		info!(%did, "stored did document");
	} else {
		debug!(%did, "did document already stored");
	}
	Ok(())
}

/// Dispatches identifiers to the resolvers that support them. Native
/// resolvers are tried before non-native ones, and a resolver that does not
/// know an identifier hands it to the next one.
#[derive(Debug, Default, Clone)]
pub struct ResolverRegistry {
	resolvers: Vec<Arc<dyn DidResolver>>,
}

impl ResolverRegistry {
	pub fn register(&mut self, resolver: impl DidResolver) -> &mut Self {
		self.resolvers.push(Arc::new(resolver));
		// Stable, so registration order is kept within each type.
		self.resolvers
			.sort_by_key(|r| r.resolver_type() != ResolverType::Native);
		self
	}

	pub fn with(mut self, resolver: impl DidResolver) -> Self {
		self.register(resolver);
		self
	}

	pub async fn resolve(&self, did: &str) -> Result<Value, ResolveError> {
		let mut supported = false;
		for resolver in self.resolvers.iter().filter(|r| r.supports(did)) {
			supported = true;
			match resolver.resolve(did).await {
				Err(ResolveError::NotFound(_)) => {
					debug!(did, ?resolver, "not found, trying next resolver")
				}
				other => return other,
			}
		}
		if supported {
			Err(ResolveError::NotFound(did.to_owned()))
		} else {
			Err(ResolveError::UnsupportedIdentifierKind(did.to_owned()))
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	use did_peer::{derive_peer3, methods::peer::DidPeer2};
	use serde_json::json;
	use std::convert::Infallible;

	use crate::storage::{
		test::{sqlite_file_storage, sqlite_storage},
		InMemoryStorage, StorageSession,
	};

	const PEER2: &str = concat!(
		"did:peer:2.Ez6LSbysY2xFMRpGMhb7tFTLMpeuPRaqaWM1yECx2AtzE3KCc",
		".Vz6MkqRYqQiSgvZQdnBytw86Qbs2ZWUkGv22od935YF4s8M7V",
	);

	fn derived() -> (DidPeer3, Document) {
		let expand = |did: &DidPeer2| -> Result<Document, Infallible> {
			Ok(Document::from_value(json!({
				"id": did.as_str(),
				"verificationMethod": [{"id": "#6MkqRYqQ", "controller": did.as_str()}],
			}))
			.unwrap())
		};
		derive_peer3(PEER2, &expand).unwrap()
	}

	async fn check_resolver(storage: Arc<dyn RecordStorage>) {
		let (peer3, doc) = derived();
		let resolver = PeerDid3Resolver::new(Arc::clone(&storage));

		assert!(matches!(
			resolver.resolve(peer3.as_str()).await,
			Err(ResolveError::NotFound(did)) if did == peer3.as_str()
		));

		store_peer3(storage.as_ref(), &peer3, &doc).await.unwrap();
		store_peer3(storage.as_ref(), &peer3, &doc).await.unwrap();

		let resolved = resolver.resolve(peer3.as_str()).await.unwrap();
		assert_eq!(resolved, doc.to_value());
		assert_eq!(resolved["id"], json!(peer3.as_str()));
		assert_eq!(resolver.resolve_document(&peer3).await.unwrap(), doc);
	}

	#[tokio::test]
	async fn test_resolve_in_memory() {
		check_resolver(Arc::new(InMemoryStorage::default())).await;
	}

	#[tokio::test]
	async fn test_resolve_sqlite() {
		check_resolver(Arc::new(sqlite_storage().await)).await;
	}

	#[tokio::test]
	async fn test_rejects_non_peer3() {
		let resolver = PeerDid3Resolver::new(Arc::new(InMemoryStorage::default()));
		for did in [PEER2, "did:peer:3", "did:key:z6Mk", "did:peer:3zabc#key-1"] {
			assert!(
				matches!(
					resolver.resolve(did).await,
					Err(ResolveError::UnsupportedIdentifierKind(d)) if d == did
				),
				"{did} should be unsupported"
			);
		}
	}

	#[tokio::test]
	async fn test_invalid_stored_document() {
		let storage = InMemoryStorage::default();
		let (peer3, _) = derived();
		storage
			.session()
			.await
			.unwrap()
			.add_record(Record {
				record_type: RECORD_TYPE_DID_DOCUMENT.to_owned(),
				value: "not json".to_owned(),
				tags: did_filter(&peer3),
			})
			.await
			.unwrap();
		let resolver = PeerDid3Resolver::new(Arc::new(storage));
		assert!(matches!(
			resolver.resolve(peer3.as_str()).await,
			Err(ResolveError::InvalidDocument { .. })
		));
	}

	#[derive(Debug)]
	struct Fixed(&'static str, ResolverType, Option<Value>);

	#[async_trait]
	impl DidResolver for Fixed {
		fn resolver_type(&self) -> ResolverType {
			self.1
		}

		fn supported_prefix(&self) -> &'static str {
			self.0
		}

		async fn resolve(&self, did: &str) -> Result<Value, ResolveError> {
			self.2
				.clone()
				.ok_or_else(|| ResolveError::NotFound(did.to_owned()))
		}
	}

	#[tokio::test]
	async fn test_registry_dispatch() {
		let registry = ResolverRegistry::default()
			.with(Fixed("did:peer:3", ResolverType::NonNative, Some(json!("remote"))))
			.with(Fixed("did:peer:3", ResolverType::Native, None))
			.with(Fixed("did:peer:2", ResolverType::Native, None));

		// The native resolver misses, so the non-native one answers.
		assert_eq!(
			registry.resolve("did:peer:3zabc").await.unwrap(),
			json!("remote")
		);
		assert!(matches!(
			registry.resolve("did:peer:2.Ez6Mk").await,
			Err(ResolveError::NotFound(_))
		));
		assert!(matches!(
			registry.resolve("did:web:example.com").await,
			Err(ResolveError::UnsupportedIdentifierKind(_))
		));
	}

	#[tokio::test]
	async fn test_concurrent_resolution() {
		let storage: Arc<dyn RecordStorage> = Arc::new(sqlite_storage().await);
		let (peer3, doc) = derived();
		store_peer3(storage.as_ref(), &peer3, &doc).await.unwrap();
		let registry =
			Arc::new(ResolverRegistry::default().with(PeerDid3Resolver::new(storage)));

		let tasks: Vec<_> = (0..8)
			.map(|_| {
				let registry = Arc::clone(&registry);
				let did = peer3.to_string();
				tokio::spawn(async move { registry.resolve(&did).await })
			})
			.collect();
		for task in tasks {
			assert_eq!(task.await.unwrap().unwrap(), doc.to_value());
		}
	}

	async fn check_concurrent_stores(storage: Arc<dyn RecordStorage>) {
		let (peer3, doc) = derived();
		let stores: Vec<_> = (0..8)
			.map(|_| {
				let storage = Arc::clone(&storage);
				let (peer3, doc) = (peer3.clone(), doc.clone());
				tokio::spawn(
					async move { store_peer3(storage.as_ref(), &peer3, &doc).await },
				)
			})
			.collect();
		for store in stores {
			store.await.unwrap().unwrap();
		}

		// A second copy of the record would make every later lookup fail.
		let resolver = PeerDid3Resolver::new(storage);
		assert_eq!(resolver.resolve_document(&peer3).await.unwrap(), doc);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_concurrent_stores_in_memory() {
		check_concurrent_stores(Arc::new(InMemoryStorage::default())).await;
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_concurrent_stores_sqlite() {
		let db = sqlite_file_storage().await;
		check_concurrent_stores(Arc::new(db.storage.clone())).await;
	}
}
