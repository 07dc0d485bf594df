//! Deriving a `did:peer:3` and its document from a `did:peer:2`.

use std::str::FromStr;

use tracing::debug;

use crate::{
	document::Document,
	methods::peer::{DidPeer2, DidPeer3, FromUriError},
	reindex::reindex,
	rewrite::rewrite,
	Did,
};

/// Expands a `did:peer:2` into the document it encodes.
///
/// Decoding the did:peer:2 encoding is not this crate's job. Any
/// `Fn(&DidPeer2) -> Result<Document, E>` can be used as an expander.
pub trait Peer2Expander {
	type Error: std::error::Error + Send + Sync + 'static;

	fn expand(&self, did: &DidPeer2) -> Result<Document, Self::Error>;
}

impl<F, E> Peer2Expander for F
where
	F: Fn(&DidPeer2) -> Result<Document, E>,
	E: std::error::Error + Send + Sync + 'static,
{
	type Error = E;

	fn expand(&self, did: &DidPeer2) -> Result<Document, Self::Error> {
		self(did)
	}
}

/// Derives the `did:peer:3` form of `source`, along with the document of
/// `source` rewritten to refer to the new identifier.
///
/// This is a pure function of `source` and whatever `expander` returns for
/// it; nothing is persisted.
pub fn derive_peer3<E: Peer2Expander>(
	source: &str,
	expander: &E,
) -> Result<(DidPeer3, Document), DeriveError> {
	let peer2 = DidPeer2::from_str(source).map_err(|err| {
		DeriveError::InvalidIdentifierKind {
			did: source.to_owned(),
			source: err,
		}
	})?;
	let peer3 = peer2.to_peer3();

	let doc = expander
		.expand(&peer2)
		.map_err(|err| DeriveError::Expand {
			did: source.to_owned(),
			source: Box::new(err),
		})?;
	match doc.id() {
		Some(id) if id.as_str() == peer2.as_str() => (),
		other => {
			return Err(DeriveError::DocumentMismatch {
				did: source.to_owned(),
				document_id: other.map(|id| id.to_string()),
			})
		}
	}

	let (old, new) = (peer2.uri(), peer3.uri());
	let doc = reindex(rewrite(doc, &old, &new), &old, &new);
	debug!(%peer2, %peer3, indexed = doc.index().len(), "derived did:peer:3");
	Ok((peer3, doc))
}

#[derive(thiserror::Error, Debug)]
pub enum DeriveError {
	#[error("{did} is not a did:peer:2")]
	InvalidIdentifierKind {
		did: String,
		#[source]
		source: FromUriError,
	},
	#[error("failed to expand {did} into a did document")]
	Expand {
		did: String,
		#[source]
		source: Box<dyn std::error::Error + Send + Sync + 'static>,
	},
	#[error("expanded document for {did} has id {document_id:?}")]
	DocumentMismatch {
		did: String,
		document_id: Option<String>,
	},
}
