//! Shortening [did:peer] identifiers.
//!
//! A `did:peer:2` is handed out while setting up a connection. It carries its
//! entire DID document inline, encoded into the identifier itself, so it can
//! be resolved without talking to anybody. The downside is that it is long.
//!
//! A `did:peer:3` is the SHA-256 hash of a `did:peer:2`. It is short and
//! stable, but it can only be dereferenced by whoever stored the document of
//! the `did:peer:2` it came from. This crate computes that hash, and rewrites
//! the `did:peer:2` document so that every self-reference points at the new
//! `did:peer:3` instead:
//!
//! ```
//! use did_peer::{derive_peer3, methods::peer::DidPeer2, Document};
//!
//! let expand = |did: &DidPeer2| {
//! 	Document::from_value(serde_json::json!({
//! 		"id": did.as_str(),
//! 		"verificationMethod": [{"id": format!("{did}#key-1")}],
//! 	}))
//! };
//! let (peer3, doc) = derive_peer3("did:peer:2.Ez6MkSoAqpnzbHCs", &expand).unwrap();
//! assert!(peer3.as_str().starts_with("did:peer:3z"));
//! assert!(doc.dereference(&format!("{peer3}#key-1")).is_some());
//! ```
//!
//! [did:peer]: https://identity.foundation/peer-did-method-spec/

#![forbid(unsafe_code)]

use std::str::FromStr;

pub mod derive;
pub mod document;
pub mod methods;
pub mod multibase;
pub mod reindex;
pub mod rewrite;
pub mod uri;
pub mod url;
pub mod utf8bytes;

pub use crate::derive::{derive_peer3, DeriveError, Peer2Expander};
pub use crate::document::{Document, DocumentError, Index, Node};
pub use crate::reindex::reindex;
pub use crate::rewrite::rewrite;

pub trait Did: FromStr {
	fn uri(&self) -> self::uri::DidUri;
}
