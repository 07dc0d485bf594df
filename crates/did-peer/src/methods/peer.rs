//! The two numeric algorithms of the [did:peer] method that this crate deals
//! with.
//!
//! `did:peer:2` carries its whole document inside the identifier, which makes
//! it long and awkward to store. `did:peer:3` shortens it to a SHA-256 hash of
//! everything after the `did:peer:2` prefix, at the cost of needing to keep the
//! document around somewhere in order to dereference it.
//!
//! [did:peer]: https://identity.foundation/peer-did-method-spec/

use std::{fmt::Display, str::FromStr};

use crate::{
	multibase::{
		decode_base58btc, encode_content_hash, MultibaseDecodeError, DIGEST_LEN,
	},
	uri::{DidMethod, DidUri, ParseError},
	utf8bytes::Utf8Bytes,
	Did,
};

/// A `did:peer:2` identifier. See the [module](self) docs for more info.
#[derive(Debug, Eq, PartialEq, Hash, Clone)]
pub struct DidPeer2(DidUri);

impl DidPeer2 {
	pub const PREFIX: &'static str = "did:peer:2";

	/// Gets the buffer representing the did:peer:2 uri as a str.
	pub fn as_str(&self) -> &str {
		self.0.as_str()
	}

	/// Gets the buffer representing the did:peer:2 uri as a reference counted
	/// slice that is guaranteed to be utf8.
	pub fn as_utf8_bytes(&self) -> &Utf8Bytes {
		self.0.utf8_bytes()
	}

	/// Everything after [`Self::PREFIX`]. This is what gets hashed into the
	/// corresponding did:peer:3.
	pub fn content(&self) -> &str {
		&self.as_str()[Self::PREFIX.len()..]
	}

	/// Computes the shortened `did:peer:3` form of this identifier.
	pub fn to_peer3(&self) -> DidPeer3 {
		let encoded = encode_content_hash(self.content().as_bytes());
		let s = format!("{}{encoded}", DidPeer3::PREFIX);
		let uri = DidUri::try_from(s)
			.expect("hash is always a valid method-specific-id");
		DidPeer3(uri)
	}
}

/// A `did:peer:3` identifier. See the [module](self) docs for more info.
#[derive(Debug, Eq, PartialEq, Hash, Clone)]
pub struct DidPeer3(DidUri);

impl DidPeer3 {
	pub const PREFIX: &'static str = "did:peer:3";

	/// Gets the buffer representing the did:peer:3 uri as a str.
	pub fn as_str(&self) -> &str {
		self.0.as_str()
	}

	/// Gets the buffer representing the did:peer:3 uri as a reference counted
	/// slice that is guaranteed to be utf8.
	pub fn as_utf8_bytes(&self) -> &Utf8Bytes {
		self.0.utf8_bytes()
	}

	/// Everything after [`Self::PREFIX`], i.e. the multibase encoded hash.
	pub fn content(&self) -> &str {
		&self.as_str()[Self::PREFIX.len()..]
	}

	/// Decodes the SHA-256 digest of the did:peer:2 this was derived from.
	///
	/// Resolution only needs the prefix to match, so this is not checked
	/// when parsing.
	pub fn decode_digest(&self) -> Result<[u8; DIGEST_LEN], MultibaseDecodeError> {
		let mut buf = Vec::with_capacity(DIGEST_LEN);
		decode_base58btc(self.content(), &mut buf)?;
		buf.try_into()
			.map_err(|buf: Vec<u8>| MultibaseDecodeError::WrongLength(buf.len()))
	}
}

fn check_numalgo(uri: &DidUri, prefix: &str) -> Result<(), FromUriError> {
	let m = uri.method();
	if m != DidMethod::Peer {
		return Err(FromUriError::WrongMethod(m));
	}
	let s = uri.as_str();
	if !s.starts_with(prefix) {
		return Err(FromUriError::WrongNumalgo(uri.to_string()));
	}
	if s.len() == prefix.len() {
		return Err(FromUriError::MissingContent(uri.to_string()));
	}
	Ok(())
}

impl TryFrom<DidUri> for DidPeer2 {
	type Error = FromUriError;

	fn try_from(value: DidUri) -> Result<Self, Self::Error> {
		check_numalgo(&value, Self::PREFIX)?;
		Ok(Self(value))
	}
}

impl TryFrom<DidUri> for DidPeer3 {
	type Error = FromUriError;

	fn try_from(value: DidUri) -> Result<Self, Self::Error> {
		check_numalgo(&value, Self::PREFIX)?;
		Ok(Self(value))
	}
}

impl FromStr for DidPeer2 {
	type Err = FromUriError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::try_from(DidUri::from_str(s)?)
	}
}

impl FromStr for DidPeer3 {
	type Err = FromUriError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::try_from(DidUri::from_str(s)?)
	}
}

impl Did for DidPeer2 {
	fn uri(&self) -> DidUri {
		self.0.clone()
	}
}

impl Did for DidPeer3 {
	fn uri(&self) -> DidUri {
		self.0.clone()
	}
}

impl Display for DidPeer2 {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.as_str().fmt(f)
	}
}

impl Display for DidPeer3 {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.as_str().fmt(f)
	}
}

#[derive(thiserror::Error, Debug)]
pub enum FromUriError {
	#[error("Expected \"peer\" method but got {0:?}")]
	WrongMethod(DidMethod),
	#[error("{0} does not use the expected did:peer numalgo")]
	WrongNumalgo(String),
	#[error("{0} has no content after the numalgo")]
	MissingContent(String),
	#[error(transparent)]
	Parse(#[from] ParseError),
}
