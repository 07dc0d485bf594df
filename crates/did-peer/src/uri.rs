use std::{fmt::Display, str::FromStr};

use bytes::Bytes;

use crate::utf8bytes::Utf8Bytes;

#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
pub enum DidMethod {
	Peer,
}

impl DidMethod {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Peer => "peer",
		}
	}
}

impl FromStr for DidMethod {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s {
			"peer" => Self::Peer,
			"" => return Err(ParseError::MissingMethod),
			_ => return Err(ParseError::UnknownMethod),
		})
	}
}

/// Splits `did:<method>:` off of `s`, returning the method and the byte
/// offset where the method-specific-id starts.
pub(crate) fn parse_prefix(s: &str) -> Result<(DidMethod, usize), ParseError> {
	let (method, remaining) = s
		.strip_prefix("did:")
		.ok_or(ParseError::InvalidScheme)?
		.split_once(':')
		.ok_or(ParseError::MissingMethod)?;
	let method = DidMethod::from_str(method)?;
	Ok((method, s.len() - remaining.len()))
}

pub(crate) fn is_url_delimiter(c: char) -> bool {
	matches!(c, '/' | '?' | '#')
}

fn parse(s: &str) -> Result<(DidMethod, usize), ParseError> {
	let (method, start_idx) = parse_prefix(s)?;
	let msid = &s[start_idx..];
	if msid.is_empty() {
		return Err(ParseError::MissingMethodSpecificId);
	}
	if msid.contains(is_url_delimiter) {
		return Err(ParseError::UrlComponents);
	}
	Ok((method, start_idx))
}

/// Helper type to access data in the method-specific-id of a [`DidUri`].
pub struct MethodSpecificId<'a>(&'a DidUri);

impl MethodSpecificId<'_> {
	pub fn as_str(&self) -> &str {
		&(self.0.as_str()[self.0.method_specific_id.clone()])
	}

	pub fn as_slice(&self) -> &[u8] {
		&(self.0.s.as_slice()[self.0.method_specific_id.clone()])
	}

	pub fn utf8_bytes(&self) -> Utf8Bytes {
		self.0.s.slice_from(self.0.method_specific_id.start)
	}
}

/// A bare Decentralized Identifier: no path, query or fragment.
#[derive(Debug, Eq, PartialEq, Hash, Clone)]
pub struct DidUri {
	method: DidMethod,
	/// The string representation of the DID.
	s: Utf8Bytes,
	/// The substring for method-specific-id. This is a range index into `s`.
	method_specific_id: std::ops::RangeFrom<usize>,
}

impl DidUri {
	/// Gets the buffer representing the uri as a str.
	pub fn as_str(&self) -> &str {
		self.s.as_str()
	}

	/// Gets the buffer representing the uri as a byte slice.
	pub fn as_slice(&self) -> &[u8] {
		self.s.as_slice()
	}

	/// Gets the buffer representing the uri as a byte slice that is guaranteed
	/// to be utf8.
	pub fn utf8_bytes(&self) -> &Utf8Bytes {
		&self.s
	}

	/// Gets the buffer representing the uri as bytes.
	pub fn bytes(&self) -> &Bytes {
		self.s.bytes()
	}

	/// The method of the did.
	pub fn method(&self) -> DidMethod {
		self.method
	}

	/// Method-specific identity info.
	pub fn method_specific_id(&self) -> MethodSpecificId {
		MethodSpecificId(self)
	}

	pub fn into_inner(self) -> Utf8Bytes {
		self.s
	}
}

impl FromStr for DidUri {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (method, start_idx) = parse(s)?;
		Ok(DidUri {
			method,
			s: Utf8Bytes::from(s.to_owned()),
			method_specific_id: (start_idx..),
		})
	}
}

impl TryFrom<String> for DidUri {
	type Error = ParseError;

	fn try_from(s: String) -> Result<Self, Self::Error> {
		let (method, start_idx) = parse(&s)?;
		Ok(DidUri {
			method,
			s: Utf8Bytes::from(s),
			method_specific_id: (start_idx..),
		})
	}
}

impl TryFrom<Utf8Bytes> for DidUri {
	type Error = ParseError;

	fn try_from(s: Utf8Bytes) -> Result<Self, Self::Error> {
		let (method, start_idx) = parse(s.as_str())?;
		Ok(DidUri {
			method,
			s,
			method_specific_id: (start_idx..),
		})
	}
}

impl Display for DidUri {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.as_str().fmt(f)
	}
}

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum ParseError {
	#[error("expected the did: scheme")]
	InvalidScheme,
	#[error("expected did:method, but method was not present")]
	MissingMethod,
	#[error("encountered unknown did:method")]
	UnknownMethod,
	#[error("expected a method-specific-id after did:method:")]
	MissingMethodSpecificId,
	#[error("a bare did may not contain a path, query or fragment")]
	UrlComponents,
}
