use std::{fmt::Display, ops::Range, str::FromStr};

use crate::{
	uri::{is_url_delimiter, parse_prefix, DidMethod, DidUri, ParseError},
	utf8bytes::Utf8Bytes,
};

/// A Decentralized Identifier, including any path, query or fragment, as a
/// url. For example `did:peer:3zQm...#key-1`.
#[derive(Debug, Eq, PartialEq, Hash, Clone)]
pub struct DidUrl {
	method: DidMethod,
	/// The string representation of the DID url.
	s: Utf8Bytes,
	/// The substring for method-specific-id. This is a range index into `s`.
	method_specific_id: Range<usize>,
	/// Start of the fragment, after the `#`.
	fragment: Option<usize>,
}

fn parse(s: &str) -> Result<(DidMethod, Range<usize>, Option<usize>), ParseError> {
	let (method, start_idx) = parse_prefix(s)?;
	let end_idx = s[start_idx..]
		.find(is_url_delimiter)
		.map_or(s.len(), |i| start_idx + i);
	if end_idx == start_idx {
		return Err(ParseError::MissingMethodSpecificId);
	}
	let fragment = s[end_idx..].find('#').map(|i| end_idx + i + 1);
	Ok((method, start_idx..end_idx, fragment))
}

impl DidUrl {
	/// Gets the buffer representing the url as a str.
	pub fn as_str(&self) -> &str {
		self.s.as_str()
	}

	/// Gets the buffer representing the url as a byte slice.
	pub fn as_slice(&self) -> &[u8] {
		self.s.as_slice()
	}

	/// Gets the buffer representing the url as a reference counted slice that
	/// is guaranteed to be utf8.
	pub fn as_utf8_bytes(&self) -> &Utf8Bytes {
		&self.s
	}

	/// The method of the did.
	pub fn method(&self) -> DidMethod {
		self.method
	}

	/// Method-specific-id, without any of the trailing url components.
	pub fn method_specific_id(&self) -> &str {
		&self.as_str()[self.method_specific_id.clone()]
	}

	/// The bare did this url is relative to. Zero-copy.
	pub fn did(&self) -> DidUri {
		DidUri::try_from(self.s.slice_to(self.method_specific_id.end))
			.expect("prefix of a valid did url is a valid did")
	}

	/// Everything after the did: path, query and fragment.
	pub fn suffix(&self) -> &str {
		&self.as_str()[self.method_specific_id.end..]
	}

	pub fn fragment(&self) -> Option<&str> {
		self.fragment.map(|start| &self.as_str()[start..])
	}

	/// `true` when the url carries nothing beyond the bare did.
	pub fn is_bare(&self) -> bool {
		self.suffix().is_empty()
	}
}

impl FromStr for DidUrl {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (method, method_specific_id, fragment) = parse(s)?;
		Ok(DidUrl {
			method,
			s: Utf8Bytes::from(s.to_owned()),
			method_specific_id,
			fragment,
		})
	}
}

impl TryFrom<String> for DidUrl {
	type Error = ParseError;

	fn try_from(s: String) -> Result<Self, Self::Error> {
		let (method, method_specific_id, fragment) = parse(&s)?;
		Ok(DidUrl {
			method,
			s: Utf8Bytes::from(s),
			method_specific_id,
			fragment,
		})
	}
}

impl TryFrom<Utf8Bytes> for DidUrl {
	type Error = ParseError;

	fn try_from(s: Utf8Bytes) -> Result<Self, Self::Error> {
		let (method, method_specific_id, fragment) = parse(s.as_str())?;
		Ok(DidUrl {
			method,
			s,
			method_specific_id,
			fragment,
		})
	}
}

impl Display for DidUrl {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.as_str().fmt(f)
	}
}
