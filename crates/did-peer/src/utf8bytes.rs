use std::fmt::Display;

use bytes::Bytes;

/// Wrapper around [`Bytes`] which is guaranteed to be UTF-8.
/// Like `Bytes`, it is cheaply cloneable, so identifiers and the document
/// nodes that hold them can share one buffer.
#[derive(Debug, Eq, PartialEq, Hash, Clone, PartialOrd, Ord)]
pub struct Utf8Bytes(Bytes);

impl Utf8Bytes {
	pub fn as_str(&self) -> &str {
		std::str::from_utf8(self.0.as_ref()).expect("infallible")
	}

	pub fn as_slice(&self) -> &[u8] {
		self.0.as_ref()
	}

	pub fn bytes(&self) -> &Bytes {
		&self.0
	}

	pub fn into_inner(self) -> Bytes {
		self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Zero-copy substring starting at byte `at`. Panics if `at` is not a
	/// char boundary.
	pub fn slice_from(&self, at: usize) -> Self {
		assert!(
			self.as_str().is_char_boundary(at),
			"slicing would have created invalid UTF-8!"
		);
		Self(self.0.slice(at..))
	}

	/// Zero-copy substring ending before byte `at`. Panics if `at` is not a
	/// char boundary.
	pub fn slice_to(&self, at: usize) -> Self {
		assert!(
			self.as_str().is_char_boundary(at),
			"slicing would have created invalid UTF-8!"
		);
		Self(self.0.slice(..at))
	}

	/// Replaces the first occurrence of `from` with `to`.
	///
	/// Returns `None` when `from` does not occur (or is empty), so callers can
	/// keep the original buffer without copying.
	pub fn replace_first(&self, from: &str, to: &str) -> Option<Self> {
		if from.is_empty() {
			return None;
		}
		let s = self.as_str();
		let pos = s.find(from)?;
		let mut out = String::with_capacity(s.len() - from.len() + to.len());
		out.push_str(&s[..pos]);
		out.push_str(to);
		out.push_str(&s[pos + from.len()..]);
		Some(Self::from(out))
	}
}

impl AsRef<[u8]> for Utf8Bytes {
	fn as_ref(&self) -> &[u8] {
		self.0.as_ref()
	}
}

impl AsRef<str> for Utf8Bytes {
	fn as_ref(&self) -> &str {
		self.as_str()
	}
}

impl From<String> for Utf8Bytes {
	/// This is zero-copy, and skips UTF-8 checks.
	fn from(value: String) -> Self {
		Self(Bytes::from(value))
	}
}

impl From<&'static str> for Utf8Bytes {
	/// This is zero-copy, and skips UTF-8 checks.
	fn from(value: &'static str) -> Self {
		Self(Bytes::from_static(value.as_bytes()))
	}
}

impl TryFrom<Bytes> for Utf8Bytes {
	type Error = std::str::Utf8Error;

	/// This is zero-copy, and performs UTF-8 checks.
	fn try_from(value: Bytes) -> Result<Self, Self::Error> {
		let _s = std::str::from_utf8(value.as_ref())?;
		Ok(Self(value))
	}
}

impl Display for Utf8Bytes {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.as_str().fmt(f)
	}
}
