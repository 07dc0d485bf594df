//! Replacing one identifier with another throughout a [`Document`].

use std::collections::BTreeMap;

use tracing::debug;

use crate::{
	document::{Document, Node},
	uri::DidUri,
	utf8bytes::Utf8Bytes,
};

/// Something that can have an identifier replaced inside of it.
pub trait RewriteIdentifier {
	/// Replaces the first occurrence of `old` in every string-like leaf with
	/// `new`. Returns how many leaves changed.
	fn rewrite_identifier(&mut self, old: &str, new: &str) -> usize;
}

fn rewrite_text(text: &Utf8Bytes, old: &str, new: &str) -> Option<Node> {
	text.replace_first(old, new).map(Node::from_text)
}

impl RewriteIdentifier for Node {
	fn rewrite_identifier(&mut self, old: &str, new: &str) -> usize {
		let replacement = match self {
			Node::Null | Node::Bool(_) | Node::Number(_) => None,
			Node::String(s) => rewrite_text(s, old, new),
			Node::Did(did) => rewrite_text(did.utf8_bytes(), old, new),
			Node::DidUrl(url) => rewrite_text(url.as_utf8_bytes(), old, new),
			Node::Map(map) => return map.rewrite_identifier(old, new),
			Node::Seq(seq) => {
				return seq
					.iter_mut()
					.map(|node| node.rewrite_identifier(old, new))
					.sum();
			}
		};
		match replacement {
			Some(node) => {
				*self = node;
				1
			}
			None => 0,
		}
	}
}

impl RewriteIdentifier for BTreeMap<String, Node> {
	/// Only values are rewritten, never keys.
	fn rewrite_identifier(&mut self, old: &str, new: &str) -> usize {
		self.values_mut()
			.map(|node| node.rewrite_identifier(old, new))
			.sum()
	}
}

/// Replaces `old` with `new` everywhere in the content of `doc`.
///
/// Only the first occurrence in each value is replaced, so
/// `"<old>#key-1"` becomes `"<new>#key-1"` even if the fragment happens to
/// repeat the identifier. The index is left alone; see [`crate::reindex`].
pub fn rewrite(mut doc: Document, old: &DidUri, new: &DidUri) -> Document {
	if old == new {
		return doc;
	}
	let replaced = doc.root.rewrite_identifier(old.as_str(), new.as_str());
	debug!(replaced, %old, %new, "rewrote identifier in document");
	doc
}
