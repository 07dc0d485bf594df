//! Keeping a [`Document`]'s [`Index`] in step with a rewritten identifier.

use std::collections::BTreeMap;

use tracing::warn;

use crate::{
	document::{Document, Index, NodePath},
	uri::DidUri,
};

/// Returns a new index where the first occurrence of `old` in every key is
/// replaced with `new`. Each key keeps pointing at the same node.
///
/// The result always has as many entries as `index`. If a rewritten key
/// would land on a key that is already taken, the original key is kept
/// instead.
pub fn reindex_keys(index: &Index, old: &str, new: &str) -> Index {
	if old.is_empty() || old == new {
		return index.clone();
	}
	let (to_rewrite, untouched): (Vec<_>, Vec<_>) =
		index.iter().partition(|(key, _)| key.contains(old));

	let mut out: BTreeMap<String, NodePath> = untouched
		.into_iter()
		.map(|(key, path)| (key.to_owned(), path.clone()))
		.collect();
	for (key, path) in to_rewrite {
		let new_key = key.replacen(old, new, 1);
		if out.contains_key(&new_key) {
			warn!(
				key,
				collides_with = new_key.as_str(),
				"rewritten index key collides, keeping the original key"
			);
			let previous = out.insert(key.to_owned(), path.clone());
			debug_assert!(previous.is_none(), "index keys are unique");
		} else {
			out.insert(new_key, path.clone());
		}
	}
	debug_assert_eq!(out.len(), index.len());
	Index(out)
}

/// Rewrites the keys of `doc`'s index from `old` to `new`. The document's
/// content is left alone; see [`crate::rewrite`].
pub fn reindex(mut doc: Document, old: &DidUri, new: &DidUri) -> Document {
	doc.index = reindex_keys(&doc.index, old.as_str(), new.as_str());
	doc
}
