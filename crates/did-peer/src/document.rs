//! A DID document as a tree of typed [`Node`]s, together with an [`Index`] of
//! every resource in it that has an `id`.
//!
//! Strings that parse as DIDs are kept as [`Node::Did`] or [`Node::DidUrl`], so
//! code walking the tree can tell identifiers apart from other text without
//! re-parsing.

use std::{collections::BTreeMap, fmt::Display};

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{
	uri::{DidUri, ParseError},
	url::DidUrl,
	utf8bytes::Utf8Bytes,
};

/// One value in a document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
	Null,
	Bool(bool),
	Number(serde_json::Number),
	String(Utf8Bytes),
	/// A bare DID, such as the top level `id` or a `controller`.
	Did(DidUri),
	/// A DID with a path, query or fragment, such as `did:peer:2...#key-1`.
	DidUrl(DidUrl),
	Map(BTreeMap<String, Node>),
	Seq(Vec<Node>),
}

impl Node {
	/// Classifies `text` as a [`Node::Did`], [`Node::DidUrl`] or plain
	/// [`Node::String`].
	pub fn from_text(text: Utf8Bytes) -> Self {
		if !text.as_str().starts_with("did:") {
			return Self::String(text);
		}
		match DidUrl::try_from(text.clone()) {
			Ok(url) if url.is_bare() => Self::Did(url.did()),
			Ok(url) => Self::DidUrl(url),
			Err(_) => Self::String(text),
		}
	}

	/// The text of any string-like node.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s.as_str()),
			Self::Did(did) => Some(did.as_str()),
			Self::DidUrl(url) => Some(url.as_str()),
			_ => None,
		}
	}

	pub fn get(&self, key: &str) -> Option<&Node> {
		match self {
			Self::Map(map) => map.get(key),
			_ => None,
		}
	}

	/// Follows `path` starting at this node.
	pub fn at(&self, path: &NodePath) -> Option<&Node> {
		path.0.iter().try_fold(self, |node, segment| match (node, segment) {
			(Self::Map(map), PathSegment::Key(key)) => map.get(key),
			(Self::Seq(seq), PathSegment::Pos(pos)) => seq.get(*pos),
			_ => None,
		})
	}

	pub fn to_value(&self) -> Value {
		match self {
			Self::Null => Value::Null,
			Self::Bool(b) => Value::Bool(*b),
			Self::Number(n) => Value::Number(n.clone()),
			Self::String(_) | Self::Did(_) | Self::DidUrl(_) => {
				Value::String(self.as_str().unwrap_or_default().to_owned())
			}
			Self::Map(map) => Value::Object(
				map.iter().map(|(k, v)| (k.clone(), v.to_value())).collect(),
			),
			Self::Seq(seq) => Value::Array(seq.iter().map(Node::to_value).collect()),
		}
	}
}

impl From<Value> for Node {
	fn from(value: Value) -> Self {
		match value {
			Value::Null => Self::Null,
			Value::Bool(b) => Self::Bool(b),
			Value::Number(n) => Self::Number(n),
			Value::String(s) => Self::from_text(Utf8Bytes::from(s)),
			Value::Array(seq) => Self::Seq(seq.into_iter().map(Node::from).collect()),
			Value::Object(map) => {
				Self::Map(map.into_iter().map(|(k, v)| (k, Node::from(v))).collect())
			}
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
	Key(String),
	Pos(usize),
}

/// Location of a node, relative to the document root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NodePath(Vec<PathSegment>);

impl NodePath {
	pub fn segments(&self) -> &[PathSegment] {
		&self.0
	}

	fn child(&self, segment: PathSegment) -> Self {
		let mut segments = Vec::with_capacity(self.0.len() + 1);
		segments.extend_from_slice(&self.0);
		segments.push(segment);
		Self(segments)
	}
}

impl Display for NodePath {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		for segment in &self.0 {
			match segment {
				PathSegment::Key(key) => write!(f, "/{key}")?,
				PathSegment::Pos(pos) => write!(f, "/{pos}")?,
			}
		}
		Ok(())
	}
}

/// Maps the absolute DID url of every resource in a document to where that
/// resource lives in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Index(pub(crate) BTreeMap<String, NodePath>);

impl Index {
	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn get(&self, key: &str) -> Option<&NodePath> {
		self.0.get(key)
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.0.keys().map(String::as_str)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &NodePath)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v))
	}

	/// Indexes every map below `root` that carries an `id`. Relative ids
	/// (`#key-1`) are made absolute against `doc_id`. The first resource to
	/// claim a key wins.
	pub fn build(root: &BTreeMap<String, Node>, doc_id: &str) -> Self {
		let mut index = BTreeMap::new();
		for (key, child) in root {
			let path = NodePath::default().child(PathSegment::Key(key.clone()));
			index_node(child, path, doc_id, &mut index);
		}
		Self(index)
	}
}

fn index_node(
	node: &Node,
	path: NodePath,
	doc_id: &str,
	index: &mut BTreeMap<String, NodePath>,
) {
	match node {
		Node::Map(map) => {
			if let Some(id) = map.get("id").and_then(Node::as_str) {
				let key = if id.starts_with('#') {
					format!("{doc_id}{id}")
				} else {
					id.to_owned()
				};
				index.entry(key).or_insert_with(|| path.clone());
			}
			for (key, child) in map {
				let path = path.child(PathSegment::Key(key.clone()));
				index_node(child, path, doc_id, index);
			}
		}
		Node::Seq(seq) => {
			for (pos, child) in seq.iter().enumerate() {
				index_node(child, path.child(PathSegment::Pos(pos)), doc_id, index);
			}
		}
		_ => (),
	}
}

/// A DID document. Owns its node tree and the [`Index`] over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
	pub(crate) root: BTreeMap<String, Node>,
	pub(crate) index: Index,
}

impl Document {
	pub fn from_value(value: Value) -> Result<Self, DocumentError> {
		let Node::Map(root) = Node::from(value) else {
			return Err(DocumentError::NotAnObject);
		};
		let id = match root.get("id") {
			Some(Node::Did(did)) => did.as_str().to_owned(),
			Some(other) => {
				let text = other.as_str().unwrap_or_default().to_owned();
				let err = DidUri::try_from(text.clone())
					.err()
					.unwrap_or(ParseError::UrlComponents);
				return Err(DocumentError::InvalidId(text, err));
			}
			None => return Err(DocumentError::MissingId),
		};
		let index = Index::build(&root, &id);
		Ok(Self { root, index })
	}

	pub fn from_json(raw: &str) -> Result<Self, DocumentError> {
		let value: Value = serde_json::from_str(raw)?;
		Self::from_value(value)
	}

	pub fn to_value(&self) -> Value {
		Value::Object(
			self.root
				.iter()
				.map(|(k, v)| (k.clone(), v.to_value()))
				.collect(),
		)
	}

	pub fn to_json(&self) -> String {
		self.to_value().to_string()
	}

	/// The top level `id`. Only `None` if a rewrite replaced it with something
	/// that is no longer a DID.
	pub fn id(&self) -> Option<&DidUri> {
		match self.root.get("id") {
			Some(Node::Did(did)) => Some(did),
			_ => None,
		}
	}

	pub fn get(&self, key: &str) -> Option<&Node> {
		self.root.get(key)
	}

	pub fn root(&self) -> &BTreeMap<String, Node> {
		&self.root
	}

	pub fn index(&self) -> &Index {
		&self.index
	}

	/// Follows `path` from the document root.
	pub fn node_at(&self, path: &NodePath) -> Option<&Node> {
		let (first, rest) = path.0.split_first()?;
		let PathSegment::Key(key) = first else {
			return None;
		};
		self.root.get(key)?.at(&NodePath(rest.to_vec()))
	}

	/// Looks up a resource by DID url. Relative references (`#key-1`) are
	/// resolved against the document id.
	pub fn dereference(&self, reference: &str) -> Option<&Node> {
		let path = if reference.starts_with('#') {
			let id = self.id()?;
			self.index.get(&format!("{id}{reference}"))?
		} else {
			self.index.get(reference)?
		};
		self.node_at(path)
	}
}

impl Serialize for Document {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.to_value().serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for Document {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let value = Value::deserialize(deserializer)?;
		Document::from_value(value).map_err(D::Error::custom)
	}
}

#[derive(thiserror::Error, Debug)]
pub enum DocumentError {
	#[error("a did document must be a json object")]
	NotAnObject,
	#[error("did document has no `id`")]
	MissingId,
	#[error("did document id {0:?} is not a did")]
	InvalidId(String, #[source] ParseError),
	#[error(transparent)]
	Json(#[from] serde_json::Error),
}
