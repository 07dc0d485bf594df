//! Record storage for did documents.
//!
//! The resolver only needs [`StorageSession::find_record`]. Sessions are
//! scoped: whatever a session holds on to (a pooled sqlite connection, for
//! example) is given back when it is dropped.

use std::{collections::BTreeMap, sync::Arc};

use axum::async_trait;
use sqlx::{
	pool::PoolConnection,
	sqlite::{SqliteConnection, SqlitePool},
	Connection as _, QueryBuilder, Row as _, Sqlite,
};
use tokio::sync::RwLock;
use tracing::debug;

/// Record type of stored did documents. The `did` tag holds the identifier.
pub const RECORD_TYPE_DID_DOCUMENT: &str = "did_doc";

/// Tag name -> tag value. A record matches if it has all of the tags.
pub type TagFilter = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
	pub record_type: String,
	pub value: String,
	pub tags: TagFilter,
}

impl Record {
	fn matches(&self, record_type: &str, filter: &TagFilter) -> bool {
		self.record_type == record_type
			&& filter
				.iter()
				.all(|(name, value)| self.tags.get(name) == Some(value))
	}
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
	#[error("no {record_type} record matches {filter:?}")]
	NotFound {
		record_type: String,
		filter: TagFilter,
	},
	#[error("more than one {record_type} record matches {filter:?}")]
	Duplicate {
		record_type: String,
		filter: TagFilter,
	},
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error(transparent)]
	Migrate(#[from] sqlx::migrate::MigrateError),
}

impl StorageError {
	fn not_found(record_type: &str, filter: &TagFilter) -> Self {
		Self::NotFound {
			record_type: record_type.to_owned(),
			filter: filter.clone(),
		}
	}

	fn duplicate(record_type: &str, filter: &TagFilter) -> Self {
		Self::Duplicate {
			record_type: record_type.to_owned(),
			filter: filter.clone(),
		}
	}
}

/// Hands out [`StorageSession`]s.
///
/// This exists to support swapping the sqlite database for an in-memory one,
/// for the purposes of testing.
#[async_trait]
pub trait RecordStorage: std::fmt::Debug + Send + Sync + 'static {
	/// Acquires a session. It is released when dropped.
	async fn session(&self) -> Result<Box<dyn StorageSession>, StorageError>;
}

#[async_trait]
pub trait StorageSession: Send {
	/// Finds the single record of `record_type` that carries every tag in
	/// `filter`.
	async fn find_record(
		&mut self,
		record_type: &str,
		filter: &TagFilter,
	) -> Result<Record, StorageError>;

	async fn add_record(&mut self, record: Record) -> Result<(), StorageError>;

	/// Adds `record` unless a record of the same type already carries all of
	/// its tags. Returns whether it was added.
	///
	/// The check and the insert are atomic with respect to every other
	/// session of the same storage.
	async fn add_record_if_absent(
		&mut self,
		record: Record,
	) -> Result<bool, StorageError>;
}

/// A sqlite pool that has had all migrations applied.
#[derive(Debug, Clone)]
pub struct MigratedDbPool(SqlitePool);

impl MigratedDbPool {
	pub async fn new(pool: SqlitePool) -> Result<Self, StorageError> {
		sqlx::migrate!().run(&pool).await?;
		Ok(Self(pool))
	}
}

/// [`RecordStorage`] backed by sqlite. Each session is one pooled connection.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
	pool: MigratedDbPool,
}

impl SqliteStorage {
	pub fn new(pool: MigratedDbPool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl RecordStorage for SqliteStorage {
	async fn session(&self) -> Result<Box<dyn StorageSession>, StorageError> {
		let conn = self.pool.0.acquire().await?;
		Ok(Box::new(SqliteSession { conn }))
	}
}

struct SqliteSession {
	conn: PoolConnection<Sqlite>,
}

/// Pushes the conditions matching a `records` row of `record_type` that
/// carries every tag in `filter`.
fn push_match(
	query: &mut QueryBuilder<'_, Sqlite>,
	record_type: &str,
	filter: &TagFilter,
) {
	query.push("records.record_type = ");
	query.push_bind(record_type.to_owned());
	for (name, value) in filter {
		query.push(
			" AND EXISTS (SELECT 1 FROM record_tags t \
			WHERE t.record_id = records.id AND t.name = ",
		);
		query.push_bind(name.clone());
		query.push(" AND t.value = ");
		query.push_bind(value.clone());
		query.push(")");
	}
}

async fn insert_tags(
	conn: &mut SqliteConnection,
	id: i64,
	tags: &TagFilter,
) -> Result<(), sqlx::Error> {
	for (name, value) in tags {
		sqlx::query(
			"INSERT INTO record_tags (record_id, name, value) VALUES (?, ?, ?)",
		)
		.bind(id)
		.bind(name)
		.bind(value)
		.execute(&mut *conn)
		.await?;
	}
	Ok(())
}

#[async_trait]
impl StorageSession for SqliteSession {
	async fn find_record(
		&mut self,
		record_type: &str,
		filter: &TagFilter,
	) -> Result<Record, StorageError> {
		let mut query =
			QueryBuilder::<Sqlite>::new("SELECT id, value FROM records WHERE ");
		push_match(&mut query, record_type, filter);
		// Two is enough to tell a unique match from a duplicate.
		query.push(" LIMIT 2");
		let rows = query.build().fetch_all(&mut *self.conn).await?;

		let row = match rows.as_slice() {
			[] => return Err(StorageError::not_found(record_type, filter)),
			[row] => row,
			_ => return Err(StorageError::duplicate(record_type, filter)),
		};
		let id: i64 = row.try_get("id")?;
		let value: String = row.try_get("value")?;

		let tags =
			sqlx::query("SELECT name, value FROM record_tags WHERE record_id = ?")
				.bind(id)
				.fetch_all(&mut *self.conn)
				.await?
				.into_iter()
				.map(|row| -> Result<(String, String), sqlx::Error> {
					Ok((row.try_get("name")?, row.try_get("value")?))
				})
				.collect::<Result<TagFilter, _>>()?;

		Ok(Record {
			record_type: record_type.to_owned(),
			value,
			tags,
		})
	}

	async fn add_record(&mut self, record: Record) -> Result<(), StorageError> {
		let mut tx = self.conn.begin().await?;
		let id = sqlx::query("INSERT INTO records (record_type, value) VALUES (?, ?)")
			.bind(&record.record_type)
			.bind(&record.value)
			.execute(&mut *tx)
			.await?
			.last_insert_rowid();
		insert_tags(&mut *tx, id, &record.tags).await?;
		tx.commit().await?;
		debug!(id, record_type = %record.record_type, "added record");
		Ok(())
	}

	async fn add_record_if_absent(
		&mut self,
		record: Record,
	) -> Result<bool, StorageError> {
		let mut tx = self.conn.begin().await?;
		// A single statement that writes takes sqlite's write lock before it
		// reads, so no other connection can insert between the check and the
		// insert. The lock is held until commit, which covers the tags too.
		let mut insert = QueryBuilder::<Sqlite>::new(
			"INSERT INTO records (record_type, value) SELECT ",
		);
		insert.push_bind(record.record_type.clone());
		insert.push(", ");
		insert.push_bind(record.value.clone());
		insert.push(" WHERE NOT EXISTS (SELECT 1 FROM records WHERE ");
		push_match(&mut insert, &record.record_type, &record.tags);
		insert.push(")");
		let inserted = insert.build().execute(&mut *tx).await?;
		if inserted.rows_affected() == 0 {
			tx.rollback().await?;
			return Ok(false);
		}
		let id = inserted.last_insert_rowid();
		insert_tags(&mut *tx, id, &record.tags).await?;
		tx.commit().await?;
		debug!(id, record_type = %record.record_type, "added record");
		Ok(true)
	}
}

/// [`RecordStorage`] that keeps everything in memory. Useful for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
	records: Arc<RwLock<Vec<Record>>>,
}

#[async_trait]
impl RecordStorage for InMemoryStorage {
	async fn session(&self) -> Result<Box<dyn StorageSession>, StorageError> {
		Ok(Box::new(InMemorySession {
			records: Arc::clone(&self.records),
		}))
	}
}

struct InMemorySession {
	records: Arc<RwLock<Vec<Record>>>,
}

#[async_trait]
impl StorageSession for InMemorySession {
	async fn find_record(
		&mut self,
		record_type: &str,
		filter: &TagFilter,
	) -> Result<Record, StorageError> {
		let records = self.records.read().await;
		let mut matches = records.iter().filter(|r| r.matches(record_type, filter));
		match (matches.next(), matches.next()) {
			(None, _) => Err(StorageError::not_found(record_type, filter)),
			(Some(record), None) => Ok(record.clone()),
			(Some(_), Some(_)) => Err(StorageError::duplicate(record_type, filter)),
		}
	}

	async fn add_record(&mut self, record: Record) -> Result<(), StorageError> {
		self.records.write().await.push(record);
		Ok(())
	}

	async fn add_record_if_absent(
		&mut self,
		record: Record,
	) -> Result<bool, StorageError> {
		let mut records = self.records.write().await;
		if records
			.iter()
			.any(|r| r.matches(&record.record_type, &record.tags))
		{
			return Ok(false);
		}
		records.push(record);
		Ok(true)
	}
}

#[cfg(test)]
pub(crate) mod test {
	use super::*;

	use std::{
		path::PathBuf,
		sync::atomic::{AtomicUsize, Ordering},
	};

	use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

	/// A fresh, migrated, in-memory sqlite database.
	pub(crate) async fn sqlite_storage() -> SqliteStorage {
		// A single connection, so every session sees the same in-memory db.
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.connect_with(SqliteConnectOptions::new().in_memory(true))
			.await
			.expect("failed to open in-memory sqlite");
		SqliteStorage::new(MigratedDbPool::new(pool).await.expect("failed to migrate"))
	}

	/// A migrated sqlite database in a fresh file, behind a pool that hands
	/// out several connections at once. The files are removed on drop.
	pub(crate) struct FileStorage {
		pub(crate) storage: SqliteStorage,
		path: PathBuf,
	}

	impl Drop for FileStorage {
		fn drop(&mut self) {
			for suffix in ["", "-wal", "-shm", "-journal"] {
				let mut path = self.path.clone().into_os_string();
				path.push(suffix);
				let _ = std::fs::remove_file(path);
			}
		}
	}

	pub(crate) async fn sqlite_file_storage() -> FileStorage {
		static NEXT: AtomicUsize = AtomicUsize::new(0);
		let path = std::env::temp_dir().join(format!(
			"peer_resolver-test-{}-{}.db",
			std::process::id(),
			NEXT.fetch_add(1, Ordering::Relaxed),
		));
		let connect_opts = SqliteConnectOptions::new()
			.filename(&path)
			.create_if_missing(true);
		let pool = SqlitePoolOptions::new()
			.max_connections(8)
			.connect_with(connect_opts)
			.await
			.expect("failed to open sqlite file");
		FileStorage {
			storage: SqliteStorage::new(
				MigratedDbPool::new(pool).await.expect("failed to migrate"),
			),
			path,
		}
	}

	fn did_doc(did: &str, value: &str) -> Record {
		Record {
			record_type: RECORD_TYPE_DID_DOCUMENT.to_owned(),
			value: value.to_owned(),
			tags: TagFilter::from([("did".to_owned(), did.to_owned())]),
		}
	}

	fn filter(did: &str) -> TagFilter {
		TagFilter::from([("did".to_owned(), did.to_owned())])
	}

	async fn check_storage(storage: &dyn RecordStorage) {
		let mut session = storage.session().await.unwrap();
		session.add_record(did_doc("did:peer:3za", "{\"a\":1}")).await.unwrap();
		session.add_record(did_doc("did:peer:3zb", "{\"b\":2}")).await.unwrap();
		drop(session);

		let mut session = storage.session().await.unwrap();
		let found = session
			.find_record(RECORD_TYPE_DID_DOCUMENT, &filter("did:peer:3zb"))
			.await
			.unwrap();
		assert_eq!(found, did_doc("did:peer:3zb", "{\"b\":2}"));

		assert!(matches!(
			session
				.find_record(RECORD_TYPE_DID_DOCUMENT, &filter("did:peer:3zc"))
				.await,
			Err(StorageError::NotFound { .. })
		));
		assert!(matches!(
			session.find_record("connection", &filter("did:peer:3za")).await,
			Err(StorageError::NotFound { .. })
		));

		assert!(session
			.add_record_if_absent(did_doc("did:peer:3zd", "{}"))
			.await
			.unwrap());
		assert!(!session
			.add_record_if_absent(did_doc("did:peer:3zd", "{\"d\":4}"))
			.await
			.unwrap());
		assert!(!session
			.add_record_if_absent(did_doc("did:peer:3zb", "{}"))
			.await
			.unwrap());
		let other_type = Record {
			record_type: "connection".to_owned(),
			..did_doc("did:peer:3zd", "{}")
		};
		assert!(session.add_record_if_absent(other_type).await.unwrap());
		let found = session
			.find_record(RECORD_TYPE_DID_DOCUMENT, &filter("did:peer:3zd"))
			.await
			.unwrap();
		assert_eq!(found, did_doc("did:peer:3zd", "{}"));

		session.add_record(did_doc("did:peer:3za", "{}")).await.unwrap();
		assert!(matches!(
			session
				.find_record(RECORD_TYPE_DID_DOCUMENT, &filter("did:peer:3za"))
				.await,
			Err(StorageError::Duplicate { .. })
		));
	}

	#[tokio::test]
	async fn test_in_memory_storage() {
		check_storage(&InMemoryStorage::default()).await;
	}

	#[tokio::test]
	async fn test_sqlite_storage() {
		check_storage(&sqlite_storage().await).await;
	}

	#[tokio::test]
	async fn test_sqlite_sessions_are_released() {
		let storage = sqlite_storage().await;
		// With a single pooled connection, this only finishes if every
		// session gives its connection back.
		for _ in 0..4 {
			let mut session = storage.session().await.unwrap();
			let _ = session
				.find_record(RECORD_TYPE_DID_DOCUMENT, &filter("did:peer:3zmissing"))
				.await;
		}
	}

	async fn check_concurrent_add_if_absent(storage: Arc<dyn RecordStorage>) {
		let tasks: Vec<_> = (0..16)
			.map(|i| {
				let storage = Arc::clone(&storage);
				tokio::spawn(async move {
					let mut session = storage.session().await?;
					let record = did_doc("did:peer:3zrace", &format!("{i}"));
					session.add_record_if_absent(record).await
				})
			})
			.collect();
		let mut added = 0;
		for task in tasks {
			if task.await.unwrap().unwrap() {
				added += 1;
			}
		}
		assert_eq!(added, 1);

		let mut session = storage.session().await.unwrap();
		session
			.find_record(RECORD_TYPE_DID_DOCUMENT, &filter("did:peer:3zrace"))
			.await
			.expect("exactly one record should have been added");
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_in_memory_concurrent_add_if_absent() {
		check_concurrent_add_if_absent(Arc::new(InMemoryStorage::default())).await;
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_sqlite_concurrent_add_if_absent() {
		let db = sqlite_file_storage().await;
		check_concurrent_add_if_absent(Arc::new(db.storage.clone())).await;
	}
}
