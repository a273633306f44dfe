//! Content-addressed record of completed transforms.
//!
//! Records are keyed by [`TransformRequest::compute_hash`] and live in a
//! SQLite database inside the cache directory, next to one data directory
//! per transform.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::db::{self, transform_repo, Database, DatabaseError};
use crate::models::{TransformRequest, TransformStatus};
use crate::sanitize::local_file_name;

/// A completed transform as persisted in the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub hash: String,
    pub request_id: String,
    pub title: Option<String>,
    pub codegen: String,
    pub data_dir: PathBuf,
    /// Local paths or signed URLs, in first-seen order.
    pub file_uris: Vec<String>,
    pub status: TransformStatus,
    pub created_at: DateTime<Utc>,
}

impl CacheRecord {
    fn from_row(row: transform_repo::TransformRow) -> Result<Self, DatabaseError> {
        let file_uris = serde_json::from_str(&row.file_uris).map_err(|e| DatabaseError::Json {
            column: "file_uris",
            source: e,
        })?;
        let status = serde_json::from_str(&row.status).map_err(|e| DatabaseError::Json {
            column: "status",
            source: e,
        })?;
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default();
        Ok(Self {
            hash: row.hash,
            request_id: row.request_id,
            title: row.title,
            codegen: row.codegen,
            data_dir: PathBuf::from(row.data_dir),
            file_uris,
            status,
            created_at,
        })
    }

    fn to_row(&self) -> Result<transform_repo::TransformRow, DatabaseError> {
        Ok(transform_repo::TransformRow {
            hash: self.hash.clone(),
            request_id: self.request_id.clone(),
            title: self.title.clone(),
            codegen: self.codegen.clone(),
            data_dir: self.data_dir.to_string_lossy().into_owned(),
            file_uris: serde_json::to_string(&self.file_uris).map_err(|e| DatabaseError::Json {
                column: "file_uris",
                source: e,
            })?,
            status: serde_json::to_string(&self.status).map_err(|e| DatabaseError::Json {
                column: "status",
                source: e,
            })?,
            created_at: self.created_at.to_rfc3339(),
        })
    }
}

/// Handle to the on-disk cache. Cloning shares the database connection.
#[derive(Clone)]
pub struct QueryCache {
    db: Database,
    cache_path: PathBuf,
}

impl QueryCache {
    /// Opens the cache rooted at `cache_path`, creating it if needed.
    pub fn open(cache_path: impl Into<PathBuf>) -> Result<Self, DatabaseError> {
        let cache_path = cache_path.into();
        let db = Database::open(&cache_path.join(db::DATABASE_FILE))?;
        Ok(Self { db, cache_path })
    }

    /// Records in memory, data directories under `cache_path`.
    pub fn in_memory(cache_path: impl Into<PathBuf>) -> Result<Self, DatabaseError> {
        Ok(Self {
            db: Database::open_in_memory()?,
            cache_path: cache_path.into(),
        })
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn get_transform_by_hash(&self, hash: &str) -> Result<Option<CacheRecord>, DatabaseError> {
        transform_repo::find_by_hash(&self.db, hash)?
            .map(CacheRecord::from_row)
            .transpose()
    }

    /// Persists a completed transform under `hash`.
    ///
    /// Writing identical content for an existing hash leaves the stored
    /// record untouched.
    pub fn record(
        &self,
        hash: &str,
        request: &TransformRequest,
        status: &TransformStatus,
        data_dir: &Path,
        file_uris: &[String],
    ) -> Result<CacheRecord, DatabaseError> {
        if let Some(existing) = self.get_transform_by_hash(hash)? {
            if existing.request_id == status.request_id
                && existing.data_dir == data_dir
                && existing.file_uris == file_uris
            {
                log::debug!("Transform {} already cached", status.request_id);
                return Ok(existing);
            }
            log::warn!(
                "Replacing cached transform {} with {}",
                existing.request_id,
                status.request_id
            );
        }

        let record = CacheRecord {
            hash: hash.to_string(),
            request_id: status.request_id.clone(),
            title: request.title.clone(),
            codegen: request.codegen.clone(),
            data_dir: data_dir.to_path_buf(),
            file_uris: file_uris.to_vec(),
            status: status.clone(),
            created_at: Utc::now(),
        };
        transform_repo::insert_or_replace(&self.db, &record.to_row()?)?;
        log::info!(
            "Cached transform {} ({} files)",
            record.request_id,
            record.file_uris.len()
        );
        Ok(record)
    }

    /// [`record`](Self::record) keyed by the request's own hash.
    pub fn cache_transform(
        &self,
        request: &TransformRequest,
        status: &TransformStatus,
        data_dir: &Path,
        file_uris: &[String],
    ) -> Result<CacheRecord, DatabaseError> {
        self.record(&request.compute_hash(), request, status, data_dir, file_uris)
    }

    /// Data directory for a transform, created on first use.
    pub fn cache_path_for_transform(&self, request_id: &str) -> Result<PathBuf, DatabaseError> {
        let dir = self.cache_path.join(local_file_name(request_id));
        std::fs::create_dir_all(&dir).map_err(|e| DatabaseError::Io {
            path: dir.clone(),
            source: e,
        })?;
        Ok(dir)
    }

    /// All cached transforms, newest first.
    pub fn list_transforms(&self) -> Result<Vec<CacheRecord>, DatabaseError> {
        transform_repo::list_all(&self.db)?
            .into_iter()
            .map(CacheRecord::from_row)
            .collect()
    }

    /// Drops every record and the data directories inside the cache path.
    pub fn clear(&self) -> Result<usize, DatabaseError> {
        let records = self.list_transforms()?;
        for record in &records {
            if !record.data_dir.starts_with(&self.cache_path) || !record.data_dir.exists() {
                continue;
            }
            std::fs::remove_dir_all(&record.data_dir).map_err(|e| DatabaseError::Io {
                path: record.data_dir.clone(),
                source: e,
            })?;
        }
        let removed = transform_repo::delete_all(&self.db)?;
        log::info!("Cleared {} cached transforms", removed);
        Ok(removed)
    }
}
