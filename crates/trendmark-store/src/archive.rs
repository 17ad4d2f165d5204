//! SQLite artifact archive
//!
//! Durable copy of every committed artifact so a restarted cache can serve
//! existing versions and keep numbering them monotonically.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;
use trendmark_domain::traits::{ArtifactArchive, CollaboratorError};
use trendmark_domain::{Artifact, CacheKey};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS artifacts (
    client_id TEXT NOT NULL,
    url TEXT NOT NULL,
    version INTEGER NOT NULL,
    schema_type TEXT NOT NULL,
    generated_at INTEGER NOT NULL,
    body TEXT NOT NULL,
    PRIMARY KEY (client_id, url)
);
CREATE INDEX IF NOT EXISTS idx_artifacts_client ON artifacts(client_id);
";

/// SQLite-backed [`ArtifactArchive`]
///
/// One row per cache key holding the newest artifact as JSON. Saves with a
/// version not above the stored one are ignored.
pub struct SqliteArtifactArchive {
    conn: Mutex<Connection>,
}

impl SqliteArtifactArchive {
    /// Open (or create) an archive at `path`
    ///
    /// Use `:memory:` for a throwaway archive.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CollaboratorError> {
        let conn = Connection::open(path).map_err(storage_error)?;
        conn.execute_batch(SCHEMA).map_err(storage_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of archived artifacts
    pub fn len(&self) -> Result<usize, CollaboratorError> {
        let conn = self.conn.lock().expect("archive lock poisoned");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM artifacts", [], |row| row.get(0))
            .map_err(storage_error)?;
        Ok(count as usize)
    }

    /// True if nothing is archived
    pub fn is_empty(&self) -> Result<bool, CollaboratorError> {
        Ok(self.len()? == 0)
    }
}

impl ArtifactArchive for SqliteArtifactArchive {
    fn load(&self, key: &CacheKey) -> Result<Option<Artifact>, CollaboratorError> {
        let conn = self.conn.lock().expect("archive lock poisoned");
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM artifacts WHERE client_id = ?1 AND url = ?2",
                params![key.client_id.as_str(), key.url],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_error)?;

        body.map(|b| {
            serde_json::from_str(&b)
                .map_err(|e| CollaboratorError::Rejected(format!("corrupt archived artifact: {}", e)))
        })
        .transpose()
    }

    fn save(&self, artifact: &Artifact) -> Result<(), CollaboratorError> {
        let body = serde_json::to_string(artifact)
            .map_err(|e| CollaboratorError::Rejected(e.to_string()))?;
        let conn = self.conn.lock().expect("archive lock poisoned");
        let changed = conn
            .execute(
                "INSERT INTO artifacts (client_id, url, version, schema_type, generated_at, body)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(client_id, url) DO UPDATE SET
                    version = excluded.version,
                    schema_type = excluded.schema_type,
                    generated_at = excluded.generated_at,
                    body = excluded.body
                 WHERE excluded.version > artifacts.version",
                params![
                    artifact.key.client_id.as_str(),
                    artifact.key.url,
                    artifact.version as i64,
                    artifact.schema_type.as_str(),
                    artifact.generated_at as i64,
                    body,
                ],
            )
            .map_err(storage_error)?;
        if changed == 0 {
            debug!(
                "Archive kept newer artifact for {} (offered v{})",
                artifact.key, artifact.version
            );
        }
        Ok(())
    }
}

fn storage_error(e: rusqlite::Error) -> CollaboratorError {
    CollaboratorError::Unavailable(format!("Database error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use trendmark_domain::{ClientId, Fingerprint, SchemaType, TrendId};

    fn artifact(version: u64) -> Artifact {
        Artifact {
            key: CacheKey::new(ClientId::new("clientA"), "/sale"),
            payload: serde_json::json!({"@type": "Offer", "v": version}),
            schema_type: SchemaType::Offer,
            source_trend_id: TrendId::new("t1"),
            generated_at: 100 + version,
            content_fingerprint: Fingerprint::from_hex("aa"),
            trend_fingerprint: Fingerprint::from_hex("bb"),
            version,
            trend_expires_at: 1_000,
        }
    }

    #[test]
    fn test_save_and_load() {
        let archive = SqliteArtifactArchive::open(":memory:").unwrap();
        let key = CacheKey::new(ClientId::new("clientA"), "/sale");
        assert_eq!(archive.load(&key).unwrap(), None);

        archive.save(&artifact(1)).unwrap();
        assert_eq!(archive.load(&key).unwrap(), Some(artifact(1)));
        assert_eq!(archive.len().unwrap(), 1);
    }

    #[test]
    fn test_never_lowers_version() {
        let archive = SqliteArtifactArchive::open(":memory:").unwrap();
        let key = CacheKey::new(ClientId::new("clientA"), "/sale");

        archive.save(&artifact(3)).unwrap();
        archive.save(&artifact(2)).unwrap();
        archive.save(&artifact(3)).unwrap();
        assert_eq!(archive.load(&key).unwrap().unwrap().version, 3);

        archive.save(&artifact(4)).unwrap();
        assert_eq!(archive.load(&key).unwrap().unwrap().version, 4);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("artifacts.db");

        {
            let archive = SqliteArtifactArchive::open(&path).unwrap();
            archive.save(&artifact(5)).unwrap();
        }

        let archive = SqliteArtifactArchive::open(&path).unwrap();
        let key = CacheKey::new(ClientId::new("clientA"), "/sale");
        assert_eq!(archive.load(&key).unwrap().unwrap().version, 5);
    }
}
