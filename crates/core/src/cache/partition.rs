//! Partition CRUD operations.
//!
//! A partition is a named collection of entries keyed by request identity.
//! Every write draws a fresh sequence number from the partition's counter,
//! so insertion order is strictly increasing and never reused.

use super::connection::CacheDb;
use super::hash::CacheKey;
use crate::Error;
use crate::http::{Request, Response, ResponseType};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use url::Url;

/// How a lookup compares request URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Method and full URL (query included) must match.
    #[default]
    Exact,
    /// Method and URL without its query string must match.
    IgnoreSearch,
}

/// A key listed from a partition, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct StoredKey {
    pub method: String,
    pub url: String,
    pub seq: i64,
    pub stored_at: String,
}

/// Handle on one named partition of the store.
#[derive(Clone, Debug)]
pub struct Partition {
    db: CacheDb,
    name: String,
}

struct EntryRow {
    status: i64,
    response_type: String,
    response_url: String,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            status: row.get(0)?,
            response_type: row.get(1)?,
            response_url: row.get(2)?,
            headers_json: row.get(3)?,
            body: row.get(4)?,
        })
    }

    fn into_response(self) -> Result<Response, Error> {
        let kind = ResponseType::parse(&self.response_type)
            .ok_or_else(|| Error::StoreWrite(format!("unknown response type {:?}", self.response_type)))?;
        let url = Url::parse(&self.response_url).map_err(|e| Error::StoreWrite(e.to_string()))?;
        let status = u16::try_from(self.status).map_err(|e| Error::StoreWrite(e.to_string()))?;
        let headers: Vec<(String, String)> = serde_json::from_str(&self.headers_json)?;
        Ok(Response { url, status, kind, headers, body: Bytes::from(self.body) })
    }
}

impl CacheDb {
    /// Get a handle on a partition.
    ///
    /// No row is created until the first write.
    pub fn partition(&self, name: impl Into<String>) -> Result<Partition, Error> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidPartitionName("partition name must not be empty".into()));
        }
        Ok(Partition { db: self.clone(), name })
    }

    /// Get a handle on a partition, creating it if needed.
    pub async fn create_partition(&self, name: impl Into<String>) -> Result<Partition, Error> {
        let partition = self.partition(name)?;
        let name = partition.name.clone();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at, next_seq) VALUES (?1, ?2, 1)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;
        Ok(partition)
    }

    /// Names of every stored partition, oldest first.
    pub async fn partition_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM partitions WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a partition and all its entries.
    ///
    /// Returns false if no such partition existed.
    pub async fn delete_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM partitions WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}

impl Partition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn db(&self) -> &CacheDb {
        &self.db
    }

    /// Look up the stored response for a request.
    ///
    /// With [`MatchMode::IgnoreSearch`] the most recently inserted entry whose
    /// URL differs only by query string is returned.
    pub async fn get(&self, request: &Request, mode: MatchMode) -> Result<Option<Response>, Error> {
        let key = CacheKey::for_request(request);
        let name = self.name.clone();
        let row = self
            .db
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let result = match mode {
                    MatchMode::Exact => conn.query_row(
                        "SELECT status, response_type, response_url, headers_json, body
                         FROM entries WHERE partition = ?1 AND key_hash = ?2",
                        params![name, key.hash],
                        EntryRow::from_row,
                    ),
                    MatchMode::IgnoreSearch => conn.query_row(
                        "SELECT status, response_type, response_url, headers_json, body
                         FROM entries WHERE partition = ?1 AND method = ?2 AND loose_url = ?3
                         ORDER BY seq DESC LIMIT 1",
                        params![name, key.method, key.loose_url],
                        EntryRow::from_row,
                    ),
                };

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::into_response).transpose()
    }

    /// Store a response for a request, replacing any previous entry.
    ///
    /// The entry receives the next sequence number, so a replaced entry
    /// becomes the newest one. Creates the partition if it does not exist.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        let key = CacheKey::for_request(request);
        let name = self.name.clone();
        let headers_json = serde_json::to_string(&response.headers)?;
        let status = i64::from(response.status);
        let kind = response.kind.as_str();
        let response_url = response.url.to_string();
        let body = response.body.to_vec();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at, next_seq) VALUES (?1, ?2, 1)",
                    params![name, now],
                )?;
                let seq: i64 =
                    tx.query_row("SELECT next_seq FROM partitions WHERE name = ?1", params![name], |row| row.get(0))?;
                tx.execute("UPDATE partitions SET next_seq = ?2 WHERE name = ?1", params![name, seq + 1])?;
                tx.execute(
                    "INSERT INTO entries (
                        partition, key_hash, method, url, loose_url, status, response_type,
                        response_url, headers_json, body, seq, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                    ON CONFLICT(partition, key_hash) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        loose_url = excluded.loose_url,
                        status = excluded.status,
                        response_type = excluded.response_type,
                        response_url = excluded.response_url,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        seq = excluded.seq,
                        stored_at = excluded.stored_at",
                    params![
                        &name,
                        &key.hash,
                        &key.method,
                        &key.url,
                        &key.loose_url,
                        status,
                        kind,
                        &response_url,
                        &headers_json,
                        &body,
                        seq,
                        &now,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry stored for a request.
    ///
    /// Returns false if there was no such entry.
    pub async fn delete(&self, request: &Request) -> Result<bool, Error> {
        let key = CacheKey::for_request(request);
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE partition = ?1 AND key_hash = ?2",
                    params![name, key.hash],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete this partition and all its entries.
    pub async fn discard(&self) -> Result<bool, Error> {
        self.db.delete_partition(&self.name).await
    }

    /// Keys of every entry, oldest insertion first.
    pub async fn keys(&self) -> Result<Vec<StoredKey>, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<StoredKey>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, seq, stored_at FROM entries WHERE partition = ?1 ORDER BY seq ASC",
                )?;
                let keys = stmt
                    .query_map(params![name], |row| {
                        Ok(StoredKey { method: row.get(0)?, url: row.get(1)?, seq: row.get(2)?, stored_at: row.get(3)? })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in the partition.
    pub async fn count(&self) -> Result<usize, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE partition = ?1", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }
}
