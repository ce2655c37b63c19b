//! Bounded eviction for partitions.

use super::partition::Partition;
use crate::Error;
use tokio_rusqlite::params;

impl Partition {
    /// Delete the oldest-inserted entries until at most `max_entries` remain.
    ///
    /// Returns the number of deleted entries.
    pub async fn trim(&self, max_entries: usize) -> Result<u64, Error> {
        let name = self.name().to_string();
        let max = max_entries as i64;
        let deleted = self
            .db()
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let count: i64 =
                    tx.query_row("SELECT COUNT(*) FROM entries WHERE partition = ?1", params![name], |row| row.get(0))?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = tx.execute(
                    "DELETE FROM entries WHERE partition = ?1 AND key_hash IN (
                        SELECT key_hash FROM entries WHERE partition = ?1 ORDER BY seq ASC LIMIT ?2
                    )",
                    params![name, to_delete],
                )?;
                tx.commit()?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)?;

        if deleted > 0 {
            tracing::debug!(partition = self.name(), deleted, max_entries, "trimmed partition");
        }

        Ok(deleted)
    }
}
