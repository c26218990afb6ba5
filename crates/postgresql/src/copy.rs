//! Bulk loading through `COPY ... FROM STDIN`.

use crate::error::SqlError;
use bytes::Bytes;
use futures::SinkExt;
use postgresql_types::{encode_row, PostgreSQLDdl};
use sync_core::FlatRow;
use tokio_postgres::{Client, Transaction};
use tracing::{debug, warn};

/// Size at which buffered COPY lines are flushed to the server.
const FLUSH_THRESHOLD: usize = 64 * 1024;

/// Load `rows` into `table` in a single transaction.
///
/// `columns` is the COPY column list; it must leave out the columns whose
/// cells are deferred `now()` markers, since those produce no field. When the
/// server rejects the stream the transaction is rolled back and the whole
/// batch is reported as [`SqlError::BulkLoad`].
pub async fn bulk_load(
    client: &mut Client,
    table: &str,
    columns: &[&str],
    rows: &[FlatRow],
) -> Result<u64, SqlError> {
    if rows.is_empty() {
        return Ok(0);
    }

    let statement = PostgreSQLDdl.to_copy(table, columns);
    debug!("Bulk loading {} rows: {}", rows.len(), statement);

    let tx = client.transaction().await?;
    let copied = match copy_rows(&tx, &statement, rows).await {
        Ok(copied) => copied,
        Err(e) => {
            warn!("Bulk load into {} failed: {}", table, e);
            if let Err(rollback) = tx.rollback().await {
                debug!("Rollback after failed bulk load also failed: {}", rollback);
            }
            return Err(SqlError::bulk_load(table, e));
        }
    };
    tx.commit().await?;

    debug!("Copied {} rows into {}", copied, table);
    Ok(copied)
}

async fn copy_rows(
    tx: &Transaction<'_>,
    statement: &str,
    rows: &[FlatRow],
) -> Result<u64, tokio_postgres::Error> {
    let sink = tx.copy_in::<_, Bytes>(statement).await?;
    futures::pin_mut!(sink);

    let mut buffer = String::with_capacity(FLUSH_THRESHOLD);
    for row in rows {
        buffer.push_str(&encode_row(row));
        if buffer.len() >= FLUSH_THRESHOLD {
            let chunk = std::mem::take(&mut buffer);
            sink.as_mut().send(Bytes::from(chunk)).await?;
        }
    }
    if !buffer.is_empty() {
        sink.as_mut().send(Bytes::from(buffer)).await?;
    }

    sink.as_mut().finish().await
}
