//! Connection setup.

use crate::error::SqlError;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error};

/// Connect to PostgreSQL and drive the connection on a background task.
///
/// # Example
///
/// ```ignore
/// let client = connect("host=localhost user=postgres dbname=docsql").await?;
/// ```
pub async fn connect(connection_string: &str) -> Result<Client, SqlError> {
    let (client, connection) = tokio_postgres::connect(connection_string, NoTls).await?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("PostgreSQL connection error: {}", e);
        }
    });

    // Test connection
    client.simple_query("SELECT 1").await?;
    debug!("Connected to PostgreSQL");

    Ok(client)
}
