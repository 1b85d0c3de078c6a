//! LanceDB connection and table helpers.
//!
//! Tables are always rewritten whole: the index is persisted in one shot after
//! an indexing run, so there is no append path.
use anyhow::Result;
use arrow_array::{RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use arrow_schema::Schema;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::database::CreateTableMode;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::schema::build_meta_schema;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await?;
    Ok(names.iter().any(|n| n == name))
}

/// Replace `name` with exactly `batch` (or an empty table when `None`).
pub async fn overwrite_table(conn: &Connection, name: &str, schema: Arc<Schema>, batch: Option<RecordBatch>) -> Result<()> {
    let batches: Vec<std::result::Result<RecordBatch, arrow_schema::ArrowError>> = batch.into_iter().map(Ok).collect();
    let reader = Box::new(RecordBatchIterator::new(batches.into_iter(), schema));
    conn.create_table(name, reader).mode(CreateTableMode::Overwrite).execute().await?;
    Ok(())
}

/// Every row of `name`, in storage order. `None` when the table is missing.
pub async fn read_all(conn: &Connection, name: &str) -> Result<Option<Vec<RecordBatch>>> {
    if !table_exists(conn, name).await? {
        return Ok(None);
    }
    let table = conn.open_table(name).execute().await?;
    let total = table.count_rows(None).await?;
    if total == 0 {
        return Ok(Some(Vec::new()));
    }
    let stream = table.query().limit(total).execute().await?;
    let batches = stream.try_collect::<Vec<RecordBatch>>().await?;
    Ok(Some(batches))
}

pub async fn write_meta(conn: &Connection, table: &str, entries: &BTreeMap<String, String>) -> Result<()> {
    let now = Utc::now().timestamp_millis();
    let keys: Vec<String> = entries.keys().cloned().collect();
    let values: Vec<String> = entries.values().cloned().collect();
    let stamps = vec![now; keys.len()];
    let rb = RecordBatch::try_new(
        build_meta_schema(),
        vec![
            Arc::new(StringArray::from(keys)),
            Arc::new(StringArray::from(values)),
            Arc::new(TimestampMillisecondArray::from(stamps)),
        ],
    )?;
    overwrite_table(conn, table, build_meta_schema(), Some(rb)).await
}

pub async fn read_meta(conn: &Connection, table: &str) -> Result<Option<BTreeMap<String, String>>> {
    let Some(batches) = read_all(conn, table).await? else { return Ok(None) };
    let mut out = BTreeMap::new();
    for batch in batches {
        let keys = string_column(&batch, "key")?;
        let values = string_column(&batch, "value")?;
        for i in 0..batch.num_rows() {
            out.insert(keys.value(i).to_string(), values.value(i).to_string());
        }
    }
    Ok(Some(out))
}

pub(crate) fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow::anyhow!("column '{}' missing or not utf8", name))
}
