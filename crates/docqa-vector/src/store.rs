//! Durable storage of a [`VectorIndex`] in a LanceDB directory.
//!
//! Layout: one chunks table (rows in insertion order, `position` column) and
//! an `index_meta` key/value table recording which embedder built the vectors.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, StringArray};
use chrono::Utc;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use docqa_core::error::Error;
use docqa_core::traits::Embedder;
use docqa_core::types::{Chunk, Meta};

use crate::index::VectorIndex;
use crate::schema::build_chunks_schema;
use crate::table::{open_db, overwrite_table, read_all, read_meta, string_column, write_meta};

pub const META_TABLE: &str = "index_meta";
const KEY_EMBEDDER: &str = "embedder_id";
const KEY_DIM: &str = "dim";
const KEY_SAVED_AT: &str = "saved_at";
const KEY_RECORDS: &str = "records";

/// Summary of what is on disk, without loading vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreInfo {
    pub embedder_id: String,
    pub dim: usize,
    pub records: usize,
    pub saved_at: String,
}

pub struct IndexStore {
    dir: PathBuf,
    table: String,
    rt: Runtime,
}

impl IndexStore {
    /// Creates `dir` if needed. Nothing is written until [`IndexStore::save`].
    pub fn open(dir: &Path, table: &str) -> Result<Self> {
        std::fs::create_dir_all(dir).with_context(|| format!("creating store directory {}", dir.display()))?;
        let rt = Runtime::new()?;
        Ok(Self { dir: dir.to_path_buf(), table: table.to_string(), rt })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn uri(&self) -> String {
        self.dir.to_string_lossy().to_string()
    }

    /// Overwrites whatever was persisted before.
    pub fn save(&self, index: &VectorIndex) -> Result<()> {
        let batch = index_to_record_batch(index)?;
        let mut meta = BTreeMap::new();
        meta.insert(KEY_EMBEDDER.to_string(), index.embedder_id().to_string());
        meta.insert(KEY_DIM.to_string(), index.dim().to_string());
        meta.insert(KEY_RECORDS.to_string(), index.len().to_string());
        meta.insert(KEY_SAVED_AT.to_string(), Utc::now().to_rfc3339());
        let dim = i32::try_from(index.dim()).context("index dimension out of range")?;
        self.rt.block_on(async {
            let conn = open_db(&self.uri()).await?;
            overwrite_table(&conn, &self.table, build_chunks_schema(dim), batch).await?;
            write_meta(&conn, META_TABLE, &meta).await
        })?;
        info!(records = index.len(), dir = %self.dir.display(), "index persisted");
        Ok(())
    }

    pub fn info(&self) -> Result<Option<StoreInfo>> {
        let meta = self.rt.block_on(async {
            let conn = open_db(&self.uri()).await?;
            read_meta(&conn, META_TABLE).await
        })?;
        let Some(meta) = meta else { return Ok(None) };
        let get = |k: &str| meta.get(k).cloned().ok_or_else(|| Error::Store(format!("index metadata lacks '{k}'")));
        Ok(Some(StoreInfo {
            embedder_id: get(KEY_EMBEDDER)?,
            dim: get(KEY_DIM)?.parse().map_err(|e| Error::Store(format!("bad dim: {e}")))?,
            records: get(KEY_RECORDS).ok().and_then(|v| v.parse().ok()).unwrap_or(0),
            saved_at: get(KEY_SAVED_AT).unwrap_or_default(),
        }))
    }

    /// Restore the persisted index. `None` when nothing was ever saved here.
    pub fn load(&self) -> Result<Option<VectorIndex>> {
        let Some(info) = self.info()? else {
            debug!(dir = %self.dir.display(), "no persisted index");
            return Ok(None);
        };
        let batches = self.rt.block_on(async {
            let conn = open_db(&self.uri()).await?;
            read_all(&conn, &self.table).await
        })?;
        let Some(batches) = batches else {
            return Err(Error::Store(format!("index metadata present but table '{}' missing", self.table)).into());
        };

        let mut rows: Vec<(i64, Chunk, Vec<f32>)> = Vec::with_capacity(info.records);
        for batch in &batches {
            rows.extend(rows_from_batch(batch)?);
        }
        rows.sort_by_key(|(pos, _, _)| *pos);

        let mut index = VectorIndex::new(info.embedder_id, info.dim);
        for (_, chunk, vector) in rows {
            index.insert(chunk, vector)?;
        }
        info!(records = index.len(), "index loaded");
        Ok(Some(index))
    }

    /// Like [`IndexStore::load`], but refuses an index built by another embedder.
    pub fn load_for(&self, embedder: &dyn Embedder) -> Result<Option<VectorIndex>> {
        let Some(index) = self.load()? else { return Ok(None) };
        index.ensure_same_space(embedder)?;
        Ok(Some(index))
    }
}

fn index_to_record_batch(index: &VectorIndex) -> Result<Option<RecordBatch>> {
    if index.is_empty() {
        return Ok(None);
    }
    let dim = i32::try_from(index.dim()).context("index dimension out of range")?;
    let mut ids = Vec::new();
    let mut positions = Vec::new();
    let mut sources = Vec::new();
    let mut doc_types: Vec<Option<String>> = Vec::new();
    let mut metadata = Vec::new();
    let mut texts = Vec::new();
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
    for (pos, record) in index.records().iter().enumerate() {
        ids.push(record.id.clone());
        positions.push(pos as i64);
        sources.push(record.chunk.source().to_string());
        doc_types.push(record.chunk.doc_type().map(str::to_string));
        metadata.push(serde_json::to_string(&record.chunk.metadata)?);
        texts.push(record.chunk.text.clone());
        vectors.push(Some(record.vector.iter().map(|&x| Some(x)).collect()));
    }
    let batch = RecordBatch::try_new(
        build_chunks_schema(dim),
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(Int64Array::from(positions)),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(doc_types)),
            Arc::new(StringArray::from(metadata)),
            Arc::new(StringArray::from(texts)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), dim)),
        ],
    )?;
    Ok(Some(batch))
}

fn rows_from_batch(batch: &RecordBatch) -> Result<Vec<(i64, Chunk, Vec<f32>)>> {
    let positions = batch
        .column_by_name("position")
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| anyhow::anyhow!("column 'position' missing"))?;
    let metadata = string_column(batch, "metadata")?;
    let texts = string_column(batch, "text")?;
    let vectors = batch
        .column_by_name("vector")
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| anyhow::anyhow!("column 'vector' missing"))?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let meta: Meta = serde_json::from_str(metadata.value(i))?;
        let values = vectors.value(i);
        let floats = values
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| anyhow::anyhow!("vector items are not f32"))?;
        let vector: Vec<f32> = (0..floats.len()).map(|j| floats.value(j)).collect();
        rows.push((positions.value(i), Chunk::new(texts.value(i), meta), vector));
    }
    Ok(rows)
}
