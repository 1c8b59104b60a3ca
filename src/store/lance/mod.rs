// LanceDB store
// Arrow schema, record batch building, and the VectorStore implementation


use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use tracing::{debug, info};

use crate::extract::{ChunkSource, DocumentKind};
use crate::store::{ChunkMetadata, ChunkRecord, QueryHit, StoredChunk, VectorStore};
use crate::{Result, SemdexError};

const TABLE_NAME: &str = "chunks";

/// LanceDB-backed [`VectorStore`] holding one table of chunk records.
pub struct LanceStore {
    connection: Connection,
    dimension: usize,
}

impl LanceStore {
    /// Connect to the LanceDB directory at `index_dir`, creating it if needed.
    #[inline]
    pub async fn connect(index_dir: &Path, dimension: usize) -> Result<Self> {
        std::fs::create_dir_all(index_dir).map_err(|e| {
            SemdexError::Store(format!(
                "Failed to create index directory {}: {}",
                index_dir.display(),
                e
            ))
        })?;

        let uri = index_dir.display().to_string();
        debug!("Connecting to LanceDB at {}", uri);

        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| SemdexError::Store(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            dimension,
        })
    }

    async fn open_table(&self) -> Result<Option<Table>> {
        match self.connection.open_table(TABLE_NAME).execute().await {
            Ok(table) => Ok(Some(table)),
            Err(lancedb::Error::TableNotFound { .. }) => Ok(None),
            Err(e) => Err(SemdexError::Store(format!(
                "Failed to open chunk table: {}",
                e
            ))),
        }
    }
}

#[async_trait]
impl VectorStore for LanceStore {
    #[inline]
    async fn create_index(&self) -> Result<()> {
        let names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| SemdexError::Store(format!("Failed to list tables: {}", e)))?;

        if names.iter().any(|name| name == TABLE_NAME) {
            debug!("Chunk table already exists");
            return Ok(());
        }

        match self
            .connection
            .create_empty_table(TABLE_NAME, chunk_schema(self.dimension))
            .execute()
            .await
        {
            Ok(_) => {
                info!("Created chunk table with {} dimensions", self.dimension);
                Ok(())
            }
            // A concurrent writer won the race; the table exists either way.
            Err(lancedb::Error::TableAlreadyExists { .. }) => Ok(()),
            Err(e) => Err(SemdexError::Store(format!(
                "Failed to create chunk table: {}",
                e
            ))),
        }
    }

    #[inline]
    async fn insert_item(&self, record: ChunkRecord) -> Result<()> {
        if record.vector.len() != self.dimension {
            return Err(SemdexError::Store(format!(
                "Vector for {} has {} dimensions, index expects {}",
                record.id,
                record.vector.len(),
                self.dimension
            )));
        }

        let table = self.open_table().await?.ok_or_else(|| {
            SemdexError::Store("Chunk table does not exist; create the index first".to_string())
        })?;

        let batch = chunk_record_batch(std::slice::from_ref(&record), self.dimension)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        table.add(reader).execute().await.map_err(|e| {
            SemdexError::Store(format!("Failed to insert chunk {}: {}", record.id, e))
        })?;

        debug!("Inserted chunk {}", record.id);
        Ok(())
    }

    #[inline]
    async fn query_items(&self, vector: &[f32], k: usize) -> Result<Vec<QueryHit>> {
        let Some(table) = self.open_table().await? else {
            debug!("Query against an absent chunk table; returning no hits");
            return Ok(Vec::new());
        };

        let stream = table
            .vector_search(vector)
            .map_err(|e| SemdexError::Store(format!("Failed to build vector query: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(|e| SemdexError::Store(format!("Failed to execute vector query: {}", e)))?;

        let hits = collect_hits(stream).await?;
        debug!("Vector query returned {} hits", hits.len());
        Ok(hits)
    }

    #[inline]
    async fn list_items(&self) -> Result<Vec<StoredChunk>> {
        let Some(table) = self.open_table().await? else {
            return Ok(Vec::new());
        };

        let stream = table
            .query()
            .execute()
            .await
            .map_err(|e| SemdexError::Store(format!("Failed to scan chunk table: {}", e)))?;

        let hits = collect_hits(stream).await?;
        Ok(hits
            .into_iter()
            .map(|hit| StoredChunk {
                id: hit.id,
                metadata: hit.metadata,
            })
            .collect())
    }

    #[inline]
    async fn delete_index(&self) -> Result<()> {
        match self.connection.drop_table(TABLE_NAME).await {
            Ok(()) => {
                info!("Dropped chunk table");
                Ok(())
            }
            Err(lancedb::Error::TableNotFound { .. }) => {
                debug!("Chunk table already absent");
                Ok(())
            }
            Err(e) => Err(SemdexError::Store(format!(
                "Failed to drop chunk table: {}",
                e
            ))),
        }
    }

    #[inline]
    async fn count_items(&self) -> Result<u64> {
        let Some(table) = self.open_table().await? else {
            return Ok(0);
        };

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| SemdexError::Store(format!("Failed to count chunks: {}", e)))?;

        Ok(count as u64)
    }
}

async fn collect_hits(
    mut stream: lancedb::arrow::SendableRecordBatchStream,
) -> Result<Vec<QueryHit>> {
    let mut hits = Vec::new();
    while let Some(batch) = stream
        .try_next()
        .await
        .map_err(|e| SemdexError::Store(format!("Failed to read result stream: {}", e)))?
    {
        hits.extend(parse_chunk_batch(&batch)?);
    }
    Ok(hits)
}

fn chunk_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                dimension as i32,
            ),
            false,
        ),
        Field::new("file_name", DataType::Utf8, false),
        Field::new("file_path", DataType::Utf8, false),
        Field::new("kind", DataType::Utf8, false),
        // Sheet and row are null for chunks from text-like sources.
        Field::new("sheet", DataType::Utf8, true),
        Field::new("row", DataType::UInt32, true),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("word_count", DataType::UInt32, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("preview", DataType::Utf8, false),
        Field::new("indexed_at", DataType::Utf8, false),
    ]))
}

fn chunk_record_batch(records: &[ChunkRecord], dimension: usize) -> Result<RecordBatch> {
    let len = records.len();

    let mut ids = Vec::with_capacity(len);
    let mut flat_vectors = Vec::with_capacity(len * dimension);
    let mut file_names = Vec::with_capacity(len);
    let mut file_paths = Vec::with_capacity(len);
    let mut kinds = Vec::with_capacity(len);
    let mut sheets: Vec<Option<&str>> = Vec::with_capacity(len);
    let mut rows: Vec<Option<u32>> = Vec::with_capacity(len);
    let mut chunk_indices = Vec::with_capacity(len);
    let mut word_counts = Vec::with_capacity(len);
    let mut texts = Vec::with_capacity(len);
    let mut previews = Vec::with_capacity(len);
    let mut indexed_ats = Vec::with_capacity(len);

    for record in records {
        ids.push(record.id.as_str());
        flat_vectors.extend_from_slice(&record.vector);
        file_names.push(record.metadata.source.file_name());
        file_paths.push(record.metadata.file_path.as_str());
        kinds.push(record.metadata.kind.as_str());
        sheets.push(record.metadata.source.sheet());
        rows.push(record.metadata.source.row());
        chunk_indices.push(record.metadata.chunk_index);
        word_counts.push(record.metadata.word_count);
        texts.push(record.metadata.text.as_str());
        previews.push(record.metadata.preview.as_str());
        indexed_ats.push(record.metadata.indexed_at.as_str());
    }

    let values = Float32Array::from(flat_vectors);
    let item_field = Arc::new(Field::new("item", DataType::Float32, false));
    let vectors = FixedSizeListArray::try_new(item_field, dimension as i32, Arc::new(values), None)
        .map_err(|e| SemdexError::Store(format!("Failed to build vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vectors),
        Arc::new(StringArray::from(file_names)),
        Arc::new(StringArray::from(file_paths)),
        Arc::new(StringArray::from(kinds)),
        Arc::new(StringArray::from(sheets)),
        Arc::new(UInt32Array::from(rows)),
        Arc::new(UInt32Array::from(chunk_indices)),
        Arc::new(UInt32Array::from(word_counts)),
        Arc::new(StringArray::from(texts)),
        Arc::new(StringArray::from(previews)),
        Arc::new(StringArray::from(indexed_ats)),
    ];

    RecordBatch::try_new(chunk_schema(dimension), arrays)
        .map_err(|e| SemdexError::Store(format!("Failed to build record batch: {}", e)))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| SemdexError::Store(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| SemdexError::Store(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| SemdexError::Store(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| SemdexError::Store(format!("Invalid {} column type", name)))
}

/// Rebuild [`QueryHit`]s from a result batch.
///
/// Similarity queries carry a `_distance` column; plain scans do not, and
/// parse with a zero distance.
fn parse_chunk_batch(batch: &RecordBatch) -> Result<Vec<QueryHit>> {
    let ids = string_column(batch, "id")?;
    let file_names = string_column(batch, "file_name")?;
    let file_paths = string_column(batch, "file_path")?;
    let kinds = string_column(batch, "kind")?;
    let sheets = string_column(batch, "sheet")?;
    let rows = u32_column(batch, "row")?;
    let chunk_indices = u32_column(batch, "chunk_index")?;
    let word_counts = u32_column(batch, "word_count")?;
    let texts = string_column(batch, "text")?;
    let previews = string_column(batch, "preview")?;
    let indexed_ats = string_column(batch, "indexed_at")?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|column| column.as_any().downcast_ref::<Float32Array>());

    let mut hits = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let file_name = file_names.value(row).to_string();
        let source = if sheets.is_null(row) {
            ChunkSource::TextFile { file_name }
        } else {
            ChunkSource::ExcelRow {
                file_name,
                sheet: sheets.value(row).to_string(),
                row: if rows.is_null(row) { 0 } else { rows.value(row) },
            }
        };

        let kind = DocumentKind::from_str(kinds.value(row)).map_err(|_| {
            SemdexError::Store(format!(
                "Unknown document kind in store: {}",
                kinds.value(row)
            ))
        })?;

        let distance = distances.map_or(0.0, |array| {
            if array.is_null(row) {
                0.0
            } else {
                array.value(row)
            }
        });

        hits.push(QueryHit {
            id: ids.value(row).to_string(),
            score: 1.0 - distance,
            metadata: ChunkMetadata {
                source,
                kind,
                file_path: file_paths.value(row).to_string(),
                chunk_index: chunk_indices.value(row),
                word_count: word_counts.value(row),
                text: texts.value(row).to_string(),
                preview: previews.value(row).to_string(),
                indexed_at: indexed_ats.value(row).to_string(),
            },
        });
    }

    Ok(hits)
}
