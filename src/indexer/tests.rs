use super::*;
use crate::SemdexError;
use crate::extract::{ChunkSource, DocumentKind};
use crate::store::{QueryHit, StoredChunk};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

struct StubProvider {
    dimension: usize,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// Fail every call once this many have been issued
    fail_after: Option<usize>,
}

impl StubProvider {
    fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fail_after: None,
        }
    }

    fn failing_after(dimension: usize, calls: usize) -> Self {
        Self {
            fail_after: Some(calls),
            ..Self::new(dimension)
        }
    }
}

#[async_trait]
impl EmbeddingProvider for StubProvider {
    async fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_after.is_some_and(|limit| call >= limit) {
            return Err(SemdexError::Embedding("stub embedding failure".to_string()));
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(vec![text.len() as f32; self.dimension])
    }

    async fn health_check(&self) -> crate::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingStore {
    records: Mutex<Vec<ChunkRecord>>,
    /// Fail the insert with this zero-based sequence number
    fail_on_insert: Option<usize>,
}

impl RecordingStore {
    fn record_ids(&self) -> Vec<String> {
        self.records
            .lock()
            .expect("records lock")
            .iter()
            .map(|record| record.id.clone())
            .collect()
    }

    fn record_count(&self) -> usize {
        self.records.lock().expect("records lock").len()
    }
}

#[async_trait]
impl VectorStore for RecordingStore {
    async fn create_index(&self) -> crate::Result<()> {
        Ok(())
    }

    async fn insert_item(&self, record: ChunkRecord) -> crate::Result<()> {
        let mut records = self.records.lock().expect("records lock");
        if self.fail_on_insert == Some(records.len()) {
            return Err(SemdexError::Store("stub insert failure".to_string()));
        }
        records.push(record);
        Ok(())
    }

    async fn query_items(&self, _vector: &[f32], _k: usize) -> crate::Result<Vec<QueryHit>> {
        Ok(Vec::new())
    }

    async fn list_items(&self) -> crate::Result<Vec<StoredChunk>> {
        Ok(Vec::new())
    }

    async fn delete_index(&self) -> crate::Result<()> {
        self.records.lock().expect("records lock").clear();
        Ok(())
    }

    async fn count_items(&self) -> crate::Result<u64> {
        Ok(self.record_count() as u64)
    }
}

fn text_unit(file_name: &str, words: usize) -> ExtractedUnit {
    let text = (0..words)
        .map(|i| format!("w{}", i))
        .collect::<Vec<_>>()
        .join(" ");
    ExtractedUnit {
        text,
        kind: DocumentKind::Text,
        file_path: format!("/docs/{}", file_name),
        source: ChunkSource::TextFile {
            file_name: file_name.to_string(),
        },
    }
}

fn small_config() -> (ChunkingConfig, IndexingConfig) {
    (
        ChunkingConfig {
            chunk_size: 10,
            overlap: 2,
        },
        IndexingConfig {
            batch_size: 5,
            embed_concurrency: 5,
            batch_delay_ms: 100,
        },
    )
}

fn indexer_with(
    store: Arc<RecordingStore>,
    provider: Arc<StubProvider>,
    chunking: ChunkingConfig,
    indexing: IndexingConfig,
) -> Indexer {
    Indexer::new(store, provider, chunking, indexing)
}

/// Words needed to make a 10/2 chunking produce exactly `chunks` chunks.
fn words_for_chunks(chunks: usize) -> usize {
    2 + 8 * chunks
}

#[tokio::test(start_paused = true)]
async fn records_persist_in_chunk_order() {
    let store = Arc::new(RecordingStore::default());
    let provider = Arc::new(StubProvider::new(4));
    let (chunking, indexing) = small_config();
    let indexer = indexer_with(Arc::clone(&store), provider, chunking, indexing);

    let unit = text_unit("notes.txt", words_for_chunks(12));
    let summary = indexer.index_units(std::slice::from_ref(&unit)).await.expect("should index");

    assert_eq!(summary.chunks_created, 12);

    let records = store.records.lock().expect("records lock");
    assert_eq!(records.len(), 12);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.id, format!("notes.txt_chunk_{}", i));
        assert_eq!(record.metadata.chunk_index, i as u32);
        assert_eq!(record.metadata.kind, DocumentKind::Text);
        assert_eq!(record.metadata.file_path, "/docs/notes.txt");
        assert!(!record.metadata.indexed_at.is_empty());
        assert_eq!(record.vector.len(), 4);
    }
}

#[tokio::test(start_paused = true)]
async fn pauses_exactly_between_batches() {
    let store = Arc::new(RecordingStore::default());
    let provider = Arc::new(StubProvider::new(4));
    let (chunking, indexing) = small_config();
    let indexer = indexer_with(store, provider, chunking, indexing);

    // 12 chunks in batches of 5 makes 3 batches, so exactly 2 pauses. The
    // paused clock advances only through timers, so total time is the two
    // 100ms pauses plus one 1ms embed sleep per sequential batch wave.
    let unit = text_unit("notes.txt", words_for_chunks(12));

    let started = tokio::time::Instant::now();
    indexer.index_units(std::slice::from_ref(&unit)).await.expect("should index");
    let elapsed = started.elapsed();

    assert_eq!(elapsed, Duration::from_millis(2 * 100 + 3));
}

#[tokio::test(start_paused = true)]
async fn single_batch_has_no_pause() {
    let store = Arc::new(RecordingStore::default());
    let provider = Arc::new(StubProvider::new(4));
    let (chunking, indexing) = small_config();
    let indexer = indexer_with(store, provider, chunking, indexing);

    let unit = text_unit("notes.txt", words_for_chunks(3));

    let started = tokio::time::Instant::now();
    indexer.index_units(std::slice::from_ref(&unit)).await.expect("should index");
    let elapsed = started.elapsed();

    // One concurrent embed wave, no inter-batch pause.
    assert_eq!(elapsed, Duration::from_millis(1));
}

#[tokio::test(start_paused = true)]
async fn concurrency_stays_within_the_configured_bound() {
    let store = Arc::new(RecordingStore::default());
    let provider = Arc::new(StubProvider::new(4));
    let (chunking, mut indexing) = small_config();
    indexing.embed_concurrency = 2;
    let indexer = indexer_with(store, Arc::clone(&provider), chunking, indexing);

    let unit = text_unit("notes.txt", words_for_chunks(5));
    indexer.index_units(std::slice::from_ref(&unit)).await.expect("should index");

    assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 2);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn embedding_failure_aborts_the_unit() {
    let store = Arc::new(RecordingStore::default());
    // The first batch of 5 embeds fine; the second batch fails.
    let provider = Arc::new(StubProvider::failing_after(4, 5));
    let (chunking, indexing) = small_config();
    let indexer = indexer_with(Arc::clone(&store), provider, chunking, indexing);

    let unit = text_unit("notes.txt", words_for_chunks(12));
    let err = indexer
        .index_units(std::slice::from_ref(&unit))
        .await
        .expect_err("should fail");

    assert!(matches!(err, SemdexError::Embedding(_)));
    assert!(err.aborts_file_only());
    // Only the first batch was persisted.
    assert_eq!(store.record_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn insert_failure_aborts_the_unit() {
    let store = Arc::new(RecordingStore {
        fail_on_insert: Some(2),
        ..RecordingStore::default()
    });
    let provider = Arc::new(StubProvider::new(4));
    let (chunking, indexing) = small_config();
    let indexer = indexer_with(Arc::clone(&store), provider, chunking, indexing);

    let unit = text_unit("notes.txt", words_for_chunks(4));
    let err = indexer
        .index_units(std::slice::from_ref(&unit))
        .await
        .expect_err("should fail");

    assert!(matches!(err, SemdexError::Store(_)));
    assert!(!err.aborts_file_only());
    assert_eq!(store.record_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn totals_accumulate_across_units() {
    let store = Arc::new(RecordingStore::default());
    let provider = Arc::new(StubProvider::new(4));
    let (chunking, indexing) = small_config();
    let indexer = indexer_with(Arc::clone(&store), provider, chunking, indexing);

    let units = vec![
        text_unit("a.txt", words_for_chunks(2)),
        text_unit("b.txt", words_for_chunks(3)),
    ];
    let summary = indexer.index_units(&units).await.expect("should index");

    assert_eq!(summary.chunks_created, 5);
    let ids = store.record_ids();
    assert!(ids.contains(&"a.txt_chunk_1".to_string()));
    assert!(ids.contains(&"b.txt_chunk_2".to_string()));
}

#[tokio::test(start_paused = true)]
async fn empty_unit_creates_nothing() {
    let store = Arc::new(RecordingStore::default());
    let provider = Arc::new(StubProvider::new(4));
    let (chunking, indexing) = small_config();
    let indexer = indexer_with(Arc::clone(&store), Arc::clone(&provider), chunking, indexing);

    let unit = ExtractedUnit {
        text: "   ".to_string(),
        kind: DocumentKind::Text,
        file_path: "/docs/empty.txt".to_string(),
        source: ChunkSource::TextFile {
            file_name: "empty.txt".to_string(),
        },
    };
    let summary = indexer.index_units(std::slice::from_ref(&unit)).await.expect("should index");

    assert_eq!(summary.chunks_created, 0);
    assert_eq!(store.record_count(), 0);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn duplicate_ids_are_kept_not_deduplicated() {
    let store = Arc::new(RecordingStore::default());
    let provider = Arc::new(StubProvider::new(4));
    let (chunking, indexing) = small_config();
    let indexer = indexer_with(Arc::clone(&store), provider, chunking, indexing);

    // The same file indexed twice in one run produces colliding ids; both
    // copies are written.
    let unit = text_unit("notes.txt", words_for_chunks(2));
    let units = vec![unit.clone(), unit];
    let summary = indexer.index_units(&units).await.expect("should index");

    assert_eq!(summary.chunks_created, 4);
    let ids = store.record_ids();
    assert_eq!(ids.len(), 4);
    assert_eq!(
        ids.iter().filter(|id| *id == "notes.txt_chunk_0").count(),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn previews_are_truncated_for_long_chunks() {
    let store = Arc::new(RecordingStore::default());
    let provider = Arc::new(StubProvider::new(4));
    let indexing = IndexingConfig::default();
    let chunking = ChunkingConfig::default();
    let indexer = indexer_with(Arc::clone(&store), provider, chunking, indexing);

    // 500 five-char words join to far more than the preview cap.
    let unit = text_unit("long.txt", 500);
    indexer.index_units(std::slice::from_ref(&unit)).await.expect("should index");

    let records = store.records.lock().expect("records lock");
    assert_eq!(records.len(), 1);
    assert!(records[0].metadata.preview.ends_with("..."));
    assert_eq!(records[0].metadata.preview.chars().count(), 153);
    assert_eq!(records[0].metadata.word_count, 500);
}
