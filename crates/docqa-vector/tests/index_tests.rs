use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use docqa_core::config::IndexingSettings;
use docqa_core::traits::{ContextSource, Embedder};
use docqa_core::types::{Chunk, Document};
use docqa_embed::FakeEmbedder;
use docqa_vector::{IndexBuilder, IndexStore, Pacer, Retriever, VectorIndex};

const DIM: usize = 64;

struct CountingEmbedder {
    inner: FakeEmbedder,
    calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
    fail_on_call: Option<usize>,
}

impl CountingEmbedder {
    fn new() -> Self {
        Self {
            inner: FakeEmbedder::new(DIM),
            calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
            fail_on_call: None,
        }
    }

    fn failing_on(call: usize) -> Self {
        Self { fail_on_call: Some(call), ..Self::new() }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }
}

impl Embedder for CountingEmbedder {
    fn embedder_id(&self) -> &str {
        self.inner.embedder_id()
    }

    fn dim(&self) -> usize {
        DIM
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.batch_sizes.lock().unwrap().push(texts.len());
        if self.fail_on_call == Some(call) {
            anyhow::bail!("rate limited (simulated)");
        }
        self.inner.embed_batch(texts)
    }
}

#[derive(Default)]
struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl Pacer for RecordingPacer {
    fn pause(&self, delay: Duration) {
        self.pauses.lock().unwrap().push(delay);
    }
}

fn chunks(n: usize) -> Vec<Chunk> {
    (0..n)
        .map(|i| Chunk::new(format!("chunk number {i} about topic{}", i % 4), Document::new("", format!("doc{}.txt", i / 5)).metadata))
        .collect()
}

fn settings(batch_size: usize) -> IndexingSettings {
    IndexingSettings { batch_size, show_progress: false, ..IndexingSettings::default() }
}

struct Harness {
    _tmp: tempfile::TempDir,
    embedder: Arc<CountingEmbedder>,
    pacer: Arc<RecordingPacer>,
    builder: IndexBuilder,
}

fn harness(batch_size: usize, embedder: CountingEmbedder) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let store = IndexStore::open(&tmp.path().join("db_lance"), "chunks").unwrap();
    let embedder = Arc::new(embedder);
    let pacer = Arc::new(RecordingPacer::default());
    let builder = IndexBuilder::new(embedder.clone(), store, &settings(batch_size)).with_pacer(pacer.clone());
    Harness { _tmp: tmp, embedder, pacer, builder }
}

fn ids(index: &VectorIndex) -> BTreeSet<String> {
    index.records().iter().map(|r| r.id.clone()).collect()
}

#[test]
fn twenty_five_chunks_make_three_calls_and_two_pauses() {
    let h = harness(10, CountingEmbedder::new());
    let index = h.builder.build_or_extend(None, &chunks(25)).unwrap().unwrap();

    assert_eq!(index.len(), 25);
    assert_eq!(h.embedder.calls(), 3);
    assert_eq!(h.embedder.batch_sizes(), vec![10, 10, 5]);
    let pauses = h.pacer.pauses.lock().unwrap().clone();
    assert_eq!(pauses, vec![Duration::from_millis(1500); 2]);
}

#[test]
fn empty_input_short_circuits() {
    let h = harness(10, CountingEmbedder::new());
    assert!(h.builder.build_or_extend(None, &[]).unwrap().is_none());
    assert_eq!(h.embedder.calls(), 0);
    assert!(h.builder.store().load().unwrap().is_none());

    let existing = VectorIndex::from_chunks(h.embedder.as_ref(), &chunks(3)).unwrap();
    let calls_before = h.embedder.calls();
    let same = h.builder.build_or_extend(Some(existing.clone()), &[]).unwrap().unwrap();
    assert_eq!(ids(&same), ids(&existing));
    assert_eq!(h.embedder.calls(), calls_before);
    assert!(h.pacer.pauses.lock().unwrap().is_empty());

    // an index from another embedder is handed back unchanged, not rejected
    let foreign = VectorIndex::from_chunks(&FakeEmbedder::new(16), &chunks(2)).unwrap();
    let kept = h.builder.build_or_extend(Some(foreign.clone()), &[]).unwrap().unwrap();
    assert_eq!(ids(&kept), ids(&foreign));
    assert_eq!(kept.dim(), 16);
}

#[test]
fn batch_size_does_not_change_contents() {
    let input = chunks(23);
    let mut sets = Vec::new();
    for batch_size in [10, 7, 23] {
        let h = harness(batch_size, CountingEmbedder::new());
        h.builder.build_or_extend(None, &input).unwrap();
        assert_eq!(h.embedder.calls(), 23usize.div_ceil(batch_size));
        let loaded = h.builder.store().load().unwrap().unwrap();
        sets.push(ids(&loaded));
    }
    assert_eq!(sets[0].len(), 23);
    assert_eq!(sets[0], sets[1]);
    assert_eq!(sets[1], sets[2]);
}

#[test]
fn persistence_round_trip_is_stable() {
    let h = harness(4, CountingEmbedder::new());
    let built = h.builder.build_or_extend(None, &chunks(9)).unwrap().unwrap();
    let retriever = Retriever::new(h.embedder.clone());
    let question = "chunk number 3 about topic3";

    let first = h.builder.store().load().unwrap().unwrap();
    assert_eq!(first.embedder_id(), built.embedder_id());
    assert_eq!(first.dim(), DIM);
    let hits_a = retriever.similarity_query(Some(&first), question, 3);

    h.builder.store().save(&first).unwrap();
    let second = h.builder.store().load().unwrap().unwrap();
    let hits_b = retriever.similarity_query(Some(&second), question, 3);

    assert_eq!(hits_a.len(), 3);
    assert_eq!(hits_a, hits_b);
    assert_eq!(hits_a[0].chunk.text, question);
    assert_eq!(second.records().iter().map(|r| &r.chunk).collect::<Vec<_>>(), built.records().iter().map(|r| &r.chunk).collect::<Vec<_>>());

    let info = h.builder.store().info().unwrap().unwrap();
    assert_eq!(info.records, 9);
    assert_eq!(info.embedder_id, "fake:xxh64:d64");
}

#[test]
fn failed_batch_keeps_partial_index_unpersisted() {
    let h = harness(10, CountingEmbedder::failing_on(2));
    let err = h.builder.build_or_extend(None, &chunks(25)).unwrap_err();

    assert_eq!(err.processed, 10);
    assert_eq!(err.partial.as_ref().map(VectorIndex::len), Some(10));
    assert!(err.to_string().contains("rate limited"));
    assert_eq!(h.embedder.calls(), 2);
    assert!(h.builder.store().load().unwrap().is_none(), "nothing persisted on failure");
}

#[test]
fn reingesting_adds_only_new_chunks() {
    let h = harness(10, CountingEmbedder::new());
    let all = chunks(7);
    let first = h.builder.build_or_extend(None, &all[..5]).unwrap();
    assert_eq!(h.embedder.calls(), 1);

    let grown = h.builder.build_or_extend(first, &all).unwrap().unwrap();
    assert_eq!(grown.len(), 7);
    assert_eq!(h.embedder.calls(), 2);

    let unchanged = h.builder.build_or_extend(Some(grown), &all).unwrap().unwrap();
    assert_eq!(unchanged.len(), 7);
    assert_eq!(h.embedder.calls(), 2);
}

#[test]
fn other_embedding_space_is_rejected() {
    let h = harness(10, CountingEmbedder::new());
    let foreign = FakeEmbedder::new(16);
    let existing = VectorIndex::from_chunks(&foreign, &chunks(2)).unwrap();

    let err = h.builder.build_or_extend(Some(existing), &chunks(4)).unwrap_err();
    assert_eq!(err.processed, 0);
    assert_eq!(h.embedder.calls(), 0);

    h.builder.store().save(&err.partial.unwrap()).unwrap();
    assert!(h.builder.store().load_for(h.embedder.as_ref()).is_err());
    assert!(h.builder.store().load_for(&foreign).unwrap().is_some());
}

#[test]
fn retrieval_is_bounded_and_ordered() {
    let embedder = Arc::new(CountingEmbedder::new());
    let index = VectorIndex::from_chunks(embedder.as_ref(), &chunks(4)).unwrap();
    let retriever = Retriever::new(embedder.clone());

    let hits = retriever.similarity_query(Some(&index), "topic1", 10);
    assert_eq!(hits.len(), 4);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(retriever.similarity_query(Some(&index), "topic1", 2).len(), 2);
    assert!(retriever.similarity_query(Some(&index), "topic1", 0).is_empty());

    let calls = embedder.calls();
    assert!(retriever.similarity_query(None, "topic1", 3).is_empty());
    assert!(retriever.similarity_query(Some(&VectorIndex::new("fake:xxh64:d64", DIM)), "q", 3).is_empty());
    assert_eq!(embedder.calls(), calls, "no embedding call without records");
}

#[test]
fn retrieval_failures_become_empty_results() {
    let embedder = Arc::new(CountingEmbedder::failing_on(2));
    let index = VectorIndex::from_chunks(embedder.as_ref(), &chunks(3)).unwrap();
    let retriever = Retriever::new(embedder.clone());
    assert!(retriever.similarity_query(Some(&index), "topic0", 3).is_empty());

    let foreign = Retriever::new(Arc::new(FakeEmbedder::new(8)));
    assert!(foreign.similarity_query(Some(&index), "topic0", 3).is_empty());
}

#[test]
fn queryable_handle_supplies_context() {
    let embedder = Arc::new(CountingEmbedder::new());
    let index = VectorIndex::from_chunks(embedder.as_ref(), &chunks(6)).unwrap();
    let retriever = Retriever::new(embedder);

    assert!(retriever.as_queryable(None, 3).is_none());
    let handle = retriever.as_queryable(Some(&index), 2).unwrap();
    let context = handle.context_for("chunk number 5 about topic1");
    assert_eq!(context.len(), 2);
    assert_eq!(context[0].text, "chunk number 5 about topic1");
}
