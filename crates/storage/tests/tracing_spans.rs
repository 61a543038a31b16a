//! Integration test verifying that `#[instrument]` annotations produce spans
//! on `MemoryKeyChainStore` operations.

#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use keychain_storage::{KeyChainStore, MemoryKeyChainStore, testutil::make_record};
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

// ---------------------------------------------------------------------------
// Collecting layer — records span names as they are created
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        _attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
    }
}

fn collect() -> (SpanCollector, Arc<Mutex<Vec<String>>>) {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);
    (collector, spans)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn memory_store_add_first_creates_span() {
    let (collector, spans) = collect();
    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = MemoryKeyChainStore::new();
    store.add_first(make_record(1)).await.expect("add_first should succeed");

    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == "add_first"), "expected an 'add_first' span, got: {recorded:?}");
}

#[tokio::test]
async fn memory_store_peek_and_evict_create_spans() {
    let (collector, spans) = collect();
    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = MemoryKeyChainStore::new();
    store.add_first(make_record(1)).await.expect("add_first");
    store.peek_first().await.expect("peek_first");
    store.remove_last().await.expect("remove_last");

    let recorded = spans.lock().expect("lock poisoned");
    for expected in ["peek_first", "remove_last"] {
        assert!(recorded.iter().any(|s| s == expected), "missing '{expected}' span: {recorded:?}");
    }
}
