//! Integration test verifying that repository operations emit spans and
//! audit events.

#![allow(clippy::expect_used)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::Utc;
use keychain::{DistributedKeyChainRepository, KeyChainRepository, testutil::make_keychain_at};
use keychain_storage::MemoryKeyChainStore;
use tracing::{
    Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

#[derive(Clone, Default)]
struct Collector {
    spans: Arc<Mutex<Vec<String>>>,
    audit_actions: Arc<Mutex<Vec<String>>>,
}

struct AuditVisitor(Option<String>);

impl Visit for AuditVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "audit.action" {
            self.0 = Some(value.to_owned());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "audit.action" {
            self.0 = Some(format!("{value:?}").trim_matches('"').to_owned());
        }
    }
}

impl<S> tracing_subscriber::Layer<S> for Collector
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

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = AuditVisitor(None);
        event.record(&mut visitor);
        if let Some(action) = visitor.0 {
            self.audit_actions.lock().expect("lock poisoned").push(action);
        }
    }
}

fn repository() -> DistributedKeyChainRepository {
    DistributedKeyChainRepository::builder()
        .store(Arc::new(MemoryKeyChainStore::new()))
        .build()
        .expect("repository")
}

#[tokio::test]
async fn rotation_and_lookup_create_spans() {
    let collector = Collector::default();
    let spans = Arc::clone(&collector.spans);
    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let repo = repository();
    assert!(repo.rotate(make_keychain_at("kid-1", Utc::now()), Duration::ZERO).await);
    repo.find("kid-1").await.expect("find");
    repo.find("missing").await.expect("find");
    repo.cache().invalidate();
    repo.current().await.expect("current");
    repo.history().await.expect("history");

    let recorded = spans.lock().expect("lock poisoned");
    for expected in ["try_rotate", "add_first", "find", "current", "history"] {
        assert!(recorded.iter().any(|s| s == expected), "missing '{expected}' span: {recorded:?}");
    }
}

#[tokio::test]
async fn accepted_rotations_and_clear_emit_audit_events() {
    let collector = Collector::default();
    let actions = Arc::clone(&collector.audit_actions);
    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let repo = repository();
    assert!(repo.rotate(make_keychain_at("kid-1", Utc::now()), Duration::ZERO).await);
    assert!(!repo.rotate(make_keychain_at("kid-2", Utc::now()), Duration::from_secs(3600)).await);
    assert!(repo.forced_rotate(make_keychain_at("kid-3", Utc::now())).await);
    repo.clear().await.expect("clear");

    let recorded = actions.lock().expect("lock poisoned");
    assert_eq!(
        *recorded,
        vec!["rotate_keychain", "forced_rotate_keychain", "clear_keychains"],
        "no-op rotations are not audited"
    );
}
