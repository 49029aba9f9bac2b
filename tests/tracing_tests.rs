//! Tests for tracing instrumentation.
//!
//! These tests verify that the orchestrating thread emits its events under
//! the `collapse` span. Stage threads log to the global subscriber and are not
//! observed here.

use eventalign_collapse::{config::CollapseConfig, input::Input, pipeline::collapse};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// A simple layer that counts events at INFO level or above.
struct EventCounter {
    count: Arc<AtomicUsize>,
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventCounter {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if event.metadata().level() <= &Level::INFO {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// A layer that records the formatted message of every event.
struct MessageRecorder {
    messages: Arc<Mutex<Vec<String>>>,
}

struct MessageVisitor<'a>(&'a mut String);

impl Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{value:?}");
        }
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for MessageRecorder {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut message = String::new();
        event.record(&mut MessageVisitor(&mut message));
        self.messages.lock().unwrap().push(message);
    }
}

fn config(dir: &tempfile::TempDir) -> CollapseConfig {
    CollapseConfig::new(
        Input::from_path(&fixture_path("basic.tsv")),
        dir.path().join("out.tsv"),
        4,
        0,
    )
    .unwrap()
}

#[test]
fn collapse_emits_tracing_events() {
    let dir = tempfile::tempdir().unwrap();
    let event_count = Arc::new(AtomicUsize::new(0));
    let layer = EventCounter {
        count: Arc::clone(&event_count),
    };

    let subscriber = tracing_subscriber::registry().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        collapse(&config(&dir)).expect("should collapse");
    });

    assert!(
        event_count.load(Ordering::SeqCst) > 0,
        "should emit tracing events"
    );
}

#[test]
fn collapse_logs_completion() {
    let dir = tempfile::tempdir().unwrap();
    let messages = Arc::new(Mutex::new(Vec::new()));
    let layer = MessageRecorder {
        messages: Arc::clone(&messages),
    };

    let subscriber = tracing_subscriber::registry().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        collapse(&config(&dir)).expect("should collapse");
    });

    let messages = messages.lock().unwrap();
    assert!(
        messages.iter().any(|m| m == "collapse finished"),
        "missing completion event in {messages:?}"
    );
}
