use std::{collections::VecDeque, sync::Arc};

use tokio::sync::broadcast;

pub(crate) const RING_CAPACITY: usize = 500;

/// Mirrors tracing events as JSON lines onto the SSE log channel and a
/// bounded replay ring.
pub(crate) struct BroadcastLayer {
    pub tx: broadcast::Sender<String>,
    pub ring: Arc<std::sync::Mutex<VecDeque<String>>>,
}

/// Collects the event message and its structured fields.
#[derive(Default)]
struct FieldCollector {
    message: String,
    fields: serde_json::Map<String, serde_json::Value>,
}

impl tracing::field::Visit for FieldCollector {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), value.into());
        }
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.insert(field.name().to_string(), value.into());
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields.insert(field.name().to_string(), value.into());
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields.insert(field.name().to_string(), value.into());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let text = format!("{value:?}");
        // Debug on &str adds quotes
        let text = text
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .map(str::to_string)
            .unwrap_or(text);
        if field.name() == "message" {
            self.message = text;
        } else {
            self.fields.insert(field.name().to_string(), text.into());
        }
    }
}

/// Dashboard bucket for an event target.
pub(crate) fn category(target: &str) -> &'static str {
    if target.contains("pipeline") || target.starts_with("lawborg_core") {
        "pipeline"
    } else if target.starts_with("lawborg_search") {
        "search"
    } else if target.starts_with("lawborg_agent") {
        "agent"
    } else {
        "system"
    }
}

/// Append to the ring, evicting the oldest line past capacity.
pub(crate) fn push_ring(ring: &std::sync::Mutex<VecDeque<String>>, line: String) {
    if let Ok(mut ring) = ring.lock() {
        ring.push_back(line);
        while ring.len() > RING_CAPACITY {
            ring.pop_front();
        }
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for BroadcastLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let level = match *event.metadata().level() {
            tracing::Level::ERROR => "err",
            tracing::Level::WARN => "warn",
            tracing::Level::INFO => "info",
            tracing::Level::DEBUG => "debug",
            tracing::Level::TRACE => return,
        };

        let mut collected = FieldCollector::default();
        event.record(&mut collected);

        let mut line = serde_json::json!({
            "ts": chrono::Utc::now().timestamp(),
            "level": level,
            "message": collected.message,
            "category": category(event.metadata().target()),
        });
        if !collected.fields.is_empty() {
            line["fields"] = serde_json::Value::Object(collected.fields);
        }
        let json = line.to_string();

        let _ = self.tx.send(json.clone());
        push_ring(&self.ring, json);
    }
}
