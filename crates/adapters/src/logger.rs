//! `LoggerPort` adapter emitting `tracing` events.

use serde_json::Value;
use tracker_indexer_ports::{LogEvent, LogFields, LogLevel, LoggerPort};

/// Target used for every forwarded event.
pub const LOG_TARGET: &str = "tracker_indexer";

/// Forwards structured log events to the active `tracing` subscriber.
///
/// The event name, JSON-encoded fields, and the error payload become tracing
/// fields; the message becomes the tracing message.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    base_fields: LogFields,
}

impl TracingLogger {
    /// Logger without base fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base fields applied to every event.
    #[must_use]
    pub fn with_base_fields(mut self, fields: LogFields) -> Self {
        self.base_fields = fields;
        self
    }
}

macro_rules! forward {
    ($macro:ident, $name:expr, $fields:expr, $error:expr, $message:expr) => {
        match $error {
            Some(error) => tracing::$macro!(
                target: LOG_TARGET,
                event = %$name,
                fields = %$fields,
                error = %error,
                "{}",
                $message
            ),
            None => tracing::$macro!(
                target: LOG_TARGET,
                event = %$name,
                fields = %$fields,
                "{}",
                $message
            ),
        }
    };
}

impl LoggerPort for TracingLogger {
    fn log(&self, event: LogEvent) {
        let mut fields = self.base_fields.clone();
        fields.extend(event.fields.unwrap_or_default());
        let rendered = fields_to_json(&fields);
        let error = event.error.as_ref().map(Value::to_string);
        let name = event.event;
        let message = event.message;

        match event.level {
            LogLevel::Debug => forward!(debug, name, rendered, error, message),
            LogLevel::Info => forward!(info, name, rendered, error, message),
            LogLevel::Warn => forward!(warn, name, rendered, error, message),
            LogLevel::Error => forward!(error, name, rendered, error, message),
        }
    }

    fn child(&self, fields: LogFields) -> Box<dyn LoggerPort> {
        let mut merged = self.base_fields.clone();
        merged.extend(fields);
        Box::new(Self {
            base_fields: merged,
        })
    }
}

fn fields_to_json(fields: &LogFields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect(),
    )
}
