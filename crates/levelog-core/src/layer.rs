//! `tracing` bridge
//!
//! [`LevelogLayer`] forwards `tracing` events into a [`Logger`], so code that
//! already uses `tracing::info!` lands in the same per-severity files. A span
//! field named `trace_id` becomes the correlation token of every event inside
//! that span.

use tracing::field::{Field as TracingField, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::domain::{CallerLocation, CorrelationToken, Field, FieldValue, LogContext, Severity};
use crate::logger::{Entry, Logger};

const TOKEN_FIELD: &str = "trace_id";

/// Layer writing `tracing` events through a [`Logger`].
#[derive(Debug, Clone)]
pub struct LevelogLayer {
    logger: Logger,
}

impl LevelogLayer {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

/// Collects the correlation token declared on a span.
#[derive(Default)]
struct SpanTokenVisitor {
    token: Option<CorrelationToken>,
}

impl Visit for SpanTokenVisitor {
    fn record_str(&mut self, field: &TracingField, value: &str) {
        if field.name() == TOKEN_FIELD {
            self.token = Some(CorrelationToken::from_string(value));
        }
    }

    fn record_debug(&mut self, field: &TracingField, value: &dyn std::fmt::Debug) {
        if field.name() == TOKEN_FIELD {
            self.token = Some(CorrelationToken::from_string(format!("{value:?}")));
        }
    }
}

/// Collects message, error and structured fields of an event.
#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    error: Option<String>,
    token: Option<CorrelationToken>,
    fields: Vec<Field>,
}

impl EventVisitor {
    fn push(&mut self, field: &TracingField, value: FieldValue) {
        self.fields.push(Field::new(field.name(), value));
    }
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &TracingField, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            TOKEN_FIELD => self.token = Some(CorrelationToken::from_string(value)),
            "error" => self.error = Some(value.to_string()),
            _ => self.push(field, value.into()),
        }
    }

    fn record_i64(&mut self, field: &TracingField, value: i64) {
        self.push(field, value.into());
    }

    fn record_u64(&mut self, field: &TracingField, value: u64) {
        self.push(field, value.into());
    }

    fn record_bool(&mut self, field: &TracingField, value: bool) {
        self.push(field, value.into());
    }

    fn record_f64(&mut self, field: &TracingField, value: f64) {
        self.push(field, value.into());
    }

    fn record_error(&mut self, field: &TracingField, value: &(dyn std::error::Error + 'static)) {
        if field.name() == "error" {
            self.error = Some(value.to_string());
        } else {
            self.push(field, value.to_string().into());
        }
    }

    fn record_debug(&mut self, field: &TracingField, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = Some(format!("{value:?}")),
            TOKEN_FIELD => self.token = Some(CorrelationToken::from_string(format!("{value:?}"))),
            "error" => self.error = Some(format!("{value:?}")),
            _ => self.push(field, format!("{value:?}").into()),
        }
    }
}

/// Events emitted by this crate describe the logger itself and are left to
/// other layers.
fn is_internal(target: &str) -> bool {
    target == "levelog_core" || target.starts_with("levelog_core::")
}

impl<S> Layer<S> for LevelogLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = SpanTokenVisitor::default();
        attrs.record(&mut visitor);

        if let (Some(token), Some(span)) = (visitor.token, ctx.span(id)) {
            span.extensions_mut().insert(token);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        if is_internal(meta.target()) {
            return;
        }

        let severity = Severity::from_tracing(meta.level());
        if !self.logger.should_emit(severity) {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        // Innermost span wins
        let token = visitor.token.take().or_else(|| {
            ctx.event_scope(event)?
                .find_map(|span| span.extensions().get::<CorrelationToken>().cloned())
        });
        let log_ctx = match token {
            Some(token) => LogContext::new().attach(token),
            None => LogContext::new(),
        };

        let caller = (severity >= Severity::Warn).then(|| match (meta.file(), meta.line()) {
            (Some(file), Some(line)) => CallerLocation::Known {
                file: file.to_string(),
                line,
            },
            _ => CallerLocation::Unknown,
        });

        let mut entry = Entry::new(severity, visitor.message.unwrap_or_default())
            .field("target", meta.target())
            .fields(visitor.fields)
            .caller(caller);
        if let Some(error) = visitor.error {
            entry = entry.error(error);
        }
        self.logger.emit(&log_ctx, entry);
    }
}
