//! Tracing setup and a diagnostics layer for the host UI.
//!
//! The view-models report tolerated failures (dropped signals, orphaned
//! placements, undecodable records) as `warn` events. [`DiagnosticLayer`]
//! forwards those events to a channel so a UI collaborator can surface them.

use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Environment variable overriding the default filter directive.
pub const LOG_ENV: &str = "WHERE_LOG";

/// Installs the global subscriber: an env filter and a fmt layer.
///
/// `WHERE_LOG` overrides `default_filter`. Returns `Ok(false)` when a
/// global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<bool> {
    install(default_filter, None)
}

/// Like [`init_tracing`], additionally forwarding diagnostics to `sender`.
pub fn init_tracing_with_diagnostics(
    default_filter: &str,
    sender: mpsc::UnboundedSender<Diagnostic>,
) -> anyhow::Result<bool> {
    install(default_filter, Some(DiagnosticLayer::new(sender)))
}

fn install(default_filter: &str, diagnostics: Option<DiagnosticLayer>) -> anyhow::Result<bool> {
    let filter = match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(directive)?,
        Err(_) => EnvFilter::try_new(default_filter)?,
    };
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(diagnostics)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!("[Telemetry] tracing initialised");
    }
    Ok(installed)
}

/// A warning or error raised by the view-models.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Diagnostic {
    pub target: String,
    pub level: String,
    pub message: String,
    pub fields: HashMap<String, String>,
    pub timestamp: String,
}

/// Forwards `WARN` and `ERROR` events of the `where_*` crates to a channel.
pub struct DiagnosticLayer {
    sender: mpsc::UnboundedSender<Diagnostic>,
}

impl DiagnosticLayer {
    pub fn new(sender: mpsc::UnboundedSender<Diagnostic>) -> Self {
        Self { sender }
    }
}

impl<S> Layer<S> for DiagnosticLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > Level::WARN || !metadata.target().starts_with("where_") {
            return;
        }

        let mut fields = HashMap::new();
        event.record(&mut FieldVisitor(&mut fields));
        let diagnostic = Diagnostic {
            target: metadata.target().to_string(),
            level: metadata.level().to_string(),
            message: fields.remove("message").unwrap_or_default(),
            fields,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        // The receiver may be gone; diagnostics are best effort.
        let _ = self.sender.send(diagnostic);
    }
}

struct FieldVisitor<'a>(&'a mut HashMap<String, String>);

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0
            .insert(field.name().to_string(), format!("{:?}", value));
    }
}
