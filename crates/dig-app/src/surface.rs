//! JSON-lines output: surface effects, engine events and command errors

use std::io::Write;
use std::sync::Arc;

use dig_core::events::events::{FilterApplied, OverlayAdded, OverlayFailed, OverridesApplied};
use dig_core::events::{handler_from_fn, Event, EventBus};
use dig_core::{EffectSink, SurfaceEffect};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

/// Shared line-oriented JSON writer
#[derive(Clone)]
pub struct LineWriter {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl LineWriter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// One value per line, flushed immediately
    pub fn write<T: Serialize>(&self, value: &T) {
        let line = match serde_json::to_string(value) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "output line could not be serialized");
                return;
            }
        };

        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            warn!(error = %e, "output line could not be written");
        }
    }

    pub fn error(&self, message: &str) {
        self.write(&ErrorLine { error: message });
    }
}

#[derive(Serialize)]
struct ErrorLine<'a> {
    error: &'a str,
}

#[derive(Serialize)]
struct EventLine<'a, T: Serialize> {
    event: &'static str,
    data: &'a T,
}

/// Map surface that writes every call as a JSON line
pub struct JsonLineSurface {
    writer: LineWriter,
}

impl JsonLineSurface {
    pub fn new(writer: LineWriter) -> Self {
        Self { writer }
    }
}

impl EffectSink for JsonLineSurface {
    fn emit(&mut self, effect: SurfaceEffect) {
        self.writer.write(&effect);
    }
}

/// Mirror engine events onto the output
pub fn forward_events(bus: &EventBus, writer: &LineWriter) {
    forward::<FilterApplied>(bus, "filter_applied", writer.clone());
    forward::<OverridesApplied>(bus, "overrides_applied", writer.clone());
    forward::<OverlayAdded>(bus, "overlay_added", writer.clone());
    forward::<OverlayFailed>(bus, "overlay_failed", writer.clone());
}

fn forward<E: Event + Serialize>(bus: &EventBus, name: &'static str, writer: LineWriter) {
    bus.subscribe::<E>(handler_from_fn(move |event| {
        if let Some(event) = event.as_any().downcast_ref::<E>() {
            writer.write(&EventLine { event: name, data: event });
        }
    }));
}
