//! Build event stream and its sinks.
//!
//! The executor reports progress as [`BuildEvent`]s through an
//! [`EventSink`]; it never formats or persists log text itself.

mod buffered;
mod logger;
mod recorder;
mod subscriber;
mod types;

pub use buffered::BufferedSink;
pub use logger::{Logger, Outcome, TargetEntry};
pub use recorder::RecordingSink;
pub use subscriber::{LOG_ENV, init_subscriber};
pub use types::{BuildEvent, EventKind, EventSink, Level};

/// A captured tracing event: `(target, level, message)`.
#[cfg(test)]
pub(crate) type Captured = (String, tracing::Level, String);

/// Run `f` with an isolated thread-local subscriber and return what it logged.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn capture_tracing<R>(f: impl FnOnce() -> R) -> (R, Vec<Captured>) {
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt as _;

    struct CaptureLayer(Arc<Mutex<Vec<Captured>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CaptureLayer {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut extractor = subscriber::MessageExtractor::default();
            event.record(&mut extractor);
            let meta = event.metadata();
            self.0.lock().expect("capture poisoned").push((
                meta.target().to_string(),
                *meta.level(),
                extractor.message,
            ));
        }
    }

    let captured = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(CaptureLayer(Arc::clone(&captured)));
    let result = tracing::subscriber::with_default(subscriber, f);
    let events = captured.lock().expect("capture poisoned").clone();
    (result, events)
}
