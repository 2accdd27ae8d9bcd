//! User-visible warnings raised by the pipeline.
//!
//! The host editor decides how to show them (a dialog in an IDE, a log line
//! in the hook binary).

pub trait Notifier: Send + Sync {
    fn warn_user(&self, title: &str, message: &str);
}

/// Reports warnings through the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn warn_user(&self, title: &str, message: &str) {
        tracing::warn!(title = %title, "{}", message);
    }
}
