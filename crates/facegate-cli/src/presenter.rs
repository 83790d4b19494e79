use facegate_core::{MessageKind, Presenter};

/// Presenter that writes status lines to stdout.
pub struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn show(&self, message: &str, kind: MessageKind) {
        let tag = match kind {
            MessageKind::Info => "info",
            MessageKind::Success => "ok",
            MessageKind::Error => "error",
            MessageKind::Warning => "warn",
        };
        println!("[{tag}] {message}");
    }
}
