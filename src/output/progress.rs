use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{failure, heading, highlight, success};

/// Spinner shown on stderr while a build tree is being synthesized.
pub struct TraceProgress {
    pb: ProgressBar,
}

impl TraceProgress {
    pub fn start(slug: &str) -> Self {
        eprintln!("{}", heading("⚙️", "Tracing"));
        let pb = create_spinner(highlight(format!("Synthesizing spans for {slug}")).to_string());
        Self { pb }
    }

    pub fn finish(self, spans: usize) {
        self.pb
            .finish_with_message(success(format!("Emitted {spans} spans ✓")).to_string());
        eprintln!();
    }

    pub fn abandon(self) {
        self.pb
            .abandon_with_message(failure("Tracing stopped ✗").to_string());
        eprintln!();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    let style = ProgressStyle::default_spinner()
        .template("  {msg} {spinner}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
