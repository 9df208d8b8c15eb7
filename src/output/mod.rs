mod progress;
mod styling;
mod summary;
mod tables;

pub use progress::TraceProgress;
use styling::{brand, muted};
pub use summary::print_summary;

/// Prints the citrace banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        brand("🧵 citrace"),
        muted(env!("CARGO_PKG_VERSION")),
        muted("Retroactive CI tracing")
    );
}
