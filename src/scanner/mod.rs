//! Scanner / indexer: bulk, priority, and event-triggered scan paths.

pub mod driver;
pub mod extract;
pub mod progress;

pub use driver::Scanner;
pub use extract::{extract_block, Extraction};
pub use progress::{ScanProgress, ScanState};
