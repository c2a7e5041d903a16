pub mod store;
pub mod summary;

pub use store::{Blob, Download, OutputHandle, OutputStore, OUTPUT_MIME_TYPE};
pub use summary::AudioSummary;
