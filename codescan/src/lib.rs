//! Repository-tree scanning: TODO/FIXME/HACK/NOTE marker collection and
//! cheap related-file gathering for a CodeGen context.

mod error;
mod related;
mod scanner;

pub use error::ScanError;
pub use related::gather_related;
pub use scanner::{Marker, MarkerKind, scan_markers};
