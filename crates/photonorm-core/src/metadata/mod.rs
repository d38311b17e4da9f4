//! Unified metadata: the record type and its reconciliation.

mod reconcile;
mod record;

pub use reconcile::{extract_exif, Reconciler, SourceKind};
pub use record::{
    MetadataRecord, CAMERA_TEXT_CAPACITY, CONVERSION_SUFFIX, JPEG_IMAGE_LABEL, UNKNOWN,
};
