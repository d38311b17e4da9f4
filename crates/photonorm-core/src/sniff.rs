//! Input classification.
//!
//! Byte sniffing only distinguishes JPEG, PNG and everything else; camera
//! RAW files share magic numbers with generic TIFF rasters, so RAW routing is
//! decided by the caller (or from the file name) instead of being sniffed.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Number of leading bytes the sniffer may inspect.
pub const SNIFF_LEN: usize = 8;

const JPEG_MAGIC: [u8; 2] = [0xFF, 0xD8];
const PNG_MAGIC: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];

/// Result of sniffing an input's leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    Jpeg,
    Png,
    /// Anything else; handed to the generic raster decoder.
    OtherRaster,
}

/// Classify an input by its first [`SNIFF_LEN`] bytes. Never fails.
pub fn sniff_format(bytes: &[u8]) -> SourceFormat {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    if head.starts_with(&JPEG_MAGIC) {
        SourceFormat::Jpeg
    } else if head.starts_with(&PNG_MAGIC) {
        SourceFormat::Png
    } else {
        SourceFormat::OtherRaster
    }
}

const RAW_EXTENSIONS: &[&str] = &[
    "raw", // Generic
    "cr2", "cr3", // Canon
    "nef", // Nikon
    "dng", // Adobe Digital Negative
    "arw", "sr2", "srf", // Sony
    "raf", // Fujifilm
    "rw2", // Panasonic
    "orf", // Olympus
    "pef", "ptx", // Pentax
    "srw", // Samsung
    "3fr", "fff", // Hasselblad
    "mef", // Mamiya
    "mrw", "mdc", // Minolta
    "x3f", // Sigma
    "dcr", "kdc", // Kodak
    "iiq", "cap", // Phase One
    "rwl", // Leica
    "gpr", // GoPro
    "erf", // Epson
    "mos", // Leaf
    "r3d", // RED
];

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "tif", "bmp", "webp", "gif"];

/// Broad file category derived from a file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    Raw,
    Image,
    Unknown,
}

fn extension_lowercase(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn has_extension_in(name: &str, list: &[&str]) -> bool {
    extension_lowercase(name)
        .map(|ext| list.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// True if the file name carries a camera RAW extension (case-insensitive).
pub fn is_raw_file(name: &str) -> bool {
    has_extension_in(name, RAW_EXTENSIONS)
}

/// True if the file name carries a standard raster image extension.
pub fn is_image_file(name: &str) -> bool {
    has_extension_in(name, IMAGE_EXTENSIONS)
}

/// True if the file is either RAW or a standard image.
pub fn is_supported_file(name: &str) -> bool {
    is_raw_file(name) || is_image_file(name)
}

/// True if the file name has a `.dng` extension.
pub(crate) fn is_dng_file(name: &str) -> bool {
    extension_lowercase(name).as_deref() == Some("dng")
}

/// Classify a file name.
pub fn file_type(name: &str) -> FileType {
    if is_raw_file(name) {
        FileType::Raw
    } else if is_image_file(name) {
        FileType::Image
    } else {
        FileType::Unknown
    }
}

fn file_name_of(path: &Path) -> &str {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("")
}

/// True if the path names a file this crate knows how to normalize.
pub fn can_process_file(path: impl AsRef<Path>) -> bool {
    is_supported_file(file_name_of(path.as_ref()))
}

/// Describe how a file would be processed.
pub fn file_info(path: impl AsRef<Path>) -> String {
    match file_type(file_name_of(path.as_ref())) {
        FileType::Raw => "RAW file (decoded by the RAW backend, half-size)".to_string(),
        FileType::Image => "Standard image file (re-encoded to JPEG)".to_string(),
        FileType::Unknown => "Unsupported file format".to_string(),
    }
}
