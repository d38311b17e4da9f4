//! File entry points.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use super::{InputKind, NormalizedImage, Pipeline, Stage};
use crate::error::{ErrorKind, PipelineError, Result};
use crate::metadata::MetadataRecord;
use crate::sniff::{is_dng_file, is_raw_file};

impl Pipeline {
    /// Normalize `input` and write the JPEG to `output`.
    ///
    /// RAW files are recognized by extension; everything else is sniffed.
    /// The output is written to a temporary file beside `output` and renamed
    /// into place, so a failed run leaves no file behind.
    pub fn normalize_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<MetadataRecord> {
        let image = self.normalize_file_to_vec(input)?;
        write_atomic(output.as_ref(), &image.jpeg)?;
        Ok(image.metadata)
    }

    /// Normalize `input` and return the JPEG in memory.
    pub fn normalize_file_to_vec(&self, input: impl AsRef<Path>) -> Result<NormalizedImage> {
        let input = input.as_ref();
        let bytes = fs::read(input).map_err(|e| {
            PipelineError::new(
                Stage::Start,
                ErrorKind::OpenFailure,
                format!("cannot read {}: {}", input.display(), e),
            )
        })?;

        let name = input
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("");
        let kind = if is_raw_file(name) {
            InputKind::Raw
        } else {
            InputKind::Auto
        };
        debug!("Read {} bytes from {}", bytes.len(), input.display());

        self.run(&bytes, kind, is_dng_file(name))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let write_failure = |e: std::io::Error| {
        PipelineError::new(
            Stage::Validated,
            ErrorKind::WriteFailure,
            format!("cannot write {}: {}", path.display(), e),
        )
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(write_failure)?;
    file.write_all(bytes).map_err(write_failure)?;
    file.persist(path).map_err(|e| write_failure(e.error))?;
    Ok(())
}
