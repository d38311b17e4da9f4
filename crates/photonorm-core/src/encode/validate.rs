//! Output validation.

use crate::error::{ErrorKind, PipelineError, Result};
use crate::pipeline::Stage;

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// Check an encoded JPEG before it is handed out.
///
/// A missing SOI marker is an encode failure. Exceeding `max_bytes` is a
/// write failure; the output is rejected, never truncated or re-encoded.
pub fn validate_output(bytes: &[u8], max_bytes: Option<usize>) -> Result<()> {
    if !bytes.starts_with(&JPEG_SOI) {
        return Err(PipelineError::new(
            Stage::Encoded,
            ErrorKind::EncodeFailure,
            "encoder output does not start with a JPEG SOI marker",
        ));
    }

    if let Some(limit) = max_bytes {
        if bytes.len() > limit {
            return Err(PipelineError::new(
                Stage::Encoded,
                ErrorKind::WriteFailure,
                format!(
                    "encoded output is {} bytes, exceeding the {} byte limit",
                    bytes.len(),
                    limit
                ),
            ));
        }
    }

    Ok(())
}
