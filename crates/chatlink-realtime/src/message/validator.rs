//! Inbound frame pre-checks, run before any parsing.

use super::codec::CodecError;

/// Rejects frames that are empty or larger than `max_bytes`.
pub fn validate_inbound(raw: &str, max_bytes: usize) -> Result<(), CodecError> {
    if raw.len() > max_bytes {
        return Err(CodecError::TooLarge {
            size: raw.len(),
            max: max_bytes,
        });
    }

    if raw.trim().is_empty() {
        return Err(CodecError::Empty);
    }

    Ok(())
}
