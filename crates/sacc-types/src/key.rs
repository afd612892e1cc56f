use crate::error::TypeError;

/// Longest key accepted, in bytes.
pub const MAX_KEY_LEN: usize = 1024;

/// Check that `key` can address a record.
///
/// Keys are opaque, but they must be non-empty, bounded, and free of NUL
/// bytes (NUL is reserved by composite-key schemes in ledger stores).
pub fn validate_key(key: &str) -> Result<(), TypeError> {
    if key.is_empty() {
        return Err(TypeError::EmptyKey);
    }
    if key.len() > MAX_KEY_LEN {
        return Err(TypeError::KeyTooLong {
            len: key.len(),
            max: MAX_KEY_LEN,
        });
    }
    if key.contains('\0') {
        return Err(TypeError::KeyContainsNul);
    }
    Ok(())
}
