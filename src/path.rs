//! Path syntax validation and chroot prepend/strip — out of scope for the
//! core per its own spec (pure functions over strings), implemented once
//! here for every façade operation to share.

use crate::error::ClientError;

/// A valid path is absolute, contains no empty segments, and (besides the
/// root) has no trailing slash.
pub fn validate(path: &str) -> Result<(), ClientError> {
    if !path.starts_with('/') {
        return Err(ClientError::InvalidPath(path.to_string()));
    }

    if path.len() > 1 && path.ends_with('/') {
        return Err(ClientError::InvalidPath(path.to_string()));
    }

    if path.split('/').skip(1).any(|segment| segment.is_empty()) && path != "/" {
        return Err(ClientError::InvalidPath(path.to_string()));
    }

    Ok(())
}

/// Prepends the chroot prefix for a server-bound path.
pub fn prepend_chroot(chroot: Option<&str>, path: &str) -> String {
    match chroot {
        Some(prefix) if path == "/" => prefix.to_string(),
        Some(prefix) => format!("{prefix}{path}"),
        None => path.to_string(),
    }
}

/// Strips the chroot prefix from a client-bound path. The inverse of
/// [`prepend_chroot`]; round-trips for every valid `(chroot, path)` pair.
pub fn strip_chroot(chroot: Option<&str>, path: &str) -> String {
    match chroot {
        Some(prefix) if path.starts_with(prefix) => {
            let stripped = &path[prefix.len()..];
            if stripped.is_empty() {
                "/".to_string()
            } else {
                stripped.to_string()
            }
        }
        _ => path.to_string(),
    }
}
