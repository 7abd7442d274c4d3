//! Minimal stand-in for the external HANDLES collaborator named in
//! `spec.md` §6: maps an opaque integer id to a live [`crate::file::File`]
//! so the public API can hand callers a `u64` instead of a Rust value with
//! a lifetime.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{AtomError, Result};
use crate::file::File;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static HANDLES: RefCell<HashMap<u64, File>> = RefCell::new(HashMap::new());
}

/// Register a newly opened [`File`], returning its opaque id.
pub(crate) fn register(file: File) -> u64 {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    HANDLES.with(|h| h.borrow_mut().insert(id, file));
    id
}

/// Remove and return the [`File`] for `id`, for operations (`Close`) that
/// consume it.
pub(crate) fn take(id: u64) -> Result<File> {
    HANDLES
        .with(|h| h.borrow_mut().remove(&id))
        .ok_or_else(|| AtomError::BadAtom.into())
}

/// Run `f` against the live [`File`] for `id` without removing it.
pub(crate) fn with<R>(id: u64, f: impl FnOnce(&File) -> R) -> Result<R> {
    HANDLES.with(|h| {
        let handles = h.borrow();
        let file = handles.get(&id).ok_or(AtomError::BadAtom)?;
        Ok(f(file))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::OpenFlags;
    use crate::params::CreateParams;

    #[test]
    fn register_then_take_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.bin");
        let file = File::open(&path, OpenFlags::OVERWRITE, CreateParams::default()).unwrap();
        let id = register(file);
        assert!(take(id).is_ok());
        assert!(take(id).is_err());
    }

    #[test]
    fn bad_id_is_atom_error() {
        assert!(with(999_999, |_| ()).is_err());
    }
}
