//! Container-file core: boot-block codec, open/create semantics,
//! shared-state dedup by `(dev, ino)`, positioned block I/O with seek
//! elision, and the flush/close lifecycle.
//!
//! This crate implements the part of a hierarchical scientific data
//! library that owns the physical file: recognizing, creating, and
//! tearing down a container, and moving bytes at logical addresses in
//! and out of it. It does not know what's stored at those addresses —
//! object headers, B-trees, heaps and the symbol-table tree above the
//! root entry are out of scope, and are represented here only through
//! the narrow collaborator interfaces in [`collab`] and [`params`].
//!
//! ```no_run
//! let handle = cratefile::create("data.cfl", true, None)?;
//! cratefile::close(handle)?;
//! # Ok::<(), cratefile::Error>(())
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

mod bootblock;
mod collab;
mod error;
mod file;
mod flags;
mod handles;
mod io;
mod params;
mod probe;
mod registry;
mod shared;

use std::path::Path;

pub use crate::error::{
    ArgsError, AtomError, CacheError, CantOpenReason, Error, FileError, FlushOutcome, IoError,
    Result, SymError,
};
pub use crate::flags::OpenFlags;
pub use crate::params::{AccessParams, CreateParams, TemplateStore};
pub use crate::probe::is_container;
pub use crate::shared::FileKey;

/// Opaque identifier for an open container handle, issued by [`create`]
/// and [`open`] and consumed by [`close`], [`flush`], and
/// [`get_create_params`].
pub type HandleId = u64;

/// Creates or overwrites a container file.
///
/// `overwrite` selects between the two flag sets a creator can want:
/// `true` maps to [`OpenFlags::OVERWRITE`] (replace or create fresh),
/// `false` to [`OpenFlags::CREATE_EXCLUSIVE`] (fail if the path already
/// exists). `creation_params_id` names a template registered with
/// [`register_create_params`]; `None` uses [`CreateParams::default`].
pub fn create<P: AsRef<Path>>(
    path: P,
    overwrite: bool,
    creation_params_id: Option<u32>,
) -> Result<HandleId> {
    let open_flags = if overwrite {
        OpenFlags::OVERWRITE
    } else {
        OpenFlags::CREATE_EXCLUSIVE
    };
    let create_params = resolve_template(creation_params_id)?;
    let file = file::File::open(path.as_ref(), open_flags, create_params)?;
    Ok(handles::register(file))
}

/// Opens an existing (or, with [`OpenFlags::CREATE`], not-yet-existing)
/// container file.
///
/// `access_params_id` names a creation-parameter template used only if
/// `access_flags` includes [`OpenFlags::CREATE`] and the path doesn't
/// yet exist; it has no effect when opening an already-initialized
/// container.
pub fn open<P: AsRef<Path>>(
    path: P,
    access_flags: OpenFlags,
    access_params_id: Option<u32>,
) -> Result<HandleId> {
    let create_params = resolve_template(access_params_id)?;
    let file = file::File::open(path.as_ref(), access_flags, create_params)?;
    Ok(handles::register(file))
}

fn resolve_template(id: Option<u32>) -> Result<CreateParams> {
    match id {
        Some(id) => params::templates().init(id),
        None => Ok(params::templates().default_template()),
    }
}

/// Flushes and releases a handle.
///
/// An `Err(Error::Sym(SymError::CantFlush))` means the flush completed
/// with contained objects still open: the handle is still fully torn
/// down, but the caller should know some state may not have reached
/// disk.
pub fn close(handle: HandleId) -> Result<()> {
    handles::take(handle)?.close()
}

/// Flushes a handle's dirty state to disk without releasing it.
pub fn flush(handle: HandleId, invalidate: bool) -> Result<FlushOutcome> {
    handles::with(handle, |file| file.flush(invalidate))?
}

/// The layout parameters in effect for the container `handle` is
/// attached to.
pub fn get_create_params(handle: HandleId) -> Result<CreateParams> {
    handles::with(handle, |file| file.create_params())
}

/// Registers a reusable creation-parameter template, for non-default
/// layouts (custom `userblock_size`, offset/length widths, and so on).
/// Returns the id to pass as `creation_params_id`/`access_params_id`.
pub fn register_create_params(create_params: CreateParams) -> u32 {
    params::templates().create(create_params)
}

/// Reads `buf.len()` bytes at logical address `addr` through `handle`.
pub fn read(handle: HandleId, addr: u64, buf: &mut [u8]) -> Result<()> {
    handles::with(handle, |file| file.read(addr, buf))?
}

/// Writes `buf` at logical address `addr` through `handle`. `handle`
/// must have been opened with [`OpenFlags::WRITE`].
pub fn write(handle: HandleId, addr: u64, buf: &[u8]) -> Result<()> {
    handles::with(handle, |file| file.write(addr, buf))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_close_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.cfl");

        let h1 = create(&path, true, None).unwrap();
        close(h1).unwrap();

        let h2 = open(&path, OpenFlags::empty(), None).unwrap();
        let params = get_create_params(h2).unwrap();
        assert_eq!(params, CreateParams::default());
        close(h2).unwrap();
    }

    #[test]
    fn exclusive_create_fails_on_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.cfl");

        let h1 = create(&path, true, None).unwrap();
        close(h1).unwrap();

        let err = create(&path, false, None).unwrap_err();
        assert!(matches!(err, Error::File(FileError::Exists { .. })));
    }

    #[test]
    fn double_open_shares_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.cfl");

        let h1 = create(&path, true, None).unwrap();
        let h2 = open(&path, OpenFlags::empty(), None).unwrap();

        // Logical address 0 is where the boot block itself lives; real
        // content starts further out, past its footprint.
        write(h1, 4096, b"hello").unwrap();
        let mut buf = [0u8; 5];
        read(h2, 4096, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        close(h2).unwrap();
        close(h1).unwrap();
    }

    #[test]
    fn read_only_then_write_upgrade() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.cfl");

        let h1 = create(&path, true, None).unwrap();
        close(h1).unwrap();

        let ro = open(&path, OpenFlags::empty(), None).unwrap();
        let rw = open(&path, OpenFlags::WRITE, None).unwrap();
        write(rw, 4096, b"xyz").unwrap();
        close(rw).unwrap();
        close(ro).unwrap();
    }

    #[test]
    fn not_a_container_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("e.bin");
        std::fs::write(&path, b"not a container file at all").unwrap();

        let err = open(&path, OpenFlags::empty(), None).unwrap_err();
        assert!(matches!(err, Error::File(FileError::NotContainer { .. })));
    }

    #[test]
    fn user_block_is_skipped_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.cfl");

        let params = CreateParams {
            userblock_size: 512,
            ..CreateParams::default()
        };
        let id = register_create_params(params);

        let h1 = create(&path, true, Some(id)).unwrap();
        write(h1, 4096, b"payload").unwrap();
        close(h1).unwrap();

        let h2 = open(&path, OpenFlags::empty(), None).unwrap();
        assert_eq!(get_create_params(h2).unwrap().userblock_size, 512);
        let mut buf = [0u8; 7];
        read(h2, 4096, &mut buf).unwrap();
        assert_eq!(&buf, b"payload");
        close(h2).unwrap();
    }

    #[test]
    fn missing_file_without_create_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.cfl");
        let err = open(&path, OpenFlags::empty(), None).unwrap_err();
        assert!(matches!(
            err,
            Error::File(FileError::CantOpen {
                reason: CantOpenReason::NotFound,
                ..
            })
        ));
    }
}
