//! The reference-counted per-physical-file record that deduplicates
//! multiple logical opens of the same container.

use crate::collab::{Cache, RootEntry, Shadow};
use crate::flags::OpenFlags;
use crate::io::{Cursor, HostHandle};
use crate::params::CreateParams;

/// `(device, inode)` identity used to find whether a physical file is
/// already open in this process.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct FileKey {
    /// Host device id.
    pub dev: u64,
    /// Host inode number.
    pub ino: u64,
}

/// State shared by every [`crate::file::File`] handle attached to the
/// same physical file.
///
/// One of these exists per distinct `(dev, ino)` currently open in the
/// process; it is freed exactly when the last attached `File` is
/// destroyed.
#[derive(Debug)]
pub struct SharedState {
    pub(crate) key: FileKey,
    pub(crate) nrefs: usize,
    /// Bottom-level open intent: what the host handle actually supports.
    /// Monotonically non-decreasing — once any attached open asks for
    /// `WRITE`, this never loses that bit.
    pub(crate) flags: OpenFlags,
    pub(crate) handle: HostHandle,
    pub(crate) create_params: CreateParams,
    pub(crate) consist_flags: u32,
    pub(crate) smallobj_off: u64,
    pub(crate) freespace_off: u64,
    pub(crate) logical_len: u64,
    pub(crate) root_ent: RootEntry,
    pub(crate) cache: Cache,
    pub(crate) shadow: Shadow,
    pub(crate) cursor: Cursor,
}

impl SharedState {
    /// The `(dev, ino)` identity this shared state was registered under.
    pub(crate) fn key(&self) -> FileKey {
        self.key
    }

    pub(crate) fn new(
        key: FileKey,
        flags: OpenFlags,
        handle: HostHandle,
        create_params: CreateParams,
    ) -> Self {
        SharedState {
            key,
            nrefs: 1,
            flags,
            handle,
            create_params,
            consist_flags: 0,
            smallobj_off: 0,
            freespace_off: 0,
            logical_len: 0,
            root_ent: RootEntry::fresh(&create_params),
            cache: Cache::new(),
            shadow: Shadow::new(),
            cursor: Cursor::default(),
        }
    }
}
