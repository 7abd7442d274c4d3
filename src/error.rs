//! Error taxonomy for the container-file core.
//!
//! Mirrors the namespace/variant split the source library uses internally
//! (`Args`, `File`, `Io`, `Cache`, `Sym`, `Atom`) rather than flattening
//! everything into one enum. Each leaf carries enough context to explain
//! itself without the caller needing to know the internal call site.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by argument validation, before any I/O is attempted.
#[derive(Debug, Error)]
pub enum ArgsError {
    /// A caller-supplied value was out of the accepted domain.
    #[error("bad value: {0}")]
    BadValue(String),
    /// A caller-supplied range was invalid (e.g. zero-length where not allowed).
    #[error("bad range: {0}")]
    BadRange(String),
    /// A caller-supplied value had the wrong type/shape.
    #[error("bad type: {0}")]
    BadType(String),
}

/// Errors raised while opening, creating, or decoding a container file.
#[derive(Debug, Error)]
pub enum FileError {
    /// The path refers to something that isn't a valid container.
    #[error("{path}: bad file")]
    BadFile {
        /// Path that failed.
        path: PathBuf,
    },
    /// `EXCLUSIVE` was requested but the path already exists.
    #[error("{path}: already exists")]
    Exists {
        /// Path that failed.
        path: PathBuf,
    },
    /// `TRUNCATE` was requested but the file is already open.
    #[error("{path}: file already open, cannot truncate")]
    FileOpen {
        /// Path that failed.
        path: PathBuf,
    },
    /// The host file could not be created or truncated.
    #[error("{path}: cannot create")]
    CantCreate {
        /// Path that failed.
        path: PathBuf,
    },
    /// The host file exists but could not be opened.
    #[error("{path}: cannot open")]
    CantOpen {
        /// Path that failed.
        path: PathBuf,
        /// Why the open/decode attempt was rejected.
        reason: CantOpenReason,
    },
    /// A new file's boot block could not be written.
    #[error("{path}: cannot initialize boot block")]
    CantInit {
        /// Path that failed.
        path: PathBuf,
    },
    /// No candidate offset in the signature scan matched.
    #[error("{path}: not a container file")]
    NotContainer {
        /// Path that failed.
        path: PathBuf,
    },
    /// A caller-visible argument was invalid at the `File` level
    /// (e.g. `CREATE`/`TRUNCATE` without `WRITE`).
    #[error("{path}: bad value: {reason}")]
    BadValue {
        /// Path that failed.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },
    /// The file exists but isn't readable by this process.
    #[error("{path}: not readable")]
    ReadError {
        /// Path that failed.
        path: PathBuf,
    },
    /// `WRITE` was requested but the file isn't writable by this process.
    #[error("{path}: not writable")]
    WriteError {
        /// Path that failed.
        path: PathBuf,
    },
}

/// Sub-reason attached to [`FileError::CantOpen`] during boot-block decode.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
pub enum CantOpenReason {
    /// `bootblock_ver` did not equal the single accepted version.
    #[error("bad boot block version")]
    BadBootblockVersion,
    /// `smallobject_ver` did not equal the single accepted version.
    #[error("bad small object heap version")]
    BadSmallobjectVersion,
    /// `freespace_ver` did not equal the single accepted version.
    #[error("bad free space version")]
    BadFreespaceVersion,
    /// `objectdir_ver` did not equal the single accepted version.
    #[error("bad object directory version")]
    BadObjectdirVersion,
    /// `sharedheader_ver` did not equal the single accepted version.
    #[error("bad shared header version")]
    BadSharedheaderVersion,
    /// `offset_size` was not one of `{2, 4, 8}`.
    #[error("bad offset size")]
    BadOffsetSize,
    /// `length_size` was not one of `{2, 4, 8}`.
    #[error("bad length size")]
    BadLengthSize,
    /// `sym_leaf_k` was `< 1`.
    #[error("bad symbol table leaf node rank")]
    BadSymLeafK,
    /// `btree_internal_k` was `< 1`.
    #[error("bad B-tree internal node rank")]
    BadBtreeInternalK,
    /// The root symbol-table entry failed to decode.
    #[error("cannot read root symbol table entry")]
    BadRootEntry,
    /// A reopen for write access was requested but failed at the host.
    #[error("file cannot be reopened with write access")]
    CantReopenForWrite,
    /// `CREATE` was not set and no file exists at the given path.
    #[error("no such file, and CREATE was not set")]
    NotFound,
    /// The host `open()` call failed for a reason other than a boot-block
    /// decode failure (permissions changed between `stat` and `open`, a
    /// path component removed concurrently, and similar races).
    #[error("host open() failed")]
    HostOpenFailed,
}

/// Errors raised by the positioned block-I/O layer.
#[derive(Debug, Error)]
pub enum IoError {
    /// The host seek call failed.
    #[error("seek failed: {0}")]
    SeekError(#[source] std::io::Error),
    /// The host read call failed, or returned short.
    #[error("read failed: {0}")]
    ReadError(#[source] std::io::Error),
    /// The host write call failed, the handle isn't open for write, or
    /// the write returned short.
    #[error("write failed: {0}")]
    WriteError(String),
}

/// Errors raised by the CACHE collaborator.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache could not be fully flushed (and optionally invalidated).
    #[error("cache flush failed")]
    CantFlush,
}

/// Errors raised by the SHADOW (open-object tracker) collaborator.
#[derive(Debug, Error)]
pub enum SymError {
    /// Distinguished non-fatal-yet outcome: the shadow tracker reported
    /// that objects are still open, so invalidation was incomplete. This
    /// is tunneled through [`crate::file::File::close`] rather than
    /// treated as a hard failure.
    #[error("objects still open, flush incomplete")]
    CantFlush,
}

/// Errors raised by the HANDLES collaborator (opaque id registry).
#[derive(Debug, Error)]
pub enum AtomError {
    /// An id did not resolve to a live object of the expected kind.
    #[error("bad handle")]
    BadAtom,
    /// A new object could not be registered.
    #[error("cannot register handle")]
    CantRegister,
}

/// The union of every error this crate returns.
#[derive(Debug, Error)]
pub enum Error {
    /// See [`ArgsError`].
    #[error(transparent)]
    Args(#[from] ArgsError),
    /// See [`FileError`].
    #[error(transparent)]
    File(#[from] FileError),
    /// See [`IoError`].
    #[error(transparent)]
    Io(#[from] IoError),
    /// See [`CacheError`].
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// See [`SymError`].
    #[error(transparent)]
    Sym(#[from] SymError),
    /// See [`AtomError`].
    #[error(transparent)]
    Atom(#[from] AtomError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The tri-state outcome of [`crate::file::File::flush`]: success, a hard
/// failure, or the distinguished "objects still open" outcome that is not
/// an error for the purposes of continuing a close, but must still be
/// surfaced to the caller.
#[derive(Debug)]
pub enum FlushOutcome {
    /// Flush completed with nothing outstanding.
    Ok,
    /// Flush completed, but the shadow tracker reports objects still open.
    StillOpen,
}
