//! Narrow stand-ins for the external collaborators named in `spec.md` §6:
//! the metadata cache (`CACHE`), the root symbol-table entry encoder
//! (`ROOT`), and the open-object/shadow tracker (`SHADOW`).
//!
//! None of these re-implements its real subsystem — `spec.md` §1 is
//! explicit that they're external collaborators, re-specified only
//! through the narrow interfaces below. What's here is just enough to
//! exercise the container core end-to-end: construct one, flush it,
//! destroy it, and (for `RootEntry`) round-trip an opaque blob through
//! the boot block.

use crate::error::{CacheError, Result, SymError};
use crate::params::CreateParams;

/// Stand-in for the `CACHE` collaborator: `new`, `flush`, `destroy`.
#[derive(Debug, Default)]
pub(crate) struct Cache {
    flushed: bool,
}

impl Cache {
    pub(crate) fn new() -> Self {
        Cache { flushed: false }
    }

    /// Flush (and optionally invalidate) the entire cache.
    ///
    /// The real `CACHE` walks dirty entries and writes each back; this
    /// stand-in has no entries of its own to track, so it only records
    /// that a flush happened, which is enough for [`crate::file::File`]'s
    /// close/reopen round-trip tests to observe.
    pub(crate) fn flush(&mut self, invalidate: bool) -> Result<()> {
        self.flushed = true;
        if invalidate {
            self.flushed = false;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn was_flushed(&self) -> bool {
        self.flushed
    }
}

/// Stand-in for the `ROOT` collaborator: encode/decode the opaque root
/// symbol-table entry, and report its on-disk width.
#[derive(Debug, Clone, Default)]
pub(crate) struct RootEntry {
    bytes: Vec<u8>,
}

impl RootEntry {
    /// Decode from the raw bytes already read out of the boot block's
    /// variable part (the container core doesn't interpret them, only
    /// delegates).
    pub(crate) fn decode(raw: &[u8]) -> Self {
        RootEntry {
            bytes: raw.to_vec(),
        }
    }

    /// Fresh root entry for a newly created file: zero-filled, the width
    /// the given layout parameters dictate.
    pub(crate) fn fresh(params: &CreateParams) -> Self {
        RootEntry {
            bytes: vec![0u8; params.entry_size()],
        }
    }

    /// The bytes to write back into the boot block's variable part.
    pub(crate) fn encode(&self) -> &[u8] {
        &self.bytes
    }
}

/// Stand-in for the `SHADOW` collaborator: the open-object/shadow
/// tracker whose flush outcome can tunnel a distinguished "objects still
/// open" result through [`crate::file::File::close`].
#[derive(Debug, Default)]
pub(crate) struct Shadow {
    open_objects: usize,
}

impl Shadow {
    pub(crate) fn new() -> Self {
        Shadow { open_objects: 0 }
    }

    /// Register that a contained object is open, preventing a clean
    /// flush until it's released. Exposed for tests exercising the
    /// `StillOpen` tunnel; the core itself never opens contained objects.
    #[cfg(test)]
    pub(crate) fn hold_open(&mut self) {
        self.open_objects += 1;
    }

    #[cfg(test)]
    pub(crate) fn release(&mut self) {
        self.open_objects = self.open_objects.saturating_sub(1);
    }

    /// Flush the tracker's bookkeeping. Returns `Err(SymError::CantFlush)`
    /// — the distinguished non-fatal outcome, not a generic failure — if
    /// objects are still open.
    pub(crate) fn flush(&mut self, _invalidate: bool) -> std::result::Result<(), SymError> {
        if self.open_objects > 0 {
            return Err(SymError::CantFlush);
        }
        Ok(())
    }
}

/// Translate a [`CacheError`] into the crate-wide [`crate::error::Error`].
/// Kept as a function (rather than a blanket `From`) since `CacheError`
/// only ever arises from [`Cache::flush`] in one call site.
pub(crate) fn cache_flush_failed() -> crate::error::Error {
    CacheError::CantFlush.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_flush_invalidate_clears_flushed_flag() {
        let mut cache = Cache::new();
        cache.flush(false).unwrap();
        assert!(cache.was_flushed());
        cache.flush(true).unwrap();
        assert!(!cache.was_flushed());
    }

    #[test]
    fn root_entry_fresh_is_correctly_sized_and_round_trips() {
        let params = CreateParams::default();
        let entry = RootEntry::fresh(&params);
        assert_eq!(entry.encode().len(), params.entry_size());

        let decoded = RootEntry::decode(entry.encode());
        assert_eq!(decoded.encode(), entry.encode());
    }

    #[test]
    fn shadow_blocks_flush_while_objects_are_open() {
        let mut shadow = Shadow::new();
        assert!(shadow.flush(false).is_ok());

        shadow.hold_open();
        assert!(matches!(shadow.flush(false), Err(SymError::CantFlush)));

        shadow.release();
        assert!(shadow.flush(false).is_ok());
    }
}
