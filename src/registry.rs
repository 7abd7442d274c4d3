//! Shared-state registry: maps `(device, inode)` to the live
//! [`SharedState`] for that physical file, so two opens of the same file
//! attach to one on-disk handle and one cache instead of each opening
//! their own.
//!
//! `spec.md` §9 notes the source scans the handle registry with a
//! predicate and that an equivalent correct design is a side-index
//! rebuilt on attach/detach; this is that side index. Single-threaded
//! cooperative model (`spec.md` §5), so a bare `RefCell` is enough — no
//! internal locking.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::shared::{FileKey, SharedState};

/// Shared ownership of a [`SharedState`], as described in `spec.md` §9's
/// design note: a sum of an owned per-handle record
/// ([`crate::file::File`]) and a separately allocated shared record whose
/// lifetime equals the maximum of its attached per-handle records.
pub type SharedRef = Rc<RefCell<SharedState>>;

/// Process-wide `(dev, ino) -> SharedState` index.
#[derive(Debug, Default)]
pub struct Registry {
    by_key: HashMap<FileKey, Weak<RefCell<SharedState>>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Registry {
            by_key: HashMap::new(),
        }
    }

    /// Find the shared state already open for `key`, if any live `File`
    /// still references it. Stale (dropped) weak entries are pruned
    /// lazily on lookup.
    pub(crate) fn find(&mut self, key: FileKey) -> Option<SharedRef> {
        match self.by_key.get(&key) {
            Some(weak) => match weak.upgrade() {
                Some(shared) => Some(shared),
                None => {
                    self.by_key.remove(&key);
                    None
                }
            },
            None => None,
        }
    }

    /// Register newly constructed shared state under its key.
    pub(crate) fn insert(&mut self, key: FileKey, shared: &SharedRef) {
        self.by_key.insert(key, Rc::downgrade(shared));
    }
}

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::new());
}

/// Look up shared state for `key`, running `f` against the process-wide
/// registry.
pub(crate) fn find(key: FileKey) -> Option<SharedRef> {
    REGISTRY.with(|r| r.borrow_mut().find(key))
}

/// Register `shared` under `key` in the process-wide registry.
pub(crate) fn insert(key: FileKey, shared: &SharedRef) {
    REGISTRY.with(|r| r.borrow_mut().insert(key, shared));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::OpenFlags;
    use crate::io::HostHandle;
    use crate::params::CreateParams;

    fn dummy_shared(key: FileKey) -> SharedRef {
        // A closed-at-drop handle pointed at /dev/null is enough to
        // exercise the registry without touching a real container file.
        let handle = HostHandle::open_existing(std::path::Path::new("/dev/null"), false).unwrap();
        Rc::new(RefCell::new(SharedState::new(
            key,
            OpenFlags::empty(),
            handle,
            CreateParams::default(),
        )))
    }

    #[test]
    fn insert_then_find_roundtrips() {
        let key = FileKey { dev: 1, ino: 2 };
        let shared = dummy_shared(key);
        insert(key, &shared);
        let found = find(key).expect("just inserted");
        assert!(Rc::ptr_eq(&found, &shared));
    }

    #[test]
    fn dropped_shared_state_is_pruned() {
        let key = FileKey { dev: 3, ino: 4 };
        {
            let shared = dummy_shared(key);
            insert(key, &shared);
        }
        assert!(find(key).is_none());
    }
}
