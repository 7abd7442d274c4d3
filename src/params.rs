//! Creation/layout parameters and the TEMPLATE collaborator stand-in.
//!
//! `CreateParams` is the decoded/encoded content of the boot block's fixed
//! and variable parts (minus the root entry, which is opaque to this
//! crate and lives on [`crate::shared::SharedState::root_ent`]).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, OnceLock};

use crate::error::{ArgsError, CantOpenReason, Error, FileError};

/// Single accepted version for every versioned boot-block field. The
/// format does not evolve: decode rejects anything else outright.
pub const ACCEPTED_VERSION: u8 = 0;

/// Width, in bytes, a multi-byte boot-block integer field may take.
pub const VALID_WIDTHS: [u8; 3] = [2, 4, 8];

/// Creation/layout parameters of a container file.
///
/// Assigned once per [`crate::shared::SharedState`], the moment its
/// reference count transitions from 0 to 1, and immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateParams {
    /// Size of the opaque user-block prefix: `0` or `2^k` for `k >= 9`.
    pub userblock_size: u64,
    /// Boot block format version. Always [`ACCEPTED_VERSION`] after decode.
    pub bootblock_ver: u8,
    /// Small-object heap format version.
    pub smallobject_ver: u8,
    /// Free-space format version.
    pub freespace_ver: u8,
    /// Object-directory format version.
    pub objectdir_ver: u8,
    /// Shared-header format version.
    pub sharedheader_ver: u8,
    /// Width in bytes of an on-disk offset: one of `{2, 4, 8}`.
    pub offset_size: u8,
    /// Width in bytes of an on-disk length: one of `{2, 4, 8}`.
    pub length_size: u8,
    /// Symbol-table leaf node split rank. Must be `>= 1`.
    pub sym_leaf_k: u16,
    /// B-tree internal node split rank. Must be `>= 1`.
    pub btree_internal_k: u16,
}

impl Default for CreateParams {
    fn default() -> Self {
        CreateParams {
            userblock_size: 0,
            bootblock_ver: ACCEPTED_VERSION,
            smallobject_ver: ACCEPTED_VERSION,
            freespace_ver: ACCEPTED_VERSION,
            objectdir_ver: ACCEPTED_VERSION,
            sharedheader_ver: ACCEPTED_VERSION,
            offset_size: 4,
            length_size: 4,
            sym_leaf_k: 4,
            btree_internal_k: 16,
        }
    }
}

impl CreateParams {
    /// Width, in bytes, of the opaque root symbol-table entry blob that
    /// follows the variable part of the boot block. Delegated to the
    /// `Root` collaborator's `size_of_entry`; the in-process stand-in
    /// pins this to two address-width offsets plus an 8-byte fixed
    /// object-header part.
    pub fn entry_size(&self) -> usize {
        self.offset_size as usize * 2 + 8
    }

    /// Validate a decoded fixed part, translating the first violation
    /// into the matching [`CantOpenReason`].
    pub(crate) fn validate_decoded(&self) -> std::result::Result<(), CantOpenReason> {
        if self.bootblock_ver != ACCEPTED_VERSION {
            return Err(CantOpenReason::BadBootblockVersion);
        }
        if self.smallobject_ver != ACCEPTED_VERSION {
            return Err(CantOpenReason::BadSmallobjectVersion);
        }
        if self.freespace_ver != ACCEPTED_VERSION {
            return Err(CantOpenReason::BadFreespaceVersion);
        }
        if self.objectdir_ver != ACCEPTED_VERSION {
            return Err(CantOpenReason::BadObjectdirVersion);
        }
        if self.sharedheader_ver != ACCEPTED_VERSION {
            return Err(CantOpenReason::BadSharedheaderVersion);
        }
        if !VALID_WIDTHS.contains(&self.offset_size) {
            return Err(CantOpenReason::BadOffsetSize);
        }
        if !VALID_WIDTHS.contains(&self.length_size) {
            return Err(CantOpenReason::BadLengthSize);
        }
        if self.sym_leaf_k < 1 {
            return Err(CantOpenReason::BadSymLeafK);
        }
        if self.btree_internal_k < 1 {
            return Err(CantOpenReason::BadBtreeInternalK);
        }
        Ok(())
    }
}

/// Caller-visible access parameters passed to [`crate::open`]. Currently
/// empty: the only per-open tuning exposed at this layer is the creation
/// template used on first-time initialization, which is threaded through
/// separately as `CreateParams`. Kept as a distinct type (rather than
/// reusing `CreateParams`) so the public API shape keeps access
/// parameters conceptually independent of creation parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessParams;

/// Minimal in-process stand-in for an external creation-parameter
/// template registry: a store of named [`CreateParams`] templates, keyed
/// by an opaque id, so callers can register a non-default layout once and
/// reuse it across multiple [`crate::create`] calls.
#[derive(Debug, Default)]
pub struct TemplateStore {
    templates: Mutex<HashMap<u32, CreateParams>>,
}

static NEXT_TEMPLATE_ID: AtomicU32 = AtomicU32::new(1);

impl TemplateStore {
    /// Register a new creation-parameter template, returning its id.
    pub fn create(&self, params: CreateParams) -> u32 {
        let id = NEXT_TEMPLATE_ID.fetch_add(1, Ordering::Relaxed);
        self.templates.lock().unwrap().insert(id, params);
        id
    }

    /// Fetch a previously registered template by id.
    pub fn init(&self, id: u32) -> Result<CreateParams, Error> {
        self.templates
            .lock()
            .unwrap()
            .get(&id)
            .copied()
            .ok_or_else(|| {
                ArgsError::BadValue(format!("no such creation-parameter template: {id}")).into()
            })
    }

    /// The default template: [`CreateParams::default`].
    pub fn default_template(&self) -> CreateParams {
        CreateParams::default()
    }
}

static TEMPLATES: OnceLock<TemplateStore> = OnceLock::new();

/// Process-wide default template store.
pub fn templates() -> &'static TemplateStore {
    TEMPLATES.get_or_init(TemplateStore::default)
}

/// Validate the caller-visible precondition shared by `Create`/`Open`:
/// `CREATE`/`TRUNCATE` both require `WRITE`. Centralized here since both
/// the open engine and its callers check it.
pub(crate) fn require_write(flags: crate::flags::OpenFlags, path: &std::path::Path) -> Result<(), Error> {
    use crate::flags::OpenFlags;
    if flags.intersects(OpenFlags::CREATE | OpenFlags::TRUNCATE) && !flags.contains(OpenFlags::WRITE) {
        return Err(FileError::BadValue {
            path: path.to_path_buf(),
            reason: "CREATE/TRUNCATE requires WRITE".to_string(),
        }
        .into());
    }
    Ok(())
}
