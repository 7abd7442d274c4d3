//! The per-open container handle, and the open/flush/close engine of
//! `spec.md` §4.3–4.4.

use std::cell::RefCell;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::debug;

use crate::bootblock::{self, DecodeFailure};
use crate::collab::{self, RootEntry};
use crate::error::{CantOpenReason, FileError, FlushOutcome, IoError, Result};
use crate::flags::OpenFlags;
use crate::io::{self, HostHandle};
use crate::params::{self, CreateParams};
use crate::registry;
use crate::shared::{FileKey, SharedState};

/// One per logical open. Holds the path, the caller's access intent, and
/// a reference to the state shared with every other `File` attached to
/// the same physical file.
#[derive(Debug)]
pub struct File {
    path: PathBuf,
    intent: OpenFlags,
    shared: Rc<RefCell<SharedState>>,
}

fn stat_path(path: &Path) -> std::io::Result<libc::stat> {
    let cpath = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::stat(cpath.as_ptr(), &mut st) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(st)
}

fn access_ok(path: &Path, mode: libc::c_int) -> bool {
    match CString::new(path.as_os_str().as_bytes()) {
        Ok(cpath) => unsafe { libc::access(cpath.as_ptr(), mode) == 0 },
        Err(_) => false,
    }
}

fn key_of(st: &libc::stat) -> FileKey {
    FileKey {
        dev: st.st_dev as u64,
        ino: st.st_ino as u64,
    }
}

impl File {
    /// `Open(name, flags, default_create_params)` of `spec.md` §4.3.
    pub fn open(path: &Path, flags: OpenFlags, default_create_params: CreateParams) -> Result<File> {
        let path_buf = path.to_path_buf();

        let (shared, empty_file) = match stat_path(path) {
            Ok(st) => Self::open_existing(path, &path_buf, st, flags, default_create_params)?,
            Err(_) => Self::open_absent(path, &path_buf, flags, default_create_params)?,
        };

        let file = File {
            path: path_buf,
            intent: flags,
            shared,
        };

        finalize_attach(&file, empty_file)?;

        Ok(file)
    }

    fn open_existing(
        path: &Path,
        path_buf: &Path,
        st: libc::stat,
        flags: OpenFlags,
        default_create_params: CreateParams,
    ) -> Result<(Rc<RefCell<SharedState>>, bool)> {
        if flags.contains(OpenFlags::EXCLUSIVE) {
            return Err(FileError::Exists {
                path: path_buf.to_path_buf(),
            }
            .into());
        }
        if !access_ok(path, libc::R_OK) {
            return Err(FileError::ReadError {
                path: path_buf.to_path_buf(),
            }
            .into());
        }
        if flags.contains(OpenFlags::WRITE) && !access_ok(path, libc::W_OK) {
            return Err(FileError::WriteError {
                path: path_buf.to_path_buf(),
            }
            .into());
        }

        let key = key_of(&st);

        if let Some(shared) = registry::find(key) {
            if flags.contains(OpenFlags::TRUNCATE) {
                return Err(FileError::FileOpen {
                    path: path_buf.to_path_buf(),
                }
                .into());
            }
            let needs_upgrade =
                flags.contains(OpenFlags::WRITE) && !shared.borrow().flags.contains(OpenFlags::WRITE);
            if needs_upgrade {
                match HostHandle::open_existing(path, true) {
                    Ok(new_handle) => {
                        let mut s = shared.borrow_mut();
                        s.handle = new_handle;
                        s.flags |= OpenFlags::WRITE;
                        debug!("upgraded shared state for {key:?} to read-write");
                    }
                    Err(_) => {
                        // Leave the existing read-only handle and flags
                        // untouched; no partial mutation is visible to
                        // other attached handles.
                        return Err(FileError::CantOpen {
                            path: path_buf.to_path_buf(),
                            reason: CantOpenReason::CantReopenForWrite,
                        }
                        .into());
                    }
                }
            }
            shared.borrow_mut().nrefs += 1;
            Ok((shared, false))
        } else if flags.contains(OpenFlags::TRUNCATE) {
            params::require_write(flags, path_buf)?;
            let handle = HostHandle::create_truncate(path).map_err(|_| FileError::CantCreate {
                path: path_buf.to_path_buf(),
            })?;
            let shared = Rc::new(RefCell::new(SharedState::new(
                key,
                flags,
                handle,
                default_create_params,
            )));
            registry::insert(key, &shared);
            Ok((shared, true))
        } else {
            let handle =
                HostHandle::open_existing(path, flags.contains(OpenFlags::WRITE)).map_err(|_| {
                    FileError::CantOpen {
                        path: path_buf.to_path_buf(),
                        reason: CantOpenReason::HostOpenFailed,
                    }
                })?;
            let shared = Rc::new(RefCell::new(SharedState::new(
                key,
                flags,
                handle,
                default_create_params,
            )));
            registry::insert(key, &shared);
            Ok((shared, false))
        }
    }

    fn open_absent(
        path: &Path,
        path_buf: &Path,
        flags: OpenFlags,
        default_create_params: CreateParams,
    ) -> Result<(Rc<RefCell<SharedState>>, bool)> {
        if !flags.contains(OpenFlags::CREATE) {
            return Err(FileError::CantOpen {
                path: path_buf.to_path_buf(),
                reason: CantOpenReason::NotFound,
            }
            .into());
        }
        params::require_write(flags, path_buf)?;
        let handle = HostHandle::create_truncate(path).map_err(|_| FileError::CantCreate {
            path: path_buf.to_path_buf(),
        })?;
        let st = stat_path(path).map_err(|_| FileError::CantCreate {
            path: path_buf.to_path_buf(),
        })?;
        let key = key_of(&st);
        let shared = Rc::new(RefCell::new(SharedState::new(
            key,
            flags,
            handle,
            default_create_params,
        )));
        registry::insert(key, &shared);
        Ok((shared, true))
    }

    /// `Flush(file, invalidate)` of `spec.md` §4.4.
    pub fn flush(&self, invalidate: bool) -> Result<FlushOutcome> {
        let mut s = self.shared.borrow_mut();
        if !s.flags.contains(OpenFlags::WRITE) {
            return Ok(FlushOutcome::Ok);
        }

        let shadow_result = s.shadow.flush(invalidate);

        s.cache
            .flush(invalidate)
            .map_err(|_| collab::cache_flush_failed())?;

        let root_bytes = s.root_ent.encode().to_vec();
        let bytes = bootblock::encode(
            &s.create_params,
            s.consist_flags,
            s.smallobj_off,
            s.freespace_off,
            s.logical_len,
            &root_bytes,
        );
        let written_len = bytes.len() as u64;

        let state = &mut *s;
        io::write_at(
            &state.handle,
            &mut state.cursor,
            state.create_params.userblock_size,
            0,
            &bytes,
        )?;
        if state.logical_len == 0 {
            state.logical_len = written_len;
        }

        if shadow_result.is_err() {
            return Ok(FlushOutcome::StillOpen);
        }
        Ok(FlushOutcome::Ok)
    }

    /// `Close(file)` of `spec.md` §4.4. Consumes `self`: the final
    /// per-handle teardown (nrefs decrement, and the host handle/cache/
    /// root entry/shadow-table destruction once the last reference goes
    /// away) happens via ordinary drop when this function returns. The
    /// host handle lives on the shared state, not on `self`, so it must
    /// not be closed here directly — other attached `File`s may still be
    /// holding the same `Rc`; `HostHandle`'s own `Drop` closes the fd once
    /// the last attachment is released.
    pub fn close(self) -> Result<()> {
        let outcome = self.flush(true);

        match outcome {
            Ok(FlushOutcome::StillOpen) => Err(crate::error::SymError::CantFlush.into()),
            Ok(FlushOutcome::Ok) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// `GetCreateParams(handle_id)` of `spec.md` §6.
    pub fn create_params(&self) -> CreateParams {
        self.shared.borrow().create_params
    }

    /// The caller-supplied access intent this handle was opened with.
    pub fn intent(&self) -> OpenFlags {
        self.intent
    }

    /// The path this handle was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Read(f, addr, size, buf)` of `spec.md` §4.1 (size is `buf.len()`).
    pub fn read(&self, addr: u64, buf: &mut [u8]) -> Result<()> {
        let mut s = self.shared.borrow_mut();
        let state = &mut *s;
        io::read_at(
            &state.handle,
            &mut state.cursor,
            state.create_params.userblock_size,
            addr,
            buf,
        )
    }

    /// `Write(f, addr, size, buf)` of `spec.md` §4.1 (size is `buf.len()`).
    pub fn write(&self, addr: u64, buf: &[u8]) -> Result<()> {
        if !buf.is_empty() && !self.intent.contains(OpenFlags::WRITE) {
            return Err(IoError::WriteError(
                "file was not opened with write intent".to_string(),
            )
            .into());
        }
        let mut s = self.shared.borrow_mut();
        let state = &mut *s;
        io::write_at(
            &state.handle,
            &mut state.cursor,
            state.create_params.userblock_size,
            addr,
            buf,
        )
    }

    /// True if `self` and `other` are attached to the same shared state
    /// (the same physical `(dev, ino)`), i.e. a double-open was deduped.
    pub fn shares_state_with(&self, other: &File) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Drop for File {
    fn drop(&mut self) {
        let mut s = self.shared.borrow_mut();
        s.nrefs = s.nrefs.saturating_sub(1);
    }
}

/// Materialize the boot block (first-time init or decode scan) and run
/// the unconditional trailing-size synchronization, per `spec.md` §4.3.
fn finalize_attach(file: &File, empty_file: bool) -> Result<()> {
    let is_first_attach = file.shared.borrow().nrefs == 1;

    if empty_file {
        file.shared.borrow_mut().consist_flags = 0x03;
        match file.flush(false) {
            Ok(_) => {}
            Err(_) => {
                return Err(FileError::CantInit {
                    path: file.path.clone(),
                }
                .into());
            }
        }
    } else if is_first_attach {
        let mut s = file.shared.borrow_mut();
        let state = &mut *s;
        debug!("decoding boot block for {:?}", state.key());
        let file_len = io::current_length(&state.handle)?;
        match bootblock::decode(&state.handle, &mut state.cursor, file_len) {
            Ok((decoded, _userblock_size)) => {
                state.create_params = decoded.params;
                state.consist_flags = decoded.consist_flags;
                state.smallobj_off = decoded.smallobj_off;
                state.freespace_off = decoded.freespace_off;
                state.logical_len = decoded.logical_len;
                state.root_ent = RootEntry::decode(&decoded.root_entry);
            }
            Err(DecodeFailure::NotFound) => {
                drop(s);
                return Err(FileError::NotContainer {
                    path: file.path.clone(),
                }
                .into());
            }
            Err(DecodeFailure::Invalid(reason)) => {
                drop(s);
                return Err(FileError::CantOpen {
                    path: file.path.clone(),
                    reason,
                }
                .into());
            }
            Err(DecodeFailure::Io(e)) => {
                drop(s);
                return Err(e);
            }
        }
    }

    let mut s = file.shared.borrow_mut();
    let len = io::current_length(&s.handle)?;
    s.logical_len = len;
    Ok(())
}
