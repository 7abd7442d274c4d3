//! Host file descriptor wrapper and the positioned block-I/O layer.
//!
//! Talks straight to `libc` rather than going through `std::fs::File` —
//! this layer needs direct control over the cursor that `std::fs::File`'s
//! `Read`/`Write`/`Seek` traits would otherwise hide behind extra seeks.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::Path;

use log::debug;

use crate::error::{Error, IoError};

/// A raw host file descriptor, closed on drop.
///
/// A thin `RawFd` wrapper with an idempotent `close`, so double-close
/// (once explicitly, once via `Drop`) never double-closes the underlying
/// fd.
#[derive(Debug)]
pub(crate) struct HostHandle {
    fd: RawFd,
    closed: bool,
}

impl HostHandle {
    fn from_raw(fd: RawFd) -> Self {
        HostHandle { fd, closed: false }
    }

    /// Open an existing file with the given access mode (`O_RDONLY` or `O_RDWR`).
    pub(crate) fn open_existing(path: &Path, write: bool) -> std::io::Result<Self> {
        let mode = if write { libc::O_RDWR } else { libc::O_RDONLY };
        Self::raw_open(path, mode, 0)
    }

    /// Create (or truncate) a file for read-write access, `0666 & ~umask`.
    pub(crate) fn create_truncate(path: &Path) -> std::io::Result<Self> {
        Self::raw_open(
            path,
            libc::O_RDWR | libc::O_CREAT | libc::O_TRUNC,
            0o666,
        )
    }

    fn raw_open(path: &Path, flags: i32, mode: libc::mode_t) -> std::io::Result<Self> {
        let cpath = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let fd = unsafe { libc::open(cpath.as_ptr(), flags, mode as libc::c_uint) };
        if fd < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(Self::from_raw(fd))
    }

    pub(crate) fn as_raw(&self) -> RawFd {
        self.fd
    }

    /// Close the handle. Safe to call more than once.
    pub(crate) fn close(&mut self) {
        if !self.closed {
            unsafe {
                libc::close(self.fd);
            }
            self.closed = true;
        }
    }

    /// Seek to an absolute position. Exposed beyond `read_at`/`write_at`
    /// for callers (the signature probe) that need a raw seek without
    /// going through the seek-elision cursor.
    pub(crate) fn seek_to(&self, pos: u64) -> std::io::Result<()> {
        self.seek(pos)
    }

    fn seek(&self, pos: u64) -> std::io::Result<()> {
        let off = pos
            .try_into()
            .map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidInput))?;
        let rc = unsafe { libc::lseek(self.fd, off, libc::SEEK_SET) };
        if rc < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    /// Seek to end of file and return the resulting offset.
    pub(crate) fn seek_end(&self) -> std::io::Result<u64> {
        let rc = unsafe { libc::lseek(self.fd, 0, libc::SEEK_END) };
        if rc < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(rc as u64)
    }

    /// Current cursor position, via `SEEK_CUR` with a zero offset.
    pub(crate) fn tell(&self) -> std::io::Result<u64> {
        let rc = unsafe { libc::lseek(self.fd, 0, libc::SEEK_CUR) };
        if rc < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(rc as u64)
    }

    /// Read exactly `buf.len()` bytes from the current position, without
    /// going through the seek-elision cursor. Used by the signature
    /// probe, which re-seeks for every candidate anyway.
    pub(crate) fn read_into(&self, buf: &mut [u8]) -> std::io::Result<()> {
        self.read_exact(buf)
    }

    fn read_exact(&self, buf: &mut [u8]) -> std::io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let rc = unsafe {
                libc::read(
                    self.fd,
                    buf[filled..].as_mut_ptr() as *mut libc::c_void,
                    buf.len() - filled,
                )
            };
            if rc < 0 {
                return Err(std::io::Error::last_os_error());
            }
            if rc == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
            }
            filled += rc as usize;
        }
        Ok(())
    }

    fn write_all(&self, buf: &[u8]) -> std::io::Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let rc = unsafe {
                libc::write(
                    self.fd,
                    buf[written..].as_ptr() as *const libc::c_void,
                    buf.len() - written,
                )
            };
            if rc < 0 {
                return Err(std::io::Error::last_os_error());
            }
            written += rc as usize;
        }
        Ok(())
    }
}

impl Drop for HostHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Which operation a [`Cursor`] reflects. Kept as a two-variant enum (not
/// three) because "no previous op" is represented by [`Cursor::Unknown`]
/// rather than a third variant of this type.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum Op {
    Read,
    Write,
}

/// Seek-elision state: either nothing is known about the host cursor, or
/// the last operation of a known kind left it at a known physical
/// position. A single sum type rather than a `(last_op, cursor)` pair, so
/// "no previous op but a stale cursor value" can't be represented.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum Cursor {
    Unknown,
    At { op: Op, pos: u64 },
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor::Unknown
    }
}

impl Cursor {
    /// True if a seek can be skipped for `op` at physical position `phys`.
    fn elides(&self, op: Op, phys: u64) -> bool {
        matches!(self, Cursor::At { op: last, pos } if *last == op && *pos == phys)
    }
}

/// Read `buf.len()` bytes from logical address `addr`, eliding the host
/// seek when the cursor is already positioned correctly.
///
/// `userblock_size` shifts every logical address to its physical one.
pub(crate) fn read_at(
    handle: &HostHandle,
    cursor: &mut Cursor,
    userblock_size: u64,
    addr: u64,
    buf: &mut [u8],
) -> Result<(), Error> {
    if buf.is_empty() {
        return Ok(());
    }
    let phys = addr + userblock_size;
    if !cursor.elides(Op::Read, phys) {
        handle.seek(phys).map_err(IoError::SeekError)?;
    }
    *cursor = Cursor::At {
        op: Op::Read,
        pos: phys,
    };
    handle.read_exact(buf).map_err(IoError::ReadError)?;
    *cursor = Cursor::At {
        op: Op::Read,
        pos: phys + buf.len() as u64,
    };
    Ok(())
}

/// Write `buf` to logical address `addr`. Caller must have already
/// verified write intent; this function only applies the seek-elision
/// optimization.
pub(crate) fn write_at(
    handle: &HostHandle,
    cursor: &mut Cursor,
    userblock_size: u64,
    addr: u64,
    buf: &[u8],
) -> Result<(), Error> {
    if buf.is_empty() {
        return Ok(());
    }
    let phys = addr + userblock_size;
    if !cursor.elides(Op::Write, phys) {
        handle.seek(phys).map_err(IoError::SeekError)?;
    }
    *cursor = Cursor::At {
        op: Op::Write,
        pos: phys,
    };
    handle.write_all(buf).map_err(|e| IoError::WriteError(e.to_string()))?;
    *cursor = Cursor::At {
        op: Op::Write,
        pos: phys + buf.len() as u64,
    };
    Ok(())
}

/// Determine the current physical length of the file without disturbing
/// the seek-elision cursor: save the host cursor, seek to end, read the
/// length, then restore the saved position. The restore must not update
/// `cursor`, since it's a bookkeeping seek, not a logical read or write.
pub(crate) fn current_length(handle: &HostHandle) -> Result<u64, Error> {
    let saved = handle.tell().map_err(IoError::SeekError)?;
    let len = handle.seek_end().map_err(IoError::SeekError)?;
    handle.seek(saved).map_err(IoError::SeekError)?;
    debug!("probed file length {len}, restored cursor to {saved}");
    Ok(len)
}

