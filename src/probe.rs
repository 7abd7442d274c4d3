//! The signature probe: `is_container`, `spec.md` §4.5.

use std::path::Path;

use crate::bootblock::{FIXED_SIZE, SIGNATURE};
use crate::error::{Error, IoError};
use crate::io::HostHandle;

/// Scan candidate offsets `0, 512, 1024, 2048, ...` up to the file's
/// length for the boot-block signature. Returns `true` on the first
/// match, `false` if the scan exhausts the file without one.
///
/// Unlike [`crate::bootblock::decode`], this only needs the first 8
/// bytes of each candidate, so it doesn't bother constructing a
/// [`crate::io::Cursor`] for seek elision — each candidate needs its own
/// seek anyway.
pub fn is_container<P: AsRef<Path>>(path: P) -> Result<bool, Error> {
    let handle = HostHandle::open_existing(path.as_ref(), false).map_err(|e| {
        Error::from(IoError::ReadError(e))
    })?;
    let len = handle.seek_end().map_err(IoError::SeekError)?;

    let mut pos = 0u64;
    loop {
        if pos + 8 > len {
            return Ok(false);
        }
        let mut sig = [0u8; 8];
        seek_and_read(&handle, pos, &mut sig)?;
        if sig == SIGNATURE {
            return Ok(true);
        }
        pos = next_candidate(pos);
    }
}

fn seek_and_read(handle: &HostHandle, pos: u64, buf: &mut [u8]) -> Result<(), Error> {
    handle.seek_to(pos).map_err(IoError::SeekError)?;
    handle.read_into(buf).map_err(IoError::ReadError)?;
    Ok(())
}

fn next_candidate(pos: u64) -> u64 {
    if pos == 0 { 512 } else { pos * 2 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn finds_signature_at_offset_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&SIGNATURE).unwrap();
        f.write_all(&[0u8; FIXED_SIZE - 8]).unwrap();
        assert!(is_container(&path).unwrap());
    }

    #[test]
    fn finds_signature_at_user_block_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.bin");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&[0xAAu8; 512]).unwrap();
        f.write_all(&SIGNATURE).unwrap();
        assert!(is_container(&path).unwrap());
    }

    #[test]
    fn no_signature_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.bin");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&[0x11u8; 4096]).unwrap();
        assert!(!is_container(&path).unwrap());
    }

    #[test]
    fn empty_file_is_not_a_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.bin");
        std::fs::File::create(&path).unwrap();
        assert!(!is_container(&path).unwrap());
    }
}
