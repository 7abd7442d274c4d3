//! Boot-block codec: the fixed+variable header that identifies a
//! container file and records the parameters of its layout.
//!
//! The fixed part is 24 bytes, decoded with `zerocopy` the same way wire
//! structs are decoded elsewhere in this ecosystem (`#[repr(C)]` plus
//! `FromBytes`/`IntoBytes`/`KnownLayout`/`Immutable`); the variable part
//! has a width that depends on fields decoded from the fixed part, so it
//! is walked by hand with explicit little-endian helpers instead.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{CantOpenReason, Error};
use crate::io::{self, Cursor, HostHandle};
use crate::params::CreateParams;

/// 8-byte magic that opens every boot block.
pub const SIGNATURE: [u8; 8] = [0x81, b'C', b'F', b'L', b'E', 0x0d, 0x0a, 0x1a];

/// Size in bytes of the fixed part of the boot block.
pub const FIXED_SIZE: usize = 24;

/// Candidate offsets for the boot block: `0`, then `512, 1024, 2048, ...`.
/// `0` is conventionally distinct from "no user block": a `0` candidate
/// means `userblock_size == 0`, every other candidate `2^k` means
/// `userblock_size == 2^k`.
pub(crate) struct CandidateOffsets {
    next_pow: u32,
    first: bool,
    limit: Option<u64>,
}

impl CandidateOffsets {
    /// Produce the candidate sequence, optionally capped at `limit` bytes
    /// (the physical file length) to keep the scan from running forever
    /// against a corrupt or enormous file.
    pub(crate) fn new(limit: Option<u64>) -> Self {
        CandidateOffsets {
            next_pow: 9,
            first: true,
            limit,
        }
    }
}

impl Iterator for CandidateOffsets {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let candidate = if self.first {
            self.first = false;
            0
        } else {
            let c = 1u64 << self.next_pow;
            self.next_pow += 1;
            c
        };
        if let Some(limit) = self.limit {
            if candidate > limit {
                return None;
            }
        }
        Some(candidate)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct FixedPart {
    signature: [u8; 8],
    bootblock_ver: u8,
    smallobject_ver: u8,
    freespace_ver: u8,
    objectdir_ver: u8,
    sharedheader_ver: u8,
    offset_size: u8,
    length_size: u8,
    reserved: u8,
    sym_leaf_k: [u8; 2],
    btree_internal_k: [u8; 2],
    consist_flags: [u8; 4],
}

const _: () = assert!(std::mem::size_of::<FixedPart>() == FIXED_SIZE);

impl FixedPart {
    fn params_at(&self, userblock_size: u64) -> CreateParams {
        CreateParams {
            userblock_size,
            bootblock_ver: self.bootblock_ver,
            smallobject_ver: self.smallobject_ver,
            freespace_ver: self.freespace_ver,
            objectdir_ver: self.objectdir_ver,
            sharedheader_ver: self.sharedheader_ver,
            offset_size: self.offset_size,
            length_size: self.length_size,
            sym_leaf_k: u16::from_le_bytes(self.sym_leaf_k),
            btree_internal_k: u16::from_le_bytes(self.btree_internal_k),
        }
    }
}

/// The boot block's content, decoded from or about to be encoded to disk.
/// The opaque root entry is handled separately by the caller (it's
/// delegated to the root-entry collaborator), so it isn't parsed any
/// further by this type.
pub struct Decoded {
    /// Layout parameters recovered from the fixed+variable parts.
    pub params: CreateParams,
    /// 32-bit opaque consistency bitmap, preserved verbatim.
    pub consist_flags: u32,
    /// Logical offset of the small-object heap anchor.
    pub smallobj_off: u64,
    /// Logical offset of the free-list anchor.
    pub freespace_off: u64,
    /// Persisted length of the logical content.
    pub logical_len: u64,
    /// Raw bytes of the opaque root symbol-table entry, exactly
    /// `params.entry_size()` long.
    pub root_entry: Vec<u8>,
}

/// Why the boot-block scan failed to produce a [`Decoded`] value. Kept
/// free of any path so callers (the open engine) can attach the path
/// they already have when translating this into a public [`Error`].
pub(crate) enum DecodeFailure {
    /// No candidate offset up to the scan limit carried the signature.
    NotFound,
    /// A candidate matched the signature but failed validation.
    Invalid(CantOpenReason),
    /// A host I/O failure occurred while scanning or reading.
    Io(Error),
}

impl From<Error> for DecodeFailure {
    fn from(err: Error) -> Self {
        DecodeFailure::Io(err)
    }
}

fn decode_offset(width: u8, buf: &[u8]) -> u64 {
    match width {
        2 => u16::from_le_bytes(buf[..2].try_into().unwrap()) as u64,
        4 => u32::from_le_bytes(buf[..4].try_into().unwrap()) as u64,
        8 => u64::from_le_bytes(buf[..8].try_into().unwrap()),
        _ => unreachable!("width validated to {{2, 4, 8}} before this is called"),
    }
}

fn encode_offset(width: u8, value: u64, out: &mut Vec<u8>) {
    match width {
        2 => out.extend_from_slice(&(value as u16).to_le_bytes()),
        4 => out.extend_from_slice(&(value as u32).to_le_bytes()),
        8 => out.extend_from_slice(&value.to_le_bytes()),
        _ => unreachable!("width validated to {{2, 4, 8}} before this is called"),
    }
}

/// Scan candidate offsets for a matching boot block, decode it fully, and
/// return the result together with the `userblock_size` it was found at.
///
/// `file_len` bounds the scan so a corrupt file doesn't spin through the
/// entire unsigned-offset space. A candidate that doesn't leave room for
/// even the fixed part before `file_len` ends the scan rather than
/// reading past EOF.
pub(crate) fn decode(
    handle: &HostHandle,
    cursor: &mut Cursor,
    file_len: u64,
) -> Result<(Decoded, u64), DecodeFailure> {
    for userblock_size in CandidateOffsets::new(Some(file_len)) {
        if userblock_size + FIXED_SIZE as u64 > file_len {
            break;
        }
        let mut buf = [0u8; FIXED_SIZE];
        io::read_at(handle, cursor, userblock_size, 0, &mut buf)?;
        let fixed = FixedPart::read_from_bytes(&buf[..])
            .expect("buffer is exactly FIXED_SIZE bytes, matching FixedPart's layout");
        if fixed.signature != SIGNATURE {
            continue;
        }

        let params = fixed.params_at(userblock_size);
        params
            .validate_decoded()
            .map_err(DecodeFailure::Invalid)?;
        let consist_flags = u32::from_le_bytes(fixed.consist_flags);

        let variable_size =
            params.offset_size as usize * 2 + params.length_size as usize + params.entry_size();
        let mut var_buf = vec![0u8; variable_size];
        io::read_at(handle, cursor, userblock_size, FIXED_SIZE as u64, &mut var_buf)?;

        let mut at = 0usize;
        let smallobj_off = decode_offset(params.offset_size, &var_buf[at..]);
        at += params.offset_size as usize;
        let freespace_off = decode_offset(params.offset_size, &var_buf[at..]);
        at += params.offset_size as usize;
        let logical_len = decode_offset(params.length_size, &var_buf[at..]);
        at += params.length_size as usize;
        let root_entry = var_buf[at..at + params.entry_size()].to_vec();

        return Ok((
            Decoded {
                params,
                consist_flags,
                smallobj_off,
                freespace_off,
                logical_len,
                root_entry,
            },
            userblock_size,
        ));
    }

    Err(DecodeFailure::NotFound)
}

/// Build the fixed+variable boot block bytes, in the order they're
/// written to disk.
pub(crate) fn encode(
    params: &CreateParams,
    consist_flags: u32,
    smallobj_off: u64,
    freespace_off: u64,
    logical_len: u64,
    root_entry: &[u8],
) -> Vec<u8> {
    debug_assert_eq!(root_entry.len(), params.entry_size());

    let fixed = FixedPart {
        signature: SIGNATURE,
        bootblock_ver: params.bootblock_ver,
        smallobject_ver: params.smallobject_ver,
        freespace_ver: params.freespace_ver,
        objectdir_ver: params.objectdir_ver,
        sharedheader_ver: params.sharedheader_ver,
        offset_size: params.offset_size,
        length_size: params.length_size,
        reserved: 0,
        sym_leaf_k: params.sym_leaf_k.to_le_bytes(),
        btree_internal_k: params.btree_internal_k.to_le_bytes(),
        consist_flags: consist_flags.to_le_bytes(),
    };

    let mut out = Vec::with_capacity(
        FIXED_SIZE
            + params.offset_size as usize * 2
            + params.length_size as usize
            + root_entry.len(),
    );
    out.extend_from_slice(fixed.as_bytes());
    encode_offset(params.offset_size, smallobj_off, &mut out);
    encode_offset(params.offset_size, freespace_off, &mut out);
    encode_offset(params.length_size, logical_len, &mut out);
    out.extend_from_slice(root_entry);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::CreateParams;

    #[test]
    fn candidate_offsets_sequence() {
        let got: Vec<u64> = CandidateOffsets::new(None).take(5).collect();
        assert_eq!(got, vec![0, 512, 1024, 2048, 4096]);
    }

    #[test]
    fn candidate_offsets_respects_limit() {
        let got: Vec<u64> = CandidateOffsets::new(Some(1024)).collect();
        assert_eq!(got, vec![0, 512, 1024]);
    }

    #[test]
    fn fixed_part_round_trips_through_encode() {
        let params = CreateParams::default();
        let root_entry = vec![0xAB; params.entry_size()];
        let bytes = encode(&params, 0x03, 10, 20, 0, &root_entry);
        assert_eq!(&bytes[0..8], &SIGNATURE);
        assert_eq!(bytes[8], params.bootblock_ver);
        assert_eq!(bytes.len(), FIXED_SIZE + 4 + 4 + 4 + root_entry.len());
    }

    #[test]
    fn encode_offset_widths() {
        let mut out = Vec::new();
        encode_offset(2, 0x1234, &mut out);
        assert_eq!(out, vec![0x34, 0x12]);

        let mut out = Vec::new();
        encode_offset(8, 0x0102_0304_0506_0708, &mut out);
        assert_eq!(decode_offset(8, &out), 0x0102_0304_0506_0708);
    }

    // A file whose length is exactly a candidate offset (no room left for
    // even the fixed part there) must be reported as "not found", not as
    // an I/O error from reading past EOF.
    #[test]
    fn decode_reports_not_found_when_file_ends_exactly_at_a_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exact_boundary.bin");
        std::fs::write(&path, vec![0x11u8; 4096]).unwrap();

        let handle = HostHandle::open_existing(&path, false).unwrap();
        let mut cursor = Cursor::default();
        let file_len = io::current_length(&handle).unwrap();
        assert_eq!(file_len, 4096);

        let result = decode(&handle, &mut cursor, file_len);
        assert!(matches!(result, Err(DecodeFailure::NotFound)));
    }
}
