//! Access flags for [`create`](crate::create) and [`open`](crate::open).

use bitflags::bitflags;

bitflags! {
    /// Flags controlling how a container file is opened or created.
    ///
    /// All bits are independent; the open engine applies a precedence
    /// order among them (existence check, then `EXCLUSIVE`, then
    /// `TRUNCATE`, then dedup against already-open state).
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
    pub struct OpenFlags: u32 {
        /// Open for read and write. Absence implies read-only.
        const WRITE = 1 << 0;
        /// Create the file if it doesn't exist. Requires `WRITE`.
        const CREATE = 1 << 1;
        /// Fail if the file already exists.
        const EXCLUSIVE = 1 << 2;
        /// Create fresh, discarding prior content. Requires `WRITE` and
        /// requires no other open of the same `(dev, ino)`.
        const TRUNCATE = 1 << 3;
    }
}

impl OpenFlags {
    /// `WRITE | CREATE | TRUNCATE`: the flag set a caller asking to
    /// overwrite an existing container (or create a fresh one) wants.
    pub const OVERWRITE: OpenFlags = OpenFlags::WRITE
        .union(OpenFlags::CREATE)
        .union(OpenFlags::TRUNCATE);

    /// `WRITE | CREATE | EXCLUSIVE`: the default flag set [`crate::create`]
    /// uses when the caller didn't ask for `OVERWRITE`.
    pub const CREATE_EXCLUSIVE: OpenFlags = OpenFlags::WRITE
        .union(OpenFlags::CREATE)
        .union(OpenFlags::EXCLUSIVE);
}

#[cfg(test)]
mod tests {
    use super::OpenFlags;

    #[test]
    fn overwrite_alias() {
        assert!(OpenFlags::OVERWRITE.contains(OpenFlags::WRITE));
        assert!(OpenFlags::OVERWRITE.contains(OpenFlags::CREATE));
        assert!(OpenFlags::OVERWRITE.contains(OpenFlags::TRUNCATE));
        assert!(!OpenFlags::OVERWRITE.contains(OpenFlags::EXCLUSIVE));
    }

    #[test]
    fn create_exclusive_alias() {
        assert!(OpenFlags::CREATE_EXCLUSIVE.contains(OpenFlags::EXCLUSIVE));
        assert!(!OpenFlags::CREATE_EXCLUSIVE.contains(OpenFlags::TRUNCATE));
    }
}
