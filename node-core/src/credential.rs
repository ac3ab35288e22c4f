//! Credential identifiers and detection events.

use core::fmt;

/// Longest UID a proximity card may report (triple-size ISO 14443 UID).
pub const MAX_UID_LEN: usize = 10;

/// Opaque identifier read from a proximity card or tag.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct CredentialId {
    bytes: [u8; MAX_UID_LEN],
    len: u8,
}

impl CredentialId {
    /// Builds an identifier from raw UID bytes. Returns `None` when the slice is
    /// empty or longer than [`MAX_UID_LEN`].
    #[must_use]
    pub fn new(uid: &[u8]) -> Option<Self> {
        if uid.is_empty() || uid.len() > MAX_UID_LEN {
            return None;
        }

        let len = u8::try_from(uid.len()).ok()?;
        let mut bytes = [0; MAX_UID_LEN];
        bytes[..uid.len()].copy_from_slice(uid);
        Some(Self { bytes, len })
    }

    /// Convenience constructor for the common 4-byte UID.
    #[must_use]
    pub const fn from_u32(uid: u32) -> Self {
        let be = uid.to_be_bytes();
        let mut bytes = [0; MAX_UID_LEN];
        bytes[0] = be[0];
        bytes[1] = be[1];
        bytes[2] = be[2];
        bytes[3] = be[3];
        Self { bytes, len: 4 }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.as_bytes() {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialId({self})")
    }
}

/// A credential presented to the reader, stamped with the detection time.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CredentialEvent<TInstant> {
    pub credential: CredentialId,
    pub detected_at: TInstant,
}

impl<TInstant> CredentialEvent<TInstant> {
    pub const fn new(credential: CredentialId, detected_at: TInstant) -> Self {
        Self {
            credential,
            detected_at,
        }
    }
}
