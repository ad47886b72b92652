//! Immutability fuses.
//!
//! The registry lets a node's controller burn named single-bit permissions.
//! Burning is one-way: the registry only ever ORs new bits into a node's
//! mask, and this client never attempts to clear one. The bit assignments
//! here mirror the registry's on-chain namespace and must not be renumbered.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    /// Permission bits burnable on a registry node.
    ///
    /// `CANNOT_BURN_FUSES` deserves care: once set, no further bits can ever
    /// be burned on the node. It must only be combined with other flags when
    /// that combination is the node's intended final state - burning it
    /// early would leave the node impossible to lock down later.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Fuses: u32 {
        /// The node can no longer be unwrapped back to the bare registry.
        const CANNOT_UNWRAP = 1;
        /// No further fuses can be burned.
        const CANNOT_BURN_FUSES = 1 << 1;
        /// Ownership can no longer be transferred.
        const CANNOT_TRANSFER = 1 << 2;
        /// The resolver and content pointer are frozen.
        const CANNOT_SET_RESOLVER = 1 << 3;
        /// The TTL is frozen.
        const CANNOT_SET_TTL = 1 << 4;
        /// No child names can be created under the node.
        const CANNOT_CREATE_CHILD = 1 << 5;
        /// The parent name's controller gives up all control of the node.
        const PARENT_CANNOT_CONTROL = 1 << 16;
        /// Any party, not just the owner, may extend the node's expiry.
        const CAN_EXTEND_EXPIRY = 1 << 18;

        /// The canonical mask burned on every published version node.
        ///
        /// Freezes content (`CANNOT_SET_RESOLVER`) and ownership topology
        /// (`CANNOT_UNWRAP`, `PARENT_CANNOT_CONTROL`) while leaving expiry
        /// renewable by anyone (`CAN_EXTEND_EXPIRY`), so a publication can
        /// neither be changed nor silently lapse into reclaimability.
        const PERMANENT_PUBLICATION = Self::CANNOT_UNWRAP.bits()
            | Self::CANNOT_SET_RESOLVER.bits()
            | Self::PARENT_CANNOT_CONTROL.bits()
            | Self::CAN_EXTEND_EXPIRY.bits();
    }
}

impl Fuses {
    /// Bitwise-OR of a set of flags. Pure; the registry is what makes the
    /// result irreversible.
    #[must_use]
    pub fn combine(flags: &[Self]) -> Self {
        flags
            .iter()
            .copied()
            .fold(Self::empty(), |mask, flag| mask | flag)
    }

    /// Whether every bit of `flag` is set in this mask.
    #[must_use]
    pub const fn is_set(self, flag: Self) -> bool {
        self.contains(flag)
    }
}

impl From<u32> for Fuses {
    fn from(bits: u32) -> Self {
        // Registries can report bits newer than this build; keep what we
        // know rather than erroring on reads.
        Self::from_bits_truncate(bits)
    }
}

impl Serialize for Fuses {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for Fuses {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u32::deserialize(deserializer)?;
        Ok(Self::from_bits_retain(bits))
    }
}
