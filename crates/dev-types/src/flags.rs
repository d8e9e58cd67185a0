//! Bit-set fields carried on [`crate::ImageRecord`].
//!
//! Rating occupies the low bits, the status/content flags occupy a disjoint
//! higher range, per the invariant in spec §3 ("the flags bit-set and the
//! rating bits occupy disjoint ranges within flags").

bitflags::bitflags! {
    /// Status/content bits for an image. Occupies bits 3..=15; bits 0..=2 are
    /// reserved for [`Rating`] so the two bit-sets never collide.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ImageFlags: u32 {
        const REJECTED = 1 << 3;
        const HAS_TXT  = 1 << 4;
        const RAW      = 1 << 5;
        const HDR      = 1 << 6;
        const BW       = 1 << 7;
    }
}

/// A 0..=5 star rating, packed into the low 3 bits of `ImageRecord::flags`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Rating(u8);

impl Rating {
    pub const MASK: u32 = 0b111;
    pub const UNKNOWN: Rating = Rating(0);

    pub fn new(stars: u8) -> Self {
        Self(stars.min(5))
    }

    pub fn stars(self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u32) -> Self {
        Self((bits & Self::MASK) as u8)
    }

    pub fn to_bits(self) -> u32 {
        u32::from(self.0) & Self::MASK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_and_flags_occupy_disjoint_bits() {
        let rating_bits = Rating::new(5).to_bits();
        let flag_bits = (ImageFlags::REJECTED | ImageFlags::HAS_TXT).bits();
        assert_eq!(rating_bits & flag_bits, 0);
    }

    #[test]
    fn rating_clamps_to_five() {
        assert_eq!(Rating::new(9).stars(), 5);
    }
}
