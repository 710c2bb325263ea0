//! # Datum
//!
//! The canonical view of a ring element: big-endian bytes, per-byte popcount
//! (stratum), per-byte active bit indices (spectrum) and its glyph.

use serde::{Deserialize, Serialize};

use crate::canonical::encode_address;
use crate::ring::{PartitionClass, Ring};

/// Derived view of one ring element. Recomputed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datum {
    pub value: u64,
    pub quantum: u32,
    /// Big-endian, `ceil(n / 8)` bytes.
    pub bytes: Vec<u8>,
    /// Popcount of each byte.
    pub stratum: Vec<u32>,
    /// Set bit indices of each byte, least significant bit first (0..=7).
    pub spectrum: Vec<Vec<u32>>,
    pub glyph: String,
    pub partition: PartitionClass,
}

impl Datum {
    /// Build the view of `value` (which must already be in the ring).
    #[must_use]
    pub fn new(ring: Ring, value: u64) -> Self {
        let bytes = element_bytes(ring, value);
        let stratum = bytes.iter().map(|b| b.count_ones()).collect();
        let spectrum = bytes
            .iter()
            .map(|&b| (0..8).filter(|bit| b & (1 << bit) != 0).collect())
            .collect();
        Self {
            value,
            quantum: ring.quantum(),
            glyph: encode_address(&bytes),
            partition: ring.classify(value),
            bytes,
            stratum,
            spectrum,
        }
    }

    /// Total popcount across all bytes.
    #[must_use]
    pub fn total_stratum(&self) -> u32 {
        self.stratum.iter().sum()
    }
}

/// Big-endian bytes of a ring element, `ceil(n / 8)` wide.
#[must_use]
pub fn element_bytes(ring: Ring, value: u64) -> Vec<u8> {
    let width = ring.width();
    let be = value.to_be_bytes();
    be[be.len() - width..].to_vec()
}

/// Content address of a ring element.
#[must_use]
pub fn element_address(ring: Ring, value: u64) -> String {
    encode_address(&element_bytes(ring, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datum_for_42() {
        let ring = Ring::new(8).expect("ring");
        let datum = Datum::new(ring, 42);
        assert_eq!(datum.bytes, vec![42]);
        assert_eq!(datum.stratum, vec![3]);
        assert_eq!(datum.spectrum, vec![vec![1, 3, 5]]);
        assert_eq!(datum.glyph, "\u{282A}");
        assert_eq!(datum.partition, PartitionClass::Reducible);
    }

    #[test]
    fn wide_rings_are_big_endian() {
        let ring = Ring::new(12).expect("ring");
        let datum = Datum::new(ring, 0x0ABC);
        assert_eq!(datum.bytes, vec![0x0A, 0xBC]);
        assert_eq!(datum.total_stratum(), 2 + 5);
    }

    #[test]
    fn existence_ring_width() {
        let ring = Ring::for_existence(32).expect("ring");
        assert_eq!(element_bytes(ring, 1), vec![0, 0, 0, 1]);
    }
}
