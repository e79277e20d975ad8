//! CIDR range decomposition.
//!
//! # Responsibilities
//! - Turn an inclusive address range into a minimal cover of aligned blocks
//! - Validate explicit prefixes against the address they anchor
//!
//! # Design Decisions
//! - Addresses are `u128` with an explicit bit width (32 or 128)
//! - The iterator terminates on a `done` flag, never on overflow, so ranges
//!   ending at the top of the address space are safe

use std::iter::FusedIterator;

use crate::ipset::error::SetError;

/// All ones in the low `bits` bits.
pub const fn width_mask(bits: u8) -> u128 {
    if bits >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

/// Network mask for `prefix` in a `bits`-wide address space.
pub const fn prefix_mask(bits: u8, prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else if prefix >= bits {
        width_mask(bits)
    } else {
        width_mask(bits) & !(width_mask(bits) >> prefix)
    }
}

/// Host bits left over by `prefix`.
pub const fn host_mask(bits: u8, prefix: u8) -> u128 {
    width_mask(bits) & !prefix_mask(bits, prefix)
}

/// An aligned block: `addr` has no bits set past `prefix`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr {
    pub addr: u128,
    pub prefix: u8,
}

impl Cidr {
    /// The whole address space.
    pub const ANY: Cidr = Cidr { addr: 0, prefix: 0 };

    /// Build a block, rejecting prefixes past the width or unaligned addresses.
    pub fn new(bits: u8, addr: u128, prefix: u8) -> Result<Self, SetError> {
        if prefix > bits {
            return Err(SetError::InvalidRange(format!(
                "prefix /{prefix} exceeds {bits}-bit address width"
            )));
        }
        if addr & host_mask(bits, prefix) != 0 {
            return Err(SetError::InvalidRange(format!(
                "address has host bits set past /{prefix}"
            )));
        }
        Ok(Self { addr, prefix })
    }

    /// Last address covered by the block.
    pub const fn last(&self, bits: u8) -> u128 {
        self.addr | host_mask(bits, self.prefix)
    }

    pub const fn contains(&self, bits: u8, addr: u128) -> bool {
        addr & prefix_mask(bits, self.prefix) == self.addr
    }
}

/// Iterator over the maximal aligned blocks covering `[from, to]`.
#[derive(Debug, Clone)]
pub struct CidrRange {
    next: u128,
    to: u128,
    bits: u8,
    done: bool,
}

impl CidrRange {
    pub fn new(bits: u8, from: u128, to: u128) -> Result<Self, SetError> {
        if from > to {
            return Err(SetError::InvalidRange("range start is above range end".into()));
        }
        if to > width_mask(bits) {
            return Err(SetError::InvalidRange(format!(
                "range end exceeds {bits}-bit address width"
            )));
        }
        Ok(Self {
            next: from,
            to,
            bits,
            done: false,
        })
    }
}

impl Iterator for CidrRange {
    type Item = Cidr;

    fn next(&mut self) -> Option<Cidr> {
        if self.done {
            return None;
        }
        let from = self.next;

        // Shortest prefix whose block is aligned at `from` and stays within `to`.
        // prefix == bits always qualifies since from <= to.
        let mut prefix = 0;
        while prefix < self.bits {
            let host = host_mask(self.bits, prefix);
            if from & host == 0 && from | host <= self.to {
                break;
            }
            prefix += 1;
        }

        let last = from | host_mask(self.bits, prefix);
        if last >= self.to {
            self.done = true;
        } else {
            self.next = last + 1;
        }
        Some(Cidr { addr: from, prefix })
    }
}

impl FusedIterator for CidrRange {}

/// Decompose `[from, to]` into blocks, or anchor a single block when a prefix is given.
pub fn decompose(bits: u8, from: u128, to: u128, prefix: Option<u8>) -> Result<Vec<Cidr>, SetError> {
    match prefix {
        Some(prefix) => Ok(vec![Cidr::new(bits, from, prefix)?]),
        None => Ok(CidrRange::new(bits, from, to)?.collect()),
    }
}
