//! Per-family specialization.
//!
//! IPv4 decomposes arbitrary ranges on every network field. IPv6 accepts a
//! single address plus explicit prefix only: unaligned IPv6 ranges can expand
//! into a very large number of blocks, so they are refused outright.

use rustc_hash::FxHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::ipset::cidr::{self, Cidr};
use crate::ipset::error::SetError;
use crate::ipset::types::{ElemKey, Family};

/// Address-family behaviour plugged into a set variant.
pub trait AddrFamily: Send + Sync + fmt::Debug + 'static {
    const FAMILY: Family;
    const BITS: u8;

    /// Bucket hash over the key view.
    fn hash(key: &ElemKey) -> u32;

    /// Expand one network field of a request into the blocks to store.
    fn expand(from: u128, to: u128, prefix: Option<u8>) -> Result<Vec<Cidr>, SetError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Inet;

#[derive(Debug, Clone, Copy, Default)]
pub struct Inet6;

impl AddrFamily for Inet {
    const FAMILY: Family = Family::Inet;
    const BITS: u8 = 32;

    fn hash(key: &ElemKey) -> u32 {
        let ip1 = key.ip1 as u32;
        let ip2 = key.ip2 as u32;
        ip1.wrapping_mul(31)
            .wrapping_add(ip2.wrapping_mul(31))
            .wrapping_add(
                (u32::from(key.port) << 16) | (u32::from(key.cidr1) << 8) | u32::from(key.cidr2),
            )
    }

    fn expand(from: u128, to: u128, prefix: Option<u8>) -> Result<Vec<Cidr>, SetError> {
        cidr::decompose(Self::BITS, from, to, prefix)
    }
}

impl AddrFamily for Inet6 {
    const FAMILY: Family = Family::Inet6;
    const BITS: u8 = 128;

    fn hash(key: &ElemKey) -> u32 {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        let h = hasher.finish();
        (h ^ (h >> 32)) as u32
    }

    fn expand(from: u128, to: u128, prefix: Option<u8>) -> Result<Vec<Cidr>, SetError> {
        match prefix {
            Some(prefix) => Ok(vec![Cidr::new(Self::BITS, from, prefix)?]),
            None if from == to => Ok(vec![Cidr { addr: from, prefix: Self::BITS }]),
            None => Err(SetError::UnsupportedOperation(
                "inet6 sets take an address with an explicit prefix, not a range".into(),
            )),
        }
    }
}
