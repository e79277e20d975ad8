//! Key shapes: which fields a set type stores.

use std::fmt;

pub trait KeyShape: Send + Sync + fmt::Debug + 'static {
    /// ipset type name, e.g. `hash:net,port,net`.
    const NAME: &'static str;
    /// Number of network fields (1 or 2).
    const NETS: u8;
    /// Whether protocol and port are part of the key.
    const L4: bool;
}

/// `hash:net`: one network.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashNet;

/// `hash:net,port`: network, protocol and port.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashNetPort;

/// `hash:net,port,net`: source network, protocol and port, destination network.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashNetPortNet;

impl KeyShape for HashNet {
    const NAME: &'static str = "hash:net";
    const NETS: u8 = 1;
    const L4: bool = false;
}

impl KeyShape for HashNetPort {
    const NAME: &'static str = "hash:net,port";
    const NETS: u8 = 1;
    const L4: bool = true;
}

impl KeyShape for HashNetPortNet {
    const NAME: &'static str = "hash:net,port,net";
    const NETS: u8 = 2;
    const L4: bool = true;
}
