//! Bitcoin and Elements primitives: hashes, consensus encoding, scripts,
//! transactions, addresses and keys.

pub mod address;
pub mod bip32;
pub mod blech32;
pub mod encode;
pub mod hash;
pub mod key;
pub mod liquid;
pub mod script;
pub mod transaction;
