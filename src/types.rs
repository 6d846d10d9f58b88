use crate::error::{CtError, Result};
use crate::utils::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use std::path::PathBuf;

/// Library-wide configuration, handed to [`crate::init`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Directory for configuration files and logs. If None, nothing touches disk.
    #[serde(rename = "datadir", default)]
    pub data_dir: Option<PathBuf>,
    /// Log level for the process logger
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub log_level: Option<LogLevel>,
    /// Network used when a caller passes [`NETWORK_DEFAULT`]
    #[serde(default = "default_network")]
    pub default_network: NetworkType,
    /// Maximum nesting accepted by the descriptor parser
    #[serde(default = "default_max_descriptor_depth")]
    pub max_descriptor_depth: usize,
}

fn default_network() -> NetworkType {
    NetworkType::Liquidv1
}

fn default_max_descriptor_depth() -> usize {
    crate::descriptor::DEFAULT_MAX_DEPTH
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_level: None,
            default_network: default_network(),
            max_descriptor_depth: default_max_descriptor_depth(),
        }
    }
}

/// Network code that stands for the session's configured default network.
pub const NETWORK_DEFAULT: i32 = -1;

/// Chains the engine can derive addresses and scripts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Mainnet,
    Testnet,
    Regtest,
    Liquidv1,
    ElementsRegtest,
}

impl NetworkType {
    pub fn as_i32(self) -> i32 {
        match self {
            NetworkType::Mainnet => 0,
            NetworkType::Testnet => 1,
            NetworkType::Regtest => 2,
            NetworkType::Liquidv1 => 10,
            NetworkType::ElementsRegtest => 11,
        }
    }

    pub fn is_elements(self) -> bool {
        matches!(self, NetworkType::Liquidv1 | NetworkType::ElementsRegtest)
    }
}

impl TryFrom<i32> for NetworkType {
    type Error = CtError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(NetworkType::Mainnet),
            1 => Ok(NetworkType::Testnet),
            2 => Ok(NetworkType::Regtest),
            10 => Ok(NetworkType::Liquidv1),
            11 => Ok(NetworkType::ElementsRegtest),
            _ => Err(CtError::invalid_argument("Illegal network type.")),
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NetworkType::Mainnet => "mainnet",
            NetworkType::Testnet => "testnet",
            NetworkType::Regtest => "regtest",
            NetworkType::Liquidv1 => "liquidv1",
            NetworkType::ElementsRegtest => "elementsregtest",
        };
        f.write_str(name)
    }
}

/// Locking-script shapes an address or signature can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashType {
    P2sh,
    P2pkh,
    P2wsh,
    P2wpkh,
    P2shP2wsh,
    P2shP2wpkh,
}

impl HashType {
    pub fn as_i32(self) -> i32 {
        match self {
            HashType::P2sh => 1,
            HashType::P2pkh => 2,
            HashType::P2wsh => 3,
            HashType::P2wpkh => 4,
            HashType::P2shP2wsh => 5,
            HashType::P2shP2wpkh => 6,
        }
    }

    /// Whether spending this output type uses the segwit digest.
    pub fn is_witness(self) -> bool {
        !matches!(self, HashType::P2sh | HashType::P2pkh)
    }

    pub fn is_script_hash(self) -> bool {
        matches!(self, HashType::P2sh | HashType::P2wsh | HashType::P2shP2wsh)
    }
}

impl TryFrom<i32> for HashType {
    type Error = CtError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            1 => Ok(HashType::P2sh),
            2 => Ok(HashType::P2pkh),
            3 => Ok(HashType::P2wsh),
            4 => Ok(HashType::P2wpkh),
            5 => Ok(HashType::P2shP2wsh),
            6 => Ok(HashType::P2shP2wpkh),
            _ => Err(CtError::invalid_argument("Illegal hash type.")),
        }
    }
}
