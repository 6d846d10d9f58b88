//! # elements-ct
//!
//! A confidential-transaction engine for Elements/Liquid style ledgers.
//!
//! The crate builds raw transactions, derives addresses and locking scripts
//! (including multisig and nested output descriptors), blinds and unblinds
//! outputs and asset issuances, computes signature hashes, signs, and
//! assembles final single-key, script-hash, segwit and multisig spends.
//!
//! ## Quick Start
//!
//! ```rust
//! use elements_ct::{init, EngineConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = init(&EngineConfig::default())?;
//!     let mut session = engine.create_session()?;
//!
//!     let tx = session.initialize_tx(2, 0)?;
//!     assert_eq!(tx, "0200000000000000000000");
//!
//!     drop(session);
//!     engine.shutdown()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture Overview
//!
//! - [`primitives`]: wire encoding, scripts, keys, addresses
//! - [`transaction_builder`]: inputs, outputs, issuances and getters
//! - [`descriptor`]: output descriptors, multisig and address derivation
//! - [`confidential`]: commitments, range and surjection proofs, unblinding
//! - [`blinder`]: the accumulate-then-finalize blinding protocol
//! - [`transaction_signer`]: sighashes, signatures and multisig assembly
//! - [`session`]: hex-level operations with a per-session error slot
//!
//! ## Error Handling
//!
//! All public APIs return [`Result<T, CtError>`](error::CtError). Sessions
//! additionally remember the code and message of their last failed call.

pub mod blinder;
pub mod confidential;
pub mod descriptor;
pub mod error;
pub mod primitives;
pub mod session;
pub mod transaction_builder;
pub mod transaction_signer;
pub mod types;
pub mod utils;

pub use error::{CtError, ErrorCode, Result};
pub use session::{BlindHandle, MultisigHandle, Session};
pub use types::{EngineConfig, HashType, NetworkType, NETWORK_DEFAULT};

use std::fs;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Bit set in [`get_supported_function`] for plain Bitcoin transactions.
pub const SUPPORTED_BITCOIN: u64 = 0x01;
/// Bit set in [`get_supported_function`] for Elements transactions.
pub const SUPPORTED_ELEMENTS: u64 = 0x02;

/// Feature flags of this build.
pub fn get_supported_function() -> u64 {
    SUPPORTED_BITCOIN | SUPPORTED_ELEMENTS
}

/// Process-scoped library state returned by [`init`].
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    open_sessions: Arc<AtomicUsize>,
    next_session_id: AtomicU64,
    shut_down: AtomicBool,
}

impl Engine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn create_session(&self) -> Result<Session> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(CtError::IllegalState("Engine has been shut down".to_string()));
        }
        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        Ok(Session::new(id, &self.config, self.open_sessions.clone()))
    }

    /// Number of sessions created by this engine and not yet dropped.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Fails with `IllegalState` while sessions are still open. Afterwards
    /// no new sessions can be created.
    pub fn shutdown(&self) -> Result<()> {
        let open = self.open_sessions();
        if open > 0 {
            let err = CtError::IllegalState(format!("{} session(s) still open", open));
            log::warn!("shutdown refused: {}", err);
            return Err(err);
        }
        self.shut_down.store(true, Ordering::SeqCst);
        log::info!("engine shut down");
        Ok(())
    }
}

/// Initializes the library. Call once per process and keep the returned
/// [`Engine`] for its lifetime.
///
/// Installs `env_logger` at the configured level (an already installed
/// logger is left in place) and creates the data directory if one is
/// configured.
///
/// # Examples
///
/// ```rust
/// use elements_ct::{init, EngineConfig, NetworkType};
///
/// let config = EngineConfig {
///     default_network: NetworkType::ElementsRegtest,
///     ..EngineConfig::default()
/// };
/// let engine = init(&config).expect("Failed to initialize");
/// assert_eq!(engine.config().default_network, NetworkType::ElementsRegtest);
/// ```
pub fn init(config: &EngineConfig) -> Result<Engine> {
    config.validate()?;
    utils::logging::init_logger(config.log_level);

    if let Some(data_dir) = &config.data_dir {
        if !data_dir.exists() {
            fs::create_dir_all(data_dir)?;
            log::info!("Created data directory at: {:?}", data_dir);
        }
    }

    log::info!("Engine initialized with config: {:?}", config);
    Ok(Engine {
        config: config.clone(),
        open_sessions: Arc::new(AtomicUsize::new(0)),
        next_session_id: AtomicU64::new(1),
        shut_down: AtomicBool::new(false),
    })
}
