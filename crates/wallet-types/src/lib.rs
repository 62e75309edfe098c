//! Common types module for the wallet workspace.
//!
//! This module defines the data types shared by the pincode gate, the
//! delivery layer and the transaction flows. It provides a centralized
//! location for shared types to ensure consistency across all wallet crates.

/// Account credentials: pincode type, unlocking and mnemonic storage.
pub mod account;
/// Analytics events and the sink trait used by every flow.
pub mod analytics;
/// Device collaborators such as navigation and haptic feedback.
pub mod device;
/// Dispatched wallet actions and the event bus that carries them.
pub mod events;
/// Network identifiers and per-network configuration types.
pub mod networks;
/// Implementation registry trait for pluggable backends.
pub mod registry;
/// Redacted secret string used for pins, peppers and passwords.
pub mod secret_string;
/// Standby (optimistic, not yet confirmed) transaction records.
pub mod standby;
/// Keychain keys and storage namespaces.
pub mod storage;
/// Token metadata.
pub mod tokens;
/// Prepared transactions, hashes and receipts.
pub mod transaction;
/// Utility functions for common formatting and conversions.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use alloy::primitives::{Address, Bytes, B256, U256};
pub use account::*;
pub use analytics::*;
pub use device::*;
pub use events::*;
pub use networks::{NetworkConfig, NetworkId, NetworkKind, NetworksConfig, TokenConfig};
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use standby::*;
pub use storage::*;
pub use tokens::*;
pub use transaction::*;
pub use utils::{current_timestamp_millis, format_token_amount};
pub use validation::*;
