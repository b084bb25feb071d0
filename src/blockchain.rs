// Thin re-export module: implementation is in `blockchain/core.rs`, split into
// chain management, settlement and full-chain validation.

pub mod core;
pub use self::core::*;
