//! MyToken: an ERC20-style token ledger with a transfer tax, a per-transaction
//! cap and a wallet cap.
//!
//! * [`token`] — the policy engine: transfers, fees, limits, owner settings.
//! * [`ledger`] — atomic balance store with an event log and state root.
//! * [`accounts`] — addresses and ed25519 signers that act as callers.
//! * [`config`] — deployment parameters loaded from JSON.
//! * [`units`] — whole-token strings to base units and back.
//! * [`store`] — JSON persistence of the token state.

pub mod accounts;
pub mod config;
pub mod ledger;
pub mod store;
pub mod token;
pub mod units;

pub use accounts::{Address, Signer};
pub use config::{TokenConfig, TokenParams};
pub use ledger::{Amount, LedgerEvent};
pub use token::{Token, TokenError, TransferQuote};
