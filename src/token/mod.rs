//! Token ledger policy engine.
//!
//! Wraps a [`Ledger`] with the MyToken transfer rules: a percentage tax paid
//! to the tax receiver, a per-transaction cap and a post-transfer wallet cap.
//! The owner is exempt from the tax and from both caps and is fixed for the
//! lifetime of the token.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    accounts::Address,
    config::TokenParams,
    ledger::{Amount, Ledger, LedgerError, LedgerEvent, LedgerMutation},
};

/// Allowance value that is never decremented by `transfer_from`.
pub const UNLIMITED_ALLOWANCE: Amount = Amount::MAX;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("ERC20: transfer amount exceeds balance")]
    InsufficientBalance,
    #[error("Transfer amount exceeds the maxTxAmount")]
    MaxTxExceeded,
    #[error("Max wallet exceeded")]
    MaxWalletExceeded,
    #[error("Ownable: caller is not the owner")]
    NotOwner,
    #[error("ERC20: transfer to the zero address")]
    ZeroAddress,
    #[error("ERC20: approve to the zero address")]
    ApproveToZeroAddress,
    #[error("ERC20: insufficient allowance")]
    InsufficientAllowance,
    #[error("Tax fee must be between 0 and 100")]
    InvalidTaxFee(u8),
    #[error("total supply must be positive")]
    ZeroSupply,
    #[error("balances sum to {held}, total supply is {supply}")]
    SupplyMismatch { held: Amount, supply: Amount },
    #[error("ledger rejected transition: {0}")]
    Ledger(#[from] LedgerError),
}

/// How a transfer of `amount` would be split.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferQuote {
    pub amount: Amount,
    pub fee: Amount,
    pub net: Amount,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    metadata: TokenMetadata,
    owner: Address,
    total_supply: Amount,
    tax_receiver: Address,
    tax_fee_percent: u8,
    max_tx_amount: Amount,
    max_wallet_amount: Amount,
    allowances: BTreeMap<Address, BTreeMap<Address, Amount>>,
    ledger: Ledger,
}

impl Token {
    /// Deploys the token: the whole supply is minted to `deployer`, who
    /// becomes the permanent owner and the initial tax receiver.
    pub fn deploy(deployer: Address, params: TokenParams) -> Result<Self, TokenError> {
        if params.tax_fee_percent > 100 {
            return Err(TokenError::InvalidTaxFee(params.tax_fee_percent));
        }
        if params.total_supply == 0 {
            return Err(TokenError::ZeroSupply);
        }
        if deployer.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        let mut ledger = Ledger::new();
        ledger.record(LedgerEvent::OwnershipTransferred {
            previous: Address::ZERO,
            new: deployer,
        });
        ledger.apply_mutations(&[LedgerMutation::Mint {
            to: deployer,
            amount: params.total_supply,
        }])?;
        info!(
            owner = %deployer,
            symbol = %params.symbol,
            total_supply = params.total_supply,
            tax_fee_percent = params.tax_fee_percent,
            "token deployed"
        );
        Ok(Self {
            metadata: TokenMetadata {
                name: params.name,
                symbol: params.symbol,
                decimals: params.decimals,
            },
            owner: deployer,
            total_supply: params.total_supply,
            tax_receiver: deployer,
            tax_fee_percent: params.tax_fee_percent,
            max_tx_amount: params.max_tx_amount,
            max_wallet_amount: params.max_wallet_amount,
            allowances: BTreeMap::new(),
            ledger,
        })
    }

    /// Re-checks the deployment invariants on state that did not come from
    /// [`Token::deploy`], e.g. a state file.
    pub fn validate(&self) -> Result<(), TokenError> {
        if self.tax_fee_percent > 100 {
            return Err(TokenError::InvalidTaxFee(self.tax_fee_percent));
        }
        if self.total_supply == 0 {
            return Err(TokenError::ZeroSupply);
        }
        if self.owner.is_zero() || self.tax_receiver.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        let held = self.ledger.total();
        if held != self.total_supply {
            return Err(TokenError::SupplyMismatch {
                held,
                supply: self.total_supply,
            });
        }
        Ok(())
    }

    // ---- queries ----

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.metadata.decimals
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.ledger.balance_of(account)
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn tax_receiver(&self) -> Address {
        self.tax_receiver
    }

    pub fn tax_fee(&self) -> u8 {
        self.tax_fee_percent
    }

    pub fn max_tx_amount(&self) -> Amount {
        self.max_tx_amount
    }

    pub fn max_wallet_amount(&self) -> Amount {
        self.max_wallet_amount
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn events(&self) -> &[LedgerEvent] {
        self.ledger.events()
    }

    // ---- transfers ----

    /// Runs every transfer check without touching state and returns the fee
    /// split the transfer would commit with.
    pub fn quote(
        &self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<TransferQuote, TokenError> {
        if to.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        if self.balance_of(from) < amount {
            return Err(TokenError::InsufficientBalance);
        }
        if *from != self.owner && amount > self.max_tx_amount {
            return Err(TokenError::MaxTxExceeded);
        }
        let fee = self.fee_for(from, to, amount);
        let net = amount
            .checked_sub(fee)
            .ok_or(TokenError::InvalidTaxFee(self.tax_fee_percent))?;
        // owner-funded distributions bypass the wallet cap
        if *to != self.owner && *from != self.owner {
            let resulting = self.balance_of(to).saturating_add(net);
            if resulting > self.max_wallet_amount {
                return Err(TokenError::MaxWalletExceeded);
            }
        }
        Ok(TransferQuote { amount, fee, net })
    }

    fn fee_for(&self, from: &Address, to: &Address, amount: Amount) -> Amount {
        if *from == self.owner || *to == self.owner || self.tax_fee_percent == 0 {
            return 0;
        }
        // amount * pct overflows only near u128::MAX; split to stay exact
        let pct = self.tax_fee_percent as Amount;
        (amount / 100) * pct + (amount % 100) * pct / 100
    }

    pub fn transfer(
        &mut self,
        caller: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<bool, TokenError> {
        self.transfer_quoted(caller, to, amount).map(|_| true)
    }

    /// [`Token::transfer`] returning the committed fee split.
    pub fn transfer_quoted(
        &mut self,
        caller: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<TransferQuote, TokenError> {
        self.move_tokens(caller, to, amount)
    }

    pub fn approve(
        &mut self,
        caller: &Address,
        spender: &Address,
        amount: Amount,
    ) -> Result<bool, TokenError> {
        if spender.is_zero() {
            return Err(TokenError::ApproveToZeroAddress);
        }
        self.allowances
            .entry(*caller)
            .or_default()
            .insert(*spender, amount);
        self.ledger.record(LedgerEvent::Approval {
            owner: *caller,
            spender: *spender,
            amount,
        });
        debug!(owner = %caller, spender = %spender, amount, "approval set");
        Ok(true)
    }

    /// Moves `amount` from `from` on behalf of `caller`, under the same
    /// policy as a direct transfer sent by `from`.
    pub fn transfer_from(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<bool, TokenError> {
        self.transfer_from_quoted(caller, from, to, amount)
            .map(|_| true)
    }

    /// [`Token::transfer_from`] returning the committed fee split. The
    /// allowance is checked before the transfer policy.
    pub fn transfer_from_quoted(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<TransferQuote, TokenError> {
        let allowed = self.allowance(from, caller);
        if allowed < amount {
            warn!(spender = %caller, owner = %from, allowed, amount, "allowance too low");
            return Err(TokenError::InsufficientAllowance);
        }
        let quote = self.move_tokens(from, to, amount)?;
        if allowed != UNLIMITED_ALLOWANCE {
            let remaining = allowed - amount;
            self.allowances
                .entry(*from)
                .or_default()
                .insert(*caller, remaining);
        }
        Ok(quote)
    }

    fn move_tokens(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<TransferQuote, TokenError> {
        let quote = match self.quote(from, to, amount) {
            Ok(q) => q,
            Err(err) => {
                warn!(%from, %to, amount, reason = %err, "transfer rejected");
                return Err(err);
            }
        };
        let mut mutations = vec![LedgerMutation::Transfer {
            from: *from,
            to: *to,
            amount: quote.net,
        }];
        if quote.fee > 0 {
            mutations.push(LedgerMutation::Transfer {
                from: *from,
                to: self.tax_receiver,
                amount: quote.fee,
            });
        }
        self.ledger.apply_mutations(&mutations)?;
        debug!(%from, %to, amount, fee = quote.fee, "transfer committed");
        Ok(quote)
    }

    // ---- ownership ----

    /// Accepted from anyone and ignored: ownership cannot be renounced.
    pub fn renounce_ownership(&mut self, caller: &Address) -> Result<(), TokenError> {
        debug!(%caller, owner = %self.owner, "renounce ownership ignored");
        Ok(())
    }

    /// Accepted from anyone and ignored: ownership cannot be transferred.
    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: &Address,
    ) -> Result<(), TokenError> {
        debug!(%caller, %new_owner, owner = %self.owner, "transfer ownership ignored");
        Ok(())
    }

    // ---- owner-only settings ----

    fn only_owner(&self, caller: &Address) -> Result<(), TokenError> {
        if *caller != self.owner {
            warn!(%caller, "owner-only call rejected");
            return Err(TokenError::NotOwner);
        }
        Ok(())
    }

    pub fn set_tax_fee(&mut self, caller: &Address, percent: u8) -> Result<(), TokenError> {
        self.only_owner(caller)?;
        if percent > 100 {
            return Err(TokenError::InvalidTaxFee(percent));
        }
        info!(old = self.tax_fee_percent, new = percent, "tax fee updated");
        self.tax_fee_percent = percent;
        Ok(())
    }

    pub fn set_tax_receiver(&mut self, caller: &Address, receiver: &Address) -> Result<(), TokenError> {
        self.only_owner(caller)?;
        if receiver.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        info!(old = %self.tax_receiver, new = %receiver, "tax receiver updated");
        self.tax_receiver = *receiver;
        Ok(())
    }

    pub fn set_max_tx_amount(&mut self, caller: &Address, amount: Amount) -> Result<(), TokenError> {
        self.only_owner(caller)?;
        info!(old = self.max_tx_amount, new = amount, "max tx amount updated");
        self.max_tx_amount = amount;
        Ok(())
    }

    pub fn set_max_wallet_amount(&mut self, caller: &Address, amount: Amount) -> Result<(), TokenError> {
        self.only_owner(caller)?;
        info!(old = self.max_wallet_amount, new = amount, "max wallet amount updated");
        self.max_wallet_amount = amount;
        Ok(())
    }
}
