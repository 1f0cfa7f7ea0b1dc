use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::accounts::Address;

pub type Amount = u128;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient funds in account {account}")]
    InsufficientFunds { account: Address },
    #[error("balance overflow for account {account}")]
    Overflow { account: Address },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LedgerMeta {
    /// Number of committed batches.
    pub height: u64,
    pub last_root: Option<[u8; 32]>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub meta: LedgerMeta,
    pub balances: BTreeMap<Address, Amount>,
    pub events: Vec<LedgerEvent>,
    pub merkle_root: [u8; 32],
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    Transfer {
        from: Address,
        to: Address,
        amount: Amount,
    },
    Approval {
        owner: Address,
        spender: Address,
        amount: Amount,
    },
    OwnershipTransferred {
        previous: Address,
        new: Address,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerMutation {
    Mint {
        to: Address,
        amount: Amount,
    },
    Transfer {
        from: Address,
        to: Address,
        amount: Amount,
    },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ledger {
    pub meta: LedgerMeta,
    balances: BTreeMap<Address, Amount>,
    events: Vec<LedgerEvent>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn balances(&self) -> &BTreeMap<Address, Amount> {
        &self.balances
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Sum of every balance. Saturates, since a consistent ledger never
    /// exceeds the minted supply.
    pub fn total(&self) -> Amount {
        self.balances
            .values()
            .fold(0, |acc: Amount, v| acc.saturating_add(*v))
    }

    /// Appends an event that carries no balance change (approvals,
    /// ownership notices).
    pub fn record(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            meta: self.meta.clone(),
            balances: self.balances.clone(),
            events: self.events.clone(),
            merkle_root: compute_merkle_root(&self.balances),
        }
    }

    pub fn state_root(&self) -> [u8; 32] {
        compute_merkle_root(&self.balances)
    }

    /// Applies the whole batch or nothing. Every debit and credit is staged
    /// on a scratch copy of the touched balances; committed state and the
    /// event log change only after the last mutation validated.
    pub fn apply_mutations(&mut self, mutations: &[LedgerMutation]) -> Result<(), LedgerError> {
        let mut staged: BTreeMap<Address, Amount> = BTreeMap::new();
        let mut events = Vec::with_capacity(mutations.len());

        for mutation in mutations {
            match mutation {
                LedgerMutation::Mint { to, amount } => {
                    self.stage_credit(&mut staged, to, *amount)?;
                    events.push(LedgerEvent::Transfer {
                        from: Address::ZERO,
                        to: *to,
                        amount: *amount,
                    });
                }
                LedgerMutation::Transfer { from, to, amount } => {
                    self.stage_debit(&mut staged, from, *amount)?;
                    self.stage_credit(&mut staged, to, *amount)?;
                    events.push(LedgerEvent::Transfer {
                        from: *from,
                        to: *to,
                        amount: *amount,
                    });
                }
            }
        }

        self.balances.extend(staged);
        self.events.extend(events);
        self.meta.height += 1;
        self.meta.last_root = Some(self.state_root());
        Ok(())
    }

    fn staged_balance(&self, staged: &BTreeMap<Address, Amount>, account: &Address) -> Amount {
        staged
            .get(account)
            .copied()
            .unwrap_or_else(|| self.balance_of(account))
    }

    fn stage_debit(
        &self,
        staged: &mut BTreeMap<Address, Amount>,
        account: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let current = self.staged_balance(staged, account);
        let next = current
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientFunds { account: *account })?;
        staged.insert(*account, next);
        Ok(())
    }

    fn stage_credit(
        &self,
        staged: &mut BTreeMap<Address, Amount>,
        account: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let current = self.staged_balance(staged, account);
        let next = current
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { account: *account })?;
        staged.insert(*account, next);
        Ok(())
    }
}

fn compute_merkle_root(balances: &BTreeMap<Address, Amount>) -> [u8; 32] {
    let leaves: Vec<[u8; 32]> = balances
        .iter()
        .map(|(account, amount)| -> [u8; 32] {
            let mut hasher = Sha256::new();
            hasher.update(b"acct");
            hasher.update(account.as_bytes());
            hasher.update(amount.to_le_bytes());
            hasher.finalize().into()
        })
        .collect();
    build_merkle(leaves)
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"mytoken-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            if chunk.len() == 2 {
                hasher.update(chunk[1]);
            } else {
                hasher.update(chunk[0]);
            }
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::signers;

    #[test]
    fn merkle_root_is_deterministic() {
        let s = signers(2);
        let mut ledger = Ledger::new();
        ledger
            .apply_mutations(&[
                LedgerMutation::Mint {
                    to: s[0].address(),
                    amount: 1_000,
                },
                LedgerMutation::Mint {
                    to: s[1].address(),
                    amount: 2_000,
                },
            ])
            .unwrap();
        let root1 = ledger.snapshot().merkle_root;
        let root2 = ledger.snapshot().merkle_root;
        assert_eq!(root1, root2);
        assert_eq!(ledger.meta.last_root, Some(root1));
        assert_ne!(root1, Ledger::new().state_root());
    }

    #[test]
    fn applying_mutations_updates_balances_and_events() {
        let s = signers(3);
        let (treasury, alice, bob) = (s[0].address(), s[1].address(), s[2].address());
        let mut ledger = Ledger::new();
        ledger
            .apply_mutations(&[LedgerMutation::Mint {
                to: treasury,
                amount: 10_000,
            }])
            .unwrap();
        ledger
            .apply_mutations(&[
                LedgerMutation::Transfer {
                    from: treasury,
                    to: alice,
                    amount: 1_000,
                },
                LedgerMutation::Transfer {
                    from: alice,
                    to: bob,
                    amount: 400,
                },
            ])
            .unwrap();
        assert_eq!(ledger.balance_of(&treasury), 9_000);
        assert_eq!(ledger.balance_of(&alice), 600);
        assert_eq!(ledger.balance_of(&bob), 400);
        assert_eq!(ledger.total(), 10_000);
        assert_eq!(ledger.events().len(), 3);
        assert_eq!(ledger.meta.height, 2);
        assert_eq!(
            ledger.events()[0],
            LedgerEvent::Transfer {
                from: Address::ZERO,
                to: treasury,
                amount: 10_000
            }
        );
    }

    #[test]
    fn failed_batch_leaves_no_trace() {
        let s = signers(3);
        let (treasury, alice, bob) = (s[0].address(), s[1].address(), s[2].address());
        let mut ledger = Ledger::new();
        ledger
            .apply_mutations(&[LedgerMutation::Mint {
                to: treasury,
                amount: 500,
            }])
            .unwrap();
        let before = ledger.clone();

        let err = ledger
            .apply_mutations(&[
                LedgerMutation::Transfer {
                    from: treasury,
                    to: alice,
                    amount: 300,
                },
                LedgerMutation::Transfer {
                    from: treasury,
                    to: bob,
                    amount: 300,
                },
            ])
            .unwrap_err();
        assert_eq!(err, LedgerError::InsufficientFunds { account: treasury });
        assert_eq!(ledger, before);
    }

    #[test]
    fn credit_overflow_is_rejected() {
        let s = signers(1);
        let mut ledger = Ledger::new();
        ledger
            .apply_mutations(&[LedgerMutation::Mint {
                to: s[0].address(),
                amount: Amount::MAX,
            }])
            .unwrap();
        let err = ledger
            .apply_mutations(&[LedgerMutation::Mint {
                to: s[0].address(),
                amount: 1,
            }])
            .unwrap_err();
        assert_eq!(err, LedgerError::Overflow { account: s[0].address() });
        assert_eq!(ledger.events().len(), 1);
    }
}
