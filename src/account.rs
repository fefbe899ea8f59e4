// 💳 Account Model - Two time-ordered sequences per account
//
// Every account exposes its confirmed operations and its pending operations,
// both sorted newest-first. Accounts may own sub-accounts (token accounts,
// staking sub-accounts) which carry their own sequences.

use crate::error::HistoryError;
use crate::operation::{HistoryOperation, Operation};
use serde::{Deserialize, Serialize};

// ============================================================================
// ACCOUNT CAPABILITY
// ============================================================================

/// What the merge needs from an account.
///
/// Both sequences MUST be sorted by date descending. This is a precondition:
/// the merge never checks it (see [`validate_sort_order`] for an explicit check).
pub trait AccountLike {
    type Op: HistoryOperation;

    fn id(&self) -> &str;

    /// Confirmed operations, newest first
    fn operations(&self) -> &[Self::Op];

    /// Pending operations, newest first
    fn pending_operations(&self) -> &[Self::Op];

    fn sub_accounts(&self) -> &[Self]
    where
        Self: Sized,
    {
        &[]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sequence {
    Confirmed,
    Pending,
}

impl Sequence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sequence::Confirmed => "confirmed",
            Sequence::Pending => "pending",
        }
    }
}

// ============================================================================
// ACCOUNT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default = "default_uuid")]
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Ticker of the account currency (BTC, ETH, USDC...)
    #[serde(default)]
    pub currency: String,

    #[serde(default)]
    pub operations: Vec<Operation>,

    #[serde(default)]
    pub pending_operations: Vec<Operation>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_accounts: Vec<Account>,
}

fn default_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Account {
    pub fn new(id: &str, name: &str, currency: &str) -> Self {
        Account {
            id: id.to_string(),
            name: name.to_string(),
            currency: currency.to_string(),
            ..Default::default()
        }
    }

    pub fn with_operations(mut self, operations: Vec<Operation>) -> Self {
        self.operations = operations;
        self
    }

    pub fn with_pending_operations(mut self, pending: Vec<Operation>) -> Self {
        self.pending_operations = pending;
        self
    }

    pub fn with_sub_account(mut self, sub_account: Account) -> Self {
        self.sub_accounts.push(sub_account);
        self
    }

    /// Sort both sequences newest-first (stable) in this account and every sub-account
    pub fn normalize(&mut self) {
        self.operations.sort_by(|a, b| b.date.cmp(&a.date));
        self.pending_operations.sort_by(|a, b| b.date.cmp(&a.date));
        for sub_account in &mut self.sub_accounts {
            sub_account.normalize();
        }
    }

    /// Find an account (or nested sub-account) by id
    pub fn find(&self, id: &str) -> Option<&Account> {
        if self.id == id {
            return Some(self);
        }
        self.sub_accounts.iter().find_map(|sub| sub.find(id))
    }
}

impl AccountLike for Account {
    type Op = Operation;

    fn id(&self) -> &str {
        &self.id
    }

    fn operations(&self) -> &[Operation] {
        &self.operations
    }

    fn pending_operations(&self) -> &[Operation] {
        &self.pending_operations
    }

    fn sub_accounts(&self) -> &[Account] {
        &self.sub_accounts
    }
}

// ============================================================================
// FLATTENING
// ============================================================================

/// Flatten an account tree, pre-order: each account is followed by its sub-accounts.
///
/// The resulting order is the tie-break order of the merge.
pub fn flatten_accounts<A: AccountLike>(top_accounts: &[A]) -> Vec<&A> {
    let mut accounts = Vec::with_capacity(top_accounts.len());
    for account in top_accounts {
        push_with_sub_accounts(account, &mut accounts);
    }
    accounts
}

fn push_with_sub_accounts<'a, A: AccountLike>(account: &'a A, out: &mut Vec<&'a A>) {
    out.push(account);
    for sub_account in account.sub_accounts() {
        push_with_sub_accounts(sub_account, out);
    }
}

/// Check that both sequences of an account are sorted by date descending.
///
/// Sub-accounts are not visited; flatten first to check a whole tree.
pub fn validate_sort_order<A: AccountLike>(account: &A) -> Result<(), HistoryError> {
    check_descending(account.id(), Sequence::Confirmed, account.operations())?;
    check_descending(account.id(), Sequence::Pending, account.pending_operations())
}

fn check_descending<O: HistoryOperation>(
    account_id: &str,
    sequence: Sequence,
    ops: &[O],
) -> Result<(), HistoryError> {
    match ops.windows(2).position(|pair| pair[1].date() > pair[0].date()) {
        Some(i) => Err(HistoryError::UnsortedOperations {
            account_id: account_id.to_string(),
            sequence,
            index: i + 1,
        }),
        None => Ok(()),
    }
}

// ============================================================================
// TESTS
// ============================================================================
