// 🔀 Operation Merger - k-way merge of confirmed + pending sequences
//
// Each account contributes two cursors. Every call to `next` looks at the
// operation under each cursor and emits the most recent one, advancing only
// the winning cursor. Pending operations whose hash already appears in the
// account's confirmed sequence have landed and are skipped.
//
// Cost per emitted operation: O(accounts).

use crate::account::{AccountLike, Sequence};
use crate::operation::HistoryOperation;
use std::collections::HashSet;
use std::iter::FusedIterator;
use tracing::debug;

// ============================================================================
// CURSOR SET
// ============================================================================

/// One confirmed and one pending offset per account.
///
/// Offsets only move forward and never pass the sequence length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorSet {
    confirmed: Vec<usize>,
    pending: Vec<usize>,
}

impl CursorSet {
    pub fn new(accounts: usize) -> Self {
        CursorSet {
            confirmed: vec![0; accounts],
            pending: vec![0; accounts],
        }
    }

    pub fn get(&self, account: usize, sequence: Sequence) -> usize {
        match sequence {
            Sequence::Confirmed => self.confirmed[account],
            Sequence::Pending => self.pending[account],
        }
    }

    fn advance(&mut self, account: usize, sequence: Sequence) {
        match sequence {
            Sequence::Confirmed => self.confirmed[account] += 1,
            Sequence::Pending => self.pending[account] += 1,
        }
    }
}

// ============================================================================
// OPERATION MERGER
// ============================================================================

/// Yields operations from all accounts, newest first.
///
/// Ties on date go to the account that comes first, and within one account a
/// confirmed operation beats a pending one.
pub struct OperationMerger<'a, A: AccountLike> {
    accounts: Vec<&'a A>,

    /// Hashes of every confirmed operation, per account
    landed: Vec<HashSet<&'a str>>,

    cursors: CursorSet,
}

impl<'a, A: AccountLike> OperationMerger<'a, A> {
    pub fn new(accounts: Vec<&'a A>) -> Self {
        let landed = accounts
            .iter()
            .map(|&account| account.operations().iter().map(|op| op.hash()).collect())
            .collect();
        let cursors = CursorSet::new(accounts.len());

        OperationMerger {
            accounts,
            landed,
            cursors,
        }
    }

    pub fn cursors(&self) -> &CursorSet {
        &self.cursors
    }

    /// Move the pending cursor past operations that already landed as confirmed
    fn skip_landed(&mut self, i: usize) {
        let account: &'a A = self.accounts[i];
        let pending = account.pending_operations();

        while let Some(op) = pending.get(self.cursors.pending[i]) {
            if !self.landed[i].contains(op.hash()) {
                break;
            }
            debug!(account = account.id(), hash = op.hash(), "skipping landed pending operation");
            self.cursors.pending[i] += 1;
        }
    }

    /// Emit the most recent operation not yet emitted, or None once every cursor is at its end
    pub fn next_operation(&mut self) -> Option<&'a A::Op> {
        let mut best: Option<(usize, Sequence, &'a A::Op)> = None;

        for i in 0..self.accounts.len() {
            let account: &'a A = self.accounts[i];

            let confirmed = account.operations().get(self.cursors.confirmed[i]);
            if let Some(op) = confirmed {
                if is_newer(op, best.map(|(_, _, b)| b)) {
                    best = Some((i, Sequence::Confirmed, op));
                }
            }

            self.skip_landed(i);
            let pending = account.pending_operations().get(self.cursors.pending[i]);
            if let Some(op) = pending {
                if is_newer(op, best.map(|(_, _, b)| b)) {
                    best = Some((i, Sequence::Pending, op));
                }
            }
        }

        let (account, sequence, op) = best?;
        self.cursors.advance(account, sequence);
        Some(op)
    }
}

fn is_newer<O: HistoryOperation>(candidate: &O, best: Option<&O>) -> bool {
    match best {
        Some(best) => candidate.date() > best.date(),
        None => true,
    }
}

impl<'a, A: AccountLike> Iterator for OperationMerger<'a, A> {
    type Item = &'a A::Op;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_operation()
    }
}

impl<'a, A: AccountLike> FusedIterator for OperationMerger<'a, A> {}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::operation::{Operation, OperationType};
    use chrono::{Duration, TimeZone, Utc};

    fn create_test_operation(account: &str, hash: &str, minutes: i64) -> Operation {
        let base = Utc.with_ymd_and_hms(2024, 12, 25, 0, 0, 0).unwrap();
        Operation::new(hash, account, OperationType::Out, 1.0, base + Duration::minutes(minutes))
    }

    fn merged_ids(accounts: &[Account]) -> Vec<String> {
        let refs: Vec<&Account> = accounts.iter().collect();
        OperationMerger::new(refs)
            .map(|op| format!("{}:{}", op.account_id, op.hash))
            .collect()
    }

    #[test]
    fn test_merge_interleaves_accounts() {
        let accounts = vec![
            Account::new("a", "A", "BTC").with_operations(vec![
                create_test_operation("a", "a3", 30),
                create_test_operation("a", "a1", 10),
            ]),
            Account::new("b", "B", "BTC").with_operations(vec![
                create_test_operation("b", "b4", 40),
                create_test_operation("b", "b2", 20),
            ]),
        ];

        assert_eq!(merged_ids(&accounts), vec!["b:b4", "a:a3", "b:b2", "a:a1"]);
    }

    #[test]
    fn test_merge_interleaves_pending_and_confirmed() {
        let accounts = vec![Account::new("a", "A", "BTC")
            .with_operations(vec![create_test_operation("a", "c2", 20)])
            .with_pending_operations(vec![
                create_test_operation("a", "p3", 30),
                create_test_operation("a", "p1", 10),
            ])];

        assert_eq!(merged_ids(&accounts), vec!["a:p3", "a:c2", "a:p1"]);
    }

    #[test]
    fn test_tie_goes_to_earlier_account() {
        let accounts = vec![
            Account::new("a", "A", "BTC").with_operations(vec![create_test_operation("a", "x", 10)]),
            Account::new("b", "B", "BTC").with_operations(vec![create_test_operation("b", "y", 10)]),
        ];

        assert_eq!(merged_ids(&accounts), vec!["a:x", "b:y"]);

        let reversed = vec![accounts[1].clone(), accounts[0].clone()];
        assert_eq!(merged_ids(&reversed), vec!["b:y", "a:x"]);
    }

    #[test]
    fn test_tie_confirmed_beats_own_pending() {
        let accounts = vec![Account::new("a", "A", "BTC")
            .with_operations(vec![create_test_operation("a", "c", 10)])
            .with_pending_operations(vec![create_test_operation("a", "p", 10)])];

        assert_eq!(merged_ids(&accounts), vec!["a:c", "a:p"]);
    }

    #[test]
    fn test_tie_earlier_account_pending_beats_later_confirmed() {
        let accounts = vec![
            Account::new("a", "A", "BTC").with_pending_operations(vec![create_test_operation("a", "p", 10)]),
            Account::new("b", "B", "BTC").with_operations(vec![create_test_operation("b", "c", 10)]),
        ];

        assert_eq!(merged_ids(&accounts), vec!["a:p", "b:c"]);
    }

    #[test]
    fn test_landed_pending_is_never_emitted() {
        // "tx" landed: it sits deep in the confirmed history but at the head of pending
        let accounts = vec![Account::new("a", "A", "BTC")
            .with_operations(vec![
                create_test_operation("a", "c3", 30),
                create_test_operation("a", "c2", 20),
                create_test_operation("a", "tx", 5),
            ])
            .with_pending_operations(vec![create_test_operation("a", "tx", 50)])];

        assert_eq!(merged_ids(&accounts), vec!["a:c3", "a:c2", "a:tx"]);
    }

    #[test]
    fn test_landed_pending_does_not_hide_later_pending() {
        // Confirmed history is consumed before the landed op is reached
        let accounts = vec![Account::new("a", "A", "BTC")
            .with_operations(vec![create_test_operation("a", "tx", 40)])
            .with_pending_operations(vec![
                create_test_operation("a", "tx", 30),
                create_test_operation("a", "late", 20),
            ])];

        assert_eq!(merged_ids(&accounts), vec!["a:tx", "a:late"]);
    }

    #[test]
    fn test_dedup_is_per_account() {
        // Same hash in another account's confirmed sequence does not count
        let accounts = vec![
            Account::new("a", "A", "ETH").with_operations(vec![create_test_operation("a", "tx", 10)]),
            Account::new("b", "B", "USDC").with_pending_operations(vec![create_test_operation("b", "tx", 20)]),
        ];

        assert_eq!(merged_ids(&accounts), vec!["b:tx", "a:tx"]);
    }

    #[test]
    fn test_cursors_advance_one_per_call() {
        let accounts = vec![Account::new("a", "A", "BTC")
            .with_operations(vec![create_test_operation("a", "c", 20)])
            .with_pending_operations(vec![create_test_operation("a", "p", 10)])];
        let mut merger = OperationMerger::new(accounts.iter().collect());

        assert_eq!(merger.next_operation().map(|o| o.hash.as_str()), Some("c"));
        assert_eq!(merger.cursors().get(0, Sequence::Confirmed), 1);
        assert_eq!(merger.cursors().get(0, Sequence::Pending), 0);

        assert_eq!(merger.next_operation().map(|o| o.hash.as_str()), Some("p"));
        assert_eq!(merger.cursors().get(0, Sequence::Pending), 1);

        assert!(merger.next_operation().is_none());
        assert!(merger.next_operation().is_none());
    }

    #[test]
    fn test_empty_accounts_are_exhausted() {
        let accounts = vec![Account::new("a", "A", "BTC"), Account::new("b", "B", "BTC")];
        assert!(merged_ids(&accounts).is_empty());
        assert!(merged_ids(&[]).is_empty());
    }
}
