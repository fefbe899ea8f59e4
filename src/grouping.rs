// 📅 Daily Grouping - Paginate a merged history into calendar days
//
// Pulls operations from the merger newest-first, buffers the day in progress
// and closes it as soon as an operation from an earlier day shows up.
// Closed days are cut to the remaining budget. The day still open when the
// input runs out is returned whole, so the last section may go past `count`.

use crate::account::{flatten_accounts, validate_sort_order, AccountLike};
use crate::error::HistoryError;
use crate::merge::OperationMerger;
use crate::operation::HistoryOperation;
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// OPTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupOpsByDayOpts {
    /// Number of records wanted
    pub count: usize,

    /// Include sub-accounts (flattened right after their parent)
    #[serde(default)]
    pub with_sub_accounts: bool,
}

impl GroupOpsByDayOpts {
    pub fn new(count: usize) -> Self {
        GroupOpsByDayOpts {
            count,
            with_sub_accounts: false,
        }
    }

    pub fn with_sub_accounts(mut self, with_sub_accounts: bool) -> Self {
        self.with_sub_accounts = with_sub_accounts;
        self
    }

    /// Options for the next "load more" request
    pub fn next_page(self, page_size: usize) -> Self {
        GroupOpsByDayOpts {
            count: self.count.saturating_add(page_size),
            ..self
        }
    }
}

// ============================================================================
// RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyOperationsSection<R> {
    /// Calendar day of every record in `data`
    pub day: NaiveDate,

    /// Records of that day, newest first
    pub data: Vec<R>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyOperations<R> {
    /// Days, newest first, no day repeated
    pub sections: Vec<DailyOperationsSection<R>>,

    /// True when every operation of every account was consumed
    pub completed: bool,
}

impl<R> DailyOperations<R> {
    pub fn empty_completed() -> Self {
        DailyOperations {
            sections: Vec::new(),
            completed: true,
        }
    }

    /// Total number of records across sections
    pub fn len(&self) -> usize {
        self.sections.iter().map(|s| s.data.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.data.is_empty())
    }

    /// All records in display order
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.sections.iter().flat_map(|s| s.data.iter())
    }
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Return about `count` records of the merged history of `accounts`, grouped by local day.
pub fn group_accounts_operations_by_day<A: AccountLike>(
    accounts: &[A],
    opts: GroupOpsByDayOpts,
) -> DailyOperations<A::Op> {
    group_accounts_operations_by_day_in(accounts, opts, &Local)
}

/// Same as [`group_accounts_operations_by_day`] for a single account.
pub fn group_account_operations_by_day<A: AccountLike>(
    account: &A,
    opts: GroupOpsByDayOpts,
) -> DailyOperations<A::Op> {
    group_accounts_operations_by_day(std::slice::from_ref(account), opts)
}

/// Group with day boundaries taken in `tz` instead of the local zone.
pub fn group_accounts_operations_by_day_in<A, Tz>(
    accounts: &[A],
    opts: GroupOpsByDayOpts,
    tz: &Tz,
) -> DailyOperations<A::Op>
where
    A: AccountLike,
    Tz: TimeZone,
{
    group_accounts_operations_by_day_with(accounts, opts, tz, |op| op.flatten_with_internals())
}

/// Group with a custom expander turning each merged operation into records.
///
/// Records inherit the date of the operation they were expanded from.
pub fn group_accounts_operations_by_day_with<A, R, Tz, F>(
    accounts: &[A],
    opts: GroupOpsByDayOpts,
    tz: &Tz,
    expand: F,
) -> DailyOperations<R>
where
    A: AccountLike,
    Tz: TimeZone,
    F: FnMut(&A::Op) -> Vec<R>,
{
    let selected = select_accounts(accounts, opts.with_sub_accounts);
    group_merged(OperationMerger::new(selected), opts.count, tz, expand)
}

/// Like [`group_accounts_operations_by_day`] but rejects unsorted sequences first.
pub fn try_group_accounts_operations_by_day<A: AccountLike>(
    accounts: &[A],
    opts: GroupOpsByDayOpts,
) -> Result<DailyOperations<A::Op>, HistoryError> {
    let selected = select_accounts(accounts, opts.with_sub_accounts);
    for account in &selected {
        validate_sort_order(*account)?;
    }

    Ok(group_merged(
        OperationMerger::new(selected),
        opts.count,
        &Local,
        |op| op.flatten_with_internals(),
    ))
}

fn select_accounts<A: AccountLike>(accounts: &[A], with_sub_accounts: bool) -> Vec<&A> {
    if with_sub_accounts {
        flatten_accounts(accounts)
    } else {
        accounts.iter().collect()
    }
}

// ============================================================================
// DAY GROUPER
// ============================================================================

fn day_of<Tz: TimeZone>(date: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    date.with_timezone(tz).date_naive()
}

fn group_merged<A, R, Tz, F>(
    mut merger: OperationMerger<'_, A>,
    count: usize,
    tz: &Tz,
    mut expand: F,
) -> DailyOperations<R>
where
    A: AccountLike,
    Tz: TimeZone,
    F: FnMut(&A::Op) -> Vec<R>,
{
    let mut next = merger.next_operation();
    let Some(first) = next else {
        return DailyOperations::empty_completed();
    };

    let mut sections = Vec::new();
    let mut total = 0;
    let mut day = day_of(first.date(), tz);
    let mut data: Vec<R> = Vec::new();

    while total < count {
        let Some(op) = next else { break };
        let op_day = day_of(op.date(), tz);

        if op_day < day {
            if !data.is_empty() {
                data.truncate(count - total);
                total += data.len();
                debug!(%day, records = data.len(), total, "closing day");
                sections.push(DailyOperationsSection { day, data });
            }
            day = op_day;
            data = expand(op);
        } else {
            data.extend(expand(op));
        }

        next = merger.next_operation();
    }

    // Day still open: returned whole, even past `count`
    if !data.is_empty() && total < count {
        debug!(%day, records = data.len(), total, "flushing open day");
        sections.push(DailyOperationsSection { day, data });
    }

    DailyOperations {
        sections,
        completed: next.is_none(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::operation::{Operation, OperationType};
    use chrono::{Duration, FixedOffset, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, day, hour, 0, 0).unwrap()
    }

    fn create_test_operation(account: &str, hash: &str, date: DateTime<Utc>) -> Operation {
        Operation::new(hash, account, OperationType::Out, 1.0, date)
    }

    fn group_utc(accounts: &[Account], count: usize) -> DailyOperations<Operation> {
        group_accounts_operations_by_day_in(accounts, GroupOpsByDayOpts::new(count), &Utc)
    }

    fn section_sizes(result: &DailyOperations<Operation>) -> Vec<(u32, usize)> {
        use chrono::Datelike;
        result
            .sections
            .iter()
            .map(|s| (s.day.day(), s.data.len()))
            .collect()
    }

    fn daily_account(id: &str, days: &[(u32, usize)]) -> Account {
        let mut ops = Vec::new();
        for &(day, n) in days {
            for i in 0..n {
                let date = at(day, 20) - Duration::minutes(i as i64);
                ops.push(create_test_operation(id, &format!("{}-{}-{}", id, day, i), date));
            }
        }
        Account::new(id, id, "BTC").with_operations(ops)
    }

    #[test]
    fn test_empty_input_is_completed() {
        let none: Vec<Account> = vec![];
        for count in [0, 1, 50] {
            let result = group_utc(&none, count);
            assert!(result.sections.is_empty());
            assert!(result.completed);
        }

        let empty_accounts = vec![Account::new("a", "A", "BTC")];
        assert_eq!(group_utc(&empty_accounts, 10), DailyOperations::empty_completed());
    }

    #[test]
    fn test_zero_count_with_data() {
        let accounts = vec![daily_account("a", &[(20, 1)])];
        let result = group_utc(&accounts, 0);

        assert!(result.sections.is_empty());
        assert!(!result.completed);
    }

    #[test]
    fn test_everything_fits() {
        let accounts = vec![daily_account("a", &[(20, 2), (18, 1)])];
        let result = group_utc(&accounts, 10);

        assert_eq!(section_sizes(&result), vec![(20, 2), (18, 1)]);
        assert!(result.completed);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_closed_day_is_cut_to_budget() {
        let accounts = vec![daily_account("a", &[(20, 1), (19, 3), (18, 2)])];
        let result = group_utc(&accounts, 3);

        assert_eq!(section_sizes(&result), vec![(20, 1), (19, 2)]);
        assert!(!result.completed);
    }

    #[test]
    fn test_budget_reached_exactly_on_boundary() {
        let accounts = vec![daily_account("a", &[(20, 2), (19, 2)])];
        let result = group_utc(&accounts, 2);

        assert_eq!(section_sizes(&result), vec![(20, 2)]);
        assert!(!result.completed);
    }

    #[test]
    fn test_two_accounts_day_closed_by_older_day() {
        // A: D2 x1, D1 x2 / B: D2 x3. D1 closes D2, which is cut to the budget.
        let accounts = vec![
            daily_account("a", &[(21, 1), (20, 2)]),
            daily_account("b", &[(21, 3)]),
        ];
        let result = group_utc(&accounts, 2);

        assert_eq!(section_sizes(&result), vec![(21, 2)]);
        assert!(!result.completed);
    }

    #[test]
    fn test_open_day_overshoots_budget() {
        // A: D2 x1 / B: D2 x3. Input runs out before D2 closes: all 4 come back.
        let accounts = vec![daily_account("a", &[(21, 1)]), daily_account("b", &[(21, 3)])];
        let result = group_utc(&accounts, 2);

        assert_eq!(section_sizes(&result), vec![(21, 4)]);
        assert!(result.completed);

        let data = &result.sections[0].data;
        assert!(data.windows(2).all(|w| w[0].date >= w[1].date));
        // Same instant in both accounts: account order decides
        assert_eq!(data[0].account_id, "a");
        assert_eq!(data[1].account_id, "b");
    }

    #[test]
    fn test_open_day_overshoot_after_closed_days() {
        let accounts = vec![daily_account("a", &[(21, 1), (20, 5)])];
        let result = group_utc(&accounts, 3);

        assert_eq!(section_sizes(&result), vec![(21, 1), (20, 5)]);
        assert!(result.completed);
    }

    #[test]
    fn test_pending_and_confirmed_share_a_day() {
        let accounts = vec![Account::new("a", "A", "ETH")
            .with_operations(vec![
                create_test_operation("a", "c1", at(21, 9)),
                create_test_operation("a", "c0", at(20, 9)),
            ])
            .with_pending_operations(vec![
                create_test_operation("a", "p1", at(21, 12)),
                create_test_operation("a", "c1", at(21, 8)),
            ])];

        let result = group_utc(&accounts, 10);
        let hashes: Vec<&str> = result.iter().map(|o| o.hash.as_str()).collect();

        assert_eq!(hashes, vec!["p1", "c1", "c0"]);
        assert_eq!(section_sizes(&result), vec![(21, 2), (20, 1)]);
    }

    #[test]
    fn test_internals_expand_into_day() {
        let parent = create_test_operation("a", "swap", at(21, 10))
            .with_internal(create_test_operation("a", "swap", at(21, 10)))
            .with_internal(create_test_operation("a", "swap", at(21, 10)));
        let accounts = vec![Account::new("a", "A", "ETH").with_operations(vec![
            parent,
            create_test_operation("a", "older", at(19, 10)),
            create_test_operation("a", "oldest", at(18, 10)),
        ])];

        // Internals count against the budget of the closed day
        let result = group_utc(&accounts, 2);
        assert_eq!(section_sizes(&result), vec![(21, 2)]);
        assert!(!result.completed);
    }

    #[test]
    fn test_hidden_operation_yields_no_section() {
        let hidden = Operation::new("h", "a", OperationType::None, 0.0, at(21, 10));
        let accounts = vec![Account::new("a", "A", "ETH").with_operations(vec![
            hidden,
            create_test_operation("a", "v", at(20, 10)),
        ])];

        let result = group_utc(&accounts, 5);
        assert_eq!(section_sizes(&result), vec![(20, 1)]);
        assert!(result.completed);
    }

    #[test]
    fn test_sub_accounts_flag() {
        let tree = vec![daily_account("eth", &[(21, 1)])
            .with_sub_account(daily_account("usdc", &[(20, 2)]))];

        let top_only = group_accounts_operations_by_day_in(&tree, GroupOpsByDayOpts::new(10), &Utc);
        assert_eq!(section_sizes(&top_only), vec![(21, 1)]);

        let opts = GroupOpsByDayOpts::new(10).with_sub_accounts(true);
        let with_subs = group_accounts_operations_by_day_in(&tree, opts, &Utc);
        assert_eq!(section_sizes(&with_subs), vec![(21, 1), (20, 2)]);
    }

    #[test]
    fn test_day_boundary_follows_time_zone() {
        // 23:30 UTC on the 20th is already the 21st at UTC+2
        let accounts = vec![Account::new("a", "A", "BTC").with_operations(vec![
            create_test_operation("a", "late", at(20, 23) + Duration::minutes(30)),
            create_test_operation("a", "noon", at(20, 12)),
        ])];

        let utc = group_accounts_operations_by_day_in(&accounts, GroupOpsByDayOpts::new(10), &Utc);
        assert_eq!(section_sizes(&utc), vec![(20, 2)]);

        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let shifted = group_accounts_operations_by_day_in(&accounts, GroupOpsByDayOpts::new(10), &plus_two);
        assert_eq!(section_sizes(&shifted), vec![(21, 1), (20, 1)]);
    }

    #[test]
    fn test_custom_expander() {
        let accounts = vec![daily_account("a", &[(21, 2), (20, 1)])];
        let result = group_accounts_operations_by_day_with(
            &accounts,
            GroupOpsByDayOpts::new(10),
            &Utc,
            |op| vec![op.hash.clone()],
        );

        let hashes: Vec<&String> = result.iter().collect();
        assert_eq!(hashes, vec!["a-21-0", "a-21-1", "a-20-0"]);
    }

    #[test]
    fn test_single_account_form() {
        let account = daily_account("a", &[(21, 2), (20, 3)]);
        let opts = GroupOpsByDayOpts::new(3);

        assert_eq!(
            group_account_operations_by_day(&account, opts),
            group_accounts_operations_by_day(&[account.clone()], opts)
        );
    }

    #[test]
    fn test_try_group_rejects_unsorted() {
        let accounts = vec![Account::new("a", "A", "BTC").with_operations(vec![
            create_test_operation("a", "old", at(19, 10)),
            create_test_operation("a", "new", at(21, 10)),
        ])];

        let err = try_group_accounts_operations_by_day(&accounts, GroupOpsByDayOpts::new(5)).unwrap_err();
        assert!(matches!(err, HistoryError::UnsortedOperations { index: 1, .. }));
    }

    #[test]
    fn test_next_page_grows_count() {
        let opts = GroupOpsByDayOpts::new(20).with_sub_accounts(true).next_page(20);
        assert_eq!(opts.count, 40);
        assert!(opts.with_sub_accounts);
    }
}
