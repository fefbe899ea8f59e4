// 📂 Account Loader - JSON account trees and flat CSV exports
//
// Loaded accounts are normalized so both sequences are newest-first, which is
// what the merge expects. Missing identities are filled in:
// - operation hash: SHA-256 of account|date|type|value
// - account id: UUID v4

use crate::account::Account;
use crate::error::HistoryError;
use crate::operation::{Operation, OperationType};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

// ============================================================================
// ENTRY POINT
// ============================================================================

/// Load accounts from `.csv` (flat rows) or anything else as JSON
pub fn load_accounts(path: &Path) -> Result<Vec<Account>> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));

    if is_csv {
        load_operations_csv(path)
    } else {
        load_accounts_json(path)
    }
}

// ============================================================================
// JSON
// ============================================================================

pub fn load_accounts_json(path: &Path) -> Result<Vec<Account>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut accounts: Vec<Account> =
        serde_json::from_str(&raw).context("Failed to deserialize accounts")?;

    for account in &mut accounts {
        prepare_account(account);
    }

    info!(path = %path.display(), accounts = accounts.len(), "loaded accounts from JSON");
    Ok(accounts)
}

/// Fill missing operation identities and sort both sequences, recursively
fn prepare_account(account: &mut Account) {
    let account_id = account.id.clone();
    for op in account
        .operations
        .iter_mut()
        .chain(account.pending_operations.iter_mut())
    {
        if op.account_id.is_empty() {
            op.account_id = account_id.clone();
        }
        if op.hash.is_empty() {
            op.hash = compute_operation_hash(
                &op.account_id,
                &op.date.to_rfc3339(),
                op.operation_type,
                op.value,
            );
        }
        if op.id.is_empty() {
            op.id = Operation::encode_id(&op.account_id, &op.hash, op.operation_type);
        }
    }

    account.normalize();
    for sub_account in &mut account.sub_accounts {
        prepare_account(sub_account);
    }
}

// ============================================================================
// CSV
// ============================================================================

/// One operation per row. Accounts are declared implicitly by their first row.
#[derive(Debug, Deserialize)]
struct OperationRow {
    account_id: String,

    #[serde(default)]
    account_name: String,

    /// Empty for top-level accounts
    #[serde(default)]
    parent_account_id: String,

    #[serde(default)]
    currency: String,

    #[serde(default)]
    hash: String,

    date: String,

    #[serde(rename = "type")]
    operation_type: String,

    value: f64,

    #[serde(default)]
    fee: f64,

    /// Empty while the operation is pending
    #[serde(default)]
    block_height: Option<u64>,
}

pub fn load_operations_csv(path: &Path) -> Result<Vec<Account>> {
    let mut rdr = csv::Reader::from_path(path).context("Failed to open CSV file")?;

    let mut order: Vec<String> = Vec::new();
    let mut nodes: HashMap<String, Account> = HashMap::new();
    let mut parents: HashMap<String, String> = HashMap::new();
    let mut rows = 0;

    for (i, result) in rdr.deserialize().enumerate() {
        // +1 for the header, +1 for 1-based lines
        let line = i + 2;
        let row: OperationRow = result.with_context(|| format!("Failed to deserialize line {}", line))?;

        let operation_type = OperationType::parse(&row.operation_type).ok_or_else(|| {
            HistoryError::UnknownOperationType {
                line,
                value: row.operation_type.clone(),
            }
        })?;
        let date = parse_date(&row.date).ok_or_else(|| HistoryError::DateParse {
            line,
            value: row.date.clone(),
        })?;

        let hash = if row.hash.is_empty() {
            compute_operation_hash(&row.account_id, &row.date, operation_type, row.value)
        } else {
            row.hash.clone()
        };

        let mut op = Operation::new(&hash, &row.account_id, operation_type, row.value, date);
        op.fee = row.fee;
        op.block_height = row.block_height;

        let account = nodes.entry(row.account_id.clone()).or_insert_with(|| {
            order.push(row.account_id.clone());
            Account::new(&row.account_id, &row.account_name, &row.currency)
        });
        if op.is_pending() {
            account.pending_operations.push(op);
        } else {
            account.operations.push(op);
        }

        if !row.parent_account_id.is_empty() {
            parents.insert(row.account_id.clone(), row.parent_account_id.clone());
        }
        rows += 1;
    }

    let accounts = assemble_tree(&order, nodes, &parents)?;
    info!(path = %path.display(), rows, accounts = accounts.len(), "loaded operations from CSV");
    Ok(accounts)
}

/// Attach sub-accounts under their parents, keeping first-appearance order
fn assemble_tree(
    order: &[String],
    mut nodes: HashMap<String, Account>,
    parents: &HashMap<String, String>,
) -> Result<Vec<Account>> {
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut roots = Vec::new();

    for id in order {
        match parents.get(id) {
            Some(parent_id) if nodes.contains_key(parent_id) => {
                children.entry(parent_id.as_str()).or_default().push(id.as_str());
            }
            Some(parent_id) => {
                return Err(HistoryError::UnknownParent {
                    account_id: id.clone(),
                    parent_id: parent_id.clone(),
                }
                .into());
            }
            None => roots.push(id.as_str()),
        }
    }

    let mut accounts = Vec::with_capacity(roots.len());
    for root in roots {
        if let Some(account) = take_subtree(root, &mut nodes, &children) {
            accounts.push(account);
        }
    }

    if !nodes.is_empty() {
        let mut stranded: Vec<&String> = nodes.keys().collect();
        stranded.sort();
        bail!("Cyclic parent_account_id between accounts: {:?}", stranded);
    }

    for account in &mut accounts {
        account.normalize();
    }
    Ok(accounts)
}

fn take_subtree(
    id: &str,
    nodes: &mut HashMap<String, Account>,
    children: &HashMap<&str, Vec<&str>>,
) -> Option<Account> {
    let mut account = nodes.remove(id)?;
    for child in children.get(id).into_iter().flatten() {
        if let Some(sub_account) = take_subtree(child, nodes, children) {
            account.sub_accounts.push(sub_account);
        }
    }
    Some(account)
}

/// RFC 3339, or `YYYY-MM-DD HH:MM:SS` read as UTC
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Stable hash for operations exported without one
pub fn compute_operation_hash(
    account_id: &str,
    date: &str,
    operation_type: OperationType,
    value: f64,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}|{}|{}|{}",
        account_id,
        date,
        operation_type.as_str(),
        value
    ));
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// TESTS
// ============================================================================
