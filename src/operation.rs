// 🧾 Operation Model - What a history is made of
// An operation is identified by its hash within an account and carries a date.
// Some operations hide internal movements (contract calls, batched transfers)
// that the history must expose as their own rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// HISTORY OPERATION CAPABILITY
// ============================================================================

/// What the merge needs from an operation: an identity and a point in time.
pub trait HistoryOperation: Clone {
    /// Identity of the operation within its account
    fn hash(&self) -> &str;

    /// When the operation happened
    fn date(&self) -> DateTime<Utc>;

    /// User-visible records for this operation.
    ///
    /// Every record is treated as happening at `self.date()` when grouping by day.
    fn flatten_with_internals(&self) -> Vec<Self> {
        vec![self.clone()]
    }
}

// ============================================================================
// OPERATION TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    /// Funds received
    In,

    /// Funds sent
    Out,

    /// Fee-only operation (e.g. a failed transaction that still burned gas)
    Fees,

    /// Staking reward
    Reward,

    Delegate,

    Undelegate,

    /// Carrier of internal operations, never shown on its own
    None,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::In => "IN",
            OperationType::Out => "OUT",
            OperationType::Fees => "FEES",
            OperationType::Reward => "REWARD",
            OperationType::Delegate => "DELEGATE",
            OperationType::Undelegate => "UNDELEGATE",
            OperationType::None => "NONE",
        }
    }

    /// Parse the uppercase name used in CSV imports (case-insensitive)
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "IN" => Some(OperationType::In),
            "OUT" => Some(OperationType::Out),
            "FEES" => Some(OperationType::Fees),
            "REWARD" => Some(OperationType::Reward),
            "DELEGATE" => Some(OperationType::Delegate),
            "UNDELEGATE" => Some(OperationType::Undelegate),
            "NONE" => Some(OperationType::None),
            _ => None,
        }
    }

    /// Whether the operation shows up as a row in a history
    pub fn is_visible(&self) -> bool {
        *self != OperationType::None
    }
}

// ============================================================================
// OPERATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Unique id across all accounts: `{account_id}-{hash}-{type}`
    #[serde(default)]
    pub id: String,

    /// Transaction hash, identity within the account.
    /// A pending operation keeps its hash once it lands as confirmed.
    #[serde(default)]
    pub hash: String,

    #[serde(default)]
    pub account_id: String,

    #[serde(rename = "type")]
    pub operation_type: OperationType,

    /// Amount moved, in the account currency
    pub value: f64,

    #[serde(default)]
    pub fee: f64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub senders: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<String>,

    /// None while the operation is still pending
    #[serde(default)]
    pub block_height: Option<u64>,

    pub date: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub internal_operations: Vec<Operation>,
}

impl Operation {
    /// Create an operation with no fee, no counterparties and no internals
    pub fn new(
        hash: &str,
        account_id: &str,
        operation_type: OperationType,
        value: f64,
        date: DateTime<Utc>,
    ) -> Self {
        Operation {
            id: Operation::encode_id(account_id, hash, operation_type),
            hash: hash.to_string(),
            account_id: account_id.to_string(),
            operation_type,
            value,
            fee: 0.0,
            senders: Vec::new(),
            recipients: Vec::new(),
            block_height: None,
            date,
            internal_operations: Vec::new(),
        }
    }

    pub fn encode_id(account_id: &str, hash: &str, operation_type: OperationType) -> String {
        format!("{}-{}-{}", account_id, hash, operation_type.as_str())
    }

    /// Mark as confirmed at the given block
    pub fn confirmed_at(mut self, block_height: u64) -> Self {
        self.block_height = Some(block_height);
        self
    }

    pub fn with_internal(mut self, internal: Operation) -> Self {
        self.internal_operations.push(internal);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.block_height.is_none()
    }
}

impl HistoryOperation for Operation {
    fn hash(&self) -> &str {
        &self.hash
    }

    fn date(&self) -> DateTime<Utc> {
        self.date
    }

    fn flatten_with_internals(&self) -> Vec<Self> {
        flatten_operation_with_internals(self)
    }
}

/// Expand an operation into its user-visible rows.
///
/// The operation itself comes first (skipped when its type is `None`),
/// followed by its internal operations in their stored order.
pub fn flatten_operation_with_internals(op: &Operation) -> Vec<Operation> {
    let mut ops = Vec::with_capacity(1 + op.internal_operations.len());

    if op.operation_type.is_visible() {
        ops.push(op.clone());
    }

    ops.extend(op.internal_operations.iter().cloned());
    ops
}

// ============================================================================
// TESTS
// ============================================================================
