use std::fmt;

use crate::account::Sequence;

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryError {
    /// A sequence is not sorted newest-first; `index` is the first offending element.
    UnsortedOperations {
        account_id: String,
        sequence: Sequence,
        index: usize,
    },
    /// Unknown operation type in imported data.
    UnknownOperationType { line: usize, value: String },
    /// Date that is neither RFC 3339 nor `YYYY-MM-DD HH:MM:SS`.
    DateParse { line: usize, value: String },
    /// A sub-account references a parent that was never declared.
    UnknownParent { account_id: String, parent_id: String },
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsortedOperations { account_id, sequence, index } => write!(
                f,
                "account '{account_id}': {} operations not sorted by descending date at index {index}",
                sequence.as_str()
            ),
            Self::UnknownOperationType { line, value } => {
                write!(f, "line {line}: unknown operation type '{value}'")
            }
            Self::DateParse { line, value } => {
                write!(f, "line {line}: cannot parse date '{value}'")
            }
            Self::UnknownParent { account_id, parent_id } => {
                write!(f, "account '{account_id}': unknown parent account '{parent_id}'")
            }
        }
    }
}

impl std::error::Error for HistoryError {}
