//! # Error Taxonomy
//!
//! This module defines the typed errors of the column storage engine. All
//! fallible operations return `eyre::Result`; the typed values below travel
//! inside the report so callers that must distinguish error classes can
//! recover them with `downcast_ref`.
//!
//! ## Error Classes
//!
//! | Class | Recoverable? | Raised by |
//! |-------|--------------|-----------|
//! | [`VariantTypeCastError`] | yes | Variant conversions, arithmetic |
//! | [`WrongVariantTypeError`] | yes | strict `get_xxx` accessors |
//! | [`VariantSerializationError`] | caller's choice | Variant serialization |
//! | [`VariantDeserializationError`] | caller's choice | Variant deserialization |
//! | [`StorageError`] | **no** (on-disk corruption or logic bug) | Column read/write/consistency paths |
//! | [`ExhaustionError`] | no (id space / bound exceeded) | TRID generation, MCR size cap |
//!
//! `Column::put_record` catches cast errors from the coercion step and
//! translates them into a column-scoped [`StorageError::IncompatibleValue`]
//! so the row layer can reject the insert without treating the column as
//! corrupt. Storage-consistency errors always carry full addressing context
//! (database/table/column identity plus block id and offset) for postmortem
//! diagnosis.
//!
//! ## Propagation
//!
//! Nothing in this layer masks partial writes: every error propagates to the
//! row/transaction layer, which decides between per-column rollback and full
//! abort.

use std::fmt;

use thiserror::Error;

use crate::types::VariantType;

/// Identity of a column, attached to every storage-consistency error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub database_name: String,
    pub table_name: String,
    pub column_name: String,
    pub database_id: u32,
    pub table_id: u32,
    pub column_id: u64,
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}'.'{}'.'{}' ({}.{}.{})",
            self.database_name,
            self.table_name,
            self.column_name,
            self.database_id,
            self.table_id,
            self.column_id
        )
    }
}

/// A value could not be converted between two variant types.
///
/// Recoverable: the offending operation can be rejected without touching
/// any on-disk state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot cast variant from {source_type:?} to {dest_type:?}{}",
    reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
pub struct VariantTypeCastError {
    pub source_type: VariantType,
    pub dest_type: VariantType,
    pub reason: Option<String>,
}

impl VariantTypeCastError {
    pub fn new(source_type: VariantType, dest_type: VariantType) -> Self {
        Self {
            source_type,
            dest_type,
            reason: None,
        }
    }

    pub fn with_reason(
        source_type: VariantType,
        dest_type: VariantType,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            source_type,
            dest_type,
            reason: Some(reason.into()),
        }
    }
}

/// A strict accessor was called on a variant holding a different type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("wrong variant type: expected {expected:?}, found {actual:?}")]
pub struct WrongVariantTypeError {
    pub expected: VariantType,
    pub actual: VariantType,
}

/// Variant serialization failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VariantSerializationError {
    #[error("LOB of {size} bytes exceeds the serializable maximum of {max} bytes")]
    LobTooLong { size: u64, max: u64 },

    #[error("LOB stream does not support rewind")]
    RewindNotSupported,

    #[error("LOB stream ended early: expected {expected} bytes, read {actual}")]
    LobTruncated { expected: u64, actual: u64 },
}

/// Variant deserialization failures. `NotEnoughData` and `CorruptData` are
/// reported distinctly so framing layers can ask for more input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VariantDeserializationError {
    #[error("not enough data: need at least {needed} more bytes")]
    NotEnoughData { needed: usize },

    #[error("unknown variant type tag {tag}")]
    UnknownTag { tag: u8 },

    #[error("corrupt variant value: {reason}")]
    CorruptData { reason: String },
}

/// Fatal, non-retryable storage-consistency errors. These indicate on-disk
/// corruption or a logic bug in the engine; the affected column must not be
/// written to until repaired.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("column {column}: invalid data position: block {block_id}, offset {offset}")]
    InvalidDataPosition {
        column: ColumnRef,
        block_id: u64,
        offset: u32,
    },

    #[error(
        "column {column}: digest mismatch in block {block_id}: \
         computed {computed:#018x}, stored {stored:#018x}"
    )]
    BlockDigestMismatch {
        column: ColumnRef,
        block_id: u64,
        computed: u64,
        stored: u64,
    },

    #[error(
        "column {column}: block {block_id} has previous block {actual_prev}, \
         expected {expected_prev}"
    )]
    BlockChainBroken {
        column: ColumnRef,
        block_id: u64,
        expected_prev: u64,
        actual_prev: u64,
    },

    #[error(
        "column {column}: invalid LOB chunk header at block {block_id}, \
         offset {offset}: {reason}"
    )]
    InvalidLobChunkHeader {
        column: ColumnRef,
        block_id: u64,
        offset: u32,
        reason: String,
    },

    #[error("column {column}: block {block_id} not found")]
    BlockNotFound { column: ColumnRef, block_id: u64 },

    #[error(
        "column {column}: rollback target block {target_block_id} is not reachable \
         from block {from_block_id}"
    )]
    UnreachableRollbackTarget {
        column: ColumnRef,
        target_block_id: u64,
        from_block_id: u64,
    },

    #[error("column {column}: cannot insert NULL value into NOT NULL column")]
    NullValueNotAllowed { column: ColumnRef },

    #[error(
        "column {column}: cannot store {source_type:?} value in a \
         {dest_type:?} column{}",
        reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
    )]
    IncompatibleValue {
        column: ColumnRef,
        source_type: VariantType,
        dest_type: VariantType,
        reason: Option<String>,
    },

    #[error("column {column}: master index entry for row id {trid} already exists")]
    DuplicateTrid { column: ColumnRef, trid: u64 },

    #[error("column {column}: master index entry for row id {trid} not found")]
    TridNotFound { column: ColumnRef, trid: u64 },
}

/// An id space or bounded structure has been exceeded. Fatal for the
/// attempted operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExhaustionError {
    #[error("user row id space exhausted")]
    UserTridExhausted,

    #[error("system row id space exhausted (first user row id is {first_user_trid})")]
    SystemTridExhausted { first_user_trid: u64 },

    #[error("master column record of {size} bytes exceeds the maximum of {max} bytes")]
    MasterRecordTooLong { size: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ref() -> ColumnRef {
        ColumnRef {
            database_name: "db".into(),
            table_name: "t".into(),
            column_name: "c".into(),
            database_id: 1,
            table_id: 2,
            column_id: 3,
        }
    }

    #[test]
    fn cast_error_display_includes_both_types() {
        let err = VariantTypeCastError::new(VariantType::String, VariantType::Int32);
        let msg = err.to_string();
        assert!(msg.contains("String"));
        assert!(msg.contains("Int32"));
    }

    #[test]
    fn cast_error_display_includes_reason() {
        let err = VariantTypeCastError::with_reason(
            VariantType::String,
            VariantType::Int32,
            "trailing characters",
        );
        assert!(err.to_string().contains("trailing characters"));
    }

    #[test]
    fn storage_error_carries_addressing_context() {
        let err = StorageError::BlockDigestMismatch {
            column: sample_ref(),
            block_id: 7,
            computed: 0xAB,
            stored: 0xCD,
        };
        let msg = err.to_string();
        assert!(msg.contains("'db'.'t'.'c'"));
        assert!(msg.contains("block 7"));
    }

    #[test]
    fn cast_error_downcasts_through_eyre() {
        let report = eyre::Report::new(VariantTypeCastError::new(
            VariantType::Clob,
            VariantType::Bool,
        ));
        let err = report.downcast_ref::<VariantTypeCastError>().unwrap();
        assert_eq!(err.source_type, VariantType::Clob);
    }
}
