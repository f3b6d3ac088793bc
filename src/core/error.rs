// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for Memris
//!
//! This module defines all error types used by the query engine and its
//! storage collaborators.

use thiserror::Error;

/// Result type alias for Memris operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Memris
///
/// Not-found conditions (id lookup misses, join target misses) are never
/// errors; they surface as absent values or empty collections.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // =========================================================================
    // Argument errors
    // =========================================================================
    /// Malformed call-site argument (missing BETWEEN bound, null IN element, ...)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Value cannot be converted to the column's logical type
    #[error("cannot convert {from} to {to}")]
    TypeConversion { from: String, to: String },

    // =========================================================================
    // Unsupported operations
    // =========================================================================
    /// Operator/type combination, join type or grouping feature not supported
    #[error("not supported: {0}")]
    NotSupported(String),

    // =========================================================================
    // Configuration errors
    // =========================================================================
    /// A required collaborator (type handler, materializer, table) is missing
    #[error("missing configuration: {0}")]
    MissingConfiguration(String),

    /// Column position outside the table layout
    #[error("column index {index} out of bounds for {column_count} columns")]
    ColumnIndexOutOfBounds { index: usize, column_count: usize },

    /// Index referenced by name does not exist
    #[error("index '{0}' not found")]
    IndexNotFound(String),

    // =========================================================================
    // Storage errors
    // =========================================================================
    /// Table has no free slot left
    #[error("table capacity of {capacity} rows exceeded")]
    CapacityExceeded { capacity: usize },

    /// Insert with an id that is already live
    #[error("duplicate id {0}")]
    DuplicateId(String),

    // =========================================================================
    // Materialization errors
    // =========================================================================
    /// Entity construction or field assignment failed
    #[error("failed to materialize {entity}.{field}: {message}")]
    Materialization {
        entity: String,
        field: String,
        message: String,
    },

    // =========================================================================
    // Internal errors
    // =========================================================================
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Create a new InvalidArgument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Create a new NotSupported error
    pub fn not_supported(message: impl Into<String>) -> Self {
        Error::NotSupported(message.into())
    }

    /// Create a new TypeConversion error
    pub fn type_conversion(from: impl Into<String>, to: impl Into<String>) -> Self {
        Error::TypeConversion {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create a MissingConfiguration error for an unregistered type code
    pub fn missing_handler(type_code: u8) -> Self {
        Error::MissingConfiguration(format!(
            "no type handler registered for type code {}",
            type_code
        ))
    }

    /// Create a new Materialization error
    pub fn materialization(
        entity: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Materialization {
            entity: entity.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new ColumnIndexOutOfBounds error
    pub fn column_out_of_bounds(index: usize, column_count: usize) -> Self {
        Error::ColumnIndexOutOfBounds {
            index,
            column_count,
        }
    }

    /// Create a new Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Check if this error was caused by a malformed argument
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument(_) | Error::TypeConversion { .. }
        )
    }

    /// Check if this error reports an unsupported operation
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Error::NotSupported(_))
    }

    /// Check if this error reports a missing collaborator or bad layout
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::MissingConfiguration(_)
                | Error::ColumnIndexOutOfBounds { .. }
                | Error::IndexNotFound(_)
        )
    }
}
