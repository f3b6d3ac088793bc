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

//! Engine configuration
//!

use crate::common::row_id_set::DEFAULT_BITSET_THRESHOLD;

/// Sizing options for the reference columnar table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    /// Rows per page
    /// Default: 1024
    pub page_size: usize,

    /// Maximum number of pages; capacity is `page_size * max_pages`
    /// Default: 1024
    pub max_pages: usize,

    /// Optimistic seqlock retries before the reader yields its time slice
    /// Default: 64
    pub seqlock_spin_limit: u32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            page_size: 1024,
            max_pages: 1024,
            seqlock_spin_limit: 64,
        }
    }
}

impl TableConfig {
    /// Creates a new TableConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Row capacity of a table built with this configuration
    pub fn capacity(&self) -> usize {
        self.page_size.saturating_mul(self.max_pages)
    }

    /// Builder method to set the page size
    pub fn with_page_size(mut self, rows: usize) -> Self {
        self.page_size = rows.max(1);
        self
    }

    /// Builder method to set the maximum page count
    pub fn with_max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages.max(1);
        self
    }

    /// Builder method to set the seqlock spin limit
    pub fn with_seqlock_spin_limit(mut self, spins: u32) -> Self {
        self.seqlock_spin_limit = spins;
        self
    }
}

/// Configuration for the query engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Table sizing
    pub table: TableConfig,

    /// Size at which the COUNT/EXISTS accumulator switches to a bitset
    /// Default: 4096
    pub bitset_threshold: usize,

    /// Sort large candidate sets on the rayon pool
    /// Default: true
    pub enable_parallel_sorting: bool,

    /// Candidate count at which parallel sorting kicks in
    /// Default: 1000
    pub parallel_sort_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table: TableConfig::default(),
            bitset_threshold: DEFAULT_BITSET_THRESHOLD,
            enable_parallel_sorting: true,
            parallel_sort_threshold: 1000,
        }
    }
}

impl Config {
    /// Creates a new Config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Small tables, sequential sorting; suited to tests and embedded use
    pub fn small() -> Self {
        Self {
            table: TableConfig::new().with_page_size(256).with_max_pages(64),
            bitset_threshold: 1024,
            enable_parallel_sorting: false,
            parallel_sort_threshold: usize::MAX,
        }
    }

    /// Large tables with eager parallel sorting
    pub fn large() -> Self {
        Self {
            table: TableConfig::new().with_page_size(4096).with_max_pages(4096),
            bitset_threshold: DEFAULT_BITSET_THRESHOLD,
            enable_parallel_sorting: true,
            parallel_sort_threshold: 500,
        }
    }

    /// Builder method to set table sizing
    pub fn with_table(mut self, table: TableConfig) -> Self {
        self.table = table;
        self
    }

    /// Builder method to set the bitset threshold
    pub fn with_bitset_threshold(mut self, threshold: usize) -> Self {
        self.bitset_threshold = threshold.max(1);
        self
    }

    /// Builder method to enable/disable parallel sorting
    pub fn with_parallel_sorting(mut self, enabled: bool) -> Self {
        self.enable_parallel_sorting = enabled;
        self
    }

    /// Builder method to set the parallel sort threshold
    pub fn with_parallel_sort_threshold(mut self, rows: usize) -> Self {
        self.parallel_sort_threshold = rows;
        self
    }

    /// Returns true if a candidate set of `rows` should be sorted in parallel
    pub fn sorts_in_parallel(&self, rows: usize) -> bool {
        self.enable_parallel_sorting && rows >= self.parallel_sort_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_config_default() {
        let config = TableConfig::default();
        assert_eq!(config.page_size, 1024);
        assert_eq!(config.max_pages, 1024);
        assert_eq!(config.capacity(), 1024 * 1024);
        assert_eq!(config.seqlock_spin_limit, 64);
    }

    #[test]
    fn test_table_config_builder() {
        let config = TableConfig::new()
            .with_page_size(0)
            .with_max_pages(8)
            .with_seqlock_spin_limit(4);
        assert_eq!(config.page_size, 1);
        assert_eq!(config.capacity(), 8);
        assert_eq!(config.seqlock_spin_limit, 4);
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.bitset_threshold, 4096);
        assert!(config.enable_parallel_sorting);
        assert_eq!(config.parallel_sort_threshold, 1000);
        assert!(config.sorts_in_parallel(1000));
        assert!(!config.sorts_in_parallel(999));
    }

    #[test]
    fn test_config_presets() {
        assert!(!Config::small().sorts_in_parallel(1_000_000));
        assert!(Config::large().sorts_in_parallel(500));
        assert_eq!(Config::large().table.capacity(), 4096 * 4096);
    }

    #[test]
    fn test_config_builder() {
        let config = Config::new()
            .with_bitset_threshold(16)
            .with_parallel_sorting(false)
            .with_table(TableConfig::new().with_max_pages(2));
        assert_eq!(config.bitset_threshold, 16);
        assert!(!config.sorts_in_parallel(usize::MAX));
        assert_eq!(config.table.max_pages, 2);
    }
}
