// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Page window arithmetic shared by browsing and filtered pagination.

use crate::config::PaginationConfig;
use serde::Serialize;

/// A normalized page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    /// 1-based page number
    pub page: u64,
    pub size: u64,
    pub offset: u64,
}

impl PageWindow {
    /// Clamp a caller's page and size into a usable window
    ///
    /// A size above the maximum is cut to the maximum, a size below one falls
    /// back to the default, and a page below one becomes the first page.
    pub fn normalize(page: i64, size: i64, limits: &PaginationConfig) -> Self {
        let size = if size < 1 {
            limits.default_page_size
        } else {
            (size as u64).min(limits.max_page_size)
        };
        let page = if page < 1 { 1 } else { page as u64 };
        Self {
            page,
            size,
            offset: (page - 1).saturating_mul(size),
        }
    }

    /// Number of pages needed for `total` rows
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.size)
    }
}
