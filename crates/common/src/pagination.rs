//! Pagination and sorting utilities.
//!
//! Callers send a raw [`PaginationRequest`]; it is clamped into a [`PageWindow`]
//! before any query runs, and results come back as a [`PaginatedResult`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default items per page
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Maximum items per page
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page size bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    #[serde(default = "max_page_size")]
    pub max_page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn max_page_size() -> u32 {
    MAX_PAGE_SIZE
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl PaginationConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_page_size == 0 {
            return Err("Maximum page size must be greater than 0".to_string());
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(format!(
                "Default page size must be between 1 and {}",
                self.max_page_size
            ));
        }
        Ok(())
    }
}

/// Raw, unvalidated pagination input.
///
/// Both values are optional and may be out of range; see [`PaginationRequest::normalize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationRequest {
    #[serde(default)]
    pub page_number: Option<i64>,

    #[serde(default)]
    pub page_size: Option<i64>,
}

impl PaginationRequest {
    pub fn new(page_number: i64, page_size: i64) -> Self {
        Self {
            page_number: Some(page_number),
            page_size: Some(page_size),
        }
    }

    /// Clamp the request into a usable window.
    ///
    /// Page numbers below 1 become 1. Missing or non-positive sizes fall back to
    /// the configured default, and sizes above the maximum are capped.
    pub fn normalize(&self, config: &PaginationConfig) -> PageWindow {
        let max = config.max_page_size.max(1);
        let default = config.default_page_size.clamp(1, max);

        let page_number = match self.page_number {
            Some(n) if n > 1 => u32::try_from(n).unwrap_or(u32::MAX),
            _ => 1,
        };
        let page_size = match self.page_size {
            Some(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX).min(max),
            _ => default,
        };

        PageWindow {
            page_number,
            page_size,
        }
    }
}

/// Normalize a raw page number and size into a window.
pub fn normalize(
    page_number: Option<i64>,
    page_size: Option<i64>,
    config: &PaginationConfig,
) -> PageWindow {
    PaginationRequest {
        page_number,
        page_size,
    }
    .normalize(config)
}

/// A validated page: number is at least 1, size is within the configured bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    page_number: u32,
    page_size: u32,
}

impl PageWindow {
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Items to skip before the page starts
    pub fn skip(&self) -> u64 {
        u64::from(self.page_number - 1) * u64::from(self.page_size)
    }

    /// Items to take
    pub fn take(&self) -> u32 {
        self.page_size
    }
}

/// Sort direction for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn is_descending(&self) -> bool {
        matches!(self, Self::Desc)
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            _ => Err(format!("Invalid sort direction: {}", s)),
        }
    }
}

/// One page of results plus the totals needed to navigate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total_items: u64,
    pub page_number: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total_items: u64, window: PageWindow) -> Self {
        Self {
            items,
            total_items,
            page_number: window.page_number,
            page_size: window.page_size,
            total_pages: total_items.div_ceil(u64::from(window.page_size)),
        }
    }

    pub fn empty(window: PageWindow) -> Self {
        Self::new(Vec::new(), 0, window)
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page_number) < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page_number > 1
    }

    /// Map the items, keeping the page metadata
    pub fn map<U, F>(self, f: F) -> PaginatedResult<U>
    where
        F: FnMut(T) -> U,
    {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            total_items: self.total_items,
            page_number: self.page_number,
            page_size: self.page_size,
            total_pages: self.total_pages,
        }
    }
}

/// Assemble a page result from items already sliced to `window`.
pub fn build_result<T>(items: Vec<T>, total_items: u64, window: PageWindow) -> PaginatedResult<T> {
    PaginatedResult::new(items, total_items, window)
}
