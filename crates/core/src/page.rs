//! Page requests for batch reads.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Page size used by batch passes unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Upper bound accepted for a configured page size.
pub const MAX_PAGE_SIZE: u32 = 10_000;

/// One page of a tenant-scoped batch read (0-based page index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn first(page_size: u32) -> DomainResult<Self> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(DomainError::validation(format!(
                "page_size must be within 1..={MAX_PAGE_SIZE} (got {page_size})"
            )));
        }
        Ok(Self { page: 0, page_size })
    }

    pub fn next(self) -> Self {
        Self {
            page: self.page + 1,
            page_size: self.page_size,
        }
    }

    /// Row offset of this page.
    pub fn offset(self) -> u64 {
        u64::from(self.page) * u64::from(self.page_size)
    }

    /// A page shorter than the requested size is the last one.
    pub fn is_last(self, len: usize) -> bool {
        len < self.page_size as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_advance_by_page_size() {
        let first = PageRequest::first(1000).unwrap();
        assert_eq!(first.offset(), 0);
        assert_eq!(first.next().offset(), 1000);
        assert_eq!(first.next().next().page, 2);
    }

    #[test]
    fn short_page_terminates() {
        let req = PageRequest::first(3).unwrap();
        assert!(!req.is_last(3));
        assert!(req.is_last(2));
        assert!(req.is_last(0));
    }

    #[test]
    fn page_size_bounds() {
        assert!(PageRequest::first(0).is_err());
        assert!(PageRequest::first(MAX_PAGE_SIZE + 1).is_err());
        assert_eq!(PageRequest::default().page_size, DEFAULT_PAGE_SIZE);
    }
}
