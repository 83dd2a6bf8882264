//! Data models for tenantdesk entities.
//!
//! This module contains the data structures returned by the backend:
//!
//! - `User`: platform accounts, including super-admin flag
//! - `Organization`: tenants
//! - RBAC types: `Role`, `Permission`, and the client-side `PermissionGroup`
//! - `Page<T>`: paginated list envelope
//! - `DashboardSummary`: counts shown on the landing page

pub mod organization;
pub mod rbac;
pub mod user;

use serde::{Deserialize, Serialize};

pub use organization::Organization;
pub use rbac::{group_permissions, toggle_group, toggle_permission, Permission, PermissionGroup, Role};
pub use user::User;

/// Largest page size the backend accepts
pub const MAX_PAGE_LIMIT: u32 = 100;

/// A page of results. `page` is 1-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

impl<T> Page<T> {
    /// Number of pages, given the total and page size
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return if self.total > 0 { 1 } else { 0 };
        }
        self.total.div_ceil(u64::from(self.limit))
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }
}

/// Clamp pagination arguments to what the backend accepts
pub fn page_params(page: u32, limit: u32) -> (u32, u32) {
    (page.max(1), limit.clamp(1, MAX_PAGE_LIMIT))
}

/// Headline counts for the dashboard landing page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub organizations: u64,
    pub users: u64,
    pub roles: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_parsing_with_defaults() {
        let page: Page<u32> = serde_json::from_str(r#"{"items": [1, 2], "total": 12, "limit": 5}"#).unwrap();
        assert_eq!(page.items, vec![1, 2]);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());
    }

    #[test]
    fn test_last_page_has_no_next() {
        let page: Page<u32> = Page { items: vec![], total: 10, page: 2, limit: 5 };
        assert_eq!(page.total_pages(), 2);
        assert!(!page.has_next());

        let empty: Page<u32> = Page { items: vec![], total: 0, page: 1, limit: 0 };
        assert_eq!(empty.total_pages(), 0);
    }

    #[test]
    fn test_page_params_clamped() {
        assert_eq!(page_params(0, 0), (1, 1));
        assert_eq!(page_params(3, 20), (3, 20));
        assert_eq!(page_params(1, 500), (1, MAX_PAGE_LIMIT));
    }
}
