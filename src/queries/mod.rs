//! Read-model types shared by every listing: page/limit/search input and
//! the paginated envelope returned to callers.

use crate::errors::ServiceError;
use sea_orm::{ConnectionTrait, EntityTrait, FromQueryResult, PaginatorTrait, Select};
use serde::{Deserialize, Serialize};
use tracing::error;
use validator::Validate;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Paging and free-text search for a listing. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ListQuery {
    #[validate(range(min = 1))]
    pub page: u64,
    #[validate(range(min = 1, max = 1000))]
    pub limit: u64,
    #[validate(length(max = 255))]
    pub search: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            search: None,
        }
    }
}

impl ListQuery {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page,
            limit,
            search: None,
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Clamps paging into range and drops a blank search term.
    pub fn normalize(&self, default_limit: u64, max_limit: u64) -> Self {
        let limit = match self.limit {
            0 => default_limit,
            n => n.min(max_limit),
        };
        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Self {
            page: self.page.max(1),
            limit: limit.max(1),
            search,
        }
    }

    /// Parameters folded into a listing cache key, in a fixed order.
    pub fn cache_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
            ("search", self.search.clone().unwrap_or_default()),
        ]
    }

    /// `LIKE` pattern for the search term, if any.
    pub fn like_pattern(&self) -> Option<String> {
        self.search.as_ref().map(|s| format!("%{}%", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            (total + limit - 1) / limit
        };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

/// Runs an ordered select as one page of a listing.
pub async fn fetch_page<E, C>(
    db: &C,
    select: Select<E>,
    query: &ListQuery,
) -> Result<Paginated<E::Model>, ServiceError>
where
    E: EntityTrait,
    E::Model: FromQueryResult + Send + Sync,
    C: ConnectionTrait,
{
    let paginator = select.paginate(db, query.limit);

    let total = paginator.num_items().await.map_err(|e| {
        error!(error = %e, "Database error when counting rows");
        ServiceError::db_error(e)
    })?;

    let items = paginator.fetch_page(query.page - 1).await.map_err(|e| {
        error!(page = %query.page, limit = %query.limit, error = %e, "Database error when fetching page");
        ServiceError::db_error(e)
    })?;

    Ok(Paginated::new(items, total, query.page, query.limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ListQuery::new(0, 0), 1, 10)]
    #[case(ListQuery::new(3, 500), 3, 100)]
    #[case(ListQuery::new(2, 25), 2, 25)]
    fn normalize_clamps_paging(#[case] input: ListQuery, #[case] page: u64, #[case] limit: u64) {
        let normalized = input.normalize(DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
        assert_eq!((normalized.page, normalized.limit), (page, limit));
    }

    #[test]
    fn blank_search_is_dropped() {
        let q = ListQuery::default().with_search("   ").normalize(10, 100);
        assert_eq!(q.search, None);

        let q = ListQuery::default().with_search(" rice ").normalize(10, 100);
        assert_eq!(q.like_pattern().as_deref(), Some("%rice%"));
    }

    #[test]
    fn total_pages_rounds_up() {
        let page: Paginated<u8> = Paginated::new(vec![], 21, 1, 10);
        assert_eq!(page.total_pages, 3);
    }
}
