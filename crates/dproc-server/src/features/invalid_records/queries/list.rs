//! List invalid records query
//!
//! Newest records first, filtered by data source, review state, the rule of
//! the first error, or free text.

use dproc_common::types::{InvalidRecord, ReviewState, RuleKind};
use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::api::response::PaginationMeta;
use crate::store::{RecordFilter, SharedStore, StoreError};

pub const DEFAULT_PER_PAGE: i64 = 25;
pub const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInvalidRecordsQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(default, alias = "per_page", skip_serializing_if = "Option::is_none")]
    pub per_page: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_id: Option<String>,
    #[serde(default, alias = "status", skip_serializing_if = "Option::is_none")]
    pub review_state: Option<ReviewState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<RuleKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInvalidRecordsResponse {
    pub items: Vec<InvalidRecord>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, thiserror::Error)]
pub enum ListInvalidRecordsError {
    #[error("Page must be greater than 0")]
    InvalidPage,
    #[error("Per page must be between 1 and {max}", max = MAX_PER_PAGE)]
    InvalidPerPage,
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl Request<Result<ListInvalidRecordsResponse, ListInvalidRecordsError>> for ListInvalidRecordsQuery {}

impl ListInvalidRecordsQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.per_page()
    }

    pub fn validate(&self) -> Result<(), ListInvalidRecordsError> {
        if self.page.is_some_and(|p| p < 1) {
            return Err(ListInvalidRecordsError::InvalidPage);
        }
        if self.per_page.is_some_and(|p| !(1..=MAX_PER_PAGE).contains(&p)) {
            return Err(ListInvalidRecordsError::InvalidPerPage);
        }
        Ok(())
    }

    fn filter(&self) -> RecordFilter {
        RecordFilter {
            data_source_id: self.data_source_id.clone().filter(|s| !s.is_empty()),
            review_state: self.review_state,
            error_type: self.error_type,
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
        }
    }
}

#[tracing::instrument(skip(store, query), fields(page = query.page(), per_page = query.per_page()))]
pub async fn handle(
    store: SharedStore,
    query: ListInvalidRecordsQuery,
) -> Result<ListInvalidRecordsResponse, ListInvalidRecordsError> {
    query.validate()?;

    let offset = usize::try_from(query.offset()).unwrap_or(0);
    let limit = usize::try_from(query.per_page()).unwrap_or(1);
    let page = store.list(&query.filter(), offset, limit).await?;
    let total = i64::try_from(page.total).unwrap_or(i64::MAX);

    Ok(ListInvalidRecordsResponse {
        items: page.items,
        pagination: PaginationMeta::new(query.page(), query.per_page(), total),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let query = ListInvalidRecordsQuery::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.per_page(), DEFAULT_PER_PAGE);
        assert_eq!(query.offset(), 0);

        let query = ListInvalidRecordsQuery {
            page: Some(3),
            per_page: Some(10),
            ..Default::default()
        };
        assert_eq!(query.offset(), 20);
    }

    #[test]
    fn test_validation() {
        let query = ListInvalidRecordsQuery {
            per_page: Some(101),
            ..Default::default()
        };
        assert!(matches!(query.validate(), Err(ListInvalidRecordsError::InvalidPerPage)));

        let query = ListInvalidRecordsQuery {
            page: Some(0),
            ..Default::default()
        };
        assert!(matches!(query.validate(), Err(ListInvalidRecordsError::InvalidPage)));
    }

    #[test]
    fn test_blank_filters_are_ignored() {
        let query = ListInvalidRecordsQuery {
            data_source_id: Some(String::new()),
            search: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(query.filter(), RecordFilter::default());
    }
}
