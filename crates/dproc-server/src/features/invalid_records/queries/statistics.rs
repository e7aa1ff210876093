//! Invalid record statistics query

use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::store::{SharedStore, Statistics, StoreError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticsQuery;

#[derive(Debug, thiserror::Error)]
pub enum StatisticsError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl Request<Result<Statistics, StatisticsError>> for StatisticsQuery {}

#[tracing::instrument(skip(store, _query))]
pub async fn handle(store: SharedStore, _query: StatisticsQuery) -> Result<Statistics, StatisticsError> {
    Ok(store.statistics().await?)
}
