// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::application::dto::search_request::UserId;
use crate::domain::models::aggregation::AggregationResult;
use crate::infrastructure::search::batch::{BatchMetrics, BatchQuery, BatchReport};

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct BatchQueryDto {
    #[validate(length(min = 1, max = 512, message = "Query cannot be empty"))]
    pub query: String,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub sources: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct BatchSearchRequestDto {
    #[validate(length(min = 1, max = 500), nested)]
    pub queries: Vec<BatchQueryDto>,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

impl BatchSearchRequestDto {
    pub fn into_queries(self) -> Vec<BatchQuery> {
        self.queries
            .into_iter()
            .map(|q| BatchQuery::new(q.query, q.sources))
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct BatchItemDto {
    pub index: usize,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AggregationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchSearchResponseDto {
    pub batch_id: Uuid,
    pub metrics: BatchMetrics,
    pub items: Vec<BatchItemDto>,
}

impl From<BatchReport> for BatchSearchResponseDto {
    fn from(report: BatchReport) -> Self {
        let items = report
            .items
            .into_iter()
            .map(|item| {
                let (result, error) = match item.result {
                    Ok(result) => (Some(result), None),
                    Err(e) => (None, Some(e.to_string())),
                };
                BatchItemDto {
                    index: item.index,
                    query: item.text,
                    result,
                    error,
                }
            })
            .collect();
        Self {
            batch_id: report.batch_id,
            metrics: report.metrics,
            items,
        }
    }
}
