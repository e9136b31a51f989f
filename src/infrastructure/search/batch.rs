// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::models::aggregation::AggregationResult;
use crate::domain::models::query::Query;
use crate::domain::search::errors::AggregateError;
use crate::domain::search::provider::SearchOptions;
use crate::infrastructure::search::dispatcher::Dispatcher;

/// 批量模式中的一条查询
#[derive(Debug, Clone, Default)]
pub struct BatchQuery {
    pub text: String,
    pub sources: Vec<String>,
    pub options: SearchOptions,
}

impl BatchQuery {
    pub fn new<I, S>(text: impl Into<String>, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            text: text.into(),
            sources: sources.into_iter().map(Into::into).collect(),
            options: SearchOptions::default(),
        }
    }
}

/// 单条查询的执行结果
#[derive(Debug)]
pub struct BatchItem {
    pub index: usize,
    pub text: String,
    pub result: Result<AggregationResult, AggregateError>,
}

/// 批量执行统计
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchMetrics {
    pub total: usize,
    pub succeeded: usize,
    pub with_data: usize,
    pub failed: usize,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// 批量执行报告，条目顺序与输入顺序一致
#[derive(Debug)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub items: Vec<BatchItem>,
    pub metrics: BatchMetrics,
}

/// 批量查询执行器
///
/// 同时进行的查询数由信号量限制为 `max_workers`，多出的查询排队等待空位。
/// 查询之间没有顺序保证。
pub struct BatchRunner {
    dispatcher: Arc<Dispatcher>,
    semaphore: Arc<Semaphore>,
    max_workers: usize,
}

impl BatchRunner {
    pub fn new(dispatcher: Arc<Dispatcher>, max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            dispatcher,
            semaphore: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// 执行一批查询
    pub async fn run(&self, queries: Vec<BatchQuery>, cancel: CancellationToken) -> BatchReport {
        let batch_id = Uuid::new_v4();
        let started = Instant::now();
        info!(
            "Batch {} started: {} queries, {} workers",
            batch_id,
            queries.len(),
            self.max_workers
        );

        let texts: Vec<String> = queries.iter().map(|q| q.text.clone()).collect();
        let handles: Vec<_> = queries
            .into_iter()
            .map(|batch_query| {
                let dispatcher = self.dispatcher.clone();
                let semaphore = self.semaphore.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    let _permit = tokio::select! {
                        _ = cancel.cancelled() => return Err(AggregateError::Cancelled),
                        permit = semaphore.acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => return Err(AggregateError::Cancelled),
                        },
                    };
                    let query = Query::new(batch_query.text, batch_query.sources);
                    dispatcher.dispatch(query, batch_query.options, cancel).await
                })
            })
            .collect();

        let items: Vec<BatchItem> = join_all(handles)
            .await
            .into_iter()
            .zip(texts)
            .enumerate()
            .map(|(index, (joined, text))| {
                let result = joined.unwrap_or_else(|e| {
                    error!("Batch {} query {} task failed: {}", batch_id, index, e);
                    Err(AggregateError::Cancelled)
                });
                BatchItem {
                    index,
                    text,
                    result,
                }
            })
            .collect();

        let succeeded = items.iter().filter(|i| i.result.is_ok()).count();
        let with_data = items
            .iter()
            .filter(|i| matches!(&i.result, Ok(r) if r.has_data))
            .count();
        let metrics = BatchMetrics {
            total: items.len(),
            succeeded,
            with_data,
            failed: items.len() - succeeded,
            elapsed: Duration::from_millis(started.elapsed().as_millis() as u64),
        };
        info!(
            "Batch {} finished: {}/{} succeeded in {:?}",
            batch_id, metrics.succeeded, metrics.total, metrics.elapsed
        );

        BatchReport {
            batch_id,
            items,
            metrics,
        }
    }
}
