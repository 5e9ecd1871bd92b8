//! Query API for stored call logs
//!
//! Turns an `(endpoint, day, page)` filter into a page of events, most
//! recent first.

use super::database::{LogStore, StoreError};
use super::event::{Day, LogEvent};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::sync::Arc;
use thiserror::Error;

/// Number of events per page
pub const PAGE_SIZE: usize = 18;

/// One page of matching events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogResponse {
    pub page_count: usize,
    pub logs: Vec<LogEvent>,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{0:?} is not a calendar day")]
    InvalidDay(Day),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Read side of the log store
#[derive(Clone)]
pub struct QueryService {
    store: Arc<LogStore>,
}

impl QueryService {
    pub fn new(store: Arc<LogStore>) -> Self {
        Self { store }
    }

    /// Endpoint names that have at least one stored event
    pub async fn list_endpoints(&self) -> Result<Vec<String>, StoreError> {
        self.store.distinct_names().await
    }

    /// Page `page` (zero-based) of `endpoint`'s events that started on `day`
    ///
    /// # Example
    ///
    /// ```ignore
    /// let response = queries.query("amar", Day::new(2023, 2, 18), 0).await?;
    /// println!("{} pages", response.page_count);
    /// ```
    pub async fn query(&self, endpoint: &str, day: Day, page: usize) -> Result<LogResponse, QueryError> {
        let (from_ms, to_ms) = day.bounds_millis().ok_or(QueryError::InvalidDay(day))?;

        let events = self.store.find(endpoint, from_ms, to_ms).await?;

        tracing::debug!(
            endpoint = %endpoint,
            from_ms = from_ms,
            to_ms = to_ms,
            matches = events.len(),
            page = page,
            "Queried call logs"
        );

        Ok(paginate(events, page))
    }
}

/// Sort newest first and cut out one page
///
/// The sort is stable, so events with equal start times keep the order the
/// store returned them in. Pages past the end are empty.
pub fn paginate(mut events: Vec<LogEvent>, page: usize) -> LogResponse {
    events.sort_by_key(|event| Reverse(event.start_time));

    let page_count = events.len().div_ceil(PAGE_SIZE);
    let logs = events
        .into_iter()
        .skip(page.saturating_mul(PAGE_SIZE))
        .take(PAGE_SIZE)
        .collect();

    LogResponse { page_count, logs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::event::LogLine;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn event_at(name: &str, start: DateTime<Utc>, marker: usize) -> LogEvent {
        LogEvent {
            name: name.to_string(),
            start_time: start,
            end_time: start,
            logs: vec![LogLine::Detail {
                key: "Marker".to_string(),
                value: marker.to_string(),
            }],
        }
    }

    fn marker(event: &LogEvent) -> String {
        match &event.logs[0] {
            LogLine::Detail { value, .. } => value.clone(),
            other => panic!("Expected detail, got {:?}", other),
        }
    }

    fn day_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 2, 18, 0, 0, 0).unwrap()
    }

    async fn service_with(events: &[LogEvent]) -> QueryService {
        let store = Arc::new(LogStore::in_memory().await.unwrap());
        for event in events {
            store.put(event).await.unwrap();
        }
        QueryService::new(store)
    }

    #[test]
    fn test_paginate_counts_pages() {
        let events = |n: usize| -> Vec<LogEvent> {
            (0..n)
                .map(|i| event_at("amar", day_start() + Duration::seconds(i as i64), i))
                .collect()
        };

        assert_eq!(paginate(events(0), 0).page_count, 0);
        assert_eq!(paginate(events(1), 0).page_count, 1);
        assert_eq!(paginate(events(18), 0).page_count, 1);
        assert_eq!(paginate(events(19), 0).page_count, 2);
        assert_eq!(paginate(events(36), 0).page_count, 2);
        assert_eq!(paginate(events(37), 0).page_count, 3);
    }

    #[test]
    fn test_pages_concatenate_to_full_descending_set() {
        let total = 41;
        let events: Vec<LogEvent> = (0..total)
            .map(|i| event_at("amar", day_start() + Duration::minutes(((i * 7) % total) as i64), i))
            .collect();

        let page_count = paginate(events.clone(), 0).page_count;
        assert_eq!(page_count, 3);

        let mut all = Vec::new();
        for page in 0..page_count {
            all.extend(paginate(events.clone(), page).logs);
        }

        assert_eq!(all.len(), total);
        assert!(all.windows(2).all(|w| w[0].start_time >= w[1].start_time));

        let mut markers: Vec<String> = all.iter().map(marker).collect();
        markers.sort();
        markers.dedup();
        assert_eq!(markers.len(), total);
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let events = vec![event_at("amar", day_start(), 0)];

        let response = paginate(events.clone(), 1);
        assert_eq!(response.page_count, 1);
        assert!(response.logs.is_empty());

        assert!(paginate(events, usize::MAX).logs.is_empty());
    }

    #[test]
    fn test_equal_start_times_keep_store_order() {
        let events: Vec<LogEvent> = (0..3).map(|i| event_at("amar", day_start(), i)).collect();

        let markers: Vec<String> = paginate(events, 0).logs.iter().map(marker).collect();
        assert_eq!(markers, vec!["0", "1", "2"]);
    }

    #[tokio::test]
    async fn test_query_returns_most_recent_first_page() {
        let events: Vec<LogEvent> = (0..20)
            .map(|i| event_at("amar", day_start() + Duration::hours(1) + Duration::seconds(i as i64), i))
            .collect();
        let service = service_with(&events).await;

        let response = service.query("amar", Day::new(2023, 2, 18), 0).await.unwrap();

        assert_eq!(response.page_count, 2);
        assert_eq!(response.logs.len(), 18);
        assert_eq!(marker(&response.logs[0]), "19");
        assert_eq!(marker(&response.logs[17]), "2");

        let second = service.query("amar", Day::new(2023, 2, 18), 1).await.unwrap();
        let markers: Vec<String> = second.logs.iter().map(marker).collect();
        assert_eq!(markers, vec!["1", "0"]);
    }

    #[tokio::test]
    async fn test_query_day_boundaries() {
        let next_day = day_start() + Duration::days(1);
        let events = vec![
            event_at("amar", day_start(), 0),
            event_at("amar", next_day - Duration::milliseconds(1), 1),
            event_at("amar", next_day, 2),
            event_at("amar", day_start() - Duration::milliseconds(1), 3),
        ];
        let service = service_with(&events).await;

        let response = service.query("amar", Day::new(2023, 2, 18), 0).await.unwrap();
        let markers: Vec<String> = response.logs.iter().map(marker).collect();
        assert_eq!(markers, vec!["1", "0"]);
    }

    #[tokio::test]
    async fn test_query_filters_by_endpoint() {
        let events = vec![
            event_at("amar", day_start(), 0),
            event_at("other", day_start(), 1),
        ];
        let service = service_with(&events).await;

        let response = service.query("other", Day::new(2023, 2, 18), 0).await.unwrap();
        assert_eq!(response.logs.len(), 1);
        assert_eq!(response.logs[0].name, "other");

        let endpoints = service.list_endpoints().await.unwrap();
        assert_eq!(endpoints, vec!["amar", "other"]);
    }

    #[tokio::test]
    async fn test_query_rejects_impossible_day() {
        let service = service_with(&[]).await;

        let result = service.query("amar", Day::new(2023, 2, 30), 0).await;
        assert!(matches!(result, Err(QueryError::InvalidDay(_))));
    }

    #[tokio::test]
    async fn test_query_without_matches() {
        let service = service_with(&[]).await;

        let response = service.query("amar", Day::new(2023, 2, 18), 0).await.unwrap();
        assert_eq!(response.page_count, 0);
        assert!(response.logs.is_empty());
    }
}
