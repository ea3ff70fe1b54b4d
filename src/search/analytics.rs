use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use super::SearchMethod;

const TOP_QUERIES: usize = 10;

/// One completed search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRecord {
    pub query: String,
    pub timestamp: String,
    pub result_count: usize,
    pub query_time_ms: f64,
    pub method: SearchMethod,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryCount {
    pub query: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchStats {
    pub total_searches: usize,
    pub average_results: f64,
    pub average_query_time_ms: f64,
    pub cache_hit_rate: f64,
    pub top_queries: Vec<QueryCount>,
    pub method_distribution: BTreeMap<String, usize>,
}

/// Ring buffer of recent searches.
pub struct SearchAnalytics {
    capacity: usize,
    records: Mutex<VecDeque<SearchRecord>>,
}

impl SearchAnalytics {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, record: SearchRecord) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    pub fn stats(&self) -> SearchStats {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let total = records.len();
        if total == 0 {
            return SearchStats::default();
        }

        let mut frequency: HashMap<&str, usize> = HashMap::new();
        let mut method_distribution = BTreeMap::new();
        for r in records.iter() {
            *frequency.entry(r.query.as_str()).or_default() += 1;
            *method_distribution.entry(r.method.as_str().to_string()).or_default() += 1;
        }

        let mut top_queries: Vec<QueryCount> = frequency
            .into_iter()
            .map(|(query, count)| QueryCount {
                query: query.to_string(),
                count,
            })
            .collect();
        top_queries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.query.cmp(&b.query)));
        top_queries.truncate(TOP_QUERIES);

        let n = total as f64;
        SearchStats {
            total_searches: total,
            average_results: records.iter().map(|r| r.result_count as f64).sum::<f64>() / n,
            average_query_time_ms: records.iter().map(|r| r.query_time_ms).sum::<f64>() / n,
            cache_hit_rate: records.iter().filter(|r| r.cache_hit).count() as f64 / n,
            top_queries,
            method_distribution,
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(query: &str, results: usize, method: SearchMethod) -> SearchRecord {
        SearchRecord {
            query: query.into(),
            timestamp: crate::memory::now_timestamp(),
            result_count: results,
            query_time_ms: 2.0,
            method,
            cache_hit: false,
        }
    }

    #[test]
    fn ring_buffer_is_bounded() {
        let analytics = SearchAnalytics::new(3);
        for i in 0..5 {
            analytics.record(record(&format!("q{i}"), 1, SearchMethod::Keyword));
        }
        assert_eq!(analytics.len(), 3);
        let stats = analytics.stats();
        assert!(stats.top_queries.iter().all(|q| q.query != "q0" && q.query != "q1"));
    }

    #[test]
    fn stats_aggregate_counts_and_methods() {
        let analytics = SearchAnalytics::new(100);
        analytics.record(record("auth", 2, SearchMethod::Hybrid));
        analytics.record(record("auth", 4, SearchMethod::Hybrid));
        analytics.record(record("rust", 0, SearchMethod::Semantic));

        let stats = analytics.stats();
        assert_eq!(stats.total_searches, 3);
        assert!((stats.average_results - 2.0).abs() < 1e-9);
        assert_eq!(stats.top_queries[0], QueryCount { query: "auth".into(), count: 2 });
        assert_eq!(stats.method_distribution["hybrid"], 2);
        assert_eq!(stats.method_distribution["semantic"], 1);
        assert_eq!(stats.cache_hit_rate, 0.0);
    }

    #[test]
    fn empty_stats_are_zero() {
        let stats = SearchAnalytics::new(10).stats();
        assert_eq!(stats.total_searches, 0);
        assert!(stats.top_queries.is_empty());
    }
}
