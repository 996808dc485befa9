// Test result accumulation and filtered retrieval
// One lock guards the whole list so a running replay appending results never
// races with a reader computing aggregates or exporting a snapshot.

use crate::models::{TestResult, Verdict};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

/// Field-wise result filter; `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ResultFilter {
    pub method: Option<String>,
    pub role: Option<String>,
    pub status: Option<u16>,
    pub verdict: Option<Verdict>,
}

impl ResultFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = Some(method.to_string());
        self
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = Some(verdict);
        self
    }

    pub fn matches(&self, result: &TestResult) -> bool {
        if let Some(method) = &self.method {
            if !result.method.eq_ignore_ascii_case(method) {
                return false;
            }
        }
        if let Some(role) = &self.role {
            if &result.role != role {
                return false;
            }
        }
        if let Some(status) = self.status {
            if result.status != status {
                return false;
            }
        }
        if let Some(verdict) = self.verdict {
            if result.verdict != verdict {
                return false;
            }
        }
        true
    }
}

/// Aggregate verdict counts over a set of results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerdictCounts {
    pub total: usize,
    pub vulnerable: usize,
    pub safe: usize,
    pub suspicious: usize,
    pub error: usize,
}

impl VerdictCounts {
    pub fn tally<'a>(results: impl IntoIterator<Item = &'a TestResult>) -> Self {
        let mut counts = Self::default();
        for result in results {
            counts.total += 1;
            match result.verdict {
                Verdict::Vulnerable => counts.vulnerable += 1,
                Verdict::Safe => counts.safe += 1,
                Verdict::Suspicious => counts.suspicious += 1,
                Verdict::Error => counts.error += 1,
            }
        }
        counts
    }
}

/// Thread-safe accumulation of test results in production order.
#[derive(Debug, Default)]
pub struct ResultStore {
    inner: Mutex<Vec<TestResult>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TestResult>> {
        self.inner.lock().unwrap_or_else(|err| err.into_inner())
    }

    pub fn append(&self, result: TestResult) {
        self.lock().push(result);
    }

    /// Drop all results, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut results = self.lock();
        let count = results.len();
        results.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Ordered copy of every stored result.
    pub fn all(&self) -> Vec<TestResult> {
        self.lock().clone()
    }

    /// Ordered copy of the results matching `filter`. Stored results are
    /// never mutated.
    pub fn filtered(&self, filter: &ResultFilter) -> Vec<TestResult> {
        self.lock()
            .iter()
            .filter(|result| filter.matches(result))
            .cloned()
            .collect()
    }

    pub fn aggregate_counts(&self) -> VerdictCounts {
        VerdictCounts::tally(self.lock().iter())
    }

    pub fn counts_for(&self, filter: &ResultFilter) -> VerdictCounts {
        VerdictCounts::tally(self.lock().iter().filter(|result| filter.matches(result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HttpService;

    fn result(method: &str, role: &str, status: u16, verdict: Verdict) -> TestResult {
        TestResult {
            endpoint: format!("https://app/{}", method.to_lowercase()),
            method: method.to_string(),
            role: role.to_string(),
            status,
            verdict,
            details: String::new(),
            request_bytes: None,
            response_bytes: None,
            service: HttpService::default(),
        }
    }

    fn seeded() -> ResultStore {
        let store = ResultStore::new();
        store.append(result("GET", "Guest", 200, Verdict::Vulnerable));
        store.append(result("POST", "Guest", 403, Verdict::Safe));
        store.append(result("GET", "User", 302, Verdict::Suspicious));
        store.append(result("GET", "User", 0, Verdict::Error));
        store
    }

    #[test]
    fn aggregates_cover_every_verdict() {
        let counts = seeded().aggregate_counts();
        assert_eq!(counts.total, 4);
        assert_eq!(counts.vulnerable, 1);
        assert_eq!(counts.safe, 1);
        assert_eq!(counts.suspicious, 1);
        assert_eq!(counts.error, 1);
    }

    #[test]
    fn filter_is_conjunctive_and_preserves_order() {
        let store = seeded();
        let filter = ResultFilter::any().with_role("User").with_method("get");
        let hits = store.filtered(&filter);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].verdict, Verdict::Suspicious);
        assert_eq!(hits[1].verdict, Verdict::Error);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn filtered_counts_match_filtered_view() {
        let store = seeded();
        let filter = ResultFilter::any().with_verdict(Verdict::Vulnerable);
        let counts = store.counts_for(&filter);
        assert_eq!(counts.total, store.filtered(&filter).len());
        assert_eq!(counts.vulnerable, 1);
        assert_eq!(counts.safe, 0);
    }

    #[test]
    fn clear_reports_removed_count() {
        let store = seeded();
        assert_eq!(store.clear(), 4);
        assert!(store.is_empty());
        assert_eq!(store.aggregate_counts(), VerdictCounts::default());
    }
}
