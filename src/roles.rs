// Role registry and capture-session state
// One coarse lock guards the whole registry: capture-time appends,
// configuration, and reads are each atomic, and replay works from an
// immutable snapshot so concurrent capture never affects a running matrix.

use crate::dedup;
use crate::errors::MatrixError;
use crate::exclusions::ExclusionPolicy;
use crate::models::{CapturedRequest, HttpService, ObservedRequest};
use crate::normalizer::{is_cookie_header, is_credential_header};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// One captured identity: its request corpus plus aggregated credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    /// Captured requests in first-seen order.
    pub requests: Vec<CapturedRequest>,
    /// Distinct cookie header values, first-seen order.
    pub cookies: Vec<String>,
    /// Distinct credential header values, first-seen order.
    pub auth_headers: Vec<String>,
}

impl Role {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// Read-only per-role counts for surrounding surfaces (tables, CLI output).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSummary {
    pub name: String,
    pub requests: usize,
    pub cookies: usize,
    pub auth_headers: usize,
    pub is_baseline: bool,
}

/// Immutable, consistent copy of the registry taken at replay start.
#[derive(Debug, Clone)]
pub struct RoleSnapshot {
    pub roles: Vec<Role>,
    pub baseline: Option<String>,
}

impl RoleSnapshot {
    pub fn baseline_role(&self) -> Option<&Role> {
        let name = self.baseline.as_deref()?;
        self.roles.iter().find(|role| role.name == name)
    }

    /// Every non-baseline role, in registry order.
    pub fn other_roles(&self) -> Vec<&Role> {
        self.roles
            .iter()
            .filter(|role| Some(role.name.as_str()) != self.baseline.as_deref())
            .collect()
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    /// Registry order is creation order.
    roles: Vec<Role>,
    baseline: Option<String>,
    /// Role currently being captured, if any.
    capturing: Option<String>,
    /// Fingerprints seen during the active capture session.
    session_fingerprints: HashSet<String>,
    policy: ExclusionPolicy,
}

impl StoreInner {
    fn role_mut(&mut self, name: &str) -> Option<&mut Role> {
        self.roles.iter_mut().find(|role| role.name == name)
    }

    fn contains(&self, name: &str) -> bool {
        self.roles.iter().any(|role| role.name == name)
    }
}

/// Thread-safe role registry. Every public operation acquires the store lock
/// internally, so callers never observe a partially-updated role.
#[derive(Debug, Default)]
pub struct RoleStore {
    inner: Mutex<StoreInner>,
}

impl RoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // A poisoned lock only means a panic elsewhere; the data is still
        // consistent because every mutation completes under the guard.
        self.inner.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Start a capture session for a new role. The per-session fingerprint
    /// set resets; an existing name is rejected without touching state.
    pub fn begin_capture(&self, name: &str) -> Result<(), MatrixError> {
        let mut inner = self.lock();
        if inner.contains(name) {
            return Err(MatrixError::DuplicateRole(name.to_string()));
        }
        inner.roles.push(Role::new(name));
        inner.capturing = Some(name.to_string());
        inner.session_fingerprints.clear();
        info!(role = name, "capture session started");
        Ok(())
    }

    /// Stop the active capture session, returning the role's final request
    /// count. Returns 0 when no session was active.
    pub fn end_capture(&self) -> usize {
        let mut inner = self.lock();
        let Some(name) = inner.capturing.take() else {
            return 0;
        };
        inner.session_fingerprints.clear();
        let count = inner
            .roles
            .iter()
            .find(|role| role.name == name)
            .map(|role| role.requests.len())
            .unwrap_or(0);
        info!(role = %name, requests = count, "capture session stopped");
        count
    }

    pub fn capturing_role(&self) -> Option<String> {
        self.lock().capturing.clone()
    }

    /// Entry point for the traffic interception collaborator. Safe to call
    /// concurrently from multiple connections; a no-op while no capture
    /// session is active or when the URL is excluded or already seen.
    pub fn observe(&self, request: ObservedRequest) {
        let mut inner = self.lock();
        let Some(active) = inner.capturing.clone() else {
            return;
        };

        if inner.policy.should_ignore(&request.url) {
            debug!(url = %request.url, "excluded from capture");
            return;
        }

        match dedup::fingerprint(&request.method, &request.url, &request.body) {
            Some(token) => {
                if !inner.session_fingerprints.insert(token) {
                    debug!(method = %request.method, url = %request.url, "duplicate dropped");
                    return;
                }
            }
            // No fingerprint available: store unconditionally rather than
            // lose the request or fail the capture.
            None => warn!(url = %request.url, "fingerprint unavailable, storing without dedup"),
        }

        let cookies: Vec<String> = request
            .headers
            .iter()
            .filter(|line| is_cookie_header(line))
            .cloned()
            .collect();
        let auth_headers: Vec<String> = request
            .headers
            .iter()
            .filter(|line| !is_cookie_header(line) && is_credential_header(line))
            .cloned()
            .collect();

        let service = if request.host.is_empty() {
            HttpService::default()
        } else {
            HttpService::new(&request.host, request.port, request.protocol)
        };

        let captured = CapturedRequest {
            method: request.method,
            url: request.url,
            headers: request.headers,
            cookies: cookies.clone(),
            auth_headers: auth_headers.clone(),
            body: request.body,
            service,
        };

        let Some(role) = inner.role_mut(&active) else {
            return;
        };
        role.requests.push(captured);
        for cookie in cookies {
            if !role.cookies.contains(&cookie) {
                role.cookies.push(cookie);
            }
        }
        for header in auth_headers {
            if !role.auth_headers.contains(&header) {
                role.auth_headers.push(header);
            }
        }
        debug!(role = %active, total = role.requests.len(), "request stored");
    }

    /// Insert a fully-formed role, e.g. from a restored session document.
    pub fn insert_role(&self, role: Role) -> Result<(), MatrixError> {
        let mut inner = self.lock();
        if inner.contains(&role.name) {
            return Err(MatrixError::DuplicateRole(role.name));
        }
        inner.roles.push(role);
        Ok(())
    }

    pub fn set_baseline(&self, name: &str) -> Result<(), MatrixError> {
        let mut inner = self.lock();
        if !inner.contains(name) {
            return Err(MatrixError::UnknownRole(name.to_string()));
        }
        inner.baseline = Some(name.to_string());
        info!(role = name, "baseline set");
        Ok(())
    }

    pub fn baseline(&self) -> Option<String> {
        self.lock().baseline.clone()
    }

    /// Remove a role. The current baseline is protected.
    pub fn delete_role(&self, name: &str) -> Result<(), MatrixError> {
        let mut inner = self.lock();
        if inner.baseline.as_deref() == Some(name) {
            return Err(MatrixError::BaselineProtected(name.to_string()));
        }
        let position = inner
            .roles
            .iter()
            .position(|role| role.name == name)
            .ok_or_else(|| MatrixError::UnknownRole(name.to_string()))?;
        inner.roles.remove(position);
        if inner.capturing.as_deref() == Some(name) {
            inner.capturing = None;
        }
        info!(role = name, "role deleted");
        Ok(())
    }

    pub fn role_names(&self) -> Vec<String> {
        self.lock().roles.iter().map(|r| r.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().roles.is_empty()
    }

    pub fn summaries(&self) -> Vec<RoleSummary> {
        let inner = self.lock();
        inner
            .roles
            .iter()
            .map(|role| RoleSummary {
                name: role.name.clone(),
                requests: role.requests.len(),
                cookies: role.cookies.len(),
                auth_headers: role.auth_headers.len(),
                is_baseline: inner.baseline.as_deref() == Some(role.name.as_str()),
            })
            .collect()
    }

    /// Consistent copy of all roles for a replay pass.
    pub fn snapshot(&self) -> RoleSnapshot {
        let inner = self.lock();
        RoleSnapshot {
            roles: inner.roles.clone(),
            baseline: inner.baseline.clone(),
        }
    }

    // Capture-policy configuration. Each call is atomic like any other
    // store operation.

    pub fn set_exclude_static(&self, enabled: bool) {
        self.lock().policy.set_exclude_static(enabled);
    }

    pub fn set_static_extensions(&self, extensions: Vec<String>) {
        self.lock().policy.set_extensions(extensions);
    }

    pub fn add_exclusion_pattern(&self, pattern: &str) -> Result<(), MatrixError> {
        self.lock().policy.add_pattern(pattern)
    }

    pub fn clear_exclusion_patterns(&self) {
        self.lock().policy.clear_patterns();
    }

    pub fn exclusion_patterns(&self) -> Vec<String> {
        self.lock().policy.patterns()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Protocol;

    fn observed(method: &str, url: &str, headers: Vec<&str>, body: &[u8]) -> ObservedRequest {
        ObservedRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: headers.into_iter().map(String::from).collect(),
            body: body.to_vec(),
            host: "app".to_string(),
            port: 443,
            protocol: Protocol::Https,
        }
    }

    #[test]
    fn duplicate_role_name_is_rejected() {
        let store = RoleStore::new();
        store.begin_capture("Admin").unwrap();
        store.end_capture();
        let err = store.begin_capture("Admin").unwrap_err();
        assert!(matches!(err, MatrixError::DuplicateRole(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn observe_outside_session_is_dropped() {
        let store = RoleStore::new();
        store.observe(observed("GET", "https://app/api", vec![], b""));
        assert!(store.is_empty());
    }

    #[test]
    fn session_deduplicates_on_method_path_body() {
        let store = RoleStore::new();
        store.begin_capture("Admin").unwrap();
        store.observe(observed("GET", "https://app/api/users?page=1", vec![], b""));
        store.observe(observed("GET", "https://app/api/users?page=2", vec![], b""));
        store.observe(observed("POST", "https://app/api/users", vec![], b""));
        assert_eq!(store.end_capture(), 2);
    }

    #[test]
    fn fingerprint_set_resets_between_sessions() {
        let store = RoleStore::new();
        store.begin_capture("Admin").unwrap();
        store.observe(observed("GET", "https://app/api/users", vec![], b""));
        store.end_capture();

        store.begin_capture("Guest").unwrap();
        store.observe(observed("GET", "https://app/api/users", vec![], b""));
        assert_eq!(store.end_capture(), 1);
    }

    #[test]
    fn credential_aggregates_have_set_semantics() {
        let store = RoleStore::new();
        store.begin_capture("Admin").unwrap();
        for path in ["/a", "/b", "/c"] {
            store.observe(observed(
                "GET",
                &format!("https://app{}", path),
                vec!["Cookie: session=abc", "Authorization: Bearer tok"],
                b"",
            ));
        }
        store.end_capture();

        let snapshot = store.snapshot();
        let role = &snapshot.roles[0];
        assert_eq!(role.requests.len(), 3);
        assert_eq!(role.cookies, vec!["Cookie: session=abc".to_string()]);
        assert_eq!(role.auth_headers, vec!["Authorization: Bearer tok".to_string()]);
    }

    #[test]
    fn static_assets_are_not_captured() {
        let store = RoleStore::new();
        store.begin_capture("Admin").unwrap();
        store.observe(observed("GET", "https://app/bundle.js", vec![], b""));
        store.observe(observed("GET", "https://app/api/data", vec![], b""));
        assert_eq!(store.end_capture(), 1);
    }

    #[test]
    fn exclusion_pattern_applies_to_full_url() {
        let store = RoleStore::new();
        store.add_exclusion_pattern(r"/telemetry/").unwrap();
        store.begin_capture("Admin").unwrap();
        store.observe(observed("POST", "https://app/Telemetry/beat", vec![], b""));
        store.observe(observed("POST", "https://app/api/data", vec![], b""));
        assert_eq!(store.end_capture(), 1);
    }

    #[test]
    fn baseline_must_exist_and_protects_deletion() {
        let store = RoleStore::new();
        assert!(matches!(
            store.set_baseline("Nobody"),
            Err(MatrixError::UnknownRole(_))
        ));

        store.begin_capture("Admin").unwrap();
        store.end_capture();
        store.set_baseline("Admin").unwrap();
        assert_eq!(store.baseline().as_deref(), Some("Admin"));

        assert!(matches!(
            store.delete_role("Admin"),
            Err(MatrixError::BaselineProtected(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn non_baseline_role_deletion_succeeds() {
        let store = RoleStore::new();
        store.begin_capture("Admin").unwrap();
        store.end_capture();
        store.begin_capture("Guest").unwrap();
        store.end_capture();
        store.set_baseline("Admin").unwrap();

        store.delete_role("Guest").unwrap();
        assert_eq!(store.role_names(), vec!["Admin".to_string()]);
        assert!(matches!(
            store.delete_role("Guest"),
            Err(MatrixError::UnknownRole(_))
        ));
    }

    #[test]
    fn snapshot_is_isolated_from_later_captures() {
        let store = RoleStore::new();
        store.begin_capture("Admin").unwrap();
        store.observe(observed("GET", "https://app/one", vec![], b""));
        let snapshot = store.snapshot();
        store.observe(observed("GET", "https://app/two", vec![], b""));
        store.end_capture();

        assert_eq!(snapshot.roles[0].requests.len(), 1);
        assert_eq!(store.snapshot().roles[0].requests.len(), 2);
    }

    #[test]
    fn snapshot_orders_other_roles_by_registry() {
        let store = RoleStore::new();
        for name in ["Admin", "Editor", "Guest"] {
            store.begin_capture(name).unwrap();
            store.end_capture();
        }
        store.set_baseline("Editor").unwrap();

        let snapshot = store.snapshot();
        let others: Vec<&str> = snapshot
            .other_roles()
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(others, vec!["Admin", "Guest"]);
        assert_eq!(snapshot.baseline_role().unwrap().name, "Editor");
    }
}
