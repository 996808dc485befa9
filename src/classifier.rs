// Verdict heuristics for replayed responses
// Known limitation: redirect-target matching and status-code buckets are
// heuristics tuned to common conventions. Applications with nonstandard
// login paths can be misclassified; the markers are data so callers can
// supply their own.

use crate::models::Verdict;

/// Redirect targets containing any of these are treated as login walls.
pub const LOGIN_MARKERS: &[&str] = &[
    "/login",
    "/signin",
    "/auth",
    "/authenticate",
    "login?",
    "signin?",
];

const REDIRECT_DETAIL_LIMIT: usize = 100;

/// Map a replay outcome onto a verdict and a human-readable detail.
/// Pure function; transport failures never reach it (they are recorded as
/// ERROR by the replay engine before classification).
pub fn classify(status: u16, headers: &[String]) -> (Verdict, String) {
    classify_with_markers(status, headers, LOGIN_MARKERS)
}

/// Same as [`classify`] but with caller-supplied login markers.
pub fn classify_with_markers(
    status: u16,
    headers: &[String],
    login_markers: &[&str],
) -> (Verdict, String) {
    match status {
        301 | 302 | 303 | 307 | 308 => {
            let location = redirect_location(headers).unwrap_or_default();
            if login_markers.iter().any(|marker| location.contains(marker)) {
                (
                    Verdict::Safe,
                    "Redirect to login - access properly blocked".to_string(),
                )
            } else {
                let shown: String = location.chars().take(REDIRECT_DETAIL_LIMIT).collect();
                (
                    Verdict::Suspicious,
                    format!("Redirect to: {} - manual review recommended", shown),
                )
            }
        }
        200 | 201 | 204 => (
            Verdict::Vulnerable,
            format!(
                "Lower privilege role accessed restricted resource (Status: {})",
                status
            ),
        ),
        401 | 403 | 405 => (
            Verdict::Safe,
            format!("Access properly blocked (Status: {})", status),
        ),
        status if status >= 400 => (
            Verdict::Suspicious,
            format!("Unexpected status: {} - review manually", status),
        ),
        _ => (Verdict::Safe, "Access blocked".to_string()),
    }
}

/// Lower-cased `Location` header value, if present.
fn redirect_location(headers: &[String]) -> Option<String> {
    headers.iter().find_map(|header| {
        let lower = header.to_ascii_lowercase();
        lower
            .strip_prefix("location:")
            .map(|value| value.trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn success_statuses_are_vulnerable() {
        for status in [200, 201, 204] {
            let (verdict, _) = classify(status, &[]);
            assert_eq!(verdict, Verdict::Vulnerable, "status {}", status);
        }
    }

    #[test]
    fn blocked_statuses_are_safe() {
        for status in [401, 403, 405] {
            let (verdict, detail) = classify(status, &[]);
            assert_eq!(verdict, Verdict::Safe, "status {}", status);
            assert!(detail.contains(&status.to_string()));
        }
    }

    #[test]
    fn redirect_to_login_is_safe() {
        let (verdict, _) = classify(
            302,
            &headers(&["Location: /login?next=/admin", "Server: nginx"]),
        );
        assert_eq!(verdict, Verdict::Safe);
    }

    #[test]
    fn redirect_elsewhere_is_suspicious_with_target_in_detail() {
        let (verdict, detail) = classify(302, &headers(&["Location: /admin/dashboard"]));
        assert_eq!(verdict, Verdict::Suspicious);
        assert!(detail.contains("/admin/dashboard"));
    }

    #[test]
    fn redirect_detail_is_truncated() {
        let long = format!("Location: /{}", "a".repeat(300));
        let (verdict, detail) = classify(301, &headers(&[&long]));
        assert_eq!(verdict, Verdict::Suspicious);
        let shown = detail
            .strip_prefix("Redirect to: ")
            .and_then(|rest| rest.strip_suffix(" - manual review recommended"))
            .unwrap();
        assert_eq!(shown.chars().count(), 100);
    }

    #[test]
    fn redirect_matching_is_case_insensitive() {
        let (verdict, _) = classify(303, &headers(&["LOCATION: /Login"]));
        assert_eq!(verdict, Verdict::Safe);
    }

    #[test]
    fn other_client_errors_are_suspicious() {
        for status in [400, 404, 418, 500, 503] {
            let (verdict, _) = classify(status, &[]);
            assert_eq!(verdict, Verdict::Suspicious, "status {}", status);
        }
    }

    #[test]
    fn classifier_is_total_over_status_range() {
        for status in 100..=599 {
            let (verdict, detail) = classify(status, &headers(&["Location: /elsewhere"]));
            assert_ne!(verdict, Verdict::Error, "status {}", status);
            assert!(!detail.is_empty());
        }
    }

    #[test]
    fn custom_markers_override_defaults() {
        let (verdict, _) = classify_with_markers(
            302,
            &headers(&["Location: /sso/start"]),
            &["/sso/"],
        );
        assert_eq!(verdict, Verdict::Safe);
    }
}
