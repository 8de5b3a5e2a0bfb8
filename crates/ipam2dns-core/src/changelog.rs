//! IPAM changelog rows
//!
//! Both change sources read rows of the phpIPAM `changelog` table: an action
//! verb, the address object's current hostname and IP (empty once the object
//! is gone), and the free-text `cdiff` column. [`ChangelogRow::into_event`]
//! turns one row into a [`ChangeEvent`], recovering missing fields from the
//! diff (`[hostname]: value\r`, `[ip_addr]: value\r`).
//!
//! Rows are skipped when the action is unknown, when no IPv4 address can be
//! found, or when an `add`/`edit` has no hostname. A `delete` without a
//! hostname is kept so its PTR record still gets removed.

use crate::traits::{ChangeAction, ChangeEvent};
use regex::Regex;
use std::net::Ipv4Addr;
use std::sync::LazyLock;
use tracing::{debug, warn};

static HOSTNAME_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[hostname\]. (.+)\r").expect("hostname pattern compiles"));

static IP_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[ip_addr\]. (.*?)\r").expect("ip pattern compiles"));

/// Hostname placeholder phpIPAM writes for an address without a name
const NO_HOSTNAME: &str = "/";

/// One changelog row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangelogRow {
    /// Changelog id (`cid`)
    pub cid: u64,
    /// Action verb (`caction`)
    pub action: String,
    /// Current hostname of the address object
    pub hostname: Option<String>,
    /// Current dotted-quad address of the address object
    pub ip: Option<String>,
    /// Free-text change description (`cdiff`)
    pub diff: Option<String>,
}

impl ChangelogRow {
    /// Convert to a change event, `None` when the row has to be skipped
    pub fn into_event(self) -> Option<ChangeEvent> {
        let Some(action) = ChangeAction::from_changelog(&self.action) else {
            debug!("Skipping change {} with action {:?}", self.cid, self.action);
            return None;
        };

        let diff = self.diff.as_deref().unwrap_or("");

        let ip_text = non_empty(self.ip).or_else(|| capture(&IP_FIELD, diff));
        let ip = match ip_text.as_deref().map(str::parse::<Ipv4Addr>) {
            Some(Ok(ip)) => ip,
            Some(Err(_)) => {
                warn!(
                    "Skipping change {}: {:?} is not an IPv4 address",
                    self.cid, ip_text
                );
                return None;
            }
            None => {
                warn!("Skipping change {}: no IP address", self.cid);
                return None;
            }
        };

        let hostname = non_empty(self.hostname)
            .or_else(|| capture(&HOSTNAME_FIELD, diff))
            .filter(|name| name != NO_HOSTNAME);

        let hostname = match (hostname, action) {
            (Some(name), _) => name,
            (None, ChangeAction::Delete) => String::new(),
            (None, ChangeAction::Ensure) => {
                warn!("Skipping change {} for {}: no hostname", self.cid, ip);
                return None;
            }
        };

        Some(ChangeEvent::new(self.cid, action, hostname, ip))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// First capture of `pattern` in `diff`, trimmed
fn capture(pattern: &Regex, diff: &str) -> Option<String> {
    let value = pattern.captures(diff)?.get(1)?.as_str().trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cid: u64, action: &str, hostname: Option<&str>, ip: Option<&str>) -> ChangelogRow {
        ChangelogRow {
            cid,
            action: action.to_string(),
            hostname: hostname.map(str::to_string),
            ip: ip.map(str::to_string),
            diff: None,
        }
    }

    #[test]
    fn test_diff_capture() {
        let diff = "[ip_addr]: 192.0.2.10\r\n[hostname]: web1.example.com\r\n[description]: x\r\n";
        assert_eq!(capture(&IP_FIELD, diff).as_deref(), Some("192.0.2.10"));
        assert_eq!(
            capture(&HOSTNAME_FIELD, diff).as_deref(),
            Some("web1.example.com")
        );
        assert_eq!(capture(&HOSTNAME_FIELD, "[mac]: aa:bb\r\n"), None);
    }

    #[test]
    fn test_diff_values_need_carriage_return() {
        assert_eq!(capture(&HOSTNAME_FIELD, "[hostname]: last.example.com"), None);
        assert_eq!(capture(&HOSTNAME_FIELD, "[hostname]: last.example.com\n"), None);
        assert_eq!(capture(&IP_FIELD, "[ip_addr]: \r\n"), None);
    }

    #[test]
    fn test_fields_recovered_from_diff() {
        let mut deleted = row(5, "delete", None, Some(""));
        deleted.diff = Some("[ip_addr]: 10.0.0.9\r\n[hostname]: old.example.com\r\n".to_string());

        let event = deleted.into_event().unwrap();
        assert_eq!(event.action, ChangeAction::Delete);
        assert_eq!(event.hostname, "old.example.com");
        assert_eq!(event.ip, Ipv4Addr::new(10, 0, 0, 9));
    }

    #[test]
    fn test_columns_win_over_diff() {
        let mut edited = row(8, "edit", Some("new.example.com"), Some("10.0.0.8"));
        edited.diff = Some("[hostname]: old.example.com\r\n".to_string());
        let event = edited.into_event().unwrap();
        assert_eq!(event.hostname, "new.example.com");
    }

    #[test]
    fn test_slash_hostname_means_none() {
        let mut delete = row(6, "delete", None, Some("10.0.0.9"));
        delete.diff = Some("[hostname]: / \r\n".to_string());
        assert_eq!(delete.into_event().unwrap().hostname, "");

        let mut add = row(7, "add", None, Some("10.0.0.9"));
        add.diff = Some("[hostname]: / \r\n".to_string());
        assert!(add.into_event().is_none());
    }

    #[test]
    fn test_skips_unknown_action_and_non_ipv4() {
        assert!(row(1, "truncate", Some("a.example.com"), Some("10.0.0.1")).into_event().is_none());
        assert!(row(2, "add", Some("a.example.com"), Some("2001:db8::1")).into_event().is_none());
        assert!(row(3, "add", Some("a.example.com"), None).into_event().is_none());
    }

    #[test]
    fn test_edit_maps_to_ensure() {
        let event = row(4, "edit", Some("a.example.com"), Some("10.0.0.1"))
            .into_event()
            .unwrap();
        assert_eq!(event.action, ChangeAction::Ensure);
        assert_eq!(event.change_id, 4);
    }
}
