//! DNS record reconciliation
//!
//! For one hostname/IPv4 binding the [`Reconciler`] drives two independent
//! lanes, each through zone resolution, a live query, diff planning and at
//! most one signed update:
//!
//! ```text
//!                 ┌──────────────┐
//!  ensure/delete ─│  Reconciler  │
//!                 └──────────────┘
//!                   │          │
//!          reverse  ▼          ▼  forward
//!   <d.c.b.a>.in-addr.arpa. PTR   <hostname> A
//!                   │          │
//!      ZoneRegistry → query → plan → transmit
//! ```
//!
//! A failure in one lane (no zone, query error, rejected update) is logged
//! and reported but never prevents the other lane from running.

pub mod plan;
pub mod query;
pub mod transmit;

pub use plan::{DesiredRecordState, DiffPlan, RECORD_TTL};
pub use transmit::UpdateResult;

use crate::error::{Error, Result};
use crate::registry::{ZoneRegistry, fqdn};
use crate::traits::{ChangeAction, ChangeEvent, DnsTransport};
use hickory_proto::rr::rdata::{A, PTR};
use hickory_proto::rr::{Name, RData, RecordType};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Reverse lookup name of an IPv4 address, e.g. `10.2.0.192.in-addr.arpa.`
pub fn reverse_name(ip: Ipv4Addr) -> String {
    let [a, b, c, d] = ip.octets();
    format!("{}.{}.{}.{}.in-addr.arpa.", d, c, b, a)
}

/// One of the two independent reconciliation directions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// PTR record at the reverse lookup name
    Reverse,
    /// A record at the hostname
    Forward,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lane::Reverse => f.write_str("reverse"),
            Lane::Forward => f.write_str("forward"),
        }
    }
}

/// What happened in one lane
#[derive(Debug)]
pub enum LaneOutcome {
    /// A transaction was accepted
    Applied,
    /// Live state already matched, nothing was sent
    Skipped,
    /// The lane was not run (delete of the root name)
    NotAttempted,
    /// The lane failed; the error has been logged
    Failed(Error),
}

impl LaneOutcome {
    /// Whether the lane ended in an error
    pub fn is_failure(&self) -> bool {
        matches!(self, LaneOutcome::Failed(_))
    }

    /// The lane's error, if any
    pub fn error(&self) -> Option<&Error> {
        match self {
            LaneOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<UpdateResult> for LaneOutcome {
    fn from(result: UpdateResult) -> Self {
        match result {
            UpdateResult::Applied => LaneOutcome::Applied,
            UpdateResult::Skipped => LaneOutcome::Skipped,
        }
    }
}

/// Per-lane outcome of one `ensure` or `delete`
#[derive(Debug)]
pub struct ReconcileReport {
    /// Normalized hostname
    pub hostname: String,
    /// Bound address
    pub ip: Ipv4Addr,
    /// PTR lane
    pub reverse: LaneOutcome,
    /// A lane
    pub forward: LaneOutcome,
}

impl ReconcileReport {
    /// Whether neither lane failed
    pub fn is_success(&self) -> bool {
        !self.reverse.is_failure() && !self.forward.is_failure()
    }
}

/// Reconciliation engine
///
/// Holds no state across calls besides the read-only registry, so clones can
/// run concurrently for different bindings.
#[derive(Clone)]
pub struct Reconciler {
    registry: Arc<ZoneRegistry>,
    transport: Arc<dyn DnsTransport>,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(registry: Arc<ZoneRegistry>, transport: Arc<dyn DnsTransport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Zone registry in use
    pub fn registry(&self) -> &ZoneRegistry {
        &self.registry
    }

    /// Dispatch a change event to [`ensure`](Self::ensure) or [`delete`](Self::delete)
    pub async fn apply_change(&self, event: &ChangeEvent) -> ReconcileReport {
        match event.action {
            ChangeAction::Ensure => self.ensure(&event.hostname, event.ip).await,
            ChangeAction::Delete => self.delete(&event.hostname, event.ip).await,
        }
    }

    /// Make `hostname A ip` and `reverse(ip) PTR hostname` the only values
    pub async fn ensure(&self, hostname: &str, ip: Ipv4Addr) -> ReconcileReport {
        let hostname = fqdn(hostname);
        debug!("ensure {} <-> {}", hostname, ip);

        if hostname == "." {
            let reason = || Error::invalid_input(format!("no hostname to bind to {}", ip));
            error!("Cannot ensure records for {}: no hostname", ip);
            return ReconcileReport {
                hostname,
                ip,
                reverse: LaneOutcome::Failed(reason()),
                forward: LaneOutcome::Failed(reason()),
            };
        }

        let reverse = match host_name(&hostname) {
            Ok(target) => {
                self.reconcile_lane(
                    Lane::Reverse,
                    &reverse_name(ip),
                    RecordType::PTR,
                    DesiredRecordState::Present(RData::PTR(PTR(target))),
                    false,
                )
                .await
            }
            Err(e) => self.fail(Lane::Reverse, &hostname, e),
        };

        let forward = self
            .reconcile_lane(
                Lane::Forward,
                &hostname,
                RecordType::A,
                DesiredRecordState::Present(RData::A(A(ip))),
                false,
            )
            .await;

        ReconcileReport {
            hostname,
            ip,
            reverse,
            forward,
        }
    }

    /// Remove every PTR at `reverse(ip)` and every A at `hostname`
    ///
    /// The forward lane is skipped when the hostname normalizes to the root.
    pub async fn delete(&self, hostname: &str, ip: Ipv4Addr) -> ReconcileReport {
        let hostname = fqdn(hostname);
        debug!("delete {} <-> {}", hostname, ip);

        let reverse = self
            .reconcile_lane(
                Lane::Reverse,
                &reverse_name(ip),
                RecordType::PTR,
                DesiredRecordState::Absent,
                true,
            )
            .await;

        let forward = if hostname == "." {
            debug!("no hostname for {}, forward lane skipped", ip);
            LaneOutcome::NotAttempted
        } else {
            self.reconcile_lane(
                Lane::Forward,
                &hostname,
                RecordType::A,
                DesiredRecordState::Absent,
                true,
            )
            .await
        };

        ReconcileReport {
            hostname,
            ip,
            reverse,
            forward,
        }
    }

    async fn reconcile_lane(
        &self,
        lane: Lane,
        owner: &str,
        record_type: RecordType,
        desired: DesiredRecordState,
        cleanup_only: bool,
    ) -> LaneOutcome {
        match self
            .try_reconcile(owner, record_type, &desired, cleanup_only)
            .await
        {
            Ok(result) => result.into(),
            Err(e) => self.fail(lane, owner, e),
        }
    }

    async fn try_reconcile(
        &self,
        owner: &str,
        record_type: RecordType,
        desired: &DesiredRecordState,
        cleanup_only: bool,
    ) -> Result<UpdateResult> {
        let zone = self.registry.resolve(owner)?;
        let name = host_name(owner)?;

        let actual =
            query::query_records(self.transport.as_ref(), &zone.server, &name, record_type)
                .await?;
        let diff = plan::plan(&name, desired, &actual, cleanup_only);

        transmit::apply(self.transport.as_ref(), zone, &diff, &name, record_type).await
    }

    fn fail(&self, lane: Lane, owner: &str, e: Error) -> LaneOutcome {
        if e.is_zone_miss() {
            warn!("{} lane for {} skipped: {}", lane, owner, e);
        } else {
            error!("{} lane for {} failed: {}", lane, owner, e);
        }
        LaneOutcome::Failed(e)
    }
}

fn host_name(name: &str) -> Result<Name> {
    Name::from_ascii(name).map_err(|e| Error::invalid_input(format!("{}: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_name_derivation() {
        assert_eq!(
            reverse_name(Ipv4Addr::new(192, 0, 2, 10)),
            "10.2.0.192.in-addr.arpa."
        );
        assert_eq!(
            reverse_name(Ipv4Addr::new(10, 0, 0, 1)),
            "1.0.0.10.in-addr.arpa."
        );
    }

    #[test]
    fn test_lane_outcome_from_update_result() {
        assert!(matches!(
            LaneOutcome::from(UpdateResult::Applied),
            LaneOutcome::Applied
        ));
        assert!(matches!(
            LaneOutcome::from(UpdateResult::Skipped),
            LaneOutcome::Skipped
        ));
        assert!(!LaneOutcome::NotAttempted.is_failure());
        assert!(LaneOutcome::Failed(Error::zone_not_found("x.")).is_failure());
    }
}
