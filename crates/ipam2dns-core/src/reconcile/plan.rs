//! Diff planning between the desired value and the live record set
//!
//! Plans are computed fresh on every call from freshly queried state and are
//! never cached: other writers may change the zone between two passes.

use hickory_proto::rr::{DNSClass, Name, RData, Record};
use tracing::debug;

/// TTL of every record this system inserts
pub const RECORD_TTL: u32 = 60;

/// Reconciliation target for one name/type pair
#[derive(Debug, Clone, PartialEq)]
pub enum DesiredRecordState {
    /// Exactly this value must exist
    Present(RData),
    /// No value must exist
    Absent,
}

/// Records to remove and the record to insert for one name/type pair
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffPlan {
    /// Live records that must go, in query order
    pub to_remove: Vec<Record>,
    /// Record to add after the removals
    pub to_insert: Option<Record>,
    /// A live record already carries the desired value
    pub already_satisfied: bool,
}

impl DiffPlan {
    /// Whether applying this plan needs no transaction at all
    pub fn is_noop(&self) -> bool {
        self.to_remove.is_empty() && self.to_insert.is_none()
    }
}

/// Compute the diff for `name` between `desired` and `actual`
///
/// With `cleanup_only` every live record is removed and nothing is inserted,
/// whatever `desired` says. Otherwise records holding the desired value are
/// kept, all others are removed, and the desired value is inserted with
/// [`RECORD_TTL`] when no live record holds it.
///
/// A repeated copy of the kept value is neither removed nor re-inserted:
/// removal is by value, so it would also delete the kept record.
pub fn plan(
    name: &Name,
    desired: &DesiredRecordState,
    actual: &[Record],
    cleanup_only: bool,
) -> DiffPlan {
    let wanted = match desired {
        DesiredRecordState::Present(value) if !cleanup_only => Some(value),
        _ => None,
    };

    let mut diff = DiffPlan::default();
    for record in actual {
        let matches = wanted.is_some_and(|value| record.data() == Some(value));
        if matches {
            debug!("{} {:?} exists", name, record.data());
            diff.already_satisfied = true;
            continue;
        }

        let listed = diff
            .to_remove
            .iter()
            .any(|r| r.record_type() == record.record_type() && r.data() == record.data());
        if !listed {
            debug!("set to remove {:?} from {}", record.data(), name);
            diff.to_remove.push(record.clone());
        }
    }

    if let Some(value) = wanted
        && !diff.already_satisfied
    {
        debug!("create {:?} at {}", value, name);
        let mut record = Record::from_rdata(name.clone(), RECORD_TTL, value.clone());
        record.set_dns_class(DNSClass::IN);
        diff.to_insert = Some(record);
    }

    diff
}
