//! Dynamic update transmission (RFC 2136)
//!
//! Turns a [`DiffPlan`] into one update message scoped to the owning zone and
//! hands it to the transport for TSIG signing and delivery.

use super::plan::DiffPlan;
use crate::error::{Error, Result};
use crate::registry::ZoneEntry;
use crate::traits::DnsTransport;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode, UpdateMessage};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use tracing::{debug, info};

/// Outcome of applying a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    /// The server accepted the transaction
    Applied,
    /// The plan was a no-op, nothing was sent
    Skipped,
}

/// Build the update message for `plan` in `zone`
///
/// The zone section names the zone apex (class IN, type SOA). The update
/// section lists one delete-RR-from-RRset entry (class NONE, TTL 0) per record
/// to remove, followed by the record to insert. Removals precede the insertion
/// so a replaced value never coexists with its successor.
pub fn build_update(zone: &ZoneEntry, plan: &DiffPlan) -> Result<Message> {
    let mut zone_section = Query::new();
    zone_section
        .set_name(zone.zone_name()?)
        .set_query_class(DNSClass::IN)
        .set_query_type(RecordType::SOA);

    let mut message = Message::new();
    message
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Update)
        .set_recursion_desired(false);
    message.add_zone(zone_section);

    for record in &plan.to_remove {
        let mut removal = record.clone();
        removal.set_ttl(0);
        removal.set_dns_class(DNSClass::NONE);
        message.add_update(removal);
    }

    if let Some(record) = &plan.to_insert {
        message.add_update(record.clone());
    }

    Ok(message)
}

/// Apply `plan` for `name`/`record_type` in `zone`
///
/// A no-op plan returns [`UpdateResult::Skipped`] without any network write.
/// Otherwise a single signed transaction is sent: `NoError` yields
/// [`UpdateResult::Applied`], any other code [`Error::UpdateRejected`].
pub async fn apply(
    transport: &dyn DnsTransport,
    zone: &ZoneEntry,
    plan: &DiffPlan,
    name: &Name,
    record_type: RecordType,
) -> Result<UpdateResult> {
    if plan.is_noop() {
        debug!("{} {} already ok in {}", name, record_type, zone.zone_name);
        return Ok(UpdateResult::Skipped);
    }

    let message = build_update(zone, plan)?;
    let code = transport
        .send_update(zone, message)
        .await
        .map_err(|e| match e {
            Error::UpdateTransport { .. } => e,
            other => Error::update_transport(&zone.zone_name, other.to_string()),
        })?;

    if code != ResponseCode::NoError {
        return Err(Error::UpdateRejected {
            zone: zone.zone_name.clone(),
            code,
        });
    }

    info!(
        "Updated {} {} in {} (removed {}, inserted {})",
        name,
        record_type,
        zone.zone_name,
        plan.to_remove.len(),
        usize::from(plan.to_insert.is_some())
    );
    Ok(UpdateResult::Applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerDefinition;
    use crate::registry::ZoneKind;
    use hickory_proto::rr::rdata::A;
    use hickory_proto::rr::{RData, Record};
    use std::net::Ipv4Addr;

    fn zone() -> ZoneEntry {
        ZoneEntry::from_definition(
            "example.com",
            &ServerDefinition {
                server: "192.0.2.53".to_string(),
                algo: "hmac-sha256".to_string(),
                keyname: "ddns-key".to_string(),
                secret: "c2VjcmV0".to_string(),
            },
            ZoneKind::Forward,
        )
        .unwrap()
    }

    fn a(ip: [u8; 4], ttl: u32) -> Record {
        Record::from_rdata(
            Name::from_ascii("host.example.com.").unwrap(),
            ttl,
            RData::A(A(Ipv4Addr::from(ip))),
        )
    }

    #[test]
    fn test_removals_precede_insert() {
        let plan = DiffPlan {
            to_remove: vec![a([10, 0, 0, 1], 300)],
            to_insert: Some(a([10, 0, 0, 2], 60)),
            already_satisfied: false,
        };
        let message = build_update(&zone(), &plan).unwrap();

        assert_eq!(message.op_code(), OpCode::Update);
        assert_eq!(message.message_type(), MessageType::Query);
        assert_eq!(message.queries().len(), 1);
        assert_eq!(
            message.queries()[0].name(),
            &Name::from_ascii("example.com.").unwrap()
        );
        assert_eq!(message.queries()[0].query_type(), RecordType::SOA);

        let updates = message.name_servers();
        assert_eq!(updates.len(), 2);

        assert_eq!(updates[0].dns_class(), DNSClass::NONE);
        assert_eq!(updates[0].ttl(), 0);
        assert_eq!(
            updates[0].data(),
            Some(&RData::A(A(Ipv4Addr::new(10, 0, 0, 1))))
        );

        assert_eq!(updates[1].dns_class(), DNSClass::IN);
        assert_eq!(updates[1].ttl(), 60);
        assert_eq!(
            updates[1].data(),
            Some(&RData::A(A(Ipv4Addr::new(10, 0, 0, 2))))
        );
    }

    #[test]
    fn test_cleanup_message_has_no_insert() {
        let plan = DiffPlan {
            to_remove: vec![a([10, 0, 0, 1], 60), a([10, 0, 0, 3], 60)],
            to_insert: None,
            already_satisfied: false,
        };
        let message = build_update(&zone(), &plan).unwrap();
        assert!(
            message
                .name_servers()
                .iter()
                .all(|r| r.dns_class() == DNSClass::NONE)
        );
        assert_eq!(message.name_servers().len(), 2);
    }
}
