//! Current-state lookup
//!
//! Classifies a query response into the record set the planner works on.

use crate::error::{Error, Result};
use crate::traits::DnsTransport;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{Name, Record, RecordType};
use tracing::debug;

/// Query the live record set of `name`/`record_type` on `server`
///
/// - `NoError`: the answers whose owner is `name` and whose type is exactly
///   `record_type` (CNAMEs and chased targets are ignored)
/// - `NXDomain`: an empty set
/// - any other response code, a transport failure or a timeout: [`Error::Query`]
pub async fn query_records(
    transport: &dyn DnsTransport,
    server: &str,
    name: &Name,
    record_type: RecordType,
) -> Result<Vec<Record>> {
    let response = transport
        .query(server, name, record_type)
        .await
        .map_err(|e| match e {
            Error::Query { .. } => e,
            other => Error::query(name.to_string(), server, other.to_string()),
        })?;

    match response.response_code {
        ResponseCode::NoError => {
            let records: Vec<Record> = response
                .answers
                .into_iter()
                .filter(|r| r.record_type() == record_type && r.name() == name)
                .collect();
            debug!(
                "{} {} has {} record(s) on {}",
                name,
                record_type,
                records.len(),
                server
            );
            Ok(records)
        }
        ResponseCode::NXDomain => {
            debug!("{} does not exist on {}", name, server);
            Ok(Vec::new())
        }
        code => Err(Error::query(
            name.to_string(),
            server,
            format!("unexpected response code {}", code),
        )),
    }
}
