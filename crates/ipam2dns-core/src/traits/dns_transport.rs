// # DNS Transport Trait
//
// Defines the network boundary of the reconciliation engine: one plain query
// and one signed dynamic update per call.
//
// ## Implementations
//
// - RFC 2136 over UDP with TSIG: `ipam2dns-rfc2136` crate
// - In-memory authoritative server: contract tests in `ipam2dns-core/tests`
//
// ## Usage
//
// ```rust,ignore
// use ipam2dns_core::DnsTransport;
// use hickory_proto::rr::{Name, RecordType};
//
// let response = transport
//     .query("192.0.2.53", &Name::from_ascii("host.example.com.")?, RecordType::A)
//     .await?;
// println!("rcode={} answers={}", response.response_code, response.answers.len());
// ```

use crate::registry::ZoneEntry;
use async_trait::async_trait;
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::{Name, Record, RecordType};

/// Raw outcome of a query exchange
///
/// The response code is not interpreted here; classification belongs to the
/// record query step of the engine.
#[derive(Debug, Clone)]
pub struct QueryResponse {
    /// Response code returned by the server
    pub response_code: ResponseCode,
    /// Answer section as received
    pub answers: Vec<Record>,
}

impl QueryResponse {
    /// Build a response from its parts
    pub fn new(response_code: ResponseCode, answers: Vec<Record>) -> Self {
        Self {
            response_code,
            answers,
        }
    }
}

/// Trait for DNS transport implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Contract
///
/// - Every exchange is bounded by the transport's timeout; a timeout is an `Err`.
/// - No retries. A failed exchange is reported and the next reconciliation
///   pass tries again.
/// - No caching of answers. Every call reaches the server.
#[async_trait]
pub trait DnsTransport: Send + Sync {
    /// Send a recursion-desired query for `name`/`record_type` to `server`
    ///
    /// # Returns
    ///
    /// - `Ok(QueryResponse)`: any response, whatever its response code
    /// - `Err(Error)`: transport failure or timeout
    async fn query(
        &self,
        server: &str,
        name: &Name,
        record_type: RecordType,
    ) -> Result<QueryResponse, crate::Error>;

    /// Sign `update` with the zone's TSIG key and send it to the zone's server
    ///
    /// # Returns
    ///
    /// - `Ok(ResponseCode)`: the server's response code
    /// - `Err(Error)`: transport failure, timeout, or signing failure
    async fn send_update(
        &self,
        zone: &ZoneEntry,
        update: Message,
    ) -> Result<ResponseCode, crate::Error>;

    /// Get the transport name (for logging/debugging)
    fn transport_name(&self) -> &'static str;
}
