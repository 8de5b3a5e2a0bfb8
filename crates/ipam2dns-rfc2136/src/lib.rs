// # RFC 2136 DNS Transport
//
// DnsTransport implementation that talks to authoritative servers over UDP:
// plain queries for live record state and TSIG-signed dynamic updates.
//
// ## Behavior
//
// - One exchange per call, bounded by the configured timeout
// - No retries and no caching; the engine re-reads live state on every change
// - Updates are signed with the zone's key (fudge 300 s, time = now)
//
// Queries go through the blocking `hickory-client` on the blocking pool.
// Updates are signed with `Message::finalize` and exchanged on a tokio UDP
// socket so the response code of a reply is available even when the reply
// carries no valid signature. Servers answer a bad key with an unsigned
// NOTAUTH, and that code must reach the caller.
//
// ## Security
//
// TSIG secrets never appear in logs or error messages. A NOERROR reply is
// only trusted when its TSIG verifies against the zone key.

use async_trait::async_trait;
use hickory_client::client::{Client, SyncClient};
use hickory_client::udp::UdpClientConnection;
use hickory_proto::op::{Message, MessageVerifier, ResponseCode};
use hickory_proto::rr::dnssec::tsig::TSigner;
use hickory_proto::rr::{DNSClass, Name, RecordType};
use ipam2dns_core::registry::ZoneEntry;
use ipam2dns_core::traits::{DnsTransport, QueryResponse};
use ipam2dns_core::{Error, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tracing::{debug, trace, warn};

/// Port used when a server is configured without one
pub const DEFAULT_DNS_PORT: u16 = 53;

/// Allowed clock skew for TSIG signatures, in seconds
pub const TSIG_FUDGE_SECS: u16 = 300;

/// Default timeout for one query or update exchange
pub const DEFAULT_DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// RFC 2136 transport over UDP
#[derive(Debug, Clone)]
pub struct Rfc2136Transport {
    timeout: Duration,
}

impl Default for Rfc2136Transport {
    fn default() -> Self {
        Self::new(DEFAULT_DNS_TIMEOUT)
    }
}

impl Rfc2136Transport {
    /// Create a transport whose exchanges give up after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Per-exchange timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl DnsTransport for Rfc2136Transport {
    async fn query(
        &self,
        server: &str,
        name: &Name,
        record_type: RecordType,
    ) -> Result<QueryResponse> {
        let addr = resolve_server(server).await?;
        let timeout = self.timeout;
        let query_name = name.clone();

        trace!("Querying {} {} at {}", name, record_type, addr);

        let response = tokio::task::spawn_blocking(move || {
            let conn = UdpClientConnection::with_timeout(addr, timeout)
                .map_err(|e| e.to_string())?;
            let client = SyncClient::new(conn);

            client
                .query(&query_name, DNSClass::IN, record_type)
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| Error::query(name.to_string(), server, format!("query task failed: {}", e)))?
        .map_err(|e| Error::query(name.to_string(), server, e))?;

        debug!(
            "{} {} at {}: {} ({} answers)",
            name,
            record_type,
            server,
            response.response_code(),
            response.answers().len()
        );

        Ok(QueryResponse::new(
            response.response_code(),
            response.answers().to_vec(),
        ))
    }

    async fn send_update(&self, zone: &ZoneEntry, mut update: Message) -> Result<ResponseCode> {
        let addr = resolve_server(&zone.server).await?;
        let signer = create_tsig_signer(zone)?;

        update.set_id(next_message_id());
        let mut verifier = update.finalize(&signer, unix_time()).map_err(|e| {
            Error::update_transport(&zone.zone_name, format!("cannot sign update: {}", e))
        })?;
        let request = update.to_vec().map_err(|e| {
            Error::update_transport(&zone.zone_name, format!("cannot encode update: {}", e))
        })?;

        trace!(
            "Sending update {} for {} to {}",
            update.id(),
            zone.zone_name,
            addr
        );

        let reply = tokio::time::timeout(self.timeout, exchange(addr, update.id(), &request))
            .await
            .map_err(|_| {
                Error::update_transport(
                    &zone.zone_name,
                    format!("no reply from {} within {:?}", addr, self.timeout),
                )
            })?
            .map_err(|e| Error::update_transport(&zone.zone_name, e.to_string()))?;

        classify_update_reply(&zone.zone_name, &reply, verifier.as_mut())
    }

    fn transport_name(&self) -> &'static str {
        "rfc2136"
    }
}

/// Build the TSIG signer for `zone`
pub fn create_tsig_signer(zone: &ZoneEntry) -> Result<TSigner> {
    TSigner::new(
        zone.secret_bytes()?,
        zone.tsig_algorithm()?,
        zone.key_name()?,
        TSIG_FUDGE_SECS,
    )
    .map_err(|e| {
        Error::update_transport(
            &zone.zone_name,
            format!("cannot create TSIG signer for key {}: {}", zone.key_name, e),
        )
    })
}

/// Message id source for updates
static NEXT_ID: AtomicU16 = AtomicU16::new(0);

fn next_message_id() -> u16 {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u16)
        .unwrap_or(0);
    NEXT_ID.fetch_add(1, Ordering::Relaxed).wrapping_add(seed)
}

fn unix_time() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Send `request` to `addr` and wait for the datagram answering message `id`
///
/// Datagrams from other addresses or with another id are dropped.
async fn exchange(addr: SocketAddr, id: u16, request: &[u8]) -> std::io::Result<Vec<u8>> {
    let local = match addr {
        SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    };
    let socket = UdpSocket::bind(local).await?;
    socket.send_to(request, addr).await?;

    let mut buf = vec![0u8; 4096];
    loop {
        let (len, src) = socket.recv_from(&mut buf).await?;
        if src != addr {
            warn!("Ignoring datagram from {} while waiting for {}", src, addr);
            continue;
        }
        if len < 2 || u16::from_be_bytes([buf[0], buf[1]]) != id {
            warn!("Dropping reply from {} that does not answer message {}", src, id);
            continue;
        }
        return Ok(buf[..len].to_vec());
    }
}

/// Read the response code of an update reply
///
/// Error codes are returned whether or not the reply is signed. NOERROR is
/// only accepted from a reply whose TSIG verifies.
fn classify_update_reply(
    zone_name: &str,
    reply: &[u8],
    verifier: Option<&mut MessageVerifier>,
) -> Result<ResponseCode> {
    let message = Message::from_vec(reply).map_err(|e| {
        Error::update_transport(zone_name, format!("unreadable reply: {}", e))
    })?;
    let code = message.response_code();

    let verified = match verifier {
        Some(verify) if !message.signature().is_empty() => match verify(reply) {
            Ok(_) => true,
            Err(e) => {
                warn!("Reply for {} failed TSIG verification: {}", zone_name, e);
                false
            }
        },
        _ => false,
    };

    if verified {
        return Ok(code);
    }
    if code != ResponseCode::NoError {
        debug!("Unauthenticated {} reply for {}", code, zone_name);
        return Ok(code);
    }
    Err(Error::update_transport(
        zone_name,
        "NOERROR reply is not signed with the zone key",
    ))
}

/// Resolve a configured server (`ip`, `ip:port`, `[v6]:port`, `host`, `host:port`)
///
/// Servers without a port use port 53.
pub async fn resolve_server(server: &str) -> Result<SocketAddr> {
    let server = server.trim();

    if let Ok(addr) = server.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = server.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_DNS_PORT));
    }

    let target = if server.contains(':') {
        server.to_string()
    } else {
        format!("{}:{}", server, DEFAULT_DNS_PORT)
    };

    tokio::net::lookup_host(&target)
        .await
        .map_err(|e| Error::config(format!("Cannot resolve DNS server {}: {}", server, e)))?
        .next()
        .ok_or_else(|| Error::config(format!("DNS server {} has no address", server)))
}
