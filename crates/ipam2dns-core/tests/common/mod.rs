//! Test doubles and common utilities for contract tests
//!
//! `MockTransport` behaves like a small authoritative server: it answers
//! queries from an in-memory record set and applies RFC 2136 updates to it,
//! so tests can assert on the resulting zone contents as well as on the
//! messages that were sent.

#![allow(dead_code)]

use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::rdata::{A, PTR};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use ipam2dns_core::config::{EngineConfig, SyncConfig};
use ipam2dns_core::error::{Error, Result};
use ipam2dns_core::registry::{ZoneEntry, ZoneRegistry};
use ipam2dns_core::traits::{ChangeBatch, ChangeSource, CursorStore, DnsTransport, QueryResponse};
use std::collections::{HashSet, VecDeque};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Zones used throughout the contract tests
pub const TEST_CONFIG: &str = r#"
source:
  url: http://ipam.test/api/changelog
forward zones:
  example.com:
    server: 192.0.2.53
    algo: hmac-sha256
    keyname: ddns-key
    secret: c2VjcmV0LWtleS1ieXRlcw==
  sub.example.com:
    server: 192.0.2.54:5353
    algo: hmac-sha512
    keyname: sub-key
    secret: c3ViLXNlY3JldA==
reverse zones:
  2.0.192.in-addr.arpa:
    server: 192.0.2.53
    algo: hmac-sha256
    keyname: ddns-key
    secret: c2VjcmV0LWtleS1ieXRlcw==
  10.in-addr.arpa:
    server: 192.0.2.55
    algo: hmac-sha256
    keyname: ten-key
    secret: dGVuLXNlY3JldA==
engine:
  poll_interval_secs: 1
  event_channel_capacity: 100
"#;

/// Registry built from [`TEST_CONFIG`]
pub fn test_registry() -> Arc<ZoneRegistry> {
    let config = SyncConfig::parse(TEST_CONFIG).unwrap();
    Arc::new(ZoneRegistry::from_config(&config).unwrap())
}

/// Engine settings for tests
pub fn test_engine_config() -> EngineConfig {
    SyncConfig::parse(TEST_CONFIG).unwrap().engine
}

pub fn name(s: &str) -> Name {
    Name::from_ascii(s).unwrap()
}

pub fn a_record(owner: &str, ip: Ipv4Addr, ttl: u32) -> Record {
    let mut record = Record::from_rdata(name(owner), ttl, RData::A(A(ip)));
    record.set_dns_class(DNSClass::IN);
    record
}

pub fn ptr_record(owner: &str, target: &str, ttl: u32) -> Record {
    let mut record = Record::from_rdata(name(owner), ttl, RData::PTR(PTR(name(target))));
    record.set_dns_class(DNSClass::IN);
    record
}

/// An update as received by [`MockTransport`]
#[derive(Debug, Clone)]
pub struct SentUpdate {
    /// Zone the transport was asked to sign for
    pub zone: ZoneEntry,
    /// Message as handed to the transport
    pub message: Message,
}

impl SentUpdate {
    /// Zone section name
    pub fn zone_name(&self) -> Name {
        self.message.queries()[0].name().clone()
    }

    /// Update section
    pub fn updates(&self) -> &[Record] {
        self.message.name_servers()
    }
}

/// In-memory authoritative server
pub struct MockTransport {
    records: Mutex<Vec<Record>>,
    updates: Mutex<Vec<SentUpdate>>,
    queries: Mutex<Vec<(String, Name, RecordType)>>,
    failing_query_names: Mutex<HashSet<Name>>,
    query_code: Mutex<Option<ResponseCode>>,
    update_code: Mutex<ResponseCode>,
    update_failure: Mutex<Option<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
            failing_query_names: Mutex::new(HashSet::new()),
            query_code: Mutex::new(None),
            update_code: Mutex::new(ResponseCode::NoError),
            update_failure: Mutex::new(None),
        }
    }

    /// Seed the zone data
    pub fn with_records(records: Vec<Record>) -> Self {
        let transport = Self::new();
        *transport.records.lock().unwrap() = records;
        transport
    }

    /// Current records at `owner` of `record_type`
    pub fn records_at(&self, owner: &str, record_type: RecordType) -> Vec<Record> {
        let owner = name(owner);
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.name() == &owner && r.record_type() == record_type)
            .cloned()
            .collect()
    }

    /// Every update received so far
    pub fn sent_updates(&self) -> Vec<SentUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    /// Queries received so far as (server, name, type)
    pub fn queries(&self) -> Vec<(String, Name, RecordType)> {
        self.queries.lock().unwrap().clone()
    }

    /// Make queries for `owner` fail at the transport level
    pub fn fail_queries_for(&self, owner: &str) {
        self.failing_query_names.lock().unwrap().insert(name(owner));
    }

    /// Answer every query with `code` and no records
    pub fn answer_queries_with(&self, code: ResponseCode) {
        *self.query_code.lock().unwrap() = Some(code);
    }

    /// Reject every update with `code` without applying it
    pub fn reject_updates_with(&self, code: ResponseCode) {
        *self.update_code.lock().unwrap() = code;
    }

    /// Fail every update at the transport level
    pub fn fail_updates(&self, message: &str) {
        *self.update_failure.lock().unwrap() = Some(message.to_string());
    }

    fn apply(&self, message: &Message) {
        let mut records = self.records.lock().unwrap();
        for update in message.name_servers() {
            match update.dns_class() {
                DNSClass::NONE => records.retain(|r| {
                    !(r.name() == update.name()
                        && r.record_type() == update.record_type()
                        && r.data() == update.data())
                }),
                DNSClass::IN => {
                    let present = records.iter().any(|r| {
                        r.name() == update.name()
                            && r.record_type() == update.record_type()
                            && r.data() == update.data()
                    });
                    if !present {
                        records.push(update.clone());
                    }
                }
                other => panic!("unexpected update class {:?}", other),
            }
        }
    }
}

#[async_trait::async_trait]
impl DnsTransport for MockTransport {
    async fn query(
        &self,
        server: &str,
        name: &Name,
        record_type: RecordType,
    ) -> Result<QueryResponse> {
        self.queries
            .lock()
            .unwrap()
            .push((server.to_string(), name.clone(), record_type));

        if self.failing_query_names.lock().unwrap().contains(name) {
            return Err(Error::query(name.to_string(), server, "timed out"));
        }
        if let Some(code) = *self.query_code.lock().unwrap() {
            return Ok(QueryResponse::new(code, Vec::new()));
        }

        let records = self.records.lock().unwrap();
        if !records.iter().any(|r| r.name() == name) {
            return Ok(QueryResponse::new(ResponseCode::NXDomain, Vec::new()));
        }

        let answers = records
            .iter()
            .filter(|r| r.name() == name && r.record_type() == record_type)
            .cloned()
            .collect();
        Ok(QueryResponse::new(ResponseCode::NoError, answers))
    }

    async fn send_update(&self, zone: &ZoneEntry, update: Message) -> Result<ResponseCode> {
        self.updates.lock().unwrap().push(SentUpdate {
            zone: zone.clone(),
            message: update.clone(),
        });

        if let Some(message) = self.update_failure.lock().unwrap().clone() {
            return Err(Error::update_transport(&zone.zone_name, message));
        }

        let code = *self.update_code.lock().unwrap();
        if code == ResponseCode::NoError {
            self.apply(&update);
        }
        Ok(code)
    }

    fn transport_name(&self) -> &'static str {
        "mock"
    }
}

/// A change source that replays scripted fetch results
///
/// Once the script is exhausted every fetch returns an empty batch.
#[derive(Clone)]
pub struct ScriptedChangeSource {
    script: Arc<Mutex<VecDeque<Result<ChangeBatch>>>>,
    requested: Arc<Mutex<Vec<u64>>>,
}

impl ScriptedChangeSource {
    pub fn new(script: Vec<Result<ChangeBatch>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Cursors passed to `fetch_changes`, in call order
    pub fn requested_cursors(&self) -> Vec<u64> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChangeSource for ScriptedChangeSource {
    async fn fetch_changes(&self, after: u64) -> Result<ChangeBatch> {
        self.requested.lock().unwrap().push(after);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(ChangeBatch {
                    events: Vec::new(),
                    high_water: after,
                })
            })
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// A cursor store that counts calls
#[derive(Clone, Default)]
pub struct CountingCursorStore {
    cursor: Arc<AtomicU64>,
    save_count: Arc<AtomicUsize>,
    flush_count: Arc<AtomicUsize>,
}

impl CountingCursorStore {
    pub fn starting_at(cursor: u64) -> Self {
        let store = Self::default();
        store.cursor.store(cursor, Ordering::SeqCst);
        store
    }

    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    pub fn flush_count(&self) -> usize {
        self.flush_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CursorStore for CountingCursorStore {
    async fn load(&self) -> Result<u64> {
        Ok(self.cursor())
    }

    async fn save(&self, cursor: u64) -> Result<()> {
        self.save_count.fetch_add(1, Ordering::SeqCst);
        self.cursor.store(cursor, Ordering::SeqCst);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.flush_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
