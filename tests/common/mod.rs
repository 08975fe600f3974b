//! Shared test infrastructure for catalog-level integration tests.

#![allow(dead_code)]

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{Catalog, MessageRequest, MessageResponse};
use hickory_server::proto::rr::Record;
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

use lb_dns::resolver::Resolver;
use lb_dns::server::build_catalog;

// --- TestResponseHandler ---

/// Captures the serialized DNS response for inspection in tests.
///
/// Implements `ResponseHandler` so it can be passed to `Catalog::handle_request()`.
/// The response is serialized via `MessageResponse::destructive_emit()` and stored
/// as raw wire-format bytes, which can then be parsed with `Message::from_vec()`.
#[derive(Clone)]
pub struct TestResponseHandler {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl TestResponseHandler {
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::with_capacity(512))),
        }
    }

    /// Parse the captured wire bytes into a `Message` for assertions.
    pub fn into_message(self) -> Message {
        let buf = self.buf.lock().unwrap();
        assert!(!buf.is_empty(), "no response was captured");
        Message::from_vec(&buf).expect("failed to parse captured DNS response")
    }
}

#[async_trait]
impl ResponseHandler for TestResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = self.buf.lock().unwrap();
        buf.clear();
        let mut encoder = BinEncoder::new(&mut *buf);
        encoder.set_max_size(u16::MAX);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(info)
    }
}

// --- Routing table builder ---

/// Fluent setup for a routing table.
pub struct TestTable {
    resolver: Resolver,
}

impl TestTable {
    pub fn new() -> Self {
        Self {
            resolver: Resolver::new(),
        }
    }

    /// Add members to a pool.
    pub fn pool(self, name: &str, addrs: &[&str]) -> Self {
        for addr in addrs {
            self.resolver.add_address(name, addr);
        }
        self
    }

    /// Bind a hostname or wildcard to a pool.
    pub fn host(self, pattern: &str, pool: &str) -> Self {
        self.resolver.add_host(pattern, pool);
        self
    }

    pub fn build(self) -> Resolver {
        self.resolver
    }
}

pub fn client_src() -> SocketAddr {
    "10.1.1.1:12345".parse().unwrap()
}

pub fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

// --- Query/Request construction ---

/// Build wire-format bytes for a DNS message with one question.
pub fn build_message_bytes(
    name: &str,
    record_type: RecordType,
    op_code: OpCode,
    id: u16,
) -> Vec<u8> {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(op_code);
    msg.set_recursion_desired(true);
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    msg.add_query(query);
    msg.to_vec().unwrap()
}

/// Parse wire bytes into a MessageRequest.
pub fn parse_message_request(bytes: &[u8]) -> MessageRequest {
    let mut decoder = BinDecoder::new(bytes);
    MessageRequest::read(&mut decoder).expect("failed to parse MessageRequest")
}

/// Build a full `Request`.
pub fn build_request(name: &str, record_type: RecordType, op_code: OpCode, id: u16) -> Request {
    let bytes = build_message_bytes(name, record_type, op_code, id);
    let msg = parse_message_request(&bytes);
    Request::new(msg, client_src(), Protocol::Udp)
}

// --- Response helpers ---

/// Execute a standard query through the catalog and return the parsed response.
pub async fn execute_query(
    catalog: &Catalog,
    name: &str,
    record_type: RecordType,
    id: u16,
) -> Message {
    execute(catalog, name, record_type, OpCode::Query, id).await
}

/// Execute a message with an arbitrary opcode.
pub async fn execute(
    catalog: &Catalog,
    name: &str,
    record_type: RecordType,
    op_code: OpCode,
    id: u16,
) -> Message {
    let request = build_request(name, record_type, op_code, id);
    let handler = TestResponseHandler::new();
    catalog.handle_request(&request, handler.clone()).await;
    handler.into_message()
}

/// Query `A` for `name` against a fresh catalog over `resolver`.
pub async fn query_a(resolver: &Resolver, name: &str, id: u16) -> Message {
    let catalog = build_catalog(resolver.clone());
    execute_query(&catalog, name, RecordType::A, id).await
}

/// Extract A addresses from a response.
pub fn extract_a_ips(msg: &Message) -> Vec<Ipv4Addr> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(Ipv4Addr::from(*a)),
            _ => None,
        })
        .collect()
}
