//! Hickory DNS authority answering from the routing table.

use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{DNSClass, LowerName, Name, RData, Record, RecordSet, RecordType};
use hickory_server::authority::{
    Authority, LookupControlFlow, LookupError, LookupOptions, LookupRecords, MessageRequest,
    UpdateResult, ZoneType,
};
use hickory_server::server::RequestInfo;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::metrics::{self, QueryResult, Timer};
use crate::resolver::{AddressRecord, Question, Resolver};

/// TTL on every synthesized record.
pub const RECORD_TTL: u32 = 3600;

/// Authority for the root zone that load-balances `A` answers across pools.
///
/// Registering it at `.` makes the catalog route every query here.
pub struct BalancerAuthority {
    origin: LowerName,
    resolver: Resolver,
}

impl BalancerAuthority {
    /// Create an authority over `resolver`.
    pub fn new(resolver: Resolver) -> Self {
        Self {
            origin: LowerName::from(Name::root()),
            resolver,
        }
    }

    /// Build the `A` record set for one resolved answer.
    ///
    /// Returns `None` when the owner name does not parse.
    fn build_a_record(&self, answer: &AddressRecord) -> Option<RecordSet> {
        let owner = match Name::from_ascii(&answer.name) {
            Ok(owner) => owner,
            Err(e) => {
                debug!(name = %answer.name, "dropping record with bad owner name: {}", e);
                return None;
            }
        };

        let mut record_set = RecordSet::new(owner.clone(), RecordType::A, 0);
        let mut record = Record::from_rdata(owner, RECORD_TTL, RData::A(A::from(answer.address)));
        record.set_dns_class(DNSClass::IN);
        record_set.insert(record, 0);

        Some(record_set)
    }

    fn no_answer() -> LookupControlFlow<LookupRecords> {
        LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NoError)))
    }

    /// Answer `name` as queried. The answer's owner keeps the query's case.
    fn answer_name(
        &self,
        name: &Name,
        rtype: RecordType,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<LookupRecords> {
        let timer = Timer::start();
        let rtype_str = format!("{:?}", rtype);

        trace!(name = %name, rtype = ?rtype, "DNS lookup");

        if rtype != RecordType::A {
            trace!(name = %name, rtype = ?rtype, "Unsupported record type");
            metrics::record_query(&rtype_str, QueryResult::Unsupported, timer.elapsed());
            return Self::no_answer();
        }

        let answers = self.resolver.answer(&[Question {
            name: name.to_string(),
            record_type: rtype,
        }]);

        let Some(record_set) = answers.first().and_then(|a| self.build_a_record(a)) else {
            debug!(name = %name, "A lookup: no address");
            metrics::record_query(&rtype_str, QueryResult::NoAnswer, timer.elapsed());
            return Self::no_answer();
        };

        debug!(name = %name, addr = %answers[0].address, "A lookup: returning record");
        metrics::record_query(&rtype_str, QueryResult::Answered, timer.elapsed());
        LookupControlFlow::Break(Ok(LookupRecords::new(lookup_options, Arc::new(record_set))))
    }
}

#[async_trait]
impl Authority for BalancerAuthority {
    type Lookup = LookupRecords;

    fn zone_type(&self) -> ZoneType {
        ZoneType::Primary
    }

    fn is_axfr_allowed(&self) -> bool {
        false
    }

    fn origin(&self) -> &LowerName {
        &self.origin
    }

    async fn lookup(
        &self,
        name: &LowerName,
        rtype: RecordType,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        self.answer_name(&Name::from(name.clone()), rtype, lookup_options)
    }

    async fn search(
        &self,
        request_info: RequestInfo<'_>,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        let query = request_info.query.original();
        self.answer_name(query.name(), query.query_type(), lookup_options)
    }

    async fn get_nsec_records(
        &self,
        _name: &LowerName,
        _lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        // DNSSEC not supported
        Self::no_answer()
    }

    async fn update(&self, _update: &MessageRequest) -> UpdateResult<bool> {
        // Dynamic updates not supported
        Err(ResponseCode::NotImp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority_with(host: &str, addrs: &[&str]) -> BalancerAuthority {
        let resolver = Resolver::new();
        for addr in addrs {
            resolver.add_address("blue", addr);
        }
        resolver.add_host(host, "blue");
        BalancerAuthority::new(resolver)
    }

    fn lower(name: &str) -> LowerName {
        Name::from_ascii(name).unwrap().into()
    }

    #[test]
    fn test_origin_is_root() {
        let authority = BalancerAuthority::new(Resolver::new());
        assert!(authority.origin().is_root());
    }

    #[tokio::test]
    async fn test_lookup_a_returns_record() {
        let authority = authority_with("api.example.com", &["10.0.0.1"]);

        let result = authority
            .lookup(&lower("api.example.com."), RecordType::A, LookupOptions::default())
            .await;

        assert!(matches!(result, LookupControlFlow::Break(Ok(_))));
    }

    #[tokio::test]
    async fn test_lookup_unbound_has_no_answer() {
        let authority = authority_with("api.example.com", &["10.0.0.1"]);

        let result = authority
            .lookup(&lower("other.example.com."), RecordType::A, LookupOptions::default())
            .await;

        assert!(matches!(
            result,
            LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NoError)))
        ));
    }

    #[tokio::test]
    async fn test_lookup_empty_pool_has_no_answer() {
        let authority = authority_with("api.example.com", &[]);

        let result = authority
            .lookup(&lower("api.example.com."), RecordType::A, LookupOptions::default())
            .await;

        assert!(matches!(result, LookupControlFlow::Break(Err(_))));
    }

    #[tokio::test]
    async fn test_lookup_aaaa_unsupported() {
        let authority = authority_with("api.example.com", &["10.0.0.1"]);

        let result = authority
            .lookup(&lower("api.example.com."), RecordType::AAAA, LookupOptions::default())
            .await;

        assert!(matches!(
            result,
            LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NoError)))
        ));
    }

    #[test]
    fn test_build_a_record() {
        let authority = BalancerAuthority::new(Resolver::new());
        let answer = AddressRecord {
            name: "ok.example.com.".to_string(),
            address: "10.0.0.1".parse().unwrap(),
        };

        let record_set = authority.build_a_record(&answer).unwrap();
        let records: Vec<&Record> = record_set.iter().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ttl(), RECORD_TTL);
        assert_eq!(records[0].data(), &RData::A(A::from(answer.address)));
    }

    #[test]
    fn test_build_a_record_drops_bad_names() {
        let authority = BalancerAuthority::new(Resolver::new());
        let answer = AddressRecord {
            name: "bad name.example.com.".to_string(),
            address: "10.0.0.1".parse().unwrap(),
        };

        assert!(authority.build_a_record(&answer).is_none());
    }
}
