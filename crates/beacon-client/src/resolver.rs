//! The unicast resolver: iterative resolution against a configured
//! nameserver list, with CNAME chasing, delegation following, an
//! optional DNS-over-HTTPS transport, and a guard that keeps
//! private-namespace questions away from public servers.

use async_recursion::async_recursion;
use rand::Rng;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::RwLock;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::Instrument;

use beacon_types::protocol::types::*;

use crate::cache::SharedCache;
use crate::nameserver::{is_private_address, DohSupport, Nameserver};
use crate::pool::BufferPool;

/// Give up after this many nested resolution steps.
pub const RECURSION_LIMIT: usize = 10;

/// Wall-clock budget for a single attempt against a single
/// nameserver, over either transport.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(3);

/// The well-known DNS port.
pub const DNS_PORT: u16 = 53;

/// How queries travel to nameservers.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResolutionMode {
    /// Plain UDP only.
    InsecureOnly,
    /// DNS-over-HTTPS only; servers that cannot speak it fail.
    SecureOnly,
    /// DNS-over-HTTPS first, falling back to UDP on HTTPS or timeout
    /// errors - except against servers whose DoH flag is explicitly
    /// `No`, which skip straight to UDP.
    SecureWithFallback,
}

/// Errors surfaced by the public entry points.  Network, parse, and
/// transport failures never show up here: they are absorbed into
/// moving on to the next nameserver, and exhaustion is an empty
/// result.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Error {
    /// A null, empty, or unparseable argument.
    InvalidInput,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::InvalidInput => write!(f, "invalid input"),
        }
    }
}

impl std::error::Error for Error {}

/// A caching, iterating DNS stub-and-a-half: it follows referrals
/// itself rather than asking anyone to recurse on its behalf.
pub struct Resolver {
    nameservers: RwLock<Vec<Nameserver>>,
    mode: ResolutionMode,
    port: u16,
    cache: SharedCache,
    http: reqwest::Client,
    pool: BufferPool,
}

impl Resolver {
    /// A resolver using the system's configured nameservers, falling
    /// back to the root hints.
    pub fn new(mode: ResolutionMode) -> Self {
        Self::with_nameservers(crate::nameserver::system(), mode)
    }

    /// A resolver with an explicit nameserver list, contacted in
    /// order.
    pub fn with_nameservers(nameservers: Vec<Nameserver>, mode: ResolutionMode) -> Self {
        Self {
            nameservers: RwLock::new(nameservers),
            mode,
            port: DNS_PORT,
            cache: SharedCache::new(),
            http: reqwest::Client::builder()
                .http2_prior_knowledge()
                .timeout(ATTEMPT_TIMEOUT)
                .build()
                .unwrap_or_default(),
            pool: BufferPool::new(UNICAST_BUFFER_LEN),
        }
    }

    /// Send upstream queries to a non-standard port.  Useful for
    /// talking to resolvers on unprivileged ports.
    pub fn set_upstream_port(&mut self, port: u16) {
        self.port = port;
    }

    /// A snapshot of the configured nameservers.
    ///
    /// # Panics
    ///
    /// If the lock has been poisoned.
    pub fn nameservers(&self) -> Vec<Nameserver> {
        self.nameservers.read().expect("nameserver lock poisoned").clone()
    }

    /// Replace the nameserver list.  In-flight resolutions keep the
    /// snapshot they started with.
    ///
    /// # Panics
    ///
    /// If the lock has been poisoned.
    pub fn set_nameservers(&self, nameservers: Vec<Nameserver>) {
        *self.nameservers.write().expect("nameserver lock poisoned") = nameservers;
    }

    /// Addresses for a host name: the results of an A query followed
    /// by an AAAA query.
    pub async fn resolve_host(&self, name: &str) -> Result<Vec<IpAddr>, Error> {
        let mut addresses: Vec<IpAddr> = self
            .resolve_host_v4(name)
            .await?
            .into_iter()
            .map(IpAddr::V4)
            .collect();
        addresses.extend(self.resolve_host_v6(name).await?.into_iter().map(IpAddr::V6));
        Ok(addresses)
    }

    pub async fn resolve_host_v4(&self, name: &str) -> Result<Vec<Ipv4Addr>, Error> {
        let name = self.complete_short_name(parse_host_argument(name)?);
        let question = Question::new(name, QueryType::Record(RecordType::A));
        let mut addresses = Vec::new();
        if let Some(response) = self.resolve_query(&question).await {
            for rr in &response.answers {
                if let RecordTypeWithData::A { address } = rr.rtype_with_data {
                    addresses.push(address);
                }
            }
        }
        Ok(addresses)
    }

    pub async fn resolve_host_v6(&self, name: &str) -> Result<Vec<Ipv6Addr>, Error> {
        let name = self.complete_short_name(parse_host_argument(name)?);
        let question = Question::new(name, QueryType::Record(RecordType::AAAA));
        let mut addresses = Vec::new();
        if let Some(response) = self.resolve_query(&question).await {
            for rr in &response.answers {
                if let RecordTypeWithData::AAAA { address } = rr.rtype_with_data {
                    addresses.push(address);
                }
            }
        }
        Ok(addresses)
    }

    /// Complete a bare single-label name with the search suffix the
    /// nameserver discovery recorded, when there is one.
    fn complete_short_name(&self, name: DomainName) -> DomainName {
        if name.labels.len() == 2 {
            let suffix = self
                .nameservers()
                .into_iter()
                .find_map(|ns| ns.search_suffix);
            if let Some(suffix) = suffix {
                return name.with_default_suffix(&suffix);
            }
        }
        name
    }

    /// The host name an address reverse-maps to, via a PTR query on
    /// the `in-addr.arpa` / `ip6.arpa` owner.
    pub async fn resolve_ip(&self, address: IpAddr) -> Option<DomainName> {
        match self.resolve_ip_record(address).await?.rtype_with_data {
            RecordTypeWithData::PTR { ptrdname } => Some(ptrdname),
            _ => None,
        }
    }

    /// Like `resolve_ip`, but handing back the whole PTR record.
    pub async fn resolve_ip_record(&self, address: IpAddr) -> Option<ResourceRecord> {
        let question = Question::new(
            DomainName::from_ip(address),
            QueryType::Record(RecordType::PTR),
        );
        let response = self.resolve_query(&question).await?;
        response
            .answers
            .into_iter()
            .find(|rr| rr.rtype() == RecordType::PTR)
    }

    /// The resolution primitive: the first usable response from the
    /// configured nameservers, or nothing.
    pub async fn resolve_query(&self, question: &Question) -> Option<Message> {
        let nameservers = self.nameservers();
        self.resolve_against(question, &nameservers, 0)
            .instrument(tracing::debug_span!("resolve_query", %question))
            .await
    }

    #[async_recursion]
    async fn resolve_against(
        &self,
        question: &Question,
        nameservers: &[Nameserver],
        depth: usize,
    ) -> Option<Message> {
        if depth >= RECURSION_LIMIT {
            tracing::debug!("hit recursion limit");
            return None;
        }

        let cached = self.cache.search(&question.name, question.qtype);
        if !cached.is_empty() {
            tracing::trace!("cache hit");
            return Some(synthesise_response(question, cached));
        }

        let sockets = CallSockets::bind().await;
        let private_question = is_private_question(question);

        for nameserver in nameservers {
            if private_question && !is_private_address(nameserver.address) {
                tracing::debug!(
                    address = %nameserver.address,
                    "not leaking private question to public nameserver"
                );
                continue;
            }

            let Some(response) = self
                .exchange(&sockets, nameserver, question)
                .instrument(tracing::debug_span!("exchange", address = %nameserver.address))
                .await
            else {
                continue;
            };

            match response.header.rcode {
                Rcode::NoError => (),
                // a definitive no, in the legacy plain-NXDOMAIN shape
                Rcode::NameError => return Some(response),
                _ => continue,
            }

            self.cache.store_all(&response.answers);
            self.cache.store_all(&response.authority);
            self.cache.store_all(&response.additional);

            let matches_answer = response
                .answers
                .iter()
                .any(|rr| rr.rtype_with_data.matches(question.qtype));
            let matches_additional = response
                .additional
                .iter()
                .any(|rr| rr.matches(question));
            if matches_answer || matches_additional {
                return Some(response);
            }

            if let Some(cname) = first_cname(&response.answers) {
                tracing::trace!(target = %cname, "chasing CNAME");
                let mut chased = question.clone();
                chased.name = cname;
                return self.resolve_against(&chased, nameservers, depth + 1).await;
            }

            if !response.header.recursion_available
                && response.answers.is_empty()
                && !response.authority.is_empty()
            {
                let delegated = self
                    .delegation_nameservers(&response, nameserver, depth)
                    .await;
                if !delegated.is_empty() {
                    tracing::trace!(count = %delegated.len(), "following delegation");
                    return self.resolve_against(question, &delegated, depth + 1).await;
                }
            }
        }

        tracing::trace!("out of nameservers");
        None
    }

    /// One request/response exchange with one nameserver, over the
    /// transport the resolution mode picks.
    async fn exchange(
        &self,
        sockets: &CallSockets,
        nameserver: &Nameserver,
        question: &Question,
    ) -> Option<Message> {
        match self.mode {
            ResolutionMode::InsecureOnly => {
                self.query_udp(sockets, nameserver.address, question).await
            }
            ResolutionMode::SecureOnly => self.query_doh(nameserver.address, question).await,
            ResolutionMode::SecureWithFallback => {
                if nameserver.doh != DohSupport::No {
                    if let Some(response) = self.query_doh(nameserver.address, question).await {
                        return Some(response);
                    }
                }
                self.query_udp(sockets, nameserver.address, question).await
            }
        }
    }

    /// A single-shot UDP exchange: one datagram out, one in, within
    /// the attempt timeout.
    async fn query_udp(
        &self,
        sockets: &CallSockets,
        address: IpAddr,
        question: &Question,
    ) -> Option<Message> {
        let request = Message::query(rand::thread_rng().gen(), question.clone());
        let wire = match request.to_octets() {
            Ok(wire) => wire,
            Err(error) => {
                tracing::warn!(%error, "could not serialise query");
                return None;
            }
        };

        let socket = sockets.for_address(address)?;
        let target = SocketAddr::new(address, self.port);

        let response = timeout(ATTEMPT_TIMEOUT, async {
            socket.send_to(&wire, target).await.ok()?;
            let mut buffer = self.pool.acquire();
            let (received, _) = socket.recv_from(&mut buffer[..]).await.ok()?;
            Message::from_octets(&buffer[..received]).ok()
        })
        .await
        .ok()
        .flatten()?;

        response_matches_request(&request, &response).then_some(response)
    }

    /// POST the wire format over HTTPS, per RFC 8484.  The body
    /// carries transaction id zero so responses are cacheable.
    async fn query_doh(&self, address: IpAddr, question: &Question) -> Option<Message> {
        let request = Message::query(0, question.clone());
        let wire = request.to_octets().ok()?;

        let host = match address {
            IpAddr::V4(ip) => ip.to_string(),
            IpAddr::V6(ip) => format!("[{ip}]"),
        };
        let url = format!("https://{host}/dns-query");

        let http_response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/dns-message")
            .header(reqwest::header::ACCEPT, "application/dns-message")
            .body(wire.freeze())
            .send()
            .await
            .ok()?;

        if !http_response.status().is_success() {
            tracing::debug!(status = %http_response.status(), "DoH request failed");
            return None;
        }

        let body = http_response.bytes().await.ok()?;
        let response = Message::from_octets(&body).ok()?;
        response_matches_request(&request, &response).then_some(response)
    }

    /// Turn a delegation response into the next nameserver set: each
    /// NS name resolved from glue of the current server's address
    /// family, else from the cache, else by a nested lookup.
    async fn delegation_nameservers(
        &self,
        response: &Message,
        current: &Nameserver,
        depth: usize,
    ) -> Vec<Nameserver> {
        let want_v4 = current.address.is_ipv4();
        let rtype = if want_v4 {
            RecordType::A
        } else {
            RecordType::AAAA
        };

        let mut delegated = Vec::new();
        for rr in &response.authority {
            let RecordTypeWithData::NS { nsdname } = &rr.rtype_with_data else {
                continue;
            };

            let glue = response.additional.iter().find_map(|ad| {
                if ad.name != *nsdname {
                    return None;
                }
                match ad.rtype_with_data {
                    RecordTypeWithData::A { address } if want_v4 => Some(IpAddr::V4(address)),
                    RecordTypeWithData::AAAA { address } if !want_v4 => Some(IpAddr::V6(address)),
                    _ => None,
                }
            });

            let address = match glue {
                Some(address) => Some(address),
                None => self.nameserver_address(nsdname, rtype, depth).await,
            };

            if let Some(address) = address {
                let nameserver = Nameserver::new(address);
                if !delegated.contains(&nameserver) {
                    delegated.push(nameserver);
                }
            }
        }

        delegated
    }

    /// A nameserver's address from the cache, or by a nested
    /// resolution sharing this call's depth budget.
    async fn nameserver_address(
        &self,
        name: &DomainName,
        rtype: RecordType,
        depth: usize,
    ) -> Option<IpAddr> {
        let cached = self.cache.search(name, QueryType::Record(rtype));
        if let Some(address) = first_address(&cached) {
            return Some(address);
        }

        let question = Question::new(name.clone(), QueryType::Record(rtype));
        let nameservers = self.nameservers();
        let response = self
            .resolve_against(&question, &nameservers, depth + 1)
            .await?;
        first_address(&response.answers)
    }
}

/// A question is private when it could only sensibly be answered
/// on-link: its terminal label is `local`, or it is a bare
/// single-label name.
pub fn is_private_question(question: &Question) -> bool {
    match question.name.terminal_label() {
        Some(label) => label.eq_ignore_case(b"local") || question.name.labels.len() == 2,
        None => false,
    }
}

/// The UDP sockets for one `resolve_query` call, bound once and
/// released when the call returns.
struct CallSockets {
    v4: Option<UdpSocket>,
    v6: Option<UdpSocket>,
}

impl CallSockets {
    async fn bind() -> Self {
        Self {
            v4: UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await.ok(),
            v6: UdpSocket::bind((Ipv6Addr::UNSPECIFIED, 0)).await.ok(),
        }
    }

    fn for_address(&self, address: IpAddr) -> Option<&UdpSocket> {
        match address {
            IpAddr::V4(_) => self.v4.as_ref(),
            IpAddr::V6(_) => self.v6.as_ref(),
        }
    }
}

fn parse_host_argument(name: &str) -> Result<DomainName, Error> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput);
    }
    DomainName::parse(name).ok_or(Error::InvalidInput)
}

/// Pretend the cache is a nameserver that just responded.
fn synthesise_response(question: &Question, rrs: Vec<ResourceRecord>) -> Message {
    let mut response = Message::query(0, question.clone()).make_response();
    response.answers = rrs;
    response
}

fn first_cname(rrs: &[ResourceRecord]) -> Option<DomainName> {
    rrs.iter().find_map(|rr| match &rr.rtype_with_data {
        RecordTypeWithData::CNAME { cname } => Some(cname.clone()),
        _ => None,
    })
}

fn first_address(rrs: &[ResourceRecord]) -> Option<IpAddr> {
    rrs.iter().find_map(|rr| match rr.rtype_with_data {
        RecordTypeWithData::A { address } => Some(IpAddr::V4(address)),
        RecordTypeWithData::AAAA { address } => Some(IpAddr::V6(address)),
        _ => None,
    })
}

/// Very basic validation that a nameserver response matches a
/// request: same id, same questions, actually a response, an rcode
/// this resolver handles.  Truncated messages never get here - the
/// codec refuses to parse them.
fn response_matches_request(request: &Message, response: &Message) -> bool {
    if request.header.id != response.header.id {
        return false;
    }
    if !response.header.is_response {
        return false;
    }
    if request.header.opcode != response.header.opcode {
        return false;
    }
    if request.questions != response.questions {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use beacon_types::protocol::types::test_util::*;
    use std::net::SocketAddr;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn private_question_detection() {
        for private in ["printer.local.", "NAS.LOCAL.", "printer."] {
            assert!(
                is_private_question(&question(private, QueryType::Record(RecordType::A))),
                "{private} should be private"
            );
        }

        for public in ["example.com.", "local.example.com.", "."] {
            assert!(
                !is_private_question(&question(public, QueryType::Record(RecordType::A))),
                "{public} should be public"
            );
        }
    }

    #[test]
    fn response_matching() {
        let request = Message::query(1234, question("example.com.", QueryType::Record(RecordType::A)));
        let mut response = request.make_response();
        assert!(response_matches_request(&request, &response));

        response.header.id = 4321;
        assert!(!response_matches_request(&request, &response));

        let mut response = request.make_response();
        response.header.is_response = false;
        assert!(!response_matches_request(&request, &response));

        let mut response = request.make_response();
        response.questions = vec![question("example.org.", QueryType::Record(RecordType::A))];
        assert!(!response_matches_request(&request, &response));
    }

    #[test]
    fn empty_arguments_are_invalid() {
        assert_eq!(Err(Error::InvalidInput), parse_host_argument(""));
        assert_eq!(Err(Error::InvalidInput), parse_host_argument("   "));
        assert_eq!(Err(Error::InvalidInput), parse_host_argument("a..b"));
        assert!(parse_host_argument("example.com").is_ok());
    }

    #[test]
    fn short_names_get_the_search_suffix() {
        let mut nameserver = Nameserver::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)));
        nameserver.search_suffix = Some(domain("lan.example."));
        let resolver =
            Resolver::with_nameservers(vec![nameserver], ResolutionMode::InsecureOnly);

        assert_eq!(
            domain("nas.lan.example."),
            resolver.complete_short_name(domain("nas."))
        );
        assert_eq!(
            domain("nas.other.example."),
            resolver.complete_short_name(domain("nas.other.example."))
        );
    }

    #[tokio::test]
    async fn private_question_never_reaches_public_nameserver() {
        // a resolver pointed only at a public server answers private
        // questions with silence, without any datagram on the wire
        let resolver = Resolver::with_nameservers(
            crate::nameserver::google(),
            ResolutionMode::InsecureOnly,
        );

        let response = resolver
            .resolve_query(&question("printer.local.", QueryType::Record(RecordType::A)))
            .await;

        assert_eq!(None, response);
    }

    #[tokio::test]
    async fn cache_hit_synthesises_response() {
        let resolver =
            Resolver::with_nameservers(Vec::new(), ResolutionMode::InsecureOnly);
        let rr = a_record("host.example.com.", Ipv4Addr::new(192, 0, 2, 1));
        resolver.cache.store(&rr);

        let response = resolver
            .resolve_query(&question(
                "host.example.com.",
                QueryType::Record(RecordType::A),
            ))
            .await
            .unwrap();

        assert!(response.header.is_response);
        assert_eq!(vec![rr], response.answers);
    }

    #[tokio::test]
    async fn depth_limit_gives_up() {
        let resolver =
            Resolver::with_nameservers(Vec::new(), ResolutionMode::InsecureOnly);
        let q = question("example.com.", QueryType::Record(RecordType::A));
        assert_eq!(
            None,
            resolver
                .resolve_against(&q, &resolver.nameservers(), RECURSION_LIMIT)
                .await
        );
    }

    /// A tiny scripted nameserver: answers each incoming question
    /// from a fixed table, echoing the request id.
    async fn spawn_mock_nameserver(
        answers: Vec<(Question, Vec<ResourceRecord>)>,
    ) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let address = socket.local_addr().unwrap();
        let socket = Arc::new(socket);

        let handle = tokio::spawn(async move {
            let mut buffer = [0_u8; 512];
            loop {
                let Ok((received, from)) = socket.recv_from(&mut buffer).await else {
                    return;
                };
                let Ok(request) = Message::from_octets(&buffer[..received]) else {
                    continue;
                };

                let mut response = request.make_response();
                response.header.recursion_available = true;
                for (q, rrs) in &answers {
                    if request.questions.first() == Some(q) {
                        response.answers = rrs.clone();
                    }
                }

                let wire = response.to_octets().unwrap();
                let _ = socket.send_to(&wire, from).await;
            }
        });

        (address, handle)
    }

    #[tokio::test]
    async fn cname_chase_returns_final_answer() {
        let q_first = question("a.test.", QueryType::Record(RecordType::A));
        let q_target = question("b.test.", QueryType::Record(RecordType::A));
        let final_rr = a_record("b.test.", Ipv4Addr::new(192, 0, 2, 80));

        let (address, server) = spawn_mock_nameserver(vec![
            (q_first.clone(), vec![cname_record("a.test.", "b.test.")]),
            (q_target, vec![final_rr.clone()]),
        ])
        .await;

        let mut resolver = Resolver::with_nameservers(
            vec![Nameserver::new(address.ip())],
            ResolutionMode::InsecureOnly,
        );
        resolver.set_upstream_port(address.port());

        let response = resolver.resolve_query(&q_first).await.unwrap();
        assert_eq!(vec![final_rr], response.answers);

        server.abort();
    }

    #[tokio::test]
    async fn name_error_is_returned_to_caller() {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let address = socket.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let mut buffer = [0_u8; 512];
            let Ok((received, from)) = socket.recv_from(&mut buffer).await else {
                return;
            };
            let request = Message::from_octets(&buffer[..received]).unwrap();
            let mut response = request.make_response();
            response.header.rcode = Rcode::NameError;
            let _ = socket
                .send_to(&response.to_octets().unwrap(), from)
                .await;
        });

        let mut resolver = Resolver::with_nameservers(
            vec![Nameserver::new(address.ip())],
            ResolutionMode::InsecureOnly,
        );
        resolver.set_upstream_port(address.port());

        let response = resolver
            .resolve_query(&question("missing.test.", QueryType::Record(RecordType::A)))
            .await
            .unwrap();
        assert_eq!(Rcode::NameError, response.header.rcode);

        server.abort();
    }
}
