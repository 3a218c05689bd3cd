//! The multicast DNS client: listeners on the well-known group for
//! both address families, a sender per eligible interface address,
//! known-answer suppression, DNS-SD query helpers, and cache-driven
//! refresh of service records.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use beacon_types::protocol::types::*;

use crate::cache::SharedCache;
use crate::dedup::RecentMessageWindow;
use crate::event::{CacheEvent, ClientEvent};
use crate::pool::{BufferPool, SEND_BUFFER_LEN};

/// The well-known multicast DNS port.
pub const MDNS_PORT: u16 = 5353;

/// The IPv4 link-local multicast group.
pub const MDNS_GROUP_V4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// The IPv6 link-local multicast group.
pub const MDNS_GROUP_V6: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb);

/// Pause between sends on successive interfaces, to spread bursts.
pub const SEND_PAUSE: Duration = Duration::from_millis(5);

/// How long `resolve_query` and friends wait for answers.
pub const ANSWER_WAIT: Duration = Duration::from_secs(3);

/// Whether the platform honours the unicast-response bit reliably.
/// Where it does not, the client masks the bit off outgoing
/// questions.
pub const UNICAST_SUPPORTED: bool = cfg!(not(target_os = "windows"));

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Errors surfaced by the public entry points; everything
/// network-shaped goes to the error event instead.
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

struct SenderSocket {
    socket: UdpSocket,
    v6: bool,
}

impl SenderSocket {
    fn group(&self) -> SocketAddr {
        if self.v6 {
            SocketAddr::new(IpAddr::V6(MDNS_GROUP_V6), MDNS_PORT)
        } else {
            SocketAddr::new(IpAddr::V4(MDNS_GROUP_V4), MDNS_PORT)
        }
    }
}

/// A multicast DNS client and DNS-SD browser.
///
/// `start` joins the multicast groups and begins listening;
/// queries go out through every eligible interface.  Received answers
/// land in the passive cache and are re-broadcast to subscribers as
/// events.  Dropping the client stops everything.
pub struct MulticastClient {
    cache: SharedCache,
    events: broadcast::Sender<ClientEvent>,
    shutdown: watch::Sender<bool>,
    senders: Arc<Mutex<Vec<Arc<SenderSocket>>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    window: Arc<Mutex<RecentMessageWindow>>,
    send_pool: BufferPool,
    recv_pool: BufferPool,
    unicast_supported: bool,
}

impl MulticastClient {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown, _) = watch::channel(false);

        Self {
            cache: SharedCache::new(),
            events,
            shutdown,
            senders: Arc::new(Mutex::new(Vec::new())),
            tasks: Mutex::new(Vec::new()),
            window: Arc::new(Mutex::new(RecentMessageWindow::new())),
            send_pool: BufferPool::new(SEND_BUFFER_LEN),
            recv_pool: BufferPool::new(MDNS_BUFFER_LEN_V4),
            unicast_supported: UNICAST_SUPPORTED,
        }
    }

    /// The passive cache this client maintains.
    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Subscribe to answer, query, and error events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Bind the group listeners, open a sender per eligible interface
    /// address, and spawn the receive loops, the cache curator, and
    /// the refresh handler.
    ///
    /// # Errors
    ///
    /// If neither listener socket can be bound.
    pub fn start(&self) -> std::io::Result<()> {
        let mut tasks = self.tasks.lock().expect("task list poisoned");
        if !tasks.is_empty() {
            return Ok(());
        }

        let interfaces = eligible_interfaces();

        let listener_v4 = bind_listener_v4(&interfaces);
        let listener_v6 = bind_listener_v6(&interfaces);
        if let (Err(error), Err(_)) = (&listener_v4, &listener_v6) {
            return Err(std::io::Error::new(error.kind(), error.to_string()));
        }

        if let Ok(listener) = listener_v4 {
            tasks.push(self.spawn_receive_loop(listener, MDNS_BUFFER_LEN_V4));
        }
        if let Ok(listener) = listener_v6 {
            tasks.push(self.spawn_receive_loop(listener, MDNS_BUFFER_LEN_V6));
        }

        {
            let mut senders = self.senders.lock().expect("sender list poisoned");
            for interface in &interfaces {
                match &interface.addr {
                    if_addrs::IfAddr::V4(ifv4) => match bind_sender_v4(ifv4.ip) {
                        Ok(socket) => senders.push(Arc::new(SenderSocket {
                            socket,
                            v6: false,
                        })),
                        Err(error) => {
                            tracing::debug!(address = %ifv4.ip, ?error, "skipping sender");
                        }
                    },
                    if_addrs::IfAddr::V6(ifv6) => {
                        if !is_unicast_link_local(ifv6.ip) {
                            continue;
                        }
                        let index = interface.index.unwrap_or(0);
                        match bind_sender_v6(ifv6.ip, index) {
                            Ok(socket) => {
                                senders.push(Arc::new(SenderSocket { socket, v6: true }));
                            }
                            Err(error) => {
                                tracing::debug!(address = %ifv6.ip, ?error, "skipping sender");
                            }
                        }
                    }
                }
            }
            tracing::debug!(count = %senders.len(), "multicast senders bound");
        }

        let (cache_events_tx, cache_events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tasks.push(
            self.cache
                .spawn_curator(cache_events_tx, self.shutdown.subscribe()),
        );
        tasks.push(self.spawn_refresh_loop(cache_events_rx));

        Ok(())
    }

    /// Cancel the receive loops and the curator, close the listener
    /// sockets, and drop the senders.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
        self.senders.lock().expect("sender list poisoned").clear();
        for task in self.tasks.lock().expect("task list poisoned").drain(..) {
            task.abort();
        }
    }

    /// Serialise and send a query out of every sender, pausing
    /// between interfaces.  The transaction id is forced to zero and
    /// the unicast-response bit is masked off where the platform
    /// cannot honour it.
    pub async fn send_query(&self, mut message: Message) {
        message.header.id = 0;
        message.header.recursion_desired = false;
        message.header.recursion_available = false;
        apply_unicast_capability(&mut message, self.unicast_supported);

        let senders = self
            .senders
            .lock()
            .expect("sender list poisoned")
            .clone();
        transmit(&senders, &self.send_pool, &self.events, &message).await;
    }

    /// Enumerate services on the network: a PTR query for the DNS-SD
    /// service-enumeration name, with known answers attached.
    pub async fn query_services(&self, domain: &str, unicast: bool) -> Result<(), Error> {
        let message = self.build_services_query(domain, unicast)?;
        self.send_query(message).await;
        Ok(())
    }

    /// A PTR query for one service type, with known answers attached.
    pub async fn query_service(
        &self,
        service: &str,
        domain: &str,
        unicast: bool,
    ) -> Result<(), Error> {
        let message = self.build_service_query(service, domain, unicast)?;
        self.send_query(message).await;
        Ok(())
    }

    /// Query a fully-qualified service instance for the given record
    /// types.  When the cache already holds confident answers for
    /// every requested type, a synthetic response is returned and
    /// nothing goes on the wire.
    pub async fn query_service_instance(
        &self,
        instance: &str,
        service: &str,
        domain: &str,
        rtypes: &[RecordType],
    ) -> Result<Option<Message>, Error> {
        let name = instance_name(instance, service, domain)?;

        let known = known_answers(&self.cache, &name, rtypes);
        let satisfied = !rtypes.is_empty()
            && rtypes
                .iter()
                .all(|rtype| known.iter().any(|rr| rr.rtype() == *rtype));
        if satisfied {
            let question = Question::new(name, QueryType::Wildcard);
            let mut response = Message::mdns_query(question).make_response();
            response.answers = known;
            return Ok(Some(response));
        }

        for rtype in rtypes {
            let mut question = Question::new(name.clone(), QueryType::Record(*rtype));
            question.unicast_response = true;
            let mut message = Message::mdns_query(question);
            message.answers = known_answers(&self.cache, &name, &[*rtype]);
            self.send_query(message).await;
        }

        Ok(None)
    }

    /// Query a service instance and wait up to the answer window for
    /// its SRV record to arrive.
    pub async fn resolve_service_instance(
        &self,
        instance: &str,
        service: &str,
        domain: &str,
    ) -> Result<Option<Message>, Error> {
        let name = instance_name(instance, service, domain)?;
        let rtypes = [
            RecordType::SRV,
            RecordType::TXT,
            RecordType::A,
            RecordType::AAAA,
        ];

        let mut subscription = self.events.subscribe();
        if let Some(synthetic) = self
            .query_service_instance(instance, service, domain, &rtypes)
            .await?
        {
            return Ok(Some(synthetic));
        }

        Ok(await_answer(&mut subscription, |message| {
            message
                .answers
                .iter()
                .any(|rr| rr.name == name && rr.rtype() == RecordType::SRV)
        })
        .await)
    }

    /// The multicast analogue of the unicast primitive: issue the
    /// question, wait up to the answer window for a matching
    /// response, and detach.
    pub async fn resolve_query(&self, question: Question) -> Option<Message> {
        let cached = self.cache.search(&question.name, question.qtype);
        if !cached.is_empty() {
            let mut response = Message::mdns_query(question).make_response();
            response.answers = cached;
            return Some(response);
        }

        let mut subscription = self.events.subscribe();

        let mut outgoing = question.clone();
        outgoing.unicast_response = true;
        self.send_query(Message::mdns_query(outgoing)).await;

        await_answer(&mut subscription, move |message| {
            message
                .answers
                .iter()
                .chain(message.additional.iter())
                .any(|rr| rr.matches(&question))
        })
        .await
    }

    /// Reverse lookup over multicast.
    pub async fn resolve_inverse_query(&self, address: IpAddr) -> Option<Message> {
        let question = Question::new(
            DomainName::from_ip(address),
            QueryType::Record(RecordType::PTR),
        );
        self.resolve_query(question).await
    }

    /// Addresses for a host name on the local link.  A bare name gets
    /// the `local` suffix attached.
    pub async fn resolve_host(&self, name: &str) -> Result<Vec<IpAddr>, Error> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput);
        }
        let name = DomainName::parse(name)
            .ok_or(Error::InvalidInput)?
            .with_default_suffix(&local_domain());

        let mut addresses = Vec::new();
        for rtype in [RecordType::A, RecordType::AAAA] {
            let question = Question::new(name.clone(), QueryType::Record(rtype));
            if let Some(response) = self.resolve_query(question).await {
                for rr in response.answers.iter().chain(response.additional.iter()) {
                    match rr.rtype_with_data {
                        RecordTypeWithData::A { address } => {
                            addresses.push(IpAddr::V4(address));
                        }
                        RecordTypeWithData::AAAA { address } => {
                            addresses.push(IpAddr::V6(address));
                        }
                        _ => (),
                    }
                }
            }
        }

        Ok(addresses)
    }

    /// The name an address reverse-maps to on the local link.
    pub async fn resolve_ip(&self, address: IpAddr) -> Option<DomainName> {
        let response = self.resolve_inverse_query(address).await?;
        response
            .answers
            .into_iter()
            .find_map(|rr| match rr.rtype_with_data {
                RecordTypeWithData::PTR { ptrdname } => Some(ptrdname),
                _ => None,
            })
    }

    fn build_services_query(&self, domain: &str, unicast: bool) -> Result<Message, Error> {
        if domain.trim().is_empty() {
            return Err(Error::InvalidInput);
        }
        let name = DomainName::parse(&format!("_services._dns-sd._udp.{domain}"))
            .ok_or(Error::InvalidInput)?;
        Ok(self.build_ptr_query(name, unicast))
    }

    fn build_service_query(
        &self,
        service: &str,
        domain: &str,
        unicast: bool,
    ) -> Result<Message, Error> {
        if service.trim().is_empty() || domain.trim().is_empty() {
            return Err(Error::InvalidInput);
        }
        let name =
            DomainName::parse(&format!("{service}.{domain}")).ok_or(Error::InvalidInput)?;
        Ok(self.build_ptr_query(name, unicast))
    }

    fn build_ptr_query(&self, name: DomainName, unicast: bool) -> Message {
        let mut question = Question::new(name.clone(), QueryType::Record(RecordType::PTR));
        question.unicast_response = unicast;
        let mut message = Message::mdns_query(question);
        message.answers = known_answers(&self.cache, &name, &[RecordType::PTR]);
        message
    }

    fn spawn_receive_loop(&self, listener: UdpSocket, datagram_len: usize) -> JoinHandle<()> {
        let cache = self.cache.clone();
        let events = self.events.clone();
        let window = Arc::clone(&self.window);
        let recv_pool = self.recv_pool.clone();
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            loop {
                let mut buffer = recv_pool.acquire();
                tokio::select! {
                    _ = shutdown.changed() => return,
                    result = listener.recv_from(&mut buffer[..datagram_len]) => match result {
                        Ok((received, from)) => {
                            handle_datagram(&cache, &window, &events, &buffer[..received], from);
                        }
                        Err(error) => {
                            let _ = events.send(ClientEvent::Error {
                                from: None,
                                error: error.to_string(),
                            });
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
            }
        })
    }

    /// Consume curator events; when live service records near expiry,
    /// re-query so they stay fresh without caller involvement.
    fn spawn_refresh_loop(&self, mut cache_events: mpsc::Receiver<CacheEvent>) -> JoinHandle<()> {
        let senders = Arc::clone(&self.senders);
        let send_pool = self.send_pool.clone();
        let events = self.events.clone();
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => return,
                    event = cache_events.recv() => match event {
                        None => return,
                        Some(CacheEvent::Expired { .. }) => (),
                        Some(CacheEvent::RefreshDue { name, rtypes }) => {
                            let is_service = rtypes.contains(&RecordType::SRV)
                                || rtypes.contains(&RecordType::TXT);
                            if !is_service || ServiceInstance::from_name(&name).is_none() {
                                continue;
                            }

                            tracing::debug!(%name, "refreshing service records");
                            let snapshot =
                                senders.lock().expect("sender list poisoned").clone();
                            for rtype in [
                                RecordType::SRV,
                                RecordType::A,
                                RecordType::AAAA,
                                RecordType::TXT,
                            ] {
                                let question =
                                    Question::new(name.clone(), QueryType::Record(rtype));
                                let message = Message::mdns_query(question);
                                transmit(&snapshot, &send_pool, &events, &message).await;
                            }
                        }
                    }
                }
            }
        })
    }
}

impl Default for MulticastClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MulticastClient {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Process one received datagram: wrong-port and duplicate datagrams
/// are dropped, parse failures are swallowed, responses feed the
/// cache, and queries are surfaced for anyone interested.
fn handle_datagram(
    cache: &SharedCache,
    window: &Mutex<RecentMessageWindow>,
    events: &broadcast::Sender<ClientEvent>,
    datagram: &[u8],
    from: SocketAddr,
) {
    if from.port() != MDNS_PORT {
        tracing::trace!(%from, "dropping datagram from non-mDNS source port");
        return;
    }

    let message = match Message::from_octets(datagram) {
        Ok(message) => message,
        Err(error) => {
            tracing::trace!(%from, %error, "dropping unparseable datagram");
            return;
        }
    };

    if window
        .lock()
        .expect("dedup window poisoned")
        .seen_recently(&message, from)
    {
        tracing::trace!(%from, "dropping duplicate datagram");
        return;
    }

    if message.header.is_response {
        if message.header.rcode != Rcode::NoError {
            return;
        }
        if message.answers.is_empty() && message.additional.is_empty() {
            return;
        }

        let mut added = Vec::new();
        let mut updated = Vec::new();
        for rr in message.answers.iter().chain(message.additional.iter()) {
            match cache.store(rr) {
                crate::cache::StoreOutcome::NewData => added.push(rr.clone()),
                crate::cache::StoreOutcome::Update => updated.push(rr.clone()),
                crate::cache::StoreOutcome::NoUpdate => (),
            }
        }

        let _ = events.send(ClientEvent::Answer {
            from,
            message,
            added,
            updated,
        });
    } else if !message.questions.is_empty() {
        let _ = events.send(ClientEvent::Query { from, message });
    }
}

/// Send one serialised message from every sender socket to its
/// family's group, with the inter-send pause.
async fn transmit(
    senders: &[Arc<SenderSocket>],
    pool: &BufferPool,
    events: &broadcast::Sender<ClientEvent>,
    message: &Message,
) {
    let wire = match message.to_octets() {
        Ok(wire) => wire,
        Err(error) => {
            let _ = events.send(ClientEvent::Error {
                from: None,
                error: error.to_string(),
            });
            return;
        }
    };

    let mut buffer = pool.acquire();
    buffer.clear();
    buffer.extend_from_slice(&wire);

    let mut first = true;
    for sender in senders {
        if !first {
            tokio::time::sleep(SEND_PAUSE).await;
        }
        first = false;

        if let Err(error) = sender.socket.send_to(&buffer, sender.group()).await {
            let _ = events.send(ClientEvent::Error {
                from: None,
                error: error.to_string(),
            });
        }
    }
}

/// Wait up to `ANSWER_WAIT` for an answer event the predicate
/// accepts.  Dropping the receiver on return is what detaches the
/// ephemeral subscription.
async fn await_answer<F>(
    subscription: &mut broadcast::Receiver<ClientEvent>,
    accept: F,
) -> Option<Message>
where
    F: Fn(&Message) -> bool,
{
    let deadline = Instant::now() + ANSWER_WAIT;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }

        match timeout(remaining, subscription.recv()).await {
            Ok(Ok(ClientEvent::Answer { message, .. })) if accept(&message) => {
                return Some(message);
            }
            Ok(Ok(_)) | Ok(Err(broadcast::error::RecvError::Lagged(_))) => (),
            Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return None,
        }
    }
}

/// Clear the unicast-response bit when the platform cannot honour it.
fn apply_unicast_capability(message: &mut Message, supported: bool) {
    if !supported {
        for question in &mut message.questions {
            question.unicast_response = false;
        }
    }
}

fn known_answers(
    cache: &SharedCache,
    name: &DomainName,
    rtypes: &[RecordType],
) -> Vec<ResourceRecord> {
    let now = Instant::now();
    cache
        .known_answers(name, rtypes)
        .into_iter()
        .map(|mut rr| {
            rr.ttl = rr.remaining_ttl(now);
            rr
        })
        .collect()
}

fn instance_name(instance: &str, service: &str, domain: &str) -> Result<DomainName, Error> {
    if instance.trim().is_empty() || service.trim().is_empty() || domain.trim().is_empty() {
        return Err(Error::InvalidInput);
    }

    let service_name = DomainName::parse(service).ok_or(Error::InvalidInput)?;
    if service_name.labels.len() != 3 {
        return Err(Error::InvalidInput);
    }
    let domain_name = DomainName::parse(domain).ok_or(Error::InvalidInput)?;

    let parts = ServiceInstance {
        instance: Label::from_text(instance.as_bytes()),
        service: service_name.labels[0].clone(),
        protocol: service_name.labels[1].clone(),
        domain: domain_name,
    };
    parts.to_name().ok_or(Error::InvalidInput)
}

fn local_domain() -> DomainName {
    DomainName::parse("local.").expect("static name parses")
}

fn eligible_interfaces() -> Vec<if_addrs::Interface> {
    match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces
            .into_iter()
            .filter(|interface| !interface.is_loopback())
            .collect(),
        Err(error) => {
            tracing::warn!(?error, "could not enumerate interfaces");
            Vec::new()
        }
    }
}

fn is_unicast_link_local(address: Ipv6Addr) -> bool {
    address.segments()[0] & 0xffc0 == 0xfe80
}

fn bind_listener_v4(interfaces: &[if_addrs::Interface]) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.bind(&SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), MDNS_PORT).into())?;

    let mut joined = false;
    for interface in interfaces {
        if let if_addrs::IfAddr::V4(ifv4) = &interface.addr {
            match socket.join_multicast_v4(&MDNS_GROUP_V4, &ifv4.ip) {
                Ok(()) => joined = true,
                Err(error) => {
                    tracing::debug!(address = %ifv4.ip, ?error, "multicast join failed");
                }
            }
        }
    }
    if !joined {
        socket.join_multicast_v4(&MDNS_GROUP_V4, &Ipv4Addr::UNSPECIFIED)?;
    }

    let _ = socket.set_multicast_loop_v4(false);
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}

fn bind_listener_v6(interfaces: &[if_addrs::Interface]) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_only_v6(true)?;
    socket.bind(&SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), MDNS_PORT).into())?;

    let mut joined = false;
    for interface in interfaces {
        if let if_addrs::IfAddr::V6(ifv6) = &interface.addr {
            if !is_unicast_link_local(ifv6.ip) {
                continue;
            }
            let index = interface.index.unwrap_or(0);
            match socket.join_multicast_v6(&MDNS_GROUP_V6, index) {
                Ok(()) => joined = true,
                Err(error) => {
                    tracing::debug!(address = %ifv6.ip, ?error, "multicast join failed");
                }
            }
        }
    }
    if !joined {
        socket.join_multicast_v6(&MDNS_GROUP_V6, 0)?;
    }

    let _ = socket.set_multicast_loop_v6(false);
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}

fn bind_sender_v4(address: Ipv4Addr) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.bind(&SocketAddr::new(IpAddr::V4(address), MDNS_PORT).into())?;
    socket.set_multicast_if_v4(&address)?;
    let _ = socket.set_multicast_loop_v4(false);
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}

fn bind_sender_v6(address: Ipv6Addr, index: u32) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_only_v6(true)?;
    socket.bind(&SocketAddrV6::new(address, MDNS_PORT, 0, index).into())?;
    socket.set_multicast_if_v6(index)?;
    let _ = socket.set_multicast_loop_v6(false);
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}

#[cfg(test)]
mod tests {
    use beacon_types::protocol::types::test_util::*;

    use super::*;

    #[test]
    fn instance_names_compose() {
        let name = instance_name("den printer", "_ipp._tcp", "local").unwrap();
        assert_eq!(domain("den printer._ipp._tcp.local."), name);

        assert_eq!(
            Err(Error::InvalidInput),
            instance_name("", "_ipp._tcp", "local")
        );
        assert_eq!(
            Err(Error::InvalidInput),
            instance_name("x", "_ipp", "local")
        );
    }

    #[test]
    fn service_query_attaches_confident_known_answers() {
        let client = MulticastClient::new();
        let ptr = ptr_record("_http._tcp.local.", "web._http._tcp.local.");
        client.cache.store(&ptr);

        let message = client
            .build_service_query("_http._tcp", "local", false)
            .unwrap();

        assert_eq!(0, message.header.id);
        assert!(!message.header.recursion_desired);
        assert_eq!(
            QueryType::Record(RecordType::PTR),
            message.questions[0].qtype
        );
        assert_eq!(vec![ptr], message.answers);
    }

    #[test]
    fn service_query_omits_tired_known_answers() {
        let client = MulticastClient::new();
        let mut ptr = ptr_record("_http._tcp.local.", "web._http._tcp.local.");
        // pretend most of the lifetime has passed
        ptr.ttl = 300;
        let Some(created) = Instant::now().checked_sub(Duration::from_secs(200)) else {
            return;
        };
        ptr.created = created;
        client.cache.store(&ptr);

        let message = client
            .build_service_query("_http._tcp", "local", false)
            .unwrap();
        assert!(message.answers.is_empty());
    }

    #[test]
    fn services_query_uses_enumeration_name() {
        let client = MulticastClient::new();
        let message = client.build_services_query("local", true).unwrap();
        assert_eq!(
            domain("_services._dns-sd._udp.local."),
            message.questions[0].name
        );
        assert!(message.questions[0].unicast_response);
    }

    #[test]
    fn unicast_bit_is_masked_when_unsupported() {
        let mut question = question("host.local.", QueryType::Record(RecordType::A));
        question.unicast_response = true;
        let mut message = Message::mdns_query(question);

        apply_unicast_capability(&mut message, true);
        assert!(message.questions[0].unicast_response);

        apply_unicast_capability(&mut message, false);
        assert!(!message.questions[0].unicast_response);
    }

    #[test]
    fn datagrams_from_wrong_port_are_dropped() {
        let client = MulticastClient::new();
        let mut rx = client.subscribe();

        let mut response =
            Message::mdns_query(question("host.local.", QueryType::Record(RecordType::A)))
                .make_response();
        response.answers = vec![a_record("host.local.", Ipv4Addr::new(192, 0, 2, 1))];
        let wire = response.to_octets().unwrap();

        let wrong_port = SocketAddr::from((Ipv4Addr::new(192, 0, 2, 9), 5354));
        handle_datagram(&client.cache, &client.window, &client.events, &wire, wrong_port);
        assert!(rx.try_recv().is_err());
        assert!(client
            .cache
            .search(&domain("host.local."), QueryType::Wildcard)
            .is_empty());
    }

    #[test]
    fn answer_datagrams_are_cached_and_reported() {
        let client = MulticastClient::new();
        let mut rx = client.subscribe();

        let rr = a_record("host.local.", Ipv4Addr::new(192, 0, 2, 1));
        let mut response =
            Message::mdns_query(question("host.local.", QueryType::Record(RecordType::A)))
                .make_response();
        response.answers = vec![rr.clone()];
        let wire = response.to_octets().unwrap();

        let source = SocketAddr::from((Ipv4Addr::new(192, 0, 2, 9), MDNS_PORT));
        handle_datagram(&client.cache, &client.window, &client.events, &wire, source);

        match rx.try_recv().unwrap() {
            ClientEvent::Answer { added, updated, .. } => {
                assert_eq!(vec![rr.clone()], added);
                assert!(updated.is_empty());
            }
            other => panic!("expected answer event, got {other:?}"),
        }
        assert_eq!(
            1,
            client
                .cache
                .search(&domain("host.local."), QueryType::Record(RecordType::A))
                .len()
        );

        // the same datagram again is a duplicate and stays silent
        handle_datagram(&client.cache, &client.window, &client.events, &wire, source);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn query_datagrams_become_query_events() {
        let client = MulticastClient::new();
        let mut rx = client.subscribe();

        let query = Message::mdns_query(question("host.local.", QueryType::Record(RecordType::A)));
        let wire = query.to_octets().unwrap();
        let source = SocketAddr::from((Ipv4Addr::new(192, 0, 2, 9), MDNS_PORT));
        handle_datagram(&client.cache, &client.window, &client.events, &wire, source);

        assert!(matches!(
            rx.try_recv().unwrap(),
            ClientEvent::Query { from, .. } if from == source
        ));
    }

    #[tokio::test]
    async fn query_service_instance_synthesises_from_cache() {
        let client = MulticastClient::new();
        client
            .cache
            .store(&srv_record("web._http._tcp.local.", 80, "host.local."));
        client
            .cache
            .store(&txt_record("web._http._tcp.local.", b"path=/"));

        let response = client
            .query_service_instance(
                "web",
                "_http._tcp",
                "local",
                &[RecordType::SRV, RecordType::TXT],
            )
            .await
            .unwrap()
            .expect("cache should satisfy the query");

        assert!(response.header.is_response);
        assert_eq!(2, response.answers.len());

        // asking for a type the cache lacks goes to the wire instead
        let response = client
            .query_service_instance(
                "web",
                "_http._tcp",
                "local",
                &[RecordType::SRV, RecordType::AAAA],
            )
            .await
            .unwrap();
        assert_eq!(None, response);
    }

    #[tokio::test]
    async fn resolve_query_answers_from_cache_without_waiting() {
        let client = MulticastClient::new();
        let rr = a_record("host.local.", Ipv4Addr::new(192, 0, 2, 1));
        client.cache.store(&rr);

        let response = client
            .resolve_query(question("host.local.", QueryType::Record(RecordType::A)))
            .await
            .unwrap();
        assert_eq!(vec![rr], response.answers);
    }

    #[tokio::test]
    async fn start_and_stop() {
        let client = MulticastClient::new();
        // binding the mDNS port may be impossible in a sandbox; that
        // is not what this test is checking
        if client.start().is_err() {
            return;
        }

        client.query_service("_http._tcp", "local", false).await.unwrap();
        client.stop();
    }
}
