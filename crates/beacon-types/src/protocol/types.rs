use bytes::Bytes;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::time::{Duration, Instant};

/// A name must be 255 octets or shorter in total, including both
/// length and label octets.
pub const DOMAINNAME_MAX_LEN: usize = 255;

/// A label must be 63 octets or shorter.
pub const LABEL_MAX_LEN: usize = 63;

/// How many compression pointers a single name may chase before the
/// parse is abandoned as adversarial.
pub const POINTER_CHASE_LIMIT: usize = 32;

/// Datagram buffer size for unicast exchanges.
pub const UNICAST_BUFFER_LEN: usize = 512;

/// Datagram buffer size for multicast DNS over IPv4: 9000-octet
/// jumbogram minus the IPv4 and UDP headers.
pub const MDNS_BUFFER_LEN_V4: usize = 8972;

/// Datagram buffer size for multicast DNS over IPv6: 9000-octet
/// jumbogram minus the IPv6 and UDP headers.
pub const MDNS_BUFFER_LEN_V6: usize = 8952;

pub const HEADER_MASK_QR: u8 = 0b1000_0000;
pub const HEADER_MASK_OPCODE: u8 = 0b0111_1000;
pub const HEADER_OFFSET_OPCODE: usize = 3;
pub const HEADER_MASK_AA: u8 = 0b0000_0100;
pub const HEADER_MASK_TC: u8 = 0b0000_0010;
pub const HEADER_MASK_RD: u8 = 0b0000_0001;
pub const HEADER_MASK_RA: u8 = 0b1000_0000;
pub const HEADER_MASK_AD: u8 = 0b0010_0000;
pub const HEADER_MASK_CD: u8 = 0b0001_0000;
pub const HEADER_MASK_RCODE: u8 = 0b0000_1111;

/// In multicast DNS the top bit of the class field is repurposed: on a
/// question it requests a unicast response, on a record it is the
/// cache-flush bit.  See sections 5.4 and 10.2 of RFC 6762.
pub const CLASS_MASK_MDNS_FLAG: u16 = 0b1000_0000_0000_0000;
pub const CLASS_MASK_VALUE: u16 = 0b0111_1111_1111_1111;

/// Basic DNS message format, used for both queries and responses.
///
/// ```text
///     +---------------------+
///     |        Header       |
///     +---------------------+
///     |       Question      | the question for the name server
///     +---------------------+
///     |        Answer       | RRs answering the question
///     +---------------------+
///     |      Authority      | RRs pointing toward an authority
///     +---------------------+
///     |      Additional     | RRs holding additional information
///     +---------------------+
/// ```
///
/// See section 4.1 of RFC 1035.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authority: Vec<ResourceRecord>,
    pub additional: Vec<ResourceRecord>,
}

impl Message {
    /// A standard query with the given transaction id.
    pub fn query(id: u16, question: Question) -> Self {
        Self {
            header: Header {
                id,
                is_response: false,
                opcode: Opcode::Query,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: true,
                recursion_available: false,
                authentic_data: false,
                checking_disabled: false,
                rcode: Rcode::NoError,
            },
            questions: vec![question],
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// A multicast query: the transaction id is zero and recursion
    /// bits are clear, per section 18 of RFC 6762.
    pub fn mdns_query(question: Question) -> Self {
        let mut message = Self::query(0, question);
        message.header.recursion_desired = false;
        message
    }

    pub fn make_response(&self) -> Self {
        Self {
            header: Header {
                id: self.header.id,
                is_response: true,
                opcode: self.header.opcode,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: self.header.recursion_desired,
                recursion_available: true,
                authentic_data: false,
                checking_disabled: self.header.checking_disabled,
                rcode: Rcode::NoError,
            },
            questions: self.questions.clone(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }
}

/// Common header type for all messages.
///
/// ```text
///                                     1  1  1  1  1  1
///       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                      ID                       |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |QR|   Opcode  |AA|TC|RD|RA| Z|AD|CD|   RCODE   |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    QDCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ANCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    NSCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ARCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// See section 4.1.1 of RFC 1035, with the AD and CD bits of RFC 4035
/// carved out of the Z field.  AD and CD are carried through verbatim:
/// nothing in this library validates DNSSEC.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Header {
    /// A 16 bit identifier assigned by the program that generates any
    /// kind of query.  This identifier is copied into the
    /// corresponding reply and can be used by the requester to match
    /// up replies to outstanding queries.  Always zero on the
    /// multicast wire.
    pub id: u16,

    /// A one bit field that specifies whether this message is a query
    /// (0), or a response (1).
    pub is_response: bool,

    /// A four bit field that specifies the kind of query in this
    /// message.
    pub opcode: Opcode,

    /// Authoritative Answer - this bit is valid in responses, and
    /// specifies that the responding name server is an authority for
    /// the domain name in the question section.
    pub is_authoritative: bool,

    /// TrunCation - specifies that this message was truncated due to
    /// length greater than that permitted on the transmission channel.
    /// Truncated responses are discarded by this codec.
    pub is_truncated: bool,

    /// Recursion Desired - this bit may be set in a query and is
    /// copied into the response.
    pub recursion_desired: bool,

    /// Recursion Available - set or cleared in a response, denotes
    /// whether recursive query support is available in the name
    /// server.
    pub recursion_available: bool,

    /// Authentic Data - set in a response when the data has been
    /// validated by the responding server.  Carried, never checked.
    pub authentic_data: bool,

    /// Checking Disabled - set in a query to ask the upstream not to
    /// perform DNSSEC validation.  Carried, never checked.
    pub checking_disabled: bool,

    /// Response code - set as part of responses.
    pub rcode: Rcode,
}

/// A `Header` as it appears on the network.  This type is used for
/// serialisation and deserialisation only: including the count fields
/// in the normal `Header` type would require ensuring those values
/// are correct.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct WireHeader {
    /// The header that will be persisted to / is taken from the
    /// `Message`.
    pub header: Header,

    /// an unsigned 16 bit integer specifying the number of entries in
    /// the question section.
    pub qdcount: u16,

    /// an unsigned 16 bit integer specifying the number of resource
    /// records in the answer section.
    pub ancount: u16,

    /// an unsigned 16 bit integer specifying the number of name
    /// server resource records in the authority records section.
    pub nscount: u16,

    /// an unsigned 16 bit integer specifying the number of
    /// resource records in the additional records section.
    pub arcount: u16,
}

/// A single entry of the question section.
///
/// See section 4.1.2 of RFC 1035 and, for the unicast-response bit,
/// section 5.4 of RFC 6762.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Question {
    /// The domain name being asked about.
    pub name: DomainName,

    /// A two octet code which specifies the type of the query.
    pub qtype: QueryType,

    /// A two octet code that specifies the class of the query,
    /// typically IN.
    pub qclass: QueryClass,

    /// Multicast only: the top bit of the class field, asking the
    /// responder to reply by unicast rather than to the group.
    pub unicast_response: bool,
}

impl Question {
    pub fn new(name: DomainName, qtype: QueryType) -> Self {
        Self {
            name,
            qtype,
            qclass: QueryClass::Record(RecordClass::IN),
            unicast_response: false,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.qtype.is_unknown() || self.qclass.is_unknown()
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.qclass, self.qtype)
    }
}

/// A single resource record from the answer, authority, or additional
/// section.
///
/// ```text
///                                     1  1  1  1  1  1
///       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                                               |
///     /                      NAME                     /
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                      TYPE                     |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                     CLASS                     |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                      TTL                      |
///     |                                               |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                   RDLENGTH                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--|
///     /                     RDATA                     /
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// See section 4.1.3 of RFC 1035.  The TTL is fixed into an absolute
/// expiry at the moment the record is built: `created` never moves, so
/// clock advancement only ever shrinks the remaining lifetime.
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    /// The domain name this record pertains to.
    pub name: DomainName,

    /// A combination of the TYPE and RDATA fields.
    pub rtype_with_data: RecordTypeWithData,

    /// The low 15 bits of the class field.
    pub rclass: RecordClass,

    /// Multicast only: the top bit of the class field on a response,
    /// telling receivers to drop other records of this (name, type)
    /// outside the two-second recent window before storing this one.
    pub cache_flush: bool,

    /// Time interval in seconds that the record may be cached.  Zero
    /// means "use for this transaction only, do not cache".
    pub ttl: u32,

    /// When this record was parsed or constructed.
    pub created: Instant,

    /// Set by the cache curator when the record is close to expiry and
    /// a refresh query is due.  Readers still treat stale records as
    /// fresh until they actually expire.
    pub stale: bool,
}

impl ResourceRecord {
    pub fn new(name: DomainName, rtype_with_data: RecordTypeWithData, ttl: u32) -> Self {
        Self {
            name,
            rtype_with_data,
            rclass: RecordClass::IN,
            cache_flush: false,
            ttl,
            created: Instant::now(),
            stale: false,
        }
    }

    pub fn rtype(&self) -> RecordType {
        self.rtype_with_data.rtype()
    }

    pub fn is_unknown(&self) -> bool {
        self.rtype_with_data.is_unknown() || self.rclass.is_unknown()
    }

    pub fn matches(&self, question: &Question) -> bool {
        self.rtype_with_data.matches(question.qtype)
            && self.rclass.matches(question.qclass)
            && self.name == question.name
    }

    /// The instant at which this record stops being usable.
    pub fn expires_at(&self) -> Instant {
        self.created + Duration::from_secs(u64::from(self.ttl))
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }

    /// Fraction of the original lifetime still remaining at `now`, in
    /// the range 0.0 to 1.0.  A zero-TTL record has no lifetime left.
    pub fn remaining_fraction(&self, now: Instant) -> f64 {
        if self.ttl == 0 {
            return 0.0;
        }
        let remaining = self.expires_at().saturating_duration_since(now).as_secs_f64();
        let lifetime = f64::from(self.ttl);
        (remaining / lifetime).clamp(0.0, 1.0)
    }

    /// The TTL this record would carry if re-emitted at `now`.
    pub fn remaining_ttl(&self, now: Instant) -> u32 {
        u32::try_from(self.expires_at().saturating_duration_since(now).as_secs())
            .unwrap_or(u32::MAX)
    }
}

/// Two records are the same record when their type, owner (compared
/// case-insensitively), and payload agree.  The cache-flush bit, TTL,
/// creation instant, and stale mark are metadata about a record, not
/// part of its identity.
impl PartialEq for ResourceRecord {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.rtype_with_data == other.rtype_with_data
    }
}

impl Eq for ResourceRecord {}

impl std::hash::Hash for ResourceRecord {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.rtype_with_data.hash(state);
    }
}

/// A record type with its associated, deserialised, data.
///
/// The type set is closed and stable, so this is a tagged variant
/// rather than anything dynamic: anything not understood is carried
/// opaquely and re-emitted byte for byte.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum RecordTypeWithData {
    /// A 32 bit Internet address.
    A { address: Ipv4Addr },

    /// A 128 bit Internet address.
    AAAA { address: Ipv6Addr },

    /// A host which should be authoritative for the specified domain.
    NS { nsdname: DomainName },

    /// The canonical name for the owner: the owner name is an alias.
    CNAME { cname: DomainName },

    /// Like `CNAME`, but redirecting the entire subtree under the
    /// owner.  See RFC 6672.
    DNAME { target: DomainName },

    /// A pointer to some other location in the name space.  The
    /// workhorse of reverse lookup and of DNS-SD enumeration.
    PTR { ptrdname: DomainName },

    /// Administrative data about a zone: the primary master, the
    /// responsible mailbox, a serial, and four intervals in seconds.
    SOA {
        mname: DomainName,
        rname: DomainName,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },

    /// One or more length-prefixed character strings.
    TXT { strings: Vec<Vec<u8>> },

    /// The location of a service: host and port with a priority and a
    /// weight for selection among multiple instances.  See RFC 2782.
    SRV {
        priority: u16,
        weight: u16,
        port: u16,
        target: DomainName,
    },

    /// General-purpose service binding.  See RFC 9460.
    SVCB {
        priority: u16,
        target: DomainName,
        params: Vec<SvcParam>,
    },

    /// `SVCB` specialised for HTTPS origins.
    HTTPS {
        priority: u16,
        target: DomainName,
        params: Vec<SvcParam>,
    },

    /// Any other record, carried as raw RDATA.  This includes OPT and
    /// NSEC, neither of which this client interprets.
    Opaque { rtype: RecordType, octets: Vec<u8> },
}

impl RecordTypeWithData {
    pub fn is_unknown(&self) -> bool {
        matches!(self, RecordTypeWithData::Opaque { .. })
    }

    pub fn matches(&self, qtype: QueryType) -> bool {
        self.rtype().matches(qtype)
    }

    pub fn rtype(&self) -> RecordType {
        match self {
            RecordTypeWithData::A { .. } => RecordType::A,
            RecordTypeWithData::AAAA { .. } => RecordType::AAAA,
            RecordTypeWithData::NS { .. } => RecordType::NS,
            RecordTypeWithData::CNAME { .. } => RecordType::CNAME,
            RecordTypeWithData::DNAME { .. } => RecordType::DNAME,
            RecordTypeWithData::PTR { .. } => RecordType::PTR,
            RecordTypeWithData::SOA { .. } => RecordType::SOA,
            RecordTypeWithData::TXT { .. } => RecordType::TXT,
            RecordTypeWithData::SRV { .. } => RecordType::SRV,
            RecordTypeWithData::SVCB { .. } => RecordType::SVCB,
            RecordTypeWithData::HTTPS { .. } => RecordType::HTTPS,
            RecordTypeWithData::Opaque { rtype, .. } => *rtype,
        }
    }
}

impl fmt::Display for RecordTypeWithData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordTypeWithData::A { address } => write!(f, "{address}"),
            RecordTypeWithData::AAAA { address } => write!(f, "{address}"),
            RecordTypeWithData::NS { nsdname } => write!(f, "{nsdname}"),
            RecordTypeWithData::CNAME { cname } => write!(f, "{cname}"),
            RecordTypeWithData::DNAME { target } => write!(f, "{target}"),
            RecordTypeWithData::PTR { ptrdname } => write!(f, "{ptrdname}"),
            RecordTypeWithData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => write!(
                f,
                "{mname} {rname} {serial} {refresh} {retry} {expire} {minimum}"
            ),
            RecordTypeWithData::TXT { strings } => {
                let mut first = true;
                for s in strings {
                    if !first {
                        write!(f, " ")?;
                    }
                    first = false;
                    write!(f, "\"{}\"", String::from_utf8_lossy(s))?;
                }
                Ok(())
            }
            RecordTypeWithData::SRV {
                priority,
                weight,
                port,
                target,
            } => write!(f, "{priority} {weight} {port} {target}"),
            RecordTypeWithData::SVCB {
                priority, target, ..
            }
            | RecordTypeWithData::HTTPS {
                priority, target, ..
            } => write!(f, "{priority} {target}"),
            RecordTypeWithData::Opaque { octets, .. } => {
                write!(f, "\\# {}", octets.len())?;
                for o in octets {
                    write!(f, " {o:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// A single service-binding parameter: a well-known key and its raw
/// value octets, in the order they appeared on the wire.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct SvcParam {
    pub key: SvcParamKey,
    pub value: Vec<u8>,
}

/// The well-known service-binding parameter keys of RFC 9460 and its
/// extensions.  Unrecognised keys (including the reserved key 65535)
/// are carried opaquely.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SvcParamKey {
    Mandatory,
    Alpn,
    NoDefaultAlpn,
    Port,
    Ipv4Hint,
    Ech,
    Ipv6Hint,
    DohPath,
    Ohttp,
    Unknown(SvcParamKeyUnknown),
}

/// A struct with a private constructor, to ensure invalid
/// `SvcParamKey`s cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SvcParamKeyUnknown(u16);

impl From<u16> for SvcParamKey {
    fn from(value: u16) -> Self {
        match value {
            0 => SvcParamKey::Mandatory,
            1 => SvcParamKey::Alpn,
            2 => SvcParamKey::NoDefaultAlpn,
            3 => SvcParamKey::Port,
            4 => SvcParamKey::Ipv4Hint,
            5 => SvcParamKey::Ech,
            6 => SvcParamKey::Ipv6Hint,
            7 => SvcParamKey::DohPath,
            8 => SvcParamKey::Ohttp,
            _ => SvcParamKey::Unknown(SvcParamKeyUnknown(value)),
        }
    }
}

impl From<SvcParamKey> for u16 {
    fn from(value: SvcParamKey) -> Self {
        match value {
            SvcParamKey::Mandatory => 0,
            SvcParamKey::Alpn => 1,
            SvcParamKey::NoDefaultAlpn => 2,
            SvcParamKey::Port => 3,
            SvcParamKey::Ipv4Hint => 4,
            SvcParamKey::Ech => 5,
            SvcParamKey::Ipv6Hint => 6,
            SvcParamKey::DohPath => 7,
            SvcParamKey::Ohttp => 8,
            SvcParamKey::Unknown(SvcParamKeyUnknown(value)) => value,
        }
    }
}

/// What sort of query this is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Opcode {
    Query,
    InverseQuery,
    Status,
    Notify,
    Update,
    Stateful,
    Reserved(OpcodeReserved),
}

/// A struct with a private constructor, to ensure invalid `Opcode`s
/// cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct OpcodeReserved(u8);

impl From<u8> for Opcode {
    fn from(octet: u8) -> Self {
        match octet & 0b0000_1111 {
            0 => Opcode::Query,
            1 => Opcode::InverseQuery,
            2 => Opcode::Status,
            4 => Opcode::Notify,
            5 => Opcode::Update,
            6 => Opcode::Stateful,
            other => Opcode::Reserved(OpcodeReserved(other)),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        match value {
            Opcode::Query => 0,
            Opcode::InverseQuery => 1,
            Opcode::Status => 2,
            Opcode::Notify => 4,
            Opcode::Update => 5,
            Opcode::Stateful => 6,
            Opcode::Reserved(OpcodeReserved(octet)) => octet,
        }
    }
}

/// What sort of response this is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Rcode {
    NoError,
    FormatError,
    ServerFailure,
    NameError,
    NotImplemented,
    Refused,
    YxDomain,
    YxRrSet,
    NxRrSet,
    NotAuth,
    NotZone,
    DsoTypeNotImplemented,
    Reserved(RcodeReserved),
}

/// A struct with a private constructor, to ensure invalid `Rcode`s
/// cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RcodeReserved(u8);

impl From<u8> for Rcode {
    fn from(octet: u8) -> Self {
        match octet & 0b0000_1111 {
            0 => Rcode::NoError,
            1 => Rcode::FormatError,
            2 => Rcode::ServerFailure,
            3 => Rcode::NameError,
            4 => Rcode::NotImplemented,
            5 => Rcode::Refused,
            6 => Rcode::YxDomain,
            7 => Rcode::YxRrSet,
            8 => Rcode::NxRrSet,
            9 => Rcode::NotAuth,
            10 => Rcode::NotZone,
            11 => Rcode::DsoTypeNotImplemented,
            other => Rcode::Reserved(RcodeReserved(other)),
        }
    }
}

impl From<Rcode> for u8 {
    fn from(value: Rcode) -> Self {
        match value {
            Rcode::NoError => 0,
            Rcode::FormatError => 1,
            Rcode::ServerFailure => 2,
            Rcode::NameError => 3,
            Rcode::NotImplemented => 4,
            Rcode::Refused => 5,
            Rcode::YxDomain => 6,
            Rcode::YxRrSet => 7,
            Rcode::NxRrSet => 8,
            Rcode::NotAuth => 9,
            Rcode::NotZone => 10,
            Rcode::DsoTypeNotImplemented => 11,
            Rcode::Reserved(RcodeReserved(octet)) => octet,
        }
    }
}

/// A domain name: a sequence of labels terminated by the empty root
/// label.  Labels are kept exactly as they arrived - comparison is
/// case-insensitive but nothing is ever normalised.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct DomainName {
    pub labels: Vec<Label>,
}

impl DomainName {
    pub fn root() -> Self {
        DomainName {
            labels: vec![Label::new()],
        }
    }

    pub fn is_root(&self) -> bool {
        self.labels.len() == 1
    }

    /// The length of this name in its wire encoding, including the
    /// length octets and the terminator.
    pub fn encoded_len(&self) -> usize {
        self.labels
            .iter()
            .map(|l| 1 + usize::from(l.len()))
            .sum::<usize>()
    }

    /// Build a name from labels.  The final label must be the root
    /// label, and the whole name must fit in the wire length limit.
    pub fn from_labels(labels: Vec<Label>) -> Option<Self> {
        match labels.last() {
            Some(last) if last.is_empty() => (),
            _ => return None,
        }
        if labels[..labels.len() - 1].iter().any(Label::is_empty) {
            return None;
        }

        let name = DomainName { labels };
        if name.encoded_len() <= DOMAINNAME_MAX_LEN {
            Some(name)
        } else {
            None
        }
    }

    /// Parse a dotted name from text.
    ///
    /// `\NN` with two hex digits decodes to the octet `0xNN`, and any
    /// other `\c` passes `c` through literally (so `\.` embeds a dot
    /// in a label).  A trailing dot is accepted but not required.
    pub fn parse(s: &str) -> Option<Self> {
        if s == "." {
            return Some(Self::root());
        }

        let mut labels = Vec::new();
        let mut current = Vec::new();
        let mut octets = s.bytes().peekable();

        while let Some(b) = octets.next() {
            match b {
                b'.' => {
                    if current.is_empty() {
                        return None;
                    }
                    labels.push(Label::from_text(&current));
                    current.clear();
                }
                b'\\' => {
                    let first = octets.next()?;
                    if first.is_ascii_hexdigit() {
                        if let Some(second) = octets.peek().copied() {
                            if second.is_ascii_hexdigit() {
                                octets.next();
                                let hi = (first as char).to_digit(16)?;
                                let lo = (second as char).to_digit(16)?;
                                #[allow(clippy::cast_possible_truncation)]
                                current.push((hi * 16 + lo) as u8);
                                continue;
                            }
                        }
                    }
                    current.push(first);
                }
                _ => current.push(b),
            }
        }

        if !current.is_empty() {
            labels.push(Label::from_text(&current));
        }
        if labels.is_empty() {
            return None;
        }

        labels.push(Label::new());
        Self::from_labels(labels)
    }

    /// The reverse-mapping owner name for an address: `in-addr.arpa`
    /// for IPv4 and nybble-by-nybble `ip6.arpa` for IPv6.
    pub fn from_ip(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(ip) => Self::from_ipv4(ip),
            IpAddr::V6(ip) => Self::from_ipv6(ip),
        }
    }

    pub fn from_ipv4(ip: Ipv4Addr) -> Self {
        let mut labels = Vec::with_capacity(7);
        for octet in ip.octets().iter().rev() {
            labels.push(Label::from_text(octet.to_string().as_bytes()));
        }
        labels.push(Label::from_text(b"in-addr"));
        labels.push(Label::from_text(b"arpa"));
        labels.push(Label::new());
        // 6 short labels and a terminator, always within limits
        DomainName { labels }
    }

    pub fn from_ipv6(ip: Ipv6Addr) -> Self {
        let mut labels = Vec::with_capacity(35);
        for octet in ip.octets().iter().rev() {
            labels.push(Label::from_text(nybble_str(octet & 0x0f)));
            labels.push(Label::from_text(nybble_str(octet >> 4)));
        }
        labels.push(Label::from_text(b"ip6"));
        labels.push(Label::from_text(b"arpa"));
        labels.push(Label::new());
        DomainName { labels }
    }

    /// mDNS convenience: a bare single-label name gets the given
    /// suffix appended; anything longer is returned unchanged.
    pub fn with_default_suffix(&self, suffix: &DomainName) -> Self {
        if self.labels.len() == 2 {
            let mut labels = vec![self.labels[0].clone()];
            labels.extend(suffix.labels.iter().cloned());
            if let Some(name) = Self::from_labels(labels) {
                return name;
            }
        }
        self.clone()
    }

    pub fn is_subdomain_of(&self, other: &DomainName) -> bool {
        self.labels.len() >= other.labels.len()
            && self.labels[self.labels.len() - other.labels.len()..] == other.labels[..]
    }

    /// The final non-root label, if any.
    pub fn terminal_label(&self) -> Option<&Label> {
        if self.is_root() {
            None
        } else {
            Some(&self.labels[self.labels.len() - 2])
        }
    }

    pub fn to_dotted_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, ".");
        }

        for label in &self.labels {
            if label.is_empty() {
                break;
            }
            for octet in label.octets() {
                match octet {
                    b'.' | b'\\' => write!(f, "\\{}", *octet as char)?,
                    0x21..=0x7e => write!(f, "{}", *octet as char)?,
                    _ => write!(f, "\\{octet:02x}")?,
                }
            }
            write!(f, ".")?;
        }
        Ok(())
    }
}

impl fmt::Debug for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainName")
            .field("to_dotted_string()", &self.to_dotted_string())
            .finish()
    }
}

impl FromStr for DomainName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("could not parse domain name '{s}'"))
    }
}

fn nybble_str(n: u8) -> &'static [u8] {
    const NYBBLES: &[u8; 16] = b"0123456789abcdef";
    &NYBBLES[usize::from(n)..=usize::from(n)]
}

/// A label is a sequence of at most 63 octets, compared as
/// case-insensitive ASCII but stored without normalisation.
#[derive(Clone)]
pub struct Label {
    /// Private to this module so constructing an invalid `Label` is
    /// impossible.
    octets: Bytes,
}

impl Label {
    /// Create a new, empty, label: the root.
    pub fn new() -> Self {
        Self {
            octets: Bytes::new(),
        }
    }

    /// Build a label from text input, sanitising as the protocol
    /// expects: control octets and `0x7e` are dropped, and anything
    /// beyond 63 octets is cut off.
    pub fn from_text(octets: &[u8]) -> Self {
        let mut cleaned = octets
            .iter()
            .copied()
            .filter(|o| *o > 0x1f && *o != 0x7e)
            .collect::<Vec<u8>>();
        cleaned.truncate(LABEL_MAX_LEN);
        Self {
            octets: Bytes::from(cleaned),
        }
    }

    /// Wire octets are opaque: no sanitisation, only the length check
    /// the caller has already performed.
    pub(crate) fn from_wire(octets: &[u8]) -> Self {
        debug_assert!(octets.len() <= LABEL_MAX_LEN);
        Self {
            octets: Bytes::copy_from_slice(octets),
        }
    }

    #[allow(clippy::missing_panics_doc)]
    pub fn len(&self) -> u8 {
        // safe as construction ensures a label is <= 63 octets
        self.octets.len().try_into().unwrap()
    }

    pub fn is_empty(&self) -> bool {
        self.octets.is_empty()
    }

    pub fn octets(&self) -> &Bytes {
        &self.octets
    }

    pub fn eq_ignore_case(&self, text: &[u8]) -> bool {
        self.octets.eq_ignore_ascii_case(text)
    }
}

impl Default for Label {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<&[u8]> for Label {
    type Error = LabelTryFromOctetsError;

    fn try_from(octets: &[u8]) -> Result<Self, Self::Error> {
        if octets.len() > LABEL_MAX_LEN {
            return Err(LabelTryFromOctetsError::TooLong);
        }

        Ok(Self {
            octets: Bytes::copy_from_slice(octets),
        })
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.octets.eq_ignore_ascii_case(&other.octets)
    }
}

impl Eq for Label {}

impl std::hash::Hash for Label {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for octet in &self.octets {
            state.write_u8(octet.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label({:?})", String::from_utf8_lossy(&self.octets))
    }
}

/// Errors that can arise when converting a `[u8]` into a `Label`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum LabelTryFromOctetsError {
    TooLong,
}

/// The naming convention of DNS Service Discovery:
/// `<instance>.<_service>.<_proto>.<domain>` where the protocol label
/// is `_tcp` or `_udp`.  See section 4.1 of RFC 6763.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ServiceInstance {
    pub instance: Label,
    pub service: Label,
    pub protocol: Label,
    pub domain: DomainName,
}

impl ServiceInstance {
    /// The fully-qualified instance name.
    pub fn to_name(&self) -> Option<DomainName> {
        let mut labels = vec![
            self.instance.clone(),
            self.service.clone(),
            self.protocol.clone(),
        ];
        labels.extend(self.domain.labels.iter().cloned());
        DomainName::from_labels(labels)
    }

    /// Split an owner name back into its DNS-SD parts.  Returns `None`
    /// unless the name has the `<instance>.<_service>.<_proto>.<domain>`
    /// shape.
    pub fn from_name(name: &DomainName) -> Option<Self> {
        if name.labels.len() < 4 {
            return None;
        }

        let instance = name.labels[0].clone();
        let service = name.labels[1].clone();
        let protocol = name.labels[2].clone();

        if !service.octets().starts_with(b"_") {
            return None;
        }
        if !(protocol.eq_ignore_case(b"_tcp") || protocol.eq_ignore_case(b"_udp")) {
            return None;
        }

        let domain = DomainName::from_labels(name.labels[3..].to_vec())?;
        Some(Self {
            instance,
            service,
            protocol,
            domain,
        })
    }
}

/// Query types are a superset of record types.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum QueryType {
    Record(RecordType),
    Wildcard,
}

impl QueryType {
    pub fn is_unknown(&self) -> bool {
        match self {
            QueryType::Record(rtype) => rtype.is_unknown(),
            QueryType::Wildcard => false,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueryType::Record(rtype) => rtype.fmt(f),
            QueryType::Wildcard => write!(f, "ANY"),
        }
    }
}

impl FromStr for QueryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ANY" | "any" | "*" => Ok(QueryType::Wildcard),
            _ => RecordType::from_str(s).map(QueryType::Record),
        }
    }
}

impl From<u16> for QueryType {
    fn from(value: u16) -> Self {
        match value {
            255 => QueryType::Wildcard,
            _ => QueryType::Record(RecordType::from(value)),
        }
    }
}

impl From<QueryType> for u16 {
    fn from(value: QueryType) -> Self {
        match value {
            QueryType::Wildcard => 255,
            QueryType::Record(rtype) => rtype.into(),
        }
    }
}

/// Query classes are a superset of record classes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum QueryClass {
    Record(RecordClass),
    Wildcard,
}

impl QueryClass {
    pub fn is_unknown(&self) -> bool {
        match self {
            QueryClass::Record(rclass) => rclass.is_unknown(),
            QueryClass::Wildcard => false,
        }
    }
}

impl fmt::Display for QueryClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueryClass::Record(rclass) => rclass.fmt(f),
            QueryClass::Wildcard => write!(f, "ANY"),
        }
    }
}

impl From<u16> for QueryClass {
    fn from(value: u16) -> Self {
        match value {
            255 => QueryClass::Wildcard,
            _ => QueryClass::Record(RecordClass::from(value)),
        }
    }
}

impl From<QueryClass> for u16 {
    fn from(value: QueryClass) -> Self {
        match value {
            QueryClass::Wildcard => 255,
            QueryClass::Record(rclass) => rclass.into(),
        }
    }
}

/// Record types are used by resource records and by queries.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RecordType {
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    TXT,
    AAAA,
    SRV,
    DNAME,
    OPT,
    SVCB,
    HTTPS,
    Unknown(RecordTypeUnknown),
}

/// A struct with a private constructor, to ensure invalid `RecordType`s
/// cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RecordTypeUnknown(u16);

impl RecordType {
    pub fn is_unknown(&self) -> bool {
        matches!(self, RecordType::Unknown(_))
    }

    pub fn matches(&self, qtype: QueryType) -> bool {
        match qtype {
            QueryType::Wildcard => true,
            QueryType::Record(rtype) => rtype == *self,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::NS => write!(f, "NS"),
            RecordType::CNAME => write!(f, "CNAME"),
            RecordType::SOA => write!(f, "SOA"),
            RecordType::PTR => write!(f, "PTR"),
            RecordType::TXT => write!(f, "TXT"),
            RecordType::AAAA => write!(f, "AAAA"),
            RecordType::SRV => write!(f, "SRV"),
            RecordType::DNAME => write!(f, "DNAME"),
            RecordType::OPT => write!(f, "OPT"),
            RecordType::SVCB => write!(f, "SVCB"),
            RecordType::HTTPS => write!(f, "HTTPS"),
            RecordType::Unknown(RecordTypeUnknown(n)) => write!(f, "TYPE{n}"),
        }
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "NS" => Ok(RecordType::NS),
            "CNAME" => Ok(RecordType::CNAME),
            "SOA" => Ok(RecordType::SOA),
            "PTR" => Ok(RecordType::PTR),
            "TXT" => Ok(RecordType::TXT),
            "AAAA" => Ok(RecordType::AAAA),
            "SRV" => Ok(RecordType::SRV),
            "DNAME" => Ok(RecordType::DNAME),
            "OPT" => Ok(RecordType::OPT),
            "SVCB" => Ok(RecordType::SVCB),
            "HTTPS" => Ok(RecordType::HTTPS),
            _ => Err(format!("unknown record type '{s}'")),
        }
    }
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            2 => RecordType::NS,
            5 => RecordType::CNAME,
            6 => RecordType::SOA,
            12 => RecordType::PTR,
            16 => RecordType::TXT,
            28 => RecordType::AAAA,
            33 => RecordType::SRV,
            39 => RecordType::DNAME,
            41 => RecordType::OPT,
            64 => RecordType::SVCB,
            65 => RecordType::HTTPS,
            _ => RecordType::Unknown(RecordTypeUnknown(value)),
        }
    }
}

impl From<RecordType> for u16 {
    fn from(value: RecordType) -> Self {
        match value {
            RecordType::A => 1,
            RecordType::NS => 2,
            RecordType::CNAME => 5,
            RecordType::SOA => 6,
            RecordType::PTR => 12,
            RecordType::TXT => 16,
            RecordType::AAAA => 28,
            RecordType::SRV => 33,
            RecordType::DNAME => 39,
            RecordType::OPT => 41,
            RecordType::SVCB => 64,
            RecordType::HTTPS => 65,
            RecordType::Unknown(RecordTypeUnknown(value)) => value,
        }
    }
}

/// Record classes are used by resource records and by queries.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RecordClass {
    IN,
    Unknown(RecordClassUnknown),
}

/// A struct with a private constructor, to ensure invalid
/// `RecordClass`es cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RecordClassUnknown(u16);

impl RecordClass {
    pub fn is_unknown(&self) -> bool {
        matches!(self, RecordClass::Unknown(_))
    }

    pub fn matches(&self, qclass: QueryClass) -> bool {
        match qclass {
            QueryClass::Wildcard => true,
            QueryClass::Record(rclass) => rclass == *self,
        }
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordClass::IN => write!(f, "IN"),
            RecordClass::Unknown(RecordClassUnknown(n)) => write!(f, "CLASS{n}"),
        }
    }
}

impl From<u16> for RecordClass {
    fn from(value: u16) -> Self {
        match value & CLASS_MASK_VALUE {
            1 => RecordClass::IN,
            other => RecordClass::Unknown(RecordClassUnknown(other)),
        }
    }
}

impl From<RecordClass> for u16 {
    fn from(value: RecordClass) -> Self {
        match value {
            RecordClass::IN => 1,
            RecordClass::Unknown(RecordClassUnknown(value)) => value,
        }
    }
}


#[cfg(any(feature = "test-util", test))]
pub mod test_util {
    use super::*;

    use arbitrary::{Arbitrary, Unstructured};
    use rand::Rng;

    impl<'a> Arbitrary<'a> for Label {
        // only generates non-empty labels
        fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
            let label_len = u.int_in_range::<u8>(1..=20)?;
            let mut octets = Vec::with_capacity(label_len.into());
            for b in u.bytes(label_len.into())? {
                let ascii_byte = if b.is_ascii() { *b } else { *b % 128 };
                octets.push(if ascii_byte <= 0x1f || ascii_byte == 0x7e {
                    b'x'
                } else {
                    ascii_byte
                });
            }
            Ok(Label::from_text(&octets))
        }
    }

    impl<'a> Arbitrary<'a> for DomainName {
        fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
            let num_labels = u.int_in_range::<usize>(1..=6)?;
            let mut labels = Vec::with_capacity(num_labels + 1);
            for _ in 0..num_labels {
                labels.push(u.arbitrary()?);
            }
            labels.push(Label::new());
            Ok(DomainName::from_labels(labels).unwrap())
        }
    }

    impl<'a> Arbitrary<'a> for SvcParam {
        fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
            let key = SvcParamKey::from(u.arbitrary::<u16>()?);
            let len = u.int_in_range(0..=32)?;
            Ok(SvcParam {
                key,
                value: u.bytes(len)?.to_vec(),
            })
        }
    }

    impl<'a> Arbitrary<'a> for RecordTypeWithData {
        fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
            Ok(match u.int_in_range(0..=11)? {
                0 => RecordTypeWithData::A {
                    address: Ipv4Addr::from(u.arbitrary::<u32>()?),
                },
                1 => RecordTypeWithData::AAAA {
                    address: Ipv6Addr::from(u.arbitrary::<u128>()?),
                },
                2 => RecordTypeWithData::NS {
                    nsdname: u.arbitrary()?,
                },
                3 => RecordTypeWithData::CNAME {
                    cname: u.arbitrary()?,
                },
                4 => RecordTypeWithData::DNAME {
                    target: u.arbitrary()?,
                },
                5 => RecordTypeWithData::PTR {
                    ptrdname: u.arbitrary()?,
                },
                6 => RecordTypeWithData::SOA {
                    mname: u.arbitrary()?,
                    rname: u.arbitrary()?,
                    serial: u.arbitrary()?,
                    refresh: u.arbitrary()?,
                    retry: u.arbitrary()?,
                    expire: u.arbitrary()?,
                    minimum: u.arbitrary()?,
                },
                7 => {
                    let count = u.int_in_range(0..=4)?;
                    let mut strings = Vec::with_capacity(count);
                    for _ in 0..count {
                        let len = u.int_in_range(0..=32)?;
                        strings.push(u.bytes(len)?.to_vec());
                    }
                    RecordTypeWithData::TXT { strings }
                }
                8 => RecordTypeWithData::SRV {
                    priority: u.arbitrary()?,
                    weight: u.arbitrary()?,
                    port: u.arbitrary()?,
                    target: u.arbitrary()?,
                },
                9 => RecordTypeWithData::SVCB {
                    priority: u.arbitrary()?,
                    target: u.arbitrary()?,
                    params: arbitrary_params(u)?,
                },
                10 => RecordTypeWithData::HTTPS {
                    priority: u.arbitrary()?,
                    target: u.arbitrary()?,
                    params: arbitrary_params(u)?,
                },
                _ => {
                    let len = u.int_in_range(0..=64)?;
                    RecordTypeWithData::Opaque {
                        rtype: arbitrary_opaque_rtype(u)?,
                        octets: u.bytes(len)?.to_vec(),
                    }
                }
            })
        }
    }

    fn arbitrary_params(u: &mut Unstructured<'_>) -> arbitrary::Result<Vec<SvcParam>> {
        let count = u.int_in_range(0..=3)?;
        let mut params = Vec::with_capacity(count);
        for _ in 0..count {
            params.push(u.arbitrary()?);
        }
        Ok(params)
    }

    fn arbitrary_opaque_rtype(u: &mut Unstructured<'_>) -> arbitrary::Result<RecordType> {
        loop {
            let rtype = RecordType::from(u.arbitrary::<u16>()?);
            if rtype.is_unknown() || rtype == RecordType::OPT {
                return Ok(rtype);
            }
        }
    }

    impl<'a> Arbitrary<'a> for ResourceRecord {
        fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
            Ok(ResourceRecord {
                name: u.arbitrary()?,
                rtype_with_data: u.arbitrary()?,
                rclass: RecordClass::from(u.arbitrary::<u16>()?),
                cache_flush: u.arbitrary()?,
                ttl: u.arbitrary()?,
                created: Instant::now(),
                stale: false,
            })
        }
    }

    impl<'a> Arbitrary<'a> for Question {
        fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
            Ok(Question {
                name: u.arbitrary()?,
                qtype: QueryType::from(u.arbitrary::<u16>()?),
                qclass: QueryClass::from(u.arbitrary::<u16>()? & CLASS_MASK_VALUE),
                unicast_response: u.arbitrary()?,
            })
        }
    }

    impl<'a> Arbitrary<'a> for Header {
        fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
            Ok(Header {
                id: u.arbitrary()?,
                is_response: u.arbitrary()?,
                opcode: Opcode::from(u.arbitrary::<u8>()?),
                is_authoritative: u.arbitrary()?,
                // a truncated message fails to parse, so generated
                // messages are never truncated
                is_truncated: false,
                recursion_desired: u.arbitrary()?,
                recursion_available: u.arbitrary()?,
                authentic_data: u.arbitrary()?,
                checking_disabled: u.arbitrary()?,
                rcode: Rcode::from(u.arbitrary::<u8>()?),
            })
        }
    }

    impl<'a> Arbitrary<'a> for Message {
        fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
            let mut sections: [Vec<ResourceRecord>; 3] = [Vec::new(), Vec::new(), Vec::new()];
            for section in &mut sections {
                for _ in 0..u.int_in_range(0..=3)? {
                    section.push(u.arbitrary()?);
                }
            }
            let [answers, authority, additional] = sections;

            let mut questions = Vec::new();
            for _ in 0..u.int_in_range(0..=2)? {
                questions.push(u.arbitrary()?);
            }

            Ok(Message {
                header: u.arbitrary()?,
                questions,
                answers,
                authority,
                additional,
            })
        }
    }

    pub fn arbitrary_value<T: for<'a> Arbitrary<'a>>() -> T {
        let mut rng = rand::thread_rng();
        for size in [128, 256, 512, 1024, 2048, 4096] {
            let mut buf = Vec::with_capacity(size);
            for _ in 0..size {
                buf.push(rng.gen());
            }

            if let Ok(value) = T::arbitrary(&mut Unstructured::new(&buf)) {
                return value;
            }
        }

        panic!("could not generate arbitrary value!");
    }

    pub fn arbitrary_resourcerecord() -> ResourceRecord {
        arbitrary_value()
    }

    pub fn arbitrary_message() -> Message {
        arbitrary_value()
    }

    pub fn domain(name: &str) -> DomainName {
        DomainName::parse(name).unwrap()
    }

    pub fn a_record(name: &str, address: Ipv4Addr) -> ResourceRecord {
        ResourceRecord::new(domain(name), RecordTypeWithData::A { address }, 300)
    }

    pub fn aaaa_record(name: &str, address: Ipv6Addr) -> ResourceRecord {
        ResourceRecord::new(domain(name), RecordTypeWithData::AAAA { address }, 300)
    }

    pub fn cname_record(name: &str, target_name: &str) -> ResourceRecord {
        ResourceRecord::new(
            domain(name),
            RecordTypeWithData::CNAME {
                cname: domain(target_name),
            },
            300,
        )
    }

    pub fn ns_record(superdomain_name: &str, nameserver_name: &str) -> ResourceRecord {
        ResourceRecord::new(
            domain(superdomain_name),
            RecordTypeWithData::NS {
                nsdname: domain(nameserver_name),
            },
            300,
        )
    }

    pub fn ptr_record(name: &str, target_name: &str) -> ResourceRecord {
        ResourceRecord::new(
            domain(name),
            RecordTypeWithData::PTR {
                ptrdname: domain(target_name),
            },
            300,
        )
    }

    pub fn srv_record(name: &str, port: u16, target_name: &str) -> ResourceRecord {
        ResourceRecord::new(
            domain(name),
            RecordTypeWithData::SRV {
                priority: 0,
                weight: 0,
                port,
                target: domain(target_name),
            },
            300,
        )
    }

    pub fn txt_record(name: &str, string: &[u8]) -> ResourceRecord {
        ResourceRecord::new(
            domain(name),
            RecordTypeWithData::TXT {
                strings: vec![string.to_vec()],
            },
            300,
        )
    }

    pub fn opaque_record(name: &str, tag: u16, octets: &[u8]) -> ResourceRecord {
        ResourceRecord::new(
            domain(name),
            RecordTypeWithData::Opaque {
                rtype: RecordType::from(tag),
                octets: octets.to_vec(),
            },
            300,
        )
    }

    pub fn question(name: &str, qtype: QueryType) -> Question {
        Question::new(domain(name), qtype)
    }
}
