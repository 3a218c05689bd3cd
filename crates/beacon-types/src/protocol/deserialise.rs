//! Deserialisation of DNS messages from the network.  See the `types`
//! module for details of the format.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Instant;

use crate::protocol::types::*;

impl Message {
    /// # Errors
    ///
    /// If the message cannot be parsed, or carries the TC flag:
    /// truncated datagrams are discarded, not retried.
    pub fn from_octets(octets: &[u8]) -> Result<Self, Error> {
        Self::deserialise(&mut ConsumableBuffer::new(octets))
    }

    /// # Errors
    ///
    /// If the message cannot be parsed.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let wire_header = WireHeader::deserialise(buffer)?;
        let id = wire_header.header.id;

        if wire_header.header.is_truncated {
            return Err(Error::Truncated(id));
        }

        let mut questions = Vec::with_capacity(wire_header.qdcount.into());
        let mut answers = Vec::with_capacity(wire_header.ancount.into());
        let mut authority = Vec::with_capacity(wire_header.nscount.into());
        let mut additional = Vec::with_capacity(wire_header.arcount.into());

        for _ in 0..wire_header.qdcount {
            questions.push(Question::deserialise(id, buffer)?);
        }
        for _ in 0..wire_header.ancount {
            answers.push(ResourceRecord::deserialise(id, buffer)?);
        }
        for _ in 0..wire_header.nscount {
            authority.push(ResourceRecord::deserialise(id, buffer)?);
        }
        for _ in 0..wire_header.arcount {
            additional.push(ResourceRecord::deserialise(id, buffer)?);
        }

        Ok(Self {
            header: wire_header.header,
            questions,
            answers,
            authority,
            additional,
        })
    }
}

impl WireHeader {
    /// # Errors
    ///
    /// If the header is too short.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let id = buffer.next_u16().ok_or(Error::CompletelyBusted)?;
        let flags1 = buffer.next_u8().ok_or(Error::HeaderTooShort(id))?;
        let flags2 = buffer.next_u8().ok_or(Error::HeaderTooShort(id))?;
        let qdcount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;
        let ancount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;
        let nscount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;
        let arcount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;

        Ok(Self {
            header: Header {
                id,
                is_response: flags1 & HEADER_MASK_QR != 0,
                opcode: Opcode::from((flags1 & HEADER_MASK_OPCODE) >> HEADER_OFFSET_OPCODE),
                is_authoritative: flags1 & HEADER_MASK_AA != 0,
                is_truncated: flags1 & HEADER_MASK_TC != 0,
                recursion_desired: flags1 & HEADER_MASK_RD != 0,
                recursion_available: flags2 & HEADER_MASK_RA != 0,
                authentic_data: flags2 & HEADER_MASK_AD != 0,
                checking_disabled: flags2 & HEADER_MASK_CD != 0,
                rcode: Rcode::from(flags2 & HEADER_MASK_RCODE),
            },
            qdcount,
            ancount,
            nscount,
            arcount,
        })
    }
}

impl Question {
    /// # Errors
    ///
    /// If the question cannot be parsed.
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let name = DomainName::deserialise(id, buffer)?;
        let qtype = QueryType::from(buffer.next_u16().ok_or(Error::QuestionTooShort(id))?);
        let raw_class = buffer.next_u16().ok_or(Error::QuestionTooShort(id))?;

        Ok(Self {
            name,
            qtype,
            qclass: QueryClass::from(raw_class & CLASS_MASK_VALUE),
            unicast_response: raw_class & CLASS_MASK_MDNS_FLAG != 0,
        })
    }
}

impl ResourceRecord {
    /// # Errors
    ///
    /// If the record cannot be parsed, including when its typed
    /// payload does not consume exactly RDLENGTH octets.
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let name = DomainName::deserialise(id, buffer)?;
        let rtype =
            RecordType::from(buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?);
        let raw_class = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;
        let ttl = buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?;
        let rdlength = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;

        let rdata_start = buffer.position();

        let mut raw_rdata = || {
            if let Some(octets) = buffer.take(rdlength as usize) {
                Ok(octets.to_vec())
            } else {
                Err(Error::ResourceRecordTooShort(id))
            }
        };

        // for records which include domain names, deserialise them to
        // expand pointers.
        let rtype_with_data = match rtype {
            RecordType::A => RecordTypeWithData::A {
                address: Ipv4Addr::from(
                    buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?,
                ),
            },
            RecordType::AAAA => RecordTypeWithData::AAAA {
                address: Ipv6Addr::from(
                    buffer
                        .next_u128()
                        .ok_or(Error::ResourceRecordTooShort(id))?,
                ),
            },
            RecordType::NS => RecordTypeWithData::NS {
                nsdname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::CNAME => RecordTypeWithData::CNAME {
                cname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::DNAME => RecordTypeWithData::DNAME {
                target: DomainName::deserialise(id, buffer)?,
            },
            RecordType::PTR => RecordTypeWithData::PTR {
                ptrdname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::SOA => RecordTypeWithData::SOA {
                mname: DomainName::deserialise(id, buffer)?,
                rname: DomainName::deserialise(id, buffer)?,
                serial: buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?,
                refresh: buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?,
                retry: buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?,
                expire: buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?,
                minimum: buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?,
            },
            RecordType::TXT => {
                let rdata_end = rdata_start + rdlength as usize;
                let mut strings = Vec::new();
                while buffer.position() < rdata_end {
                    let len = buffer.next_u8().ok_or(Error::ResourceRecordTooShort(id))?;
                    let string = buffer
                        .take(len as usize)
                        .ok_or(Error::ResourceRecordTooShort(id))?;
                    strings.push(string.to_vec());
                }
                RecordTypeWithData::TXT { strings }
            }
            RecordType::SRV => RecordTypeWithData::SRV {
                priority: buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                weight: buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                port: buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                target: DomainName::deserialise(id, buffer)?,
            },
            RecordType::SVCB => {
                let (priority, target, params) =
                    deserialise_svcb(id, buffer, rdata_start + rdlength as usize)?;
                RecordTypeWithData::SVCB {
                    priority,
                    target,
                    params,
                }
            }
            RecordType::HTTPS => {
                let (priority, target, params) =
                    deserialise_svcb(id, buffer, rdata_start + rdlength as usize)?;
                RecordTypeWithData::HTTPS {
                    priority,
                    target,
                    params,
                }
            }
            other => RecordTypeWithData::Opaque {
                rtype: other,
                octets: raw_rdata()?,
            },
        };

        let rdata_stop = buffer.position();

        if rdata_stop == rdata_start + (rdlength as usize) {
            Ok(Self {
                name,
                rtype_with_data,
                rclass: RecordClass::from(raw_class & CLASS_MASK_VALUE),
                cache_flush: raw_class & CLASS_MASK_MDNS_FLAG != 0,
                ttl,
                created: Instant::now(),
                stale: false,
            })
        } else {
            Err(Error::ResourceRecordInvalid(id))
        }
    }
}

/// Shared body parser for the `SVCB` and `HTTPS` types: a priority, a
/// target name, then `(key, length, value)` triplets until RDLENGTH is
/// exhausted.
fn deserialise_svcb(
    id: u16,
    buffer: &mut ConsumableBuffer,
    rdata_end: usize,
) -> Result<(u16, DomainName, Vec<SvcParam>), Error> {
    let priority = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;
    let target = DomainName::deserialise(id, buffer)?;

    let mut params = Vec::new();
    while buffer.position() < rdata_end {
        let key = SvcParamKey::from(buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?);
        let len = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;
        let value = buffer
            .take(len as usize)
            .ok_or(Error::ResourceRecordTooShort(id))?;
        params.push(SvcParam {
            key,
            value: value.to_vec(),
        });
    }

    Ok((priority, target, params))
}

impl DomainName {
    /// Deserialise a name, expanding compression pointers.
    ///
    /// Pointers may only point to earlier positions in the message
    /// (RFC 1035 section 4.1.4), and at most `POINTER_CHASE_LIMIT`
    /// pointers are followed before the name is rejected, so parsing
    /// terminates on any input.
    ///
    /// # Errors
    ///
    /// If the domain cannot be parsed.
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let mut labels = Vec::<Label>::with_capacity(5);
        let mut encoded_len = 0;
        let mut jumps = 0;
        // where parsing resumes after the first pointer is followed
        let mut resume = None;

        loop {
            let size_position = buffer.position();
            let size = buffer.next_u8().ok_or(Error::DomainTooShort(id))?;

            match size & 0b1100_0000 {
                0b0000_0000 => {
                    encoded_len += 1 + usize::from(size);
                    if encoded_len > DOMAINNAME_MAX_LEN {
                        return Err(Error::DomainTooLong(id));
                    }

                    if size == 0 {
                        labels.push(Label::new());
                        break;
                    }

                    if let Some(octets) = buffer.take(size as usize) {
                        labels.push(Label::from_wire(octets));
                    } else {
                        return Err(Error::DomainTooShort(id));
                    }
                }
                0b1100_0000 => {
                    jumps += 1;
                    if jumps > POINTER_CHASE_LIMIT {
                        return Err(Error::DomainPointerChainTooLong(id));
                    }

                    let hi = size & 0b0011_1111;
                    let lo = buffer.next_u8().ok_or(Error::DomainTooShort(id))?;
                    let target = usize::from(u16::from_be_bytes([hi, lo]));

                    // pointers must reach backwards (not merely to a
                    // different position: an earlier one: RFC 1035
                    // section 4.1.4)
                    if target >= size_position {
                        return Err(Error::DomainPointerInvalid(id));
                    }

                    if resume.is_none() {
                        resume = Some(buffer.position());
                    }
                    buffer.seek(target);
                }
                // 0b01 and 0b10 are reserved length encodings
                _ => return Err(Error::DomainLabelInvalid(id)),
            }
        }

        if let Some(position) = resume {
            buffer.seek(position);
        }

        // the terminating root label is pushed above, so this can only
        // fail on length, which was already checked
        DomainName::from_labels(labels).ok_or(Error::DomainTooLong(id))
    }
}

/// Errors encountered when parsing a datagram.  In all the errors
/// which have a `u16` parameter, that is the ID from the header - so
/// that the failure can be correlated with the query it answered.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    /// The datagram is not even 2 octets long, so it doesn't even
    /// contain a valid ID.
    CompletelyBusted,

    /// The header is missing one or more required fields.
    HeaderTooShort(u16),

    /// The message carries the TC flag.  This codec discards
    /// truncated messages rather than retrying over TCP.
    Truncated(u16),

    /// A question ends with an incomplete field.
    QuestionTooShort(u16),

    /// A resource record ends with an incomplete field.
    ResourceRecordTooShort(u16),

    /// A resource record's typed payload did not consume exactly
    /// RDLENGTH octets.
    ResourceRecordInvalid(u16),

    /// A domain is incomplete.
    DomainTooShort(u16),

    /// A domain is over 255 octets in size.
    DomainTooLong(u16),

    /// A domain pointer points to or after the current position.
    DomainPointerInvalid(u16),

    /// A domain name chased more pointers than the chase limit.
    DomainPointerChainTooLong(u16),

    /// A length octet uses one of the reserved encodings (`10` or
    /// `01` in the top bits).
    DomainLabelInvalid(u16),
}

impl Error {
    pub fn id(self) -> Option<u16> {
        match self {
            Error::CompletelyBusted => None,
            Error::HeaderTooShort(id)
            | Error::Truncated(id)
            | Error::QuestionTooShort(id)
            | Error::ResourceRecordTooShort(id)
            | Error::ResourceRecordInvalid(id)
            | Error::DomainTooShort(id)
            | Error::DomainTooLong(id)
            | Error::DomainPointerInvalid(id)
            | Error::DomainPointerChainTooLong(id)
            | Error::DomainLabelInvalid(id) => Some(id),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::CompletelyBusted => write!(f, "datagram too short to carry an ID"),
            Error::HeaderTooShort(id) => write!(f, "header too short (id {id})"),
            Error::Truncated(id) => write!(f, "truncated message discarded (id {id})"),
            Error::QuestionTooShort(id) => write!(f, "question too short (id {id})"),
            Error::ResourceRecordTooShort(id) => write!(f, "record too short (id {id})"),
            Error::ResourceRecordInvalid(id) => {
                write!(f, "record RDATA length mismatch (id {id})")
            }
            Error::DomainTooShort(id) => write!(f, "domain too short (id {id})"),
            Error::DomainTooLong(id) => write!(f, "domain over 255 octets (id {id})"),
            Error::DomainPointerInvalid(id) => {
                write!(f, "domain pointer not strictly backward (id {id})")
            }
            Error::DomainPointerChainTooLong(id) => {
                write!(f, "domain pointer chain too long (id {id})")
            }
            Error::DomainLabelInvalid(id) => {
                write!(f, "reserved label length encoding (id {id})")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A buffer which will be consumed by the parsing process.
pub struct ConsumableBuffer<'a> {
    octets: &'a [u8],
    position: usize,
}

impl<'a> ConsumableBuffer<'a> {
    pub fn new(octets: &'a [u8]) -> Self {
        Self {
            octets,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Move to an absolute position.  Only name-compression pointers
    /// use this, and they may only move backwards.
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    pub fn next_u8(&mut self) -> Option<u8> {
        if self.octets.len() > self.position {
            let a = self.octets[self.position];
            self.position += 1;
            Some(a)
        } else {
            None
        }
    }

    pub fn next_u16(&mut self) -> Option<u16> {
        let slice = self.take(2)?;
        Some(u16::from_be_bytes([slice[0], slice[1]]))
    }

    pub fn next_u32(&mut self) -> Option<u32> {
        let slice = self.take(4)?;
        let mut octets = [0; 4];
        octets.copy_from_slice(slice);
        Some(u32::from_be_bytes(octets))
    }

    pub fn next_u128(&mut self) -> Option<u128> {
        let slice = self.take(16)?;
        let mut octets = [0; 16];
        octets.copy_from_slice(slice);
        Some(u128::from_be_bytes(octets))
    }

    pub fn take(&mut self, size: usize) -> Option<&'a [u8]> {
        if self.octets.len() >= self.position + size {
            let slice = &self.octets[self.position..self.position + size];
            self.position += size;
            Some(slice)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::test_util::*;

    #[test]
    fn deserialise_header() {
        // id 0x1234, QR + RD + RA, one question
        let octets = [
            0x12, 0x34, 0x81, 0x80, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let wire_header = WireHeader::deserialise(&mut ConsumableBuffer::new(&octets)).unwrap();

        assert_eq!(0x1234, wire_header.header.id);
        assert!(wire_header.header.is_response);
        assert_eq!(Opcode::Query, wire_header.header.opcode);
        assert!(!wire_header.header.is_authoritative);
        assert!(!wire_header.header.is_truncated);
        assert!(wire_header.header.recursion_desired);
        assert!(wire_header.header.recursion_available);
        assert!(!wire_header.header.authentic_data);
        assert!(!wire_header.header.checking_disabled);
        assert_eq!(Rcode::NoError, wire_header.header.rcode);
        assert_eq!(1, wire_header.qdcount);
        assert_eq!(0, wire_header.ancount);
        assert_eq!(0, wire_header.nscount);
        assert_eq!(0, wire_header.arcount);
    }

    #[test]
    fn deserialise_truncated_message_fails() {
        let octets = [
            0x12, 0x34, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        assert_eq!(
            Err(Error::Truncated(0x1234)),
            Message::from_octets(&octets)
        );
    }

    #[test]
    fn deserialise_name_follows_backward_pointer() {
        // "foo." at offset 0, then a pointer back to it at offset 5
        let octets = [3, 0x66, 0x6f, 0x6f, 0x00, 0xc0, 0x00];

        let mut buffer = ConsumableBuffer::new(&octets);
        buffer.seek(5);
        let name = DomainName::deserialise(0, &mut buffer).unwrap();

        assert_eq!(domain("foo."), name);
        assert_eq!(7, buffer.position());
    }

    #[test]
    fn deserialise_name_rejects_forward_pointer() {
        let octets = [0xc0, 0x02, 0xc0, 0x00];

        assert_eq!(
            Err(Error::DomainPointerInvalid(0)),
            DomainName::deserialise(0, &mut ConsumableBuffer::new(&octets))
        );
    }

    #[test]
    fn deserialise_name_rejects_pointer_loop() {
        // offset 2 points back to 0, which points forward to 2
        let octets = [0xc0, 0x02, 0xc0, 0x00];

        let mut buffer = ConsumableBuffer::new(&octets);
        buffer.seek(2);
        assert_eq!(
            Err(Error::DomainPointerInvalid(0)),
            DomainName::deserialise(0, &mut buffer)
        );
    }

    #[test]
    fn deserialise_name_rejects_long_pointer_chain() {
        // a ladder of pointers, each reaching strictly backward, more
        // than the chase limit deep
        let mut octets = Vec::new();
        for i in 0..40_u16 {
            let target = 2 * i.saturating_sub(1);
            octets.extend_from_slice(&(0xc000 | target).to_be_bytes());
        }
        // entry 0 would loop onto itself, overwrite it with the root
        octets[0] = 0;
        octets[1] = 0;

        let mut buffer = ConsumableBuffer::new(&octets);
        buffer.seek(octets.len() - 2);
        assert_eq!(
            Err(Error::DomainPointerChainTooLong(0)),
            DomainName::deserialise(0, &mut buffer)
        );
    }

    #[test]
    fn deserialise_name_rejects_reserved_encodings() {
        for size in [0b0100_0000_u8, 0b1000_0000] {
            let octets = [size, 0x00];
            assert_eq!(
                Err(Error::DomainLabelInvalid(0)),
                DomainName::deserialise(0, &mut ConsumableBuffer::new(&octets))
            );
        }
    }

    #[test]
    fn deserialise_name_is_opaque() {
        let octets = [2, 0xff, 0x01, 0x00];
        let name = DomainName::deserialise(0, &mut ConsumableBuffer::new(&octets)).unwrap();
        assert_eq!(&[0xff, 0x01][..], &name.labels[0].octets()[..]);
    }

    #[test]
    fn deserialise_record_checks_rdlength() {
        // an A record claiming 5 octets of RDATA but using 4
        let mut octets = vec![3, 0x66, 0x6f, 0x6f, 0x00];
        octets.extend_from_slice(&u16::from(RecordType::A).to_be_bytes());
        octets.extend_from_slice(&u16::from(RecordClass::IN).to_be_bytes());
        octets.extend_from_slice(&300_u32.to_be_bytes());
        octets.extend_from_slice(&5_u16.to_be_bytes());
        octets.extend_from_slice(&[192, 0, 2, 1, 0]);

        assert_eq!(
            Err(Error::ResourceRecordInvalid(0)),
            ResourceRecord::deserialise(0, &mut ConsumableBuffer::new(&octets))
        );
    }

    #[test]
    fn deserialise_record_reads_cache_flush_bit() {
        let mut octets = vec![4, 0x68, 0x6f, 0x73, 0x74, 0x00];
        octets.extend_from_slice(&u16::from(RecordType::A).to_be_bytes());
        octets.extend_from_slice(&(CLASS_MASK_MDNS_FLAG | 1).to_be_bytes());
        octets.extend_from_slice(&120_u32.to_be_bytes());
        octets.extend_from_slice(&4_u16.to_be_bytes());
        octets.extend_from_slice(&[192, 0, 2, 1]);

        let rr = ResourceRecord::deserialise(0, &mut ConsumableBuffer::new(&octets)).unwrap();
        assert!(rr.cache_flush);
        assert_eq!(RecordClass::IN, rr.rclass);
        assert_eq!(
            RecordTypeWithData::A {
                address: "192.0.2.1".parse().unwrap()
            },
            rr.rtype_with_data
        );
    }

    #[test]
    fn deserialise_question_reads_unicast_response_bit() {
        let mut octets = vec![4, 0x68, 0x6f, 0x73, 0x74, 0x00];
        octets.extend_from_slice(&u16::from(RecordType::A).to_be_bytes());
        octets.extend_from_slice(&(CLASS_MASK_MDNS_FLAG | 1).to_be_bytes());

        let q = Question::deserialise(0, &mut ConsumableBuffer::new(&octets)).unwrap();
        assert!(q.unicast_response);
        assert_eq!(QueryClass::Record(RecordClass::IN), q.qclass);
    }

    #[test]
    fn deserialise_txt_splits_strings() {
        let mut octets = vec![1, 0x74, 0x00];
        octets.extend_from_slice(&u16::from(RecordType::TXT).to_be_bytes());
        octets.extend_from_slice(&u16::from(RecordClass::IN).to_be_bytes());
        octets.extend_from_slice(&120_u32.to_be_bytes());
        octets.extend_from_slice(&9_u16.to_be_bytes());
        octets.extend_from_slice(&[2, b'h', b'i', 5, b't', b'h', b'e', b'r', b'e']);

        let rr = ResourceRecord::deserialise(0, &mut ConsumableBuffer::new(&octets)).unwrap();
        assert_eq!(
            RecordTypeWithData::TXT {
                strings: vec![b"hi".to_vec(), b"there".to_vec()]
            },
            rr.rtype_with_data
        );
    }

    #[test]
    fn deserialise_txt_rejects_overrun() {
        // inner string length runs past RDLENGTH
        let mut octets = vec![1, 0x74, 0x00];
        octets.extend_from_slice(&u16::from(RecordType::TXT).to_be_bytes());
        octets.extend_from_slice(&u16::from(RecordClass::IN).to_be_bytes());
        octets.extend_from_slice(&120_u32.to_be_bytes());
        octets.extend_from_slice(&3_u16.to_be_bytes());
        octets.extend_from_slice(&[9, b'h', b'i']);

        assert!(ResourceRecord::deserialise(0, &mut ConsumableBuffer::new(&octets)).is_err());
    }

    #[test]
    fn deserialise_svcb_params() {
        let mut octets = vec![3, 0x73, 0x76, 0x63, 0x00];
        octets.extend_from_slice(&u16::from(RecordType::HTTPS).to_be_bytes());
        octets.extend_from_slice(&u16::from(RecordClass::IN).to_be_bytes());
        octets.extend_from_slice(&120_u32.to_be_bytes());
        // priority (2) + root target (1) + alpn param (4 + 3)
        octets.extend_from_slice(&10_u16.to_be_bytes());
        octets.extend_from_slice(&1_u16.to_be_bytes());
        octets.push(0);
        octets.extend_from_slice(&u16::from(SvcParamKey::Alpn).to_be_bytes());
        octets.extend_from_slice(&3_u16.to_be_bytes());
        octets.extend_from_slice(&[2, b'h', b'2']);

        let rr = ResourceRecord::deserialise(0, &mut ConsumableBuffer::new(&octets)).unwrap();
        assert_eq!(
            RecordTypeWithData::HTTPS {
                priority: 1,
                target: DomainName::root(),
                params: vec![SvcParam {
                    key: SvcParamKey::Alpn,
                    value: vec![2, b'h', b'2'],
                }],
            },
            rr.rtype_with_data
        );
    }

    #[test]
    fn deserialise_opaque_fallback() {
        let mut octets = vec![1, 0x78, 0x00];
        octets.extend_from_slice(&99_u16.to_be_bytes());
        octets.extend_from_slice(&u16::from(RecordClass::IN).to_be_bytes());
        octets.extend_from_slice(&120_u32.to_be_bytes());
        octets.extend_from_slice(&2_u16.to_be_bytes());
        octets.extend_from_slice(&[0xaa, 0xbb]);

        let rr = ResourceRecord::deserialise(0, &mut ConsumableBuffer::new(&octets)).unwrap();
        assert_eq!(
            RecordTypeWithData::Opaque {
                rtype: RecordType::from(99),
                octets: vec![0xaa, 0xbb],
            },
            rr.rtype_with_data
        );
    }
}
