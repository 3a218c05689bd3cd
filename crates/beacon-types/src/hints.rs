//! A minimal reader for root-hints style zone fragments: the flat
//! `owner ttl type rdata` shape of the IANA `named.root` file, not the
//! full zone-file grammar.

use std::str::FromStr;

use crate::protocol::types::*;

/// Parse a hints fragment into resource records.
///
/// Each non-comment, non-empty line splits on whitespace into at most
/// four columns: owner, TTL, type, and rdata.  A, AAAA, PTR, CNAME,
/// DNAME, and NS records get typed payloads; any other type is carried
/// opaquely with the rdata text bytes.
///
/// # Errors
///
/// If a line does not have four columns, or a column fails to parse.
pub fn parse_hints(text: &str) -> Result<Vec<ResourceRecord>, Error> {
    let mut records = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        let mut columns = line.split_whitespace();
        let owner = columns.next().ok_or(Error::MissingColumn { line_number })?;
        let ttl = columns.next().ok_or(Error::MissingColumn { line_number })?;
        let rtype = columns.next().ok_or(Error::MissingColumn { line_number })?;
        let rdata = columns.next().ok_or(Error::MissingColumn { line_number })?;
        if columns.next().is_some() {
            return Err(Error::TooManyColumns { line_number });
        }

        let name = DomainName::parse(owner).ok_or(Error::InvalidOwner { line_number })?;
        let ttl = ttl
            .parse::<u32>()
            .map_err(|_| Error::InvalidTtl { line_number })?;
        let rtype_with_data = parse_rdata(rtype, rdata).ok_or(Error::InvalidRdata {
            line_number,
        })?;

        records.push(ResourceRecord::new(name, rtype_with_data, ttl));
    }

    Ok(records)
}

fn parse_rdata(rtype: &str, rdata: &str) -> Option<RecordTypeWithData> {
    let rtype = match RecordType::from_str(rtype) {
        Ok(rtype) => rtype,
        // numeric TYPEnnn forms and unrecognised mnemonics both land
        // in the opaque bucket
        Err(_) => {
            return Some(RecordTypeWithData::Opaque {
                rtype: RecordType::from(u16::MAX),
                octets: rdata.as_bytes().to_vec(),
            })
        }
    };

    match rtype {
        RecordType::A => Some(RecordTypeWithData::A {
            address: rdata.parse().ok()?,
        }),
        RecordType::AAAA => Some(RecordTypeWithData::AAAA {
            address: rdata.parse().ok()?,
        }),
        RecordType::PTR => Some(RecordTypeWithData::PTR {
            ptrdname: DomainName::parse(rdata)?,
        }),
        RecordType::CNAME => Some(RecordTypeWithData::CNAME {
            cname: DomainName::parse(rdata)?,
        }),
        RecordType::DNAME => Some(RecordTypeWithData::DNAME {
            target: DomainName::parse(rdata)?,
        }),
        RecordType::NS => Some(RecordTypeWithData::NS {
            nsdname: DomainName::parse(rdata)?,
        }),
        other => Some(RecordTypeWithData::Opaque {
            rtype: other,
            octets: rdata.as_bytes().to_vec(),
        }),
    }
}

/// Errors encountered reading a hints fragment.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    MissingColumn { line_number: usize },
    TooManyColumns { line_number: usize },
    InvalidOwner { line_number: usize },
    InvalidTtl { line_number: usize },
    InvalidRdata { line_number: usize },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::MissingColumn { line_number } => {
                write!(f, "line {line_number}: fewer than four columns")
            }
            Error::TooManyColumns { line_number } => {
                write!(f, "line {line_number}: more than four columns")
            }
            Error::InvalidOwner { line_number } => {
                write!(f, "line {line_number}: invalid owner name")
            }
            Error::InvalidTtl { line_number } => write!(f, "line {line_number}: invalid TTL"),
            Error::InvalidRdata { line_number } => {
                write!(f, "line {line_number}: invalid rdata")
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::protocol::types::test_util::*;

    const FRAGMENT: &str = "
;       This file holds the information on root name servers
.                        3600000      NS    A.ROOT-SERVERS.NET.
A.ROOT-SERVERS.NET.      3600000      A     198.41.0.4
A.ROOT-SERVERS.NET.      3600000      AAAA  2001:503:ba3e::2:30
";

    #[test]
    fn parses_root_fragment() {
        let records = parse_hints(FRAGMENT).unwrap();
        assert_eq!(3, records.len());

        assert_eq!(DomainName::root(), records[0].name);
        assert_eq!(
            RecordTypeWithData::NS {
                nsdname: domain("a.root-servers.net.")
            },
            records[0].rtype_with_data
        );
        assert_eq!(3_600_000, records[0].ttl);

        assert_eq!(
            RecordTypeWithData::A {
                address: Ipv4Addr::new(198, 41, 0, 4)
            },
            records[1].rtype_with_data
        );
        assert_eq!(
            RecordTypeWithData::AAAA {
                address: "2001:503:ba3e::2:30".parse().unwrap()
            },
            records[2].rtype_with_data
        );
    }

    #[test]
    fn unknown_type_becomes_opaque() {
        let records = parse_hints("x.example. 300 WKS some-data").unwrap();
        assert_eq!(
            RecordTypeWithData::Opaque {
                rtype: RecordType::from(u16::MAX),
                octets: b"some-data".to_vec(),
            },
            records[0].rtype_with_data
        );
    }

    #[test]
    fn soa_mnemonic_is_opaque_not_error() {
        let records = parse_hints("x.example. 300 SOA whatever").unwrap();
        assert_eq!(RecordType::SOA, records[0].rtype());
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(
            Err(Error::MissingColumn { line_number: 1 }),
            parse_hints("x.example. 300 A")
        );
        assert_eq!(
            Err(Error::InvalidTtl { line_number: 1 }),
            parse_hints("x.example. soon A 192.0.2.1")
        );
        assert_eq!(
            Err(Error::InvalidRdata { line_number: 1 }),
            parse_hints("x.example. 300 A not-an-address")
        );
    }

    #[test]
    fn skips_comments_and_blanks() {
        let records = parse_hints("; comment\n\n# another\n").unwrap();
        assert!(records.is_empty());
    }
}
