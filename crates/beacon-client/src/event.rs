//! The event surface.  The multicast client broadcasts `ClientEvent`s
//! to whoever is subscribed; the cache curator reports over a
//! single-consumer channel of `CacheEvent`s, which the client turns
//! into refresh queries.

use std::net::SocketAddr;

use beacon_types::protocol::types::{DomainName, Message, RecordType, ResourceRecord};

/// Events emitted by the multicast client's receive loops.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A response arrived and its records went into the cache.
    Answer {
        from: SocketAddr,
        message: Message,
        /// Records the cache had not seen before.
        added: Vec<ResourceRecord>,
        /// Records that refreshed an existing cache entry.
        updated: Vec<ResourceRecord>,
    },

    /// Another resolver on the link asked a question.  Callers may
    /// choose to answer; this library does not.
    Query { from: SocketAddr, message: Message },

    /// A socket or transport failure.  Receive loops carry on after
    /// emitting this.
    Error {
        from: Option<SocketAddr>,
        error: String,
    },
}

/// Events emitted by the cache curator.
///
/// The client consumes these from a handler registered at
/// construction, which is what breaks the cache-queries-cache cycle:
/// the curator only ever sends a description of what it noticed.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CacheEvent {
    /// Records under this owner are approaching expiry and were
    /// marked stale; a refresh query is warranted.
    RefreshDue {
        name: DomainName,
        rtypes: Vec<RecordType>,
    },

    /// A curator pass over this owner's bucket only evicted expired
    /// records.
    Expired { name: DomainName },
}
