//! Short-window suppression of duplicate datagrams.  Multicast
//! responders often repeat announcements, and a machine with several
//! interfaces on one link hears each datagram once per join, so
//! recently-seen messages are dropped before they touch the cache.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use beacon_types::protocol::types::Message;

/// How many `(message, sender)` pairs are remembered.
pub const WINDOW_CAPACITY: usize = 100;

/// How long a pair is remembered for.
pub const WINDOW_TTL: Duration = Duration::from_secs(5);

/// A bounded FIFO of recently seen `(message, sender)` pairs, evicted
/// by age or by size.
#[derive(Debug)]
pub struct RecentMessageWindow {
    entries: VecDeque<Entry>,
}

#[derive(Debug)]
struct Entry {
    fingerprint: u64,
    sender: SocketAddr,
    received: Instant,
}

impl RecentMessageWindow {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(WINDOW_CAPACITY),
        }
    }

    /// Report whether this `(message, sender)` pair was seen within
    /// the window, recording it if not.
    pub fn seen_recently(&mut self, message: &Message, sender: SocketAddr) -> bool {
        self.seen_at(Instant::now(), message, sender)
    }

    fn seen_at(&mut self, now: Instant, message: &Message, sender: SocketAddr) -> bool {
        while let Some(entry) = self.entries.front() {
            if now.saturating_duration_since(entry.received) > WINDOW_TTL {
                self.entries.pop_front();
            } else {
                break;
            }
        }

        let fingerprint = fingerprint(message);
        if self
            .entries
            .iter()
            .any(|entry| entry.fingerprint == fingerprint && entry.sender == sender)
        {
            return true;
        }

        if self.entries.len() == WINDOW_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(Entry {
            fingerprint,
            sender,
            received: now,
        });

        false
    }
}

impl Default for RecentMessageWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// The identity of a multicast message is its content: the
/// transaction id is always zero on the multicast wire, so only the
/// questions, answers, and additional records distinguish datagrams.
fn fingerprint(message: &Message) -> u64 {
    let mut hasher = DefaultHasher::new();
    message.questions.hash(&mut hasher);
    message.answers.hash(&mut hasher);
    message.additional.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::time::Duration;

    use beacon_types::protocol::types::test_util::*;
    use beacon_types::protocol::types::*;

    use super::*;

    fn sender(port: u16) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::new(192, 0, 2, 7), port))
    }

    fn announcement(name: &str) -> Message {
        let mut message = Message::mdns_query(question(name, QueryType::Record(RecordType::A)))
            .make_response();
        message.answers = vec![a_record(name, Ipv4Addr::new(192, 0, 2, 1))];
        message
    }

    #[test]
    fn repeated_message_is_suppressed() {
        let mut window = RecentMessageWindow::new();
        let message = announcement("host.local.");

        assert!(!window.seen_recently(&message, sender(5353)));
        assert!(window.seen_recently(&message, sender(5353)));
    }

    #[test]
    fn different_sender_is_not_a_duplicate() {
        let mut window = RecentMessageWindow::new();
        let message = announcement("host.local.");

        assert!(!window.seen_recently(&message, sender(5353)));
        assert!(!window.seen_recently(&message, sender(5354)));
    }

    #[test]
    fn transaction_id_does_not_distinguish() {
        let mut window = RecentMessageWindow::new();
        let mut message = announcement("host.local.");

        assert!(!window.seen_recently(&message, sender(5353)));
        message.header.id = 0x1234;
        assert!(window.seen_recently(&message, sender(5353)));
    }

    #[test]
    fn entries_age_out() {
        let mut window = RecentMessageWindow::new();
        let message = announcement("host.local.");
        let start = Instant::now();

        assert!(!window.seen_at(start, &message, sender(5353)));
        assert!(window.seen_at(start + Duration::from_secs(4), &message, sender(5353)));
        assert!(!window.seen_at(start + Duration::from_secs(6), &message, sender(5353)));
    }

    #[test]
    fn window_is_bounded() {
        let mut window = RecentMessageWindow::new();
        let first = announcement("host-0.local.");
        assert!(!window.seen_recently(&first, sender(5353)));

        for i in 1..=WINDOW_CAPACITY {
            let message = announcement(&format!("host-{i}.local."));
            assert!(!window.seen_recently(&message, sender(5353)));
        }

        // the oldest entry fell off the end
        assert!(!window.seen_recently(&first, sender(5353)));
    }
}
