//! The passive record cache: populated purely by observing responses,
//! read by the resolvers, and swept by a curator task that marks
//! records for refresh before they expire.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use beacon_types::protocol::types::*;

use crate::event::CacheEvent;

/// How often the curator sweeps the cache.
pub const CURATOR_INTERVAL: Duration = Duration::from_secs(4);

/// Cache-flush tolerance: records newer than this survive a flush, so
/// a burst of flush-bit announcements coalesces instead of each one
/// evicting its siblings.
pub const FLUSH_GRACE: Duration = Duration::from_secs(2);

/// Records with less than this fraction of their lifetime left are
/// marked stale and reported for refresh.
pub const REFRESH_FRACTION: f64 = 0.125;

/// Records with more than this fraction of their lifetime left are
/// confident enough to attach to queries as known answers.
pub const KNOWN_ANSWER_FRACTION: f64 = 0.5;

/// What storing a record did to the cache.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StoreOutcome {
    /// The record is of a kind the cache does not hold.
    NoUpdate,
    /// An equal record already existed and was replaced, refreshing
    /// its TTL.
    Update,
    /// The record was not previously present.
    NewData,
}

const MUTEX_POISON_MESSAGE: &str =
    "[INTERNAL ERROR] cache mutex poisoned, cannot recover from this - aborting";

/// A convenience wrapper around a `Cache` which lets it be shared
/// between tasks.
///
/// Invoking `clone` on a `SharedCache` gives a new instance which
/// refers to the same underlying `Cache` object.
#[derive(Debug, Clone)]
pub struct SharedCache {
    cache: Arc<Mutex<Cache>>,
}

impl SharedCache {
    /// Make a new, empty, shared cache.
    pub fn new() -> Self {
        SharedCache {
            cache: Arc::new(Mutex::new(Cache::new())),
        }
    }

    /// Store a record.
    ///
    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn store(&self, record: &ResourceRecord) -> StoreOutcome {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .store_at(Instant::now(), record)
    }

    /// Store several records under one lock acquisition, discarding
    /// the per-record outcomes.
    ///
    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn store_all(&self, records: &[ResourceRecord]) {
        let mut cache = self.cache.lock().expect(MUTEX_POISON_MESSAGE);
        let now = Instant::now();
        for record in records {
            cache.store_at(now, record);
        }
    }

    /// Every fresh record under the owner whose type matches the
    /// query type.
    ///
    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn search(&self, name: &DomainName, qtype: QueryType) -> Vec<ResourceRecord> {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .search_at(Instant::now(), name, qtype)
    }

    /// Records under the owner, of the given types, that still have
    /// most of their lifetime: these accompany outgoing queries so
    /// responders may suppress their answers.
    ///
    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn known_answers(&self, name: &DomainName, rtypes: &[RecordType]) -> Vec<ResourceRecord> {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .known_answers_at(Instant::now(), name, rtypes)
    }

    /// Spawn the curator: every `CURATOR_INTERVAL` it evicts expired
    /// records, marks nearly-expired records stale, and reports what
    /// it found over the channel.  The task ends when the shutdown
    /// flag flips or the receiver goes away.
    pub fn spawn_curator(
        &self,
        events: mpsc::Sender<CacheEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CURATOR_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let pending = cache
                            .cache
                            .lock()
                            .expect(MUTEX_POISON_MESSAGE)
                            .curate_at(Instant::now());
                        for event in pending {
                            if events.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                    _ = shutdown.changed() => return,
                }
            }
        })
    }
}

impl Default for SharedCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Caching for `ResourceRecord`s, keyed by owner name.
///
/// You probably want to use `SharedCache` instead.  Operations on a
/// bucket happen under the shared lock, so updates to one owner are
/// serialised.
#[derive(Debug, Clone, Default)]
pub struct Cache {
    buckets: HashMap<DomainName, Vec<ResourceRecord>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record in its owner's bucket.
    ///
    /// OPT and opaque records are never stored, and neither are
    /// records with a zero TTL.  A record bearing the cache-flush bit
    /// first purges records of the same (owner, type) older than
    /// `FLUSH_GRACE`.
    pub fn store_at(&mut self, now: Instant, record: &ResourceRecord) -> StoreOutcome {
        if record.rtype() == RecordType::OPT || record.rtype_with_data.is_unknown() {
            return StoreOutcome::NoUpdate;
        }
        if record.ttl == 0 {
            return StoreOutcome::NoUpdate;
        }

        let bucket = self.buckets.entry(record.name.clone()).or_default();

        if record.cache_flush {
            let rtype = record.rtype();
            bucket.retain(|existing| {
                existing.rtype() != rtype
                    || now.saturating_duration_since(existing.created) <= FLUSH_GRACE
            });
        }

        if let Some(index) = bucket.iter().position(|existing| existing == record) {
            bucket[index] = record.clone();
            StoreOutcome::Update
        } else {
            bucket.push(record.clone());
            StoreOutcome::NewData
        }
    }

    /// Fresh records matching the query type.  Expired records under
    /// the owner are pruned on the way through.
    pub fn search_at(
        &mut self,
        now: Instant,
        name: &DomainName,
        qtype: QueryType,
    ) -> Vec<ResourceRecord> {
        let Some(bucket) = self.buckets.get_mut(name) else {
            return Vec::new();
        };

        bucket.retain(|record| !record.is_expired(now));
        let records = bucket
            .iter()
            .filter(|record| record.rtype().matches(qtype))
            .cloned()
            .collect();

        if bucket.is_empty() {
            self.buckets.remove(name);
        }

        records
    }

    /// Records of the given types with more than
    /// `KNOWN_ANSWER_FRACTION` of their lifetime remaining.
    pub fn known_answers_at(
        &self,
        now: Instant,
        name: &DomainName,
        rtypes: &[RecordType],
    ) -> Vec<ResourceRecord> {
        let Some(bucket) = self.buckets.get(name) else {
            return Vec::new();
        };

        bucket
            .iter()
            .filter(|record| {
                rtypes.contains(&record.rtype())
                    && record.remaining_fraction(now) > KNOWN_ANSWER_FRACTION
            })
            .cloned()
            .collect()
    }

    /// One curator pass: per bucket, evict expired records, mark
    /// nearly-expired records stale, and describe what happened.
    pub fn curate_at(&mut self, now: Instant) -> Vec<CacheEvent> {
        let mut events = Vec::new();

        self.buckets.retain(|name, bucket| {
            let before = bucket.len();
            bucket.retain(|record| !record.is_expired(now));
            let expired = before - bucket.len();

            let mut rtypes = Vec::new();
            for record in bucket.iter_mut() {
                if !record.stale && record.remaining_fraction(now) < REFRESH_FRACTION {
                    record.stale = true;
                    if !rtypes.contains(&record.rtype()) {
                        rtypes.push(record.rtype());
                    }
                }
            }

            if !rtypes.is_empty() {
                events.push(CacheEvent::RefreshDue {
                    name: name.clone(),
                    rtypes,
                });
            } else if expired > 0 {
                events.push(CacheEvent::Expired { name: name.clone() });
            }

            !bucket.is_empty()
        });

        events
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use beacon_types::protocol::types::test_util::*;

    use super::*;

    #[test]
    fn store_then_search() {
        let mut cache = Cache::new();
        let now = Instant::now();
        let rr = a_record("host.local.", Ipv4Addr::new(192, 0, 2, 1));

        assert_eq!(StoreOutcome::NewData, cache.store_at(now, &rr));
        assert_eq!(
            vec![rr.clone()],
            cache.search_at(now, &rr.name, QueryType::Record(RecordType::A))
        );
        assert_eq!(
            vec![rr.clone()],
            cache.search_at(now, &rr.name, QueryType::Wildcard)
        );
        assert!(cache
            .search_at(now, &rr.name, QueryType::Record(RecordType::AAAA))
            .is_empty());
    }

    #[test]
    fn search_is_case_insensitive() {
        let mut cache = Cache::new();
        let now = Instant::now();
        let rr = a_record("host.local.", Ipv4Addr::new(192, 0, 2, 1));
        cache.store_at(now, &rr);

        assert_eq!(
            1,
            cache
                .search_at(now, &domain("HOST.LOCAL."), QueryType::Record(RecordType::A))
                .len()
        );
    }

    #[test]
    fn store_deduplicates_and_reports_update() {
        let mut cache = Cache::new();
        let now = Instant::now();
        let rr = a_record("host.local.", Ipv4Addr::new(192, 0, 2, 1));

        assert_eq!(StoreOutcome::NewData, cache.store_at(now, &rr));
        let mut refreshed = rr.clone();
        refreshed.ttl = 500;
        assert_eq!(StoreOutcome::Update, cache.store_at(now, &refreshed));

        let found = cache.search_at(now, &rr.name, QueryType::Record(RecordType::A));
        assert_eq!(1, found.len());
        assert_eq!(500, found[0].ttl);
    }

    #[test]
    fn opaque_and_opt_records_are_not_stored() {
        let mut cache = Cache::new();
        let now = Instant::now();

        let nsec = opaque_record("host.local.", 47, &[1, 2, 3]);
        assert_eq!(StoreOutcome::NoUpdate, cache.store_at(now, &nsec));

        let opt = opaque_record(".", 41, &[]);
        assert_eq!(StoreOutcome::NoUpdate, cache.store_at(now, &opt));

        assert!(cache
            .search_at(now, &domain("host.local."), QueryType::Wildcard)
            .is_empty());
    }

    #[test]
    fn zero_ttl_records_are_not_stored() {
        let mut cache = Cache::new();
        let now = Instant::now();
        let mut rr = a_record("host.local.", Ipv4Addr::new(192, 0, 2, 1));
        rr.ttl = 0;

        assert_eq!(StoreOutcome::NoUpdate, cache.store_at(now, &rr));
    }

    #[test]
    fn expired_records_vanish_from_search() {
        let mut cache = Cache::new();
        let rr = a_record("host.local.", Ipv4Addr::new(192, 0, 2, 1));
        let created = rr.created;
        cache.store_at(created, &rr);

        // just before expiry: fresh
        assert_eq!(
            1,
            cache
                .search_at(
                    created + Duration::from_secs(299),
                    &rr.name,
                    QueryType::Record(RecordType::A)
                )
                .len()
        );
        // just after: gone, and the bucket is pruned
        assert!(cache
            .search_at(
                created + Duration::from_secs(301),
                &rr.name,
                QueryType::Record(RecordType::A)
            )
            .is_empty());
        assert!(cache.buckets.is_empty());
    }

    #[test]
    fn cache_flush_coalesces_within_grace() {
        let mut cache = Cache::new();
        let t0 = Instant::now();

        let mut r1 = a_record("host.local.", Ipv4Addr::new(192, 0, 2, 1));
        r1.cache_flush = true;
        let mut r2 = a_record("host.local.", Ipv4Addr::new(192, 0, 2, 2));
        r2.cache_flush = true;
        let mut r3 = a_record("host.local.", Ipv4Addr::new(192, 0, 2, 3));
        r3.cache_flush = true;

        cache.store_at(t0, &r1);
        // one second later: r1 is still within the grace window
        cache.store_at(t0 + Duration::from_secs(1), &r2);
        assert_eq!(
            2,
            cache
                .search_at(t0 + Duration::from_secs(1), &r1.name, QueryType::Wildcard)
                .len()
        );

        // five seconds later: r1 and r2 are outside it and get purged
        cache.store_at(t0 + Duration::from_secs(5), &r3);
        let found = cache.search_at(t0 + Duration::from_secs(5), &r1.name, QueryType::Wildcard);
        assert_eq!(vec![r3], found);
    }

    #[test]
    fn cache_flush_leaves_other_types_alone() {
        let mut cache = Cache::new();
        let t0 = Instant::now();

        let srv = srv_record("host.local.", 80, "target.local.");
        cache.store_at(t0, &srv);

        let mut addr = a_record("host.local.", Ipv4Addr::new(192, 0, 2, 1));
        addr.cache_flush = true;
        cache.store_at(t0 + Duration::from_secs(10), &addr);

        assert_eq!(
            2,
            cache
                .search_at(t0 + Duration::from_secs(10), &srv.name, QueryType::Wildcard)
                .len()
        );
    }

    #[test]
    fn known_answers_require_half_lifetime() {
        let mut cache = Cache::new();
        let rr = ptr_record("_http._tcp.local.", "web._http._tcp.local.");
        let created = rr.created;
        cache.store_at(created, &rr);

        let early = cache.known_answers_at(
            created + Duration::from_secs(100),
            &rr.name,
            &[RecordType::PTR],
        );
        assert_eq!(1, early.len());

        let late = cache.known_answers_at(
            created + Duration::from_secs(200),
            &rr.name,
            &[RecordType::PTR],
        );
        assert!(late.is_empty());
    }

    #[test]
    fn curator_marks_stale_and_reports_refresh() {
        let mut cache = Cache::new();
        let rr = srv_record("web._http._tcp.local.", 80, "host.local.");
        let created = rr.created;
        cache.store_at(created, &rr);

        // 280s into a 300s lifetime: under an eighth remaining
        let events = cache.curate_at(created + Duration::from_secs(280));
        assert_eq!(
            vec![CacheEvent::RefreshDue {
                name: rr.name.clone(),
                rtypes: vec![RecordType::SRV],
            }],
            events
        );

        // already stale: a second pass stays quiet
        assert!(cache
            .curate_at(created + Duration::from_secs(281))
            .is_empty());

        // expired: the bucket drains and reports
        let events = cache.curate_at(created + Duration::from_secs(301));
        assert_eq!(
            vec![CacheEvent::Expired {
                name: rr.name.clone()
            }],
            events
        );
        assert!(cache.buckets.is_empty());
    }

    #[test]
    fn curator_leaves_young_records_alone() {
        let mut cache = Cache::new();
        let rr = a_record("host.local.", Ipv4Addr::new(192, 0, 2, 1));
        let created = rr.created;
        cache.store_at(created, &rr);

        assert!(cache
            .curate_at(created + Duration::from_secs(100))
            .is_empty());
        assert!(!cache.buckets.is_empty());
    }

    #[tokio::test]
    async fn curator_task_stops_on_shutdown() {
        let cache = SharedCache::new();
        let (event_tx, _event_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = cache.spawn_curator(event_tx, shutdown_rx);
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
