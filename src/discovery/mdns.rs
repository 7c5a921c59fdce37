//! mDNS record channel
//!
//! Publishes records through an `mdns-sd` daemon and browses service types
//! on dedicated threads.
//!
//! Service types: `_rs-dispatcher._tcp.local.` and `_rs-endpoint._tcp.local.`
//! by default.
//! Instance names: the framework uuid for dispatchers, a name derived from
//! `(uid, framework uuid)` for endpoints.
//!
//! TXT records carry the encoded endpoint properties. A `key=value` entry
//! longer than a TXT string allows is split across `key#0`, `key#1`, ...
//! and joined again on resolution.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};

use super::channel::{BrowseHandle, RecordChannel, RecordListener};
use super::record::{RecordType, ResolvedRecord, ServiceRecord};
use crate::{Error, Result};

/// How often browse threads check for cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Longest `key=value` entry a TXT string can hold
const MAX_TXT_ENTRY: usize = 255;

/// Separates a property key from its chunk index
const CHUNK_MARKER: char = '#';

/// Most chunks a single property may be split into
const MAX_CHUNKS: usize = 1000;

/// Smallest chunk payload worth splitting into
const MIN_CHUNK: usize = 16;

type ResolvedCache = Arc<Mutex<HashMap<String, ResolvedRecord>>>;

/// Record channel over multicast DNS
pub struct MdnsChannel {
    /// mDNS daemon
    daemon: ServiceDaemon,

    /// Host name advertised with every record
    host_name: String,

    /// Records resolved by the browsers, by full name
    resolved: ResolvedCache,

    closed: AtomicBool,
}

impl MdnsChannel {
    /// Create a new mDNS channel
    ///
    /// # Errors
    ///
    /// Returns error if mDNS daemon cannot be created
    pub fn new() -> Result<Self> {
        let daemon = ServiceDaemon::new()?;

        let hostname = hostname::get()
            .map_or_else(|_| "beacon".to_string(), |h| h.to_string_lossy().to_string());

        Ok(Self {
            daemon,
            host_name: format!("{hostname}.local."),
            resolved: Arc::new(Mutex::new(HashMap::new())),
            closed: AtomicBool::new(false),
        })
    }

    fn service_info(&self, record: &ServiceRecord) -> Result<ServiceInfo> {
        let properties = split_txt_entries(&record.properties)?;

        let info = match record.address {
            Some(address) => ServiceInfo::new(
                &record.service_type,
                &record.instance,
                &self.host_name,
                address.to_string(),
                record.port,
                properties,
            )?,
            None => ServiceInfo::new(
                &record.service_type,
                &record.instance,
                &self.host_name,
                "",
                record.port,
                properties,
            )?
            .enable_addr_auto(),
        };

        Ok(info)
    }
}

impl RecordChannel for MdnsChannel {
    fn advertise(&self, record: &ServiceRecord) -> Result<()> {
        let info = self.service_info(record)?;
        self.daemon.register(info)?;

        tracing::debug!(
            name = %record.name(),
            port = record.port,
            ttl = record.ttl,
            "mDNS record registered"
        );
        Ok(())
    }

    fn withdraw(&self, record: &ServiceRecord) -> Result<()> {
        self.daemon.unregister(&record.name())?;
        tracing::debug!(name = %record.name(), "mDNS record unregistered");
        Ok(())
    }

    fn resolve(&self, _record_type: RecordType, name: &str) -> Result<Option<ResolvedRecord>> {
        Ok(self
            .resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned())
    }

    fn browse(
        &self,
        record_type: RecordType,
        service_type: &str,
        listener: Arc<dyn RecordListener>,
    ) -> Result<Box<dyn BrowseHandle>> {
        let receiver = self.daemon.browse(service_type)?;
        let stop = Arc::new(AtomicBool::new(false));

        let thread = {
            let stop = Arc::clone(&stop);
            let resolved = Arc::clone(&self.resolved);
            std::thread::Builder::new()
                .name(format!("mdns-browse-{record_type}"))
                .spawn(move || {
                    while !stop.load(Ordering::Acquire) {
                        let event = match receiver.recv_timeout(POLL_INTERVAL) {
                            Ok(event) => event,
                            Err(_) if receiver.is_disconnected() => break,
                            Err(_) => continue,
                        };

                        match event {
                            ServiceEvent::ServiceResolved(info) => {
                                let record = resolved_record(&info);
                                let name = record.name.clone();
                                resolved
                                    .lock()
                                    .unwrap_or_else(PoisonError::into_inner)
                                    .insert(name.clone(), record);
                                listener.record_discovered(record_type, &name);
                            }
                            ServiceEvent::ServiceRemoved(_, name) => {
                                resolved
                                    .lock()
                                    .unwrap_or_else(PoisonError::into_inner)
                                    .remove(&name);
                                listener.record_removed(record_type, &name);
                            }
                            ServiceEvent::SearchStopped(_) => break,
                            other => tracing::trace!(event = ?other, "mDNS event"),
                        }
                    }
                    tracing::debug!(%record_type, "browse thread exiting");
                })?
        };

        Ok(Box::new(MdnsBrowser {
            daemon: self.daemon.clone(),
            service_type: service_type.to_string(),
            stop,
            thread: Some(thread),
        }))
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.daemon.shutdown() {
            tracing::trace!(error = %e, "mDNS daemon shutdown error (expected on normal exit)");
        }
    }
}

impl Drop for MdnsChannel {
    fn drop(&mut self) {
        self.close();
    }
}

fn resolved_record(info: &ServiceInfo) -> ResolvedRecord {
    let properties = join_txt_entries(
        info.get_properties()
            .iter()
            .map(|p| (p.key().to_string(), p.val_str().to_string()))
            .collect(),
    );

    ResolvedRecord {
        name: info.get_fullname().to_string(),
        address: info.get_addresses().iter().next().map(ToString::to_string),
        port: info.get_port(),
        properties,
    }
}

/// Fit properties into TXT strings, splitting oversized values
fn split_txt_entries(properties: &BTreeMap<String, String>) -> Result<HashMap<String, String>> {
    let mut entries = HashMap::with_capacity(properties.len());

    for (key, value) in properties {
        if key.len() + 1 + value.len() <= MAX_TXT_ENTRY {
            entries.insert(key.clone(), value.clone());
            continue;
        }

        // Leave room for the marker and a three-digit index
        let budget = MAX_TXT_ENTRY.saturating_sub(key.len() + 1 + 4);
        if budget < MIN_CHUNK {
            return Err(Error::Encode(format!(
                "property key '{key}' is too long for a TXT record"
            )));
        }

        let chunks = utf8_chunks(value, budget);
        if chunks.len() > MAX_CHUNKS {
            return Err(Error::Encode(format!(
                "property '{key}' is too large for a TXT record ({} bytes)",
                value.len()
            )));
        }

        tracing::trace!(key = %key, chunks = chunks.len(), "splitting TXT entry");
        for (index, chunk) in chunks.into_iter().enumerate() {
            entries.insert(format!("{key}{CHUNK_MARKER}{index}"), chunk.to_string());
        }
    }

    Ok(entries)
}

/// Split on char boundaries into pieces of at most `budget` bytes
fn utf8_chunks(value: &str, budget: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = value;

    while !rest.is_empty() {
        let mut end = budget.min(rest.len());
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (head, tail) = rest.split_at(end);
        chunks.push(head);
        rest = tail;
    }

    chunks
}

/// Reassemble values split by [`split_txt_entries`]
///
/// Chunk sets with gaps, or whose base key is also present, are left as-is.
fn join_txt_entries(entries: BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    let mut chunked: BTreeMap<String, BTreeMap<usize, String>> = BTreeMap::new();

    for (key, value) in entries {
        let chunk = key.rsplit_once(CHUNK_MARKER).and_then(|(base, index)| {
            index.parse::<usize>().ok().map(|i| (base.to_string(), i))
        });
        match chunk {
            Some((base, index)) => {
                chunked.entry(base).or_default().insert(index, value);
            }
            None => {
                properties.insert(key, value);
            }
        }
    }

    for (base, chunks) in chunked {
        if chunks.keys().copied().eq(0..chunks.len()) && !properties.contains_key(&base) {
            properties.insert(base, chunks.into_values().collect());
        } else {
            for (index, value) in chunks {
                properties.insert(format!("{base}{CHUNK_MARKER}{index}"), value);
            }
        }
    }

    properties
}

/// A browse running on its own thread
struct MdnsBrowser {
    daemon: ServiceDaemon,
    service_type: String,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl BrowseHandle for MdnsBrowser {
    fn cancel(mut self: Box<Self>) {
        self.stop.store(true, Ordering::Release);
        if let Err(e) = self.daemon.stop_browse(&self.service_type) {
            tracing::trace!(service_type = %self.service_type, error = %e, "stop_browse failed");
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!(service_type = %self.service_type, "browse thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_DISPATCHER_TYPE, DEFAULT_ENDPOINT_TYPE};

    #[test]
    fn test_service_type_format() {
        for service_type in [DEFAULT_DISPATCHER_TYPE, DEFAULT_ENDPOINT_TYPE] {
            assert!(service_type.ends_with(".local."));
            assert!(service_type.starts_with('_'));
            assert!(service_type.contains("._tcp."));
        }
    }

    #[test]
    fn test_short_entries_are_kept() {
        let properties = BTreeMap::from([("endpoint-id".to_string(), "E1".to_string())]);
        let entries = split_txt_entries(&properties).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries["endpoint-id"], "E1");
    }

    #[test]
    fn test_long_entries_are_split_and_joined() {
        let classes = (0..40)
            .map(|i| format!("\"svc.Interface{i}\""))
            .collect::<Vec<_>>()
            .join(",");
        let properties = BTreeMap::from([
            ("object-class".to_string(), format!("[{classes}]")),
            ("doc".to_string(), format!("typed:xml:<a>{}</a>", "é".repeat(300))),
            ("endpoint-id".to_string(), "E1".to_string()),
        ]);

        let entries = split_txt_entries(&properties).unwrap();
        assert!(entries.len() > properties.len());
        for (key, value) in &entries {
            assert!(key.len() + 1 + value.len() <= MAX_TXT_ENTRY, "{key} too long");
        }
        assert!(entries.contains_key("object-class#0"));
        assert!(!entries.contains_key("object-class"));

        let joined = join_txt_entries(entries.into_iter().collect());
        assert_eq!(joined, properties);
    }

    #[test]
    fn test_oversized_key_is_rejected() {
        let properties = BTreeMap::from([("k".repeat(250), "value".to_string())]);
        assert!(matches!(
            split_txt_entries(&properties),
            Err(Error::Encode(_))
        ));
    }

    #[test]
    fn test_incomplete_chunks_are_left_alone() {
        let entries = BTreeMap::from([
            ("tags#0".to_string(), "a".to_string()),
            ("tags#2".to_string(), "c".to_string()),
        ]);
        assert_eq!(join_txt_entries(entries.clone()), entries);
    }

    #[test]
    fn test_oversized_record_is_not_registered() {
        // Actual mDNS may be unavailable in CI environments
        let Ok(channel) = MdnsChannel::new() else {
            return;
        };
        let record = ServiceRecord {
            record_type: RecordType::Endpoint,
            service_type: DEFAULT_ENDPOINT_TYPE.to_string(),
            instance: "oversized".to_string(),
            address: Some("127.0.0.1".parse().unwrap()),
            port: 8080,
            properties: BTreeMap::from([("k".repeat(250), "value".to_string())]),
            ttl: 60,
        };
        assert!(matches!(channel.advertise(&record), Err(Error::Encode(_))));
        channel.close();
    }

    #[test]
    fn test_channel_creation() {
        // Actual mDNS may be unavailable in CI environments
        if let Ok(channel) = MdnsChannel::new() {
            assert!(channel.host_name.ends_with(".local."));
            let resolved = channel
                .resolve(RecordType::Endpoint, "x._rs-endpoint._tcp.local.")
                .unwrap();
            assert!(resolved.is_none());
            channel.close();
        }
    }
}
