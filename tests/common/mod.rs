//! Shared test utilities
//!
//! [`MemoryNetwork`] stands in for a multicast segment: every record a
//! process advertises is reported to every browser of its service type,
//! the advertiser's own included. Notifications are delivered on their own
//! threads, as a multicast daemon would; [`MemoryNetwork::settle`] waits for
//! them.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;

use beacon_discovery::config::DiscoveryConfig;
use beacon_discovery::discovery::{
    BrowseHandle, DispatcherAccess, RecordChannel, RecordListener, RecordType, ResolvedRecord,
    ServiceRecord,
};
use beacon_discovery::{
    DiscoveryService, EndpointDescription, EndpointRegistry, ImportRegistry, Result,
};
use tracing_subscriber::fmt::MakeWriter;

struct Browser {
    id: u64,
    record_type: RecordType,
    service_type: String,
    listener: Arc<dyn RecordListener>,
}

#[derive(Default)]
struct NetworkState {
    /// Published records by full name, with their service type
    records: HashMap<String, (String, ResolvedRecord)>,
    browsers: Vec<Browser>,
    next_browser: u64,
    deliveries: Vec<JoinHandle<()>>,
}

/// In-process multicast segment
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel for a host reachable at `address`
    pub fn channel(&self, address: &str) -> Arc<MemoryChannel> {
        Arc::new(MemoryChannel {
            network: self.clone(),
            address: address.to_string(),
        })
    }

    /// Publish a record directly, bypassing any discovery service
    pub fn inject(&self, service_type: &str, name: &str, properties: &[(&str, &str)]) {
        let record = ResolvedRecord {
            name: name.to_string(),
            address: Some("192.0.2.1".to_string()),
            port: 9000,
            properties: properties
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
        };
        self.publish(service_type, record);
    }

    /// Wait until every pending notification has been handled
    pub fn settle(&self) {
        loop {
            let pending: Vec<_> = self.state.lock().unwrap().deliveries.drain(..).collect();
            if pending.is_empty() {
                return;
            }
            for delivery in pending {
                delivery.join().expect("listener panicked");
            }
        }
    }

    fn publish(&self, service_type: &str, record: ResolvedRecord) {
        let mut state = self.state.lock().unwrap();
        let name = record.name.clone();
        state
            .records
            .insert(name.clone(), (service_type.to_string(), record));
        notify(&mut state, service_type, &name, true);
    }

    /// Withdraw a record directly
    pub fn retract(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some((service_type, _)) = state.records.remove(name) {
            notify(&mut state, &service_type, name, false);
        }
    }
}

fn notify(state: &mut NetworkState, service_type: &str, name: &str, discovered: bool) {
    let targets: Vec<_> = state
        .browsers
        .iter()
        .filter(|b| b.service_type == service_type)
        .map(|b| (b.record_type, Arc::clone(&b.listener)))
        .collect();

    for (record_type, listener) in targets {
        let name = name.to_string();
        state.deliveries.push(std::thread::spawn(move || {
            if discovered {
                listener.record_discovered(record_type, &name);
            } else {
                listener.record_removed(record_type, &name);
            }
        }));
    }
}

/// One host's view of a [`MemoryNetwork`]
pub struct MemoryChannel {
    network: MemoryNetwork,
    address: String,
}

struct MemoryBrowse {
    network: MemoryNetwork,
    id: u64,
}

impl BrowseHandle for MemoryBrowse {
    fn cancel(self: Box<Self>) {
        self.network
            .state
            .lock()
            .unwrap()
            .browsers
            .retain(|b| b.id != self.id);
    }
}

impl RecordChannel for MemoryChannel {
    fn advertise(&self, record: &ServiceRecord) -> Result<()> {
        let resolved = ResolvedRecord {
            name: record.name(),
            address: Some(
                record
                    .address
                    .map_or_else(|| self.address.clone(), |a| a.to_string()),
            ),
            port: record.port,
            properties: record.properties.clone(),
        };
        self.network.publish(&record.service_type, resolved);
        Ok(())
    }

    fn withdraw(&self, record: &ServiceRecord) -> Result<()> {
        self.network.retract(&record.name());
        Ok(())
    }

    fn resolve(&self, _: RecordType, name: &str) -> Result<Option<ResolvedRecord>> {
        Ok(self
            .network
            .state
            .lock()
            .unwrap()
            .records
            .get(name)
            .map(|(_, record)| record.clone()))
    }

    fn browse(
        &self,
        record_type: RecordType,
        service_type: &str,
        listener: Arc<dyn RecordListener>,
    ) -> Result<Box<dyn BrowseHandle>> {
        let mut state = self.network.state.lock().unwrap();
        let id = state.next_browser;
        state.next_browser += 1;
        state.browsers.push(Browser {
            id,
            record_type,
            service_type: service_type.to_string(),
            listener: Arc::clone(&listener),
        });

        // Report what is already on the network
        let existing: Vec<_> = state
            .records
            .iter()
            .filter(|(_, (ty, _))| ty == service_type)
            .map(|(name, _)| name.clone())
            .collect();
        for name in existing {
            let listener = Arc::clone(&listener);
            state.deliveries.push(std::thread::spawn(move || {
                listener.record_discovered(record_type, &name);
            }));
        }

        Ok(Box::new(MemoryBrowse {
            network: self.network.clone(),
            id,
        }))
    }
}

/// Registry that records the calls it receives
#[derive(Default)]
pub struct RecordingRegistry {
    inner: ImportRegistry,
    pub added: Mutex<Vec<String>>,
    pub removed: Mutex<Vec<String>>,
}

impl RecordingRegistry {
    pub fn added(&self) -> Vec<String> {
        self.added.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }

    pub fn live(&self) -> usize {
        self.inner.len()
    }

    pub fn get(&self, uid: &str) -> Option<EndpointDescription> {
        self.inner.get(uid).map(|imported| imported.endpoint)
    }
}

impl EndpointRegistry for RecordingRegistry {
    fn add(&self, endpoint: EndpointDescription) -> bool {
        self.added.lock().unwrap().push(endpoint.id().to_string());
        self.inner.add(endpoint)
    }

    fn remove(&self, uid: &str) {
        self.removed.lock().unwrap().push(uid.to_string());
        self.inner.remove(uid);
    }
}

/// Dispatcher access that records discovered peers
pub struct RecordingAccess {
    port: u16,
    path: String,
    pub discovered: Mutex<Vec<(String, u16, String)>>,
}

impl RecordingAccess {
    pub fn new(port: u16, path: &str) -> Self {
        Self {
            port,
            path: path.to_string(),
            discovered: Mutex::new(Vec::new()),
        }
    }

    pub fn discovered(&self) -> Vec<(String, u16, String)> {
        self.discovered.lock().unwrap().clone()
    }
}

impl DispatcherAccess for RecordingAccess {
    fn access(&self) -> (u16, String) {
        (self.port, self.path.clone())
    }

    fn send_discovered(&self, address: &str, port: u16, path: &str) {
        self.discovered
            .lock()
            .unwrap()
            .push((address.to_string(), port, path.to_string()));
    }
}

/// A framework attached to a [`MemoryNetwork`]
pub struct Peer {
    pub service: Arc<DiscoveryService>,
    pub registry: Arc<RecordingRegistry>,
    pub access: Arc<RecordingAccess>,
}

/// Config with a small, fast retry budget
pub fn test_config() -> DiscoveryConfig {
    DiscoveryConfig {
        resolve_retries: 3,
        retry_delay: Duration::from_millis(1),
        ..DiscoveryConfig::default()
    }
}

/// Create (without starting) a framework on the network
pub fn peer(network: &MemoryNetwork, framework_uuid: &str, address: &str) -> Peer {
    let registry = Arc::new(RecordingRegistry::default());
    let access = Arc::new(RecordingAccess::new(8080, "/dispatcher"));
    let service = Arc::new(DiscoveryService::new(
        framework_uuid,
        test_config(),
        network.channel(address),
        registry.clone(),
        access.clone(),
    ));
    Peer {
        service,
        registry,
        access,
    }
}

/// Log output of every thread in the test process
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Install the capturing subscriber once per test binary
    pub fn install() -> Self {
        static CAPTURE: OnceLock<LogCapture> = OnceLock::new();

        CAPTURE
            .get_or_init(|| {
                let capture = Self::default();
                let _ = tracing_subscriber::fmt()
                    .with_writer(capture.clone())
                    .with_ansi(false)
                    .with_max_level(tracing::Level::DEBUG)
                    .try_init();
                capture
            })
            .clone()
    }

    /// Captured lines at `level` that mention every one of `needles`
    pub fn lines_with(&self, level: &str, needles: &[&str]) -> Vec<String> {
        let buffer = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buffer)
            .lines()
            .filter(|line| line.contains(level))
            .filter(|line| needles.iter().all(|needle| line.contains(needle)))
            .map(ToString::to_string)
            .collect()
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
