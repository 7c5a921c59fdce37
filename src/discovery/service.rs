//! Discovery service
//!
//! Advertises the local dispatcher and exported endpoints, browses for the
//! peers' ones, and keeps the endpoint registry in step with what the
//! network reports.
//!
//! Browse notifications arrive on the channel's threads. Each discovery
//! event is handled on its own: a timeout or a malformed record drops that
//! event only.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::channel::{BrowseHandle, RecordChannel, RecordListener};
use super::dispatcher::DispatcherAccess;
use super::record::{
    RecordType, ResolvedRecord, ServiceRecord, dispatcher_instance, endpoint_instance,
};
use crate::codec::{deserialize_properties, serialize_properties};
use crate::config::DiscoveryConfig;
use crate::endpoint::{
    ACCESS_PATH, ACCESS_PORT, EndpointDescription, ExportEndpoint, FRAMEWORK_UUID,
};
use crate::registry::EndpointRegistry;
use crate::value::Value;
use crate::{Error, Result};

#[derive(Debug, Default)]
struct DiscoveryState {
    dispatcher: Option<ServiceRecord>,
    /// Advertised records by endpoint uid
    exported: HashMap<String, ServiceRecord>,
    /// Imported endpoint uids by advertised record name
    imported: HashMap<String, String>,
}

/// Advertises local records and imports discovered ones
pub struct DiscoveryService {
    framework_uuid: String,
    config: DiscoveryConfig,
    channel: Arc<dyn RecordChannel>,
    registry: Arc<dyn EndpointRegistry>,
    access: Arc<dyn DispatcherAccess>,
    state: Mutex<DiscoveryState>,
    browsers: Mutex<Vec<Box<dyn BrowseHandle>>>,
}

impl DiscoveryService {
    #[must_use]
    pub fn new(
        framework_uuid: impl Into<String>,
        config: DiscoveryConfig,
        channel: Arc<dyn RecordChannel>,
        registry: Arc<dyn EndpointRegistry>,
        access: Arc<dyn DispatcherAccess>,
    ) -> Self {
        Self {
            framework_uuid: framework_uuid.into(),
            config,
            channel,
            registry,
            access,
            state: Mutex::new(DiscoveryState::default()),
            browsers: Mutex::new(Vec::new()),
        }
    }

    /// Identity of the local framework
    #[must_use]
    pub fn framework_uuid(&self) -> &str {
        &self.framework_uuid
    }

    /// Publish the dispatcher record and start browsing for peers
    ///
    /// # Errors
    ///
    /// Returns error if the dispatcher record cannot be published or a
    /// browser cannot be started
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let (port, path) = self.access.access();
        let properties = serialize_properties(
            &[
                (FRAMEWORK_UUID.to_string(), Value::from(self.framework_uuid.as_str())),
                (ACCESS_PORT.to_string(), Value::from(port)),
                (ACCESS_PATH.to_string(), Value::from(path)),
            ]
            .into_iter()
            .collect(),
        );

        let record = ServiceRecord {
            record_type: RecordType::Dispatcher,
            service_type: self.config.dispatcher_type.clone(),
            instance: dispatcher_instance(&self.framework_uuid),
            address: self.config.address,
            port,
            properties,
            ttl: self.config.ttl,
        };

        {
            let mut state = self.lock_state();
            self.channel.advertise(&record)?;
            tracing::info!(
                name = %record.name(),
                framework_uuid = %self.framework_uuid,
                "dispatcher advertised"
            );
            state.dispatcher = Some(record);
        }

        let listener: Arc<dyn RecordListener> = Arc::clone(self) as Arc<dyn RecordListener>;
        let mut browsers = self.browsers.lock().unwrap_or_else(PoisonError::into_inner);
        for (record_type, service_type) in [
            (RecordType::Dispatcher, &self.config.dispatcher_type),
            (RecordType::Endpoint, &self.config.endpoint_type),
        ] {
            browsers.push(
                self.channel
                    .browse(record_type, service_type, Arc::clone(&listener))?,
            );
            tracing::debug!(%record_type, service_type = %service_type, "browsing");
        }

        Ok(())
    }

    /// Stop browsing and withdraw every advertised record
    pub fn stop(&self) {
        // Browse threads may be waiting on the state lock; cancel them first
        let browsers: Vec<_> = self
            .browsers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for browser in browsers {
            browser.cancel();
        }

        let mut state = self.lock_state();
        let records = state.dispatcher.take().into_iter().chain(
            state
                .exported
                .drain()
                .map(|(_, record)| record)
                .collect::<Vec<_>>(),
        );
        for record in records {
            if let Err(e) = self.channel.withdraw(&record) {
                tracing::warn!(name = %record.name(), error = %e, "failed to withdraw record");
            }
        }
        state.imported.clear();
        drop(state);

        self.channel.close();
        tracing::info!(framework_uuid = %self.framework_uuid, "discovery stopped");
    }

    /// Advertise newly exported endpoints
    ///
    /// Endpoints that cannot be described or advertised are logged and
    /// skipped.
    pub fn endpoints_added(&self, endpoints: &[ExportEndpoint]) {
        let access = self.access.access();

        for endpoint in endpoints {
            let description = match endpoint.to_description(&self.framework_uuid, &access) {
                Ok(description) => description,
                Err(e) => {
                    tracing::warn!(uid = %endpoint.uid, error = %e, "can't describe export");
                    continue;
                }
            };

            let record = ServiceRecord {
                record_type: RecordType::Endpoint,
                service_type: self.config.endpoint_type.clone(),
                instance: endpoint_instance(&endpoint.uid, &self.framework_uuid),
                address: self.config.address,
                port: access.0,
                properties: serialize_properties(description.properties()),
                ttl: self.config.ttl,
            };

            let mut state = self.lock_state();
            match self.channel.advertise(&record) {
                Ok(()) => {
                    tracing::info!(
                        uid = %endpoint.uid,
                        name = %record.name(),
                        "endpoint advertised"
                    );
                    state.exported.insert(endpoint.uid.clone(), record);
                }
                Err(e) => {
                    tracing::warn!(uid = %endpoint.uid, error = %e, "failed to advertise endpoint");
                }
            }
        }
    }

    /// Withdraw an exported endpoint; unknown uids are ignored
    pub fn endpoint_removed(&self, uid: &str) {
        let mut state = self.lock_state();
        let Some(record) = state.exported.remove(uid) else {
            tracing::debug!(uid, "unknown export, nothing to withdraw");
            return;
        };

        match self.channel.withdraw(&record) {
            Ok(()) => tracing::info!(uid, name = %record.name(), "endpoint withdrawn"),
            Err(e) => tracing::warn!(uid, error = %e, "failed to withdraw endpoint"),
        }
    }

    /// Uids of the currently advertised endpoints
    #[must_use]
    pub fn exported_uids(&self) -> Vec<String> {
        let mut uids: Vec<_> = self.lock_state().exported.keys().cloned().collect();
        uids.sort();
        uids
    }

    /// Advertised record names of the currently imported endpoints
    #[must_use]
    pub fn imported_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.lock_state().imported.keys().cloned().collect();
        names.sort();
        names
    }

    /// Advertised record of an exported endpoint
    #[must_use]
    pub fn exported_record(&self, uid: &str) -> Option<ServiceRecord> {
        self.lock_state().exported.get(uid).cloned()
    }

    fn lock_state(&self) -> MutexGuard<'_, DiscoveryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn discover(&self, record_type: RecordType, name: &str) -> Result<()> {
        let resolved = self.resolve(record_type, name)?;
        let properties = deserialize_properties(&resolved.properties);

        let Some(peer) = properties
            .get(FRAMEWORK_UUID)
            .and_then(Value::as_str)
            .map(ToString::to_string)
        else {
            tracing::debug!(name, "not a peer record");
            return Ok(());
        };
        if peer == self.framework_uuid {
            tracing::trace!(name, "ignoring own record");
            return Ok(());
        }

        match record_type {
            RecordType::Dispatcher => {
                let address = resolved
                    .address
                    .as_deref()
                    .ok_or_else(|| Error::Schema(format!("no address for {name}")))?;
                let path = properties
                    .get(ACCESS_PATH)
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::Schema(format!("missing property: {ACCESS_PATH}")))?;
                let port = properties
                    .get(ACCESS_PORT)
                    .and_then(Value::as_i64)
                    .and_then(|port| u16::try_from(port).ok())
                    .unwrap_or(resolved.port);

                self.access.send_discovered(address, port, path);
            }
            RecordType::Endpoint => {
                let endpoint = EndpointDescription::from_properties(properties)?;
                let uid = endpoint.id().to_string();

                let mut state = self.lock_state();
                if !self.registry.add(endpoint) {
                    return Err(Error::RegistrationRejected(uid));
                }
                tracing::info!(uid = %uid, name, framework_uuid = %peer, "endpoint discovered");
                state.imported.insert(name.to_string(), uid);
            }
        }

        Ok(())
    }

    /// Resolve a record, re-querying up to the configured budget
    fn resolve(&self, record_type: RecordType, name: &str) -> Result<ResolvedRecord> {
        let attempts = self.config.resolve_retries.max(1);

        for attempt in 1..=attempts {
            match self.channel.resolve(record_type, name) {
                Ok(Some(record)) => return Ok(record),
                Ok(None) => tracing::trace!(name, attempt, "record not resolved yet"),
                Err(e) => tracing::debug!(name, attempt, error = %e, "resolution failed"),
            }

            if attempt < attempts {
                std::thread::sleep(self.config.retry_delay);
            }
        }

        Err(Error::Timeout {
            name: name.to_string(),
            attempts,
        })
    }
}

impl RecordListener for DiscoveryService {
    fn record_discovered(&self, record_type: RecordType, name: &str) {
        match self.discover(record_type, name) {
            Ok(()) => {}
            Err(Error::RegistrationRejected(uid)) => {
                tracing::debug!(uid = %uid, name, "endpoint already registered");
            }
            Err(e) => {
                tracing::warn!(%record_type, name, error = %e, "discovery event dropped");
            }
        }
    }

    fn record_removed(&self, record_type: RecordType, name: &str) {
        if record_type != RecordType::Endpoint {
            return;
        }

        let mut state = self.lock_state();
        match state.imported.remove(name) {
            Some(uid) => {
                tracing::info!(uid = %uid, name, "imported endpoint gone");
                self.registry.remove(&uid);
            }
            None => tracing::debug!(name, "unknown record removed"),
        }
    }
}

impl std::fmt::Debug for DiscoveryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryService")
            .field("framework_uuid", &self.framework_uuid)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
