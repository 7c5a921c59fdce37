//! Network channel seam
//!
//! [`RecordChannel`] is what the discovery service needs from the network:
//! publish and withdraw records, resolve a peer record, and watch a service
//! type. [`super::MdnsChannel`] implements it over multicast DNS.

use std::sync::Arc;

use super::record::{RecordType, ResolvedRecord, ServiceRecord};
use crate::Result;

/// Multicast advertisement and browsing
pub trait RecordChannel: Send + Sync {
    /// Publish a record, replacing any record with the same name
    ///
    /// # Errors
    ///
    /// Returns error if the record cannot be published
    fn advertise(&self, record: &ServiceRecord) -> Result<()>;

    /// Withdraw a previously published record
    ///
    /// # Errors
    ///
    /// Returns error if the withdrawal cannot be sent
    fn withdraw(&self, record: &ServiceRecord) -> Result<()>;

    /// Make one attempt at resolving a peer record
    ///
    /// Returns `Ok(None)` when the record is not (yet) known.
    ///
    /// # Errors
    ///
    /// Returns error if the query itself fails
    fn resolve(&self, record_type: RecordType, name: &str) -> Result<Option<ResolvedRecord>>;

    /// Watch a service type, reporting records to `listener`
    ///
    /// # Errors
    ///
    /// Returns error if browsing cannot start
    fn browse(
        &self,
        record_type: RecordType,
        service_type: &str,
        listener: Arc<dyn RecordListener>,
    ) -> Result<Box<dyn BrowseHandle>>;

    /// Release the channel once nothing is advertised or browsed any more
    fn close(&self) {}
}

/// Receives browse notifications, possibly from several threads at once
pub trait RecordListener: Send + Sync {
    fn record_discovered(&self, record_type: RecordType, name: &str);

    fn record_removed(&self, record_type: RecordType, name: &str);
}

/// A running browse
pub trait BrowseHandle: Send {
    /// Stop browsing; no notification is delivered once this returns
    fn cancel(self: Box<Self>);
}
