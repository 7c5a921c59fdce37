//! EDEF file discovery - import endpoints described in a folder of `*.xml` files

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use crate::registry::EndpointRegistry;
use crate::{Result, edef};

/// Files seen by a folder scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
}

impl ScanReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Modification time and size, enough to notice rewrites
type Fingerprint = (Option<SystemTime>, u64);

#[derive(Debug)]
struct TrackedFile {
    fingerprint: Fingerprint,
    /// Uids registered from this file
    uids: Vec<String>,
}

/// Keeps the registry in step with a folder of EDEF files
pub struct EdefDirectory {
    folder: PathBuf,
    registry: Arc<dyn EndpointRegistry>,
    files: Mutex<HashMap<String, TrackedFile>>,
}

impl EdefDirectory {
    #[must_use]
    pub fn new(folder: impl Into<PathBuf>, registry: Arc<dyn EndpointRegistry>) -> Self {
        Self {
            folder: folder.into(),
            registry,
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Watched folder
    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Compare the folder with the last scan and apply the differences
    ///
    /// A missing folder is treated as empty.
    ///
    /// # Errors
    ///
    /// Returns error if the folder exists but cannot be listed
    pub fn scan(&self) -> Result<ScanReport> {
        let current = match std::fs::read_dir(&self.folder) {
            Ok(entries) => entries
                .flatten()
                .filter_map(|entry| {
                    let name = entry.file_name().to_string_lossy().to_string();
                    let metadata = entry.metadata().ok()?;
                    (is_edef_name(&name) && metadata.is_file())
                        .then(|| (name, (metadata.modified().ok(), metadata.len())))
                })
                .collect::<HashMap<_, _>>(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.folder.display(), "EDEF folder does not exist");
                HashMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        let mut report = ScanReport::default();
        {
            let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
            for (name, fingerprint) in &current {
                match files.get(name) {
                    None => report.added.push(name.clone()),
                    Some(tracked) if tracked.fingerprint != *fingerprint => {
                        report.updated.push(name.clone());
                    }
                    Some(_) => {}
                }
            }
            report.deleted = files
                .keys()
                .filter(|name| !current.contains_key(*name))
                .cloned()
                .collect();
        }
        report.added.sort();
        report.updated.sort();
        report.deleted.sort();

        if !report.is_empty() {
            self.folder_change(&report.added, &report.updated, &report.deleted);
        }
        Ok(report)
    }

    /// Apply a change of the folder content
    ///
    /// Endpoints of updated files replace the ones previously loaded from
    /// them. Files that are not EDEF documents are remembered so they are not
    /// reloaded until modified.
    pub fn folder_change(&self, added: &[String], updated: &[String], deleted: &[String]) {
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);

        for name in deleted.iter().chain(updated).filter(|name| is_edef_name(name)) {
            if let Some(tracked) = files.remove(name) {
                for uid in &tracked.uids {
                    self.registry.remove(uid);
                }
                tracing::debug!(file = %name, endpoints = tracked.uids.len(), "EDEF file unloaded");
            }
        }

        for name in added.iter().chain(updated).filter(|name| is_edef_name(name)) {
            if let Some(previous) = files.remove(name) {
                for uid in &previous.uids {
                    self.registry.remove(uid);
                }
            }

            let path = self.folder.join(name);
            let fingerprint = std::fs::metadata(&path)
                .map(|m| (m.modified().ok(), m.len()))
                .unwrap_or_default();

            let uids = match self.load(&path) {
                Ok(uids) => {
                    tracing::info!(file = %name, endpoints = uids.len(), "EDEF file loaded");
                    uids
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "not a valid EDEF file");
                    Vec::new()
                }
            };
            files.insert(name.clone(), TrackedFile { fingerprint, uids });
        }
    }

    /// Uids currently registered from the folder
    #[must_use]
    pub fn endpoint_uids(&self) -> Vec<String> {
        let mut uids: Vec<_> = self
            .files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .flat_map(|tracked| tracked.uids.iter().cloned())
            .collect();
        uids.sort();
        uids
    }

    fn load(&self, path: &Path) -> Result<Vec<String>> {
        let content = std::fs::read_to_string(path)?;

        let mut uids = Vec::new();
        for endpoint in edef::parse(&content)? {
            let uid = endpoint.id().to_string();
            if self.registry.add(endpoint) {
                uids.push(uid);
            } else {
                tracing::debug!(uid = %uid, path = %path.display(), "endpoint already known");
            }
        }
        Ok(uids)
    }
}

impl std::fmt::Debug for EdefDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdefDirectory")
            .field("folder", &self.folder)
            .finish_non_exhaustive()
    }
}

fn is_edef_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}
