//! Device identity persistence
//!
//! A device identity is created once per datastore and reused on every
//! start. The file store writes atomically (temp file + rename) so a crash
//! mid-write never leaves a truncated identity behind.

use crate::error::{ReplyError, Result};
use crate::types::Jid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Identity of this bot as a linked device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    /// Stable device identifier
    pub id: uuid::Uuid,

    /// When the identity was first created
    pub created_at: DateTime<Utc>,

    /// Whether pairing has completed for this device
    #[serde(default)]
    pub linked: bool,

    /// Account the device is linked to
    #[serde(default)]
    pub account: Option<Jid>,

    /// Display name announced to the network
    #[serde(default = "default_push_name")]
    pub push_name: String,
}

fn default_push_name() -> String {
    "a3s-reply".to_string()
}

impl DeviceIdentity {
    /// Fresh, unlinked identity
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            created_at: Utc::now(),
            linked: false,
            account: None,
            push_name: default_push_name(),
        }
    }

    /// Mark the device as linked to `account`
    pub fn link(&mut self, account: Jid) {
        self.linked = true;
        self.account = Some(account);
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for persisting the device identity
pub trait DeviceStore: Send + Sync {
    /// Load the stored identity, if any
    fn load(&self) -> Result<Option<DeviceIdentity>>;

    /// Save (replace) the stored identity
    fn save(&self, device: &DeviceIdentity) -> Result<()>;

    /// Load the stored identity or create, save, and return a new one
    fn load_or_create(&self) -> Result<DeviceIdentity> {
        if let Some(device) = self.load()? {
            return Ok(device);
        }
        let device = DeviceIdentity::new();
        self.save(&device)?;
        tracing::info!(device = %device.id, "Created new device identity");
        Ok(device)
    }
}

/// JSON file-based device store
pub struct FileDeviceStore {
    path: PathBuf,
}

impl FileDeviceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeviceStore for FileDeviceStore {
    fn load(&self) -> Result<Option<DeviceIdentity>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&self.path).map_err(|e| {
            ReplyError::Storage(format!(
                "Failed to read session file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let device: DeviceIdentity = serde_json::from_str(&json).map_err(|e| {
            ReplyError::Storage(format!(
                "Failed to parse session file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %self.path.display(), device = %device.id, "Device loaded");
        Ok(Some(device))
    }

    fn save(&self, device: &DeviceIdentity) -> Result<()> {
        let json = serde_json::to_string_pretty(device)?;
        let tmp_path = self.path.with_extension("tmp");

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ReplyError::Storage(format!(
                    "Failed to create session directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        std::fs::write(&tmp_path, json).map_err(|e| {
            ReplyError::Storage(format!(
                "Failed to write session file {}: {}",
                tmp_path.display(),
                e
            ))
        })?;

        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            ReplyError::Storage(format!(
                "Failed to rename session file {} → {}: {}",
                tmp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %self.path.display(), "Device saved");
        Ok(())
    }
}

/// In-memory device store for testing
#[derive(Default)]
pub struct MemoryDeviceStore {
    device: std::sync::RwLock<Option<DeviceIdentity>>,
}

impl DeviceStore for MemoryDeviceStore {
    fn load(&self) -> Result<Option<DeviceIdentity>> {
        let device = self.device.read().map_err(|e| {
            ReplyError::Storage(format!("Failed to acquire device lock: {}", e))
        })?;
        Ok(device.clone())
    }

    fn save(&self, device: &DeviceIdentity) -> Result<()> {
        let mut slot = self.device.write().map_err(|e| {
            ReplyError::Storage(format!("Failed to acquire device lock: {}", e))
        })?;
        *slot = Some(device.clone());
        Ok(())
    }
}
