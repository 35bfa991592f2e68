//! # Driver Manager
//!
//! Holds an ordered list of storage drivers and routes every call to the
//! active one. Selection happens in `initialize()`: the first driver whose
//! probe succeeds and reports healthy wins, otherwise the first driver is
//! used anyway.
//!
//! When an operation fails at runtime only the *next* driver in order is
//! probed. If it is healthy it becomes active. Failed `load`s are retried on
//! it; failed `save`s and `delete`s are not, and the original error is
//! returned either way.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domains::{Board, BoardId, DomainError, DriverHealth, Result, StorageDriver};
use serde::Serialize;
use tracing::{error, info, warn};

pub const NO_HEALTHY_DRIVER: &str = "No healthy driver found, using first available";

/// A driver plus the name it is reported under.
#[derive(Clone)]
pub struct NamedDriver {
    pub name: String,
    pub driver: Arc<dyn StorageDriver>,
}

impl NamedDriver {
    pub fn new(name: impl Into<String>, driver: Arc<dyn StorageDriver>) -> Self {
        Self { name: name.into(), driver }
    }
}

impl fmt::Debug for NamedDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedDriver").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Last observed state of one driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverStatus {
    pub name: String,
    /// The probe completed at all.
    pub available: bool,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<DriverHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Load,
    Save,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Load => "load",
            Operation::Save => "save",
            Operation::Delete => "delete",
        })
    }
}

#[derive(Debug, Default)]
struct Selection {
    active: Option<usize>,
    fallback_reason: String,
    statuses: Vec<DriverStatus>,
}

pub struct DriverManager {
    drivers: Vec<NamedDriver>,
    selection: RwLock<Selection>,
}

async fn probe(slot: &NamedDriver) -> DriverStatus {
    match slot.driver.health_check().await {
        Ok(health) => DriverStatus {
            name: slot.name.clone(),
            available: true,
            healthy: health.healthy,
            last_error: health.last_error.clone(),
            health: Some(health),
        },
        Err(err) => DriverStatus {
            name: slot.name.clone(),
            available: false,
            healthy: false,
            health: Some(DriverHealth::unhealthy(err.to_string()).with_error(&err)),
            last_error: Some(err.to_string()),
        },
    }
}

impl DriverManager {
    pub fn new(drivers: Vec<NamedDriver>) -> Self {
        Self { drivers, selection: RwLock::new(Selection::default()) }
    }

    /// Probes every driver in order and activates the first healthy one.
    pub async fn initialize(&self) -> Result<()> {
        if self.drivers.is_empty() {
            return Err(DomainError::NoDrivers);
        }

        let mut statuses = Vec::with_capacity(self.drivers.len());
        let mut chosen = None;
        for (index, slot) in self.drivers.iter().enumerate() {
            let status = probe(slot).await;
            if chosen.is_none() && status.available && status.healthy {
                chosen = Some(index);
            }
            statuses.push(status);
        }

        let (active, reason) = match chosen {
            Some(0) => (0, String::new()),
            Some(index) => {
                let reason = format!("Higher-priority drivers unhealthy, using {}", self.drivers[index].name);
                warn!(driver = %self.drivers[index].name, "{reason}");
                (index, reason)
            }
            None => {
                warn!(fallback = %self.drivers[0].name, "{NO_HEALTHY_DRIVER}");
                (0, NO_HEALTHY_DRIVER.to_string())
            }
        };

        {
            let mut selection = self.selection.write().unwrap_or_else(PoisonError::into_inner);
            selection.active = Some(active);
            selection.fallback_reason = reason;
            selection.statuses = statuses;
        }
        info!(driver = %self.drivers[active].name, "storage driver selected");
        Ok(())
    }

    /// Re-runs selection from scratch.
    pub async fn refresh(&self) -> Result<()> {
        self.initialize().await
    }

    pub fn active_driver_name(&self) -> Option<String> {
        self.selection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .map(|i| self.drivers[i].name.clone())
    }

    /// Empty while the preferred driver is in use.
    pub fn fallback_reason(&self) -> String {
        self.selection.read().unwrap_or_else(PoisonError::into_inner).fallback_reason.clone()
    }

    pub fn driver_statuses(&self) -> Vec<DriverStatus> {
        self.selection.read().unwrap_or_else(PoisonError::into_inner).statuses.clone()
    }

    fn active(&self) -> Result<(usize, Arc<dyn StorageDriver>)> {
        let selection = self.selection.read().unwrap_or_else(PoisonError::into_inner);
        let index = selection.active.ok_or(DomainError::NotInitialized)?;
        Ok((index, Arc::clone(&self.drivers[index].driver)))
    }

    /// Probes the driver after `failed` and switches to it when healthy.
    /// Returns the index to retry on, if any.
    async fn fail_over(&self, op: Operation, failed: usize, err: &DomainError) -> Option<usize> {
        error!(driver = %self.drivers[failed].name, operation = %op, error = %err, "storage operation failed");

        let next = failed + 1;
        let slot = self.drivers.get(next)?;
        let status = probe(slot).await;
        let usable = status.available && status.healthy;

        {
            let mut selection = self.selection.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = selection.statuses.get_mut(next) {
                *entry = status;
            }
            // Another call may already have moved past `failed`.
            if usable && selection.active == Some(failed) {
                selection.active = Some(next);
                selection.fallback_reason = format!("{op} failed on previous driver: {err}");
            }
        }

        if usable {
            warn!(from = %self.drivers[failed].name, to = %slot.name, "switched to fallback storage driver");
            Some(next)
        } else {
            None
        }
    }
}

#[async_trait]
impl StorageDriver for DriverManager {
    async fn load(&self) -> Result<Vec<Board>> {
        let (index, driver) = self.active()?;
        match driver.load().await {
            Ok(boards) => Ok(boards),
            Err(err) => match self.fail_over(Operation::Load, index, &err).await {
                Some(next) => self.drivers[next].driver.load().await,
                None => Err(err),
            },
        }
    }

    async fn save(&self, board: &Board) -> Result<()> {
        let (index, driver) = self.active()?;
        match driver.save(board).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.fail_over(Operation::Save, index, &err).await;
                Err(err)
            }
        }
    }

    async fn delete(&self, board_id: BoardId) -> Result<()> {
        let (index, driver) = self.active()?;
        match driver.delete(board_id).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.fail_over(Operation::Delete, index, &err).await;
                Err(err)
            }
        }
    }

    fn supports_transactions(&self) -> bool {
        self.active().map(|(_, d)| d.supports_transactions()).unwrap_or(false)
    }

    fn supports_backup(&self) -> bool {
        self.active().map(|(_, d)| d.supports_backup()).unwrap_or(false)
    }

    async fn health_check(&self) -> Result<DriverHealth> {
        let (_, driver) = self.active()?;
        driver.health_check().await
    }
}
