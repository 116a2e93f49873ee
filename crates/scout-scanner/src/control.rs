//! Runtime control surface of the scan loop.
//!
//! Location and account changes are applied here and picked up by the
//! orchestrator at the next cycle boundary. Every change raises the restart
//! flag; the orchestrator drops pending work when it sees it.

use crate::error::{Result, ScanError};
use scout_core::{AccountConfig, ScanLocation, VisitOrder};
use scout_geo::{CoverageGenerator, CoverageSet};
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Notify;
use tracing::info;

struct ControlState {
    locations: Vec<ScanLocation>,
    accounts: Vec<AccountConfig>,
    accounts_changed: bool,
    coverage: Arc<CoverageSet>,
}

/// Shared scan targets and accounts.
pub struct ScanControl {
    generator: CoverageGenerator,
    order: VisitOrder,
    state: RwLock<ControlState>,
    restart: AtomicBool,
    restarted: Notify,
}

impl ScanControl {
    /// Create an empty control with the restart flag raised.
    #[must_use]
    pub fn new(generator: CoverageGenerator, order: VisitOrder) -> Self {
        Self {
            generator,
            order,
            state: RwLock::new(ControlState {
                locations: Vec::new(),
                accounts: Vec::new(),
                accounts_changed: true,
                coverage: Arc::new(CoverageSet::default()),
            }),
            restart: AtomicBool::new(true),
            restarted: Notify::new(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ControlState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ControlState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the location set.
    ///
    /// Locations whose name is already known keep their current entry, new
    /// names are added and names missing from `locations` are removed.
    pub fn set_locations(&self, locations: Vec<ScanLocation>) -> Result<()> {
        let mut state = self.write();
        let next: Vec<ScanLocation> = locations
            .into_iter()
            .map(|location| {
                state
                    .locations
                    .iter()
                    .find(|known| known.name == location.name)
                    .cloned()
                    .unwrap_or(location)
            })
            .collect();
        self.apply_locations(&mut state, next)
    }

    /// Add a location named after its coordinates, replacing one of the same name.
    pub fn add_location(&self, latitude: f64, longitude: f64, radius_m: f64) -> Result<()> {
        let location = ScanLocation::from_coordinates(latitude, longitude, radius_m);
        let mut state = self.write();
        let mut next = state.locations.clone();
        match next.iter_mut().find(|known| known.name == location.name) {
            Some(known) => *known = location,
            None => next.push(location),
        }
        self.apply_locations(&mut state, next)
    }

    /// Remove the location centered at the given coordinates.
    #[allow(clippy::float_cmp)]
    pub fn remove_location(&self, latitude: f64, longitude: f64) -> Result<()> {
        let mut state = self.write();
        let mut next = state.locations.clone();
        let index = next
            .iter()
            .position(|known| known.latitude == latitude && known.longitude == longitude)
            .ok_or(ScanError::LocationNotFound {
                latitude,
                longitude,
            })?;
        next.remove(index);
        self.apply_locations(&mut state, next)
    }

    fn apply_locations(&self, state: &mut ControlState, locations: Vec<ScanLocation>) -> Result<()> {
        let coverage = self.generator.cover_locations(&locations, self.order)?;
        info!(
            locations = locations.len(),
            points = coverage.len(),
            "Scan locations updated"
        );
        state.locations = locations;
        state.coverage = Arc::new(coverage);
        self.request_restart();
        Ok(())
    }

    /// Replace the account set.
    pub fn set_accounts(&self, accounts: Vec<AccountConfig>) {
        let mut state = self.write();
        info!("Account set updated: {} accounts", accounts.len());
        state.accounts = accounts;
        state.accounts_changed = true;
        self.request_restart();
    }

    /// Ask the orchestrator to abandon the current cycle.
    pub fn request_restart(&self) {
        self.restart.store(true, Ordering::SeqCst);
        self.restarted.notify_waiters();
    }

    /// Wait until a restart is pending.
    pub async fn wait_for_restart(&self) {
        loop {
            let mut restarted = pin!(self.restarted.notified());
            restarted.as_mut().enable();
            if self.restart_requested() {
                return;
            }
            restarted.await;
        }
    }

    /// Whether a restart is pending.
    #[must_use]
    pub fn restart_requested(&self) -> bool {
        self.restart.load(Ordering::SeqCst)
    }

    /// Consume the restart flag.
    pub fn take_restart(&self) -> bool {
        self.restart.swap(false, Ordering::SeqCst)
    }

    /// The account set, if it changed since the last call.
    pub fn take_accounts_changed(&self) -> Option<Vec<AccountConfig>> {
        let mut state = self.write();
        if !state.accounts_changed {
            return None;
        }
        state.accounts_changed = false;
        Some(state.accounts.clone())
    }

    /// Coverage of the current locations.
    #[must_use]
    pub fn coverage(&self) -> Arc<CoverageSet> {
        Arc::clone(&self.read().coverage)
    }

    /// Current scan locations.
    #[must_use]
    pub fn locations(&self) -> Vec<ScanLocation> {
        self.read().locations.clone()
    }

    /// Accounts in the current set.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.read().accounts.len()
    }

    /// Whether there is anything to scan and anyone to scan with.
    #[must_use]
    pub fn has_work(&self) -> bool {
        let state = self.read();
        !state.accounts.is_empty() && !state.coverage.is_empty()
    }
}
