//! # License Manager
//!
//! The sole entry point hosts use to gate work on a license.
//!
//! ```text
//! initialize(source)
//!   → load (document | JSON | file)
//!   → verify signature → check expiry → check node count
//!   → ACTIVE, start check-in
//!   ✗ any failure → emergency lock, LOCKED, error returned to caller
//! ```
//!
//! Every failure is routed to the same [`EmergencyLock`]. A caller that
//! ignores the returned error still cannot leave the gateway trusting a bad
//! license.
//!
//! ## Concurrency
//!
//! - `can_execute_skill` and `update_node_count` never await. They take a
//!   short `parking_lot` lock and read the lock flag atomically.
//! - `update_node_count` stores and checks the count under the same write
//!   lock that activation takes, and activation re-checks the count there.
//!   An update racing a re-initialize is therefore checked against the
//!   license that ends up active.
//! - `initialize` and `reload` are serialized by an async mutex. No
//!   `parking_lot` guard is held across an `.await`.
//! - The check-in scheduler is owned by the manager and started as a side
//!   effect of reaching `ACTIVE`. Ordinary callers cannot stop it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use helm_attest::{Attestor, AttestationConfig, CheckInError, CheckInRequest, HttpAttestor};
use helm_core::{Clock, LicenseId, NodeId, SystemClock, Timestamp};
use helm_crypto::SignatureVerifier;
use helm_state::{
    GateMachine, GateState, GateTransitionRecord, LicenseDocument, LicenseError, LicenseRecord,
    Tier,
};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::lock::EmergencyLock;
use crate::scheduler::{CheckInScheduler, CheckInStatus, CheckInTask, LockSink};

/// Where a license comes from.
#[derive(Debug, Clone)]
pub enum LicenseSource {
    /// Hosted deployment: the license was pushed by a server.
    Document(LicenseDocument),
    /// Raw JSON text.
    Json(String),
    /// Enterprise deployment: a signed file on local disk. The path is
    /// remembered for [`LicenseManager::reload`].
    File(PathBuf),
}

/// The uniform refusal for gated work. Carries no reason on purpose; the
/// reason is in the logs.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation not licensed")]
pub struct NotLicensed;

/// Result of [`LicenseManager::reload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The file's fingerprint matches the active license.
    Unchanged,
    /// A different license was validated and is now active.
    Reloaded,
}

/// How the manager checks in once a license is active.
#[derive(Debug, Clone)]
pub struct CheckInSettings {
    pub attestor: Arc<dyn Attestor>,
    pub interval: Duration,
    pub node_id: NodeId,
    pub version: String,
}

impl CheckInSettings {
    pub fn new(attestor: Arc<dyn Attestor>, interval: Duration, node_id: NodeId) -> Self {
        Self {
            attestor,
            interval,
            node_id,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Settings backed by an [`HttpAttestor`].
    pub fn from_config(config: &AttestationConfig) -> Result<Self, CheckInError> {
        let attestor = HttpAttestor::new(config.endpoint.clone(), config.timeout())?;
        Ok(Self {
            attestor: Arc::new(attestor),
            interval: config.interval(),
            node_id: config.node_id.clone(),
            version: config.version.clone(),
        })
    }
}

/// Point-in-time view of the gateway for status output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateStatus {
    pub state: GateState,
    pub license_id: Option<LicenseId>,
    pub organization: Option<String>,
    pub tier: Option<Tier>,
    pub node_count: u64,
    pub max_nodes: Option<u64>,
    pub expires_at: Option<Timestamp>,
    pub last_check_in: Option<Timestamp>,
    pub locked: bool,
}

impl std::fmt::Display for GateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "state={}", self.state)?;
        if let Some(id) = &self.license_id {
            write!(f, " license={id}")?;
        }
        if let Some(org) = &self.organization {
            write!(f, " org={org:?}")?;
        }
        if let Some(tier) = self.tier {
            write!(f, " tier={}", tier.as_str())?;
        }
        match self.max_nodes {
            Some(max) => write!(f, " nodes={}/{max}", self.node_count)?,
            None => write!(f, " nodes={}", self.node_count)?,
        }
        if let Some(expires) = self.expires_at {
            write!(f, " expires={expires}")?;
        }
        match self.last_check_in {
            Some(at) => write!(f, " last_check_in={at}")?,
            None => f.write_str(" last_check_in=never")?,
        }
        write!(f, " locked={}", self.locked)
    }
}

#[derive(Debug, Default)]
struct ManagerInner {
    gate: GateMachine,
    license: Option<LicenseRecord>,
    license_file: Option<PathBuf>,
}

/// Builder for [`LicenseManager`].
#[derive(Debug)]
pub struct LicenseManagerBuilder {
    verifier: Arc<dyn SignatureVerifier>,
    clock: Option<Arc<dyn Clock>>,
    lock: Option<EmergencyLock>,
    check_in: Option<CheckInSettings>,
}

impl LicenseManagerBuilder {
    /// Time source for expiry checks. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Share an existing lock, e.g. one already watched by a watchdog.
    pub fn lock(mut self, lock: EmergencyLock) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Enable periodic check-in once a license is active.
    pub fn check_in(mut self, settings: CheckInSettings) -> Self {
        self.check_in = Some(settings);
        self
    }

    pub fn build(self) -> LicenseManager {
        LicenseManager {
            verifier: self.verifier,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            lock: self.lock.unwrap_or_default(),
            check_in: self.check_in,
            inner: Arc::new(RwLock::new(ManagerInner::default())),
            node_count: AtomicU64::new(0),
            scheduler: Mutex::new(None),
            check_in_status: Arc::new(Mutex::new(CheckInStatus::default())),
            init_guard: tokio::sync::Mutex::new(()),
        }
    }
}

/// Validates licenses and answers gating queries.
#[derive(Debug)]
pub struct LicenseManager {
    verifier: Arc<dyn SignatureVerifier>,
    clock: Arc<dyn Clock>,
    lock: EmergencyLock,
    check_in: Option<CheckInSettings>,
    inner: Arc<RwLock<ManagerInner>>,
    node_count: AtomicU64,
    scheduler: Mutex<Option<CheckInScheduler>>,
    check_in_status: Arc<Mutex<CheckInStatus>>,
    init_guard: tokio::sync::Mutex<()>,
}

impl LicenseManager {
    pub fn builder(verifier: Arc<dyn SignatureVerifier>) -> LicenseManagerBuilder {
        LicenseManagerBuilder {
            verifier,
            clock: None,
            lock: None,
            check_in: None,
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Load and validate a license, then activate it.
    ///
    /// Not idempotent: each call re-validates. Calling again while `ACTIVE`
    /// replaces the license on success and locks on failure. Once locked,
    /// every call fails with [`LicenseError::Locked`].
    ///
    /// # Errors
    ///
    /// Any [`LicenseError`]. Every error except `Locked` also engages the
    /// emergency lock before it is returned.
    pub async fn initialize(&self, source: LicenseSource) -> Result<(), LicenseError> {
        let _guard = self.init_guard.lock().await;

        if self.lock.is_engaged() {
            tracing::warn!("initialize refused: gateway is locked");
            return Err(LicenseError::Locked);
        }

        let now = self.clock.now();
        {
            let mut inner = self.inner.write();
            if inner.gate.begin_validation(now, "initialize").is_err() {
                return Err(LicenseError::Locked);
            }
        }
        tracing::info!(state = %GateState::Validating, "license validation started");

        let license_file = match &source {
            LicenseSource::File(path) => Some(path.clone()),
            _ => None,
        };
        let record = match self.validate_source(source, now).await {
            Ok(record) => record,
            Err(e) => return Err(self.fail(e)),
        };

        let previous = self.scheduler.lock().take();
        if let Some(mut scheduler) = previous {
            scheduler.stop().await;
        }

        let activation = {
            let mut inner = self.inner.write();
            if self.lock.is_engaged() {
                Err(LicenseError::Locked)
            } else if let Err(e) = record.check_node_count(self.node_count()) {
                Err(e)
            } else if inner.gate.activate(self.clock.now(), "license validated").is_err() {
                Err(LicenseError::Locked)
            } else {
                inner.license = Some(record.clone());
                inner.license_file = license_file;
                Ok(())
            }
        };
        if let Err(e) = activation {
            return Err(self.fail(e));
        }

        tracing::info!(
            state = %GateState::Active,
            license_id = %record.id(),
            org = record.organization(),
            tier = record.tier().as_str(),
            max_nodes = record.max_nodes(),
            expires_at = %record.expires_at(),
            fingerprint = %record.fingerprint().short(),
            "license accepted"
        );

        self.start_check_in(&record);
        Ok(())
    }

    /// Re-read the license file given to the last successful
    /// [`initialize`](Self::initialize). An unchanged file is a no-op.
    ///
    /// # Errors
    ///
    /// `MalformedSource` without locking when no file was ever loaded.
    /// Otherwise as [`initialize`](Self::initialize).
    pub async fn reload(&self) -> Result<ReloadOutcome, LicenseError> {
        if self.lock.is_engaged() {
            return Err(LicenseError::Locked);
        }
        let (path, current) = {
            let inner = self.inner.read();
            (
                inner.license_file.clone(),
                inner.license.as_ref().map(LicenseRecord::fingerprint),
            )
        };
        let Some(path) = path else {
            return Err(LicenseError::MalformedSource(
                "no license file to reload".to_string(),
            ));
        };

        if let (Ok(doc), Some(current)) = (load_file(&path).await, current) {
            if doc.fingerprint().ok() == Some(current) {
                tracing::debug!(path = %path.display(), "license file unchanged");
                return Ok(ReloadOutcome::Unchanged);
            }
        }

        tracing::info!(path = %path.display(), "license file changed; reloading");
        self.initialize(LicenseSource::File(path)).await?;
        Ok(ReloadOutcome::Reloaded)
    }

    /// Stop check-in. Does not clear the lock.
    pub async fn shutdown(&self) {
        let scheduler = self.scheduler.lock().take();
        if let Some(mut scheduler) = scheduler {
            scheduler.stop().await;
        }
        tracing::info!(locked = self.lock.is_engaged(), "license manager shut down");
    }

    /// Stop check-in without shutting down. Test builds only.
    #[cfg(any(test, feature = "test-seams"))]
    pub async fn stop_check_in(&self) {
        let scheduler = self.scheduler.lock().take();
        if let Some(mut scheduler) = scheduler {
            scheduler.stop().await;
        }
    }

    // ── Gating ───────────────────────────────────────────────────────

    /// Whether `skill` may run now. False unless the gate is `ACTIVE`, the
    /// lock is clear, the license has not expired, and the allowlist
    /// permits the skill.
    pub fn can_execute_skill(&self, skill: &str) -> bool {
        if self.lock.is_engaged() {
            return false;
        }
        let inner = self.inner.read();
        if !inner.gate.is_active() {
            return false;
        }
        let Some(license) = &inner.license else {
            return false;
        };
        if license.is_expired_at(self.clock.now()) {
            return false;
        }
        license.allows_skill(skill)
    }

    /// [`can_execute_skill`](Self::can_execute_skill) as a `Result`.
    pub fn authorize_skill(&self, skill: &str) -> Result<(), NotLicensed> {
        if self.can_execute_skill(skill) {
            Ok(())
        } else {
            tracing::debug!(skill, "skill refused");
            Err(NotLicensed)
        }
    }

    /// Record the number of nodes in use. Exceeding the ceiling of the
    /// active license engages the lock before this returns.
    ///
    /// Before a license is active the count is only stored; it is checked
    /// by the next [`initialize`](Self::initialize).
    pub fn update_node_count(&self, count: u64) -> Result<(), LicenseError> {
        let check = {
            let inner = self.inner.write();
            self.node_count.store(count, Ordering::Release);
            if self.lock.is_engaged() {
                return Err(LicenseError::Locked);
            }
            inner.license.as_ref().map(|l| l.check_node_count(count))
        };
        match check {
            Some(Err(e)) => Err(self.fail(e)),
            _ => Ok(()),
        }
    }

    /// Engage the emergency lock from any collaborator. Returns `true` if
    /// this call engaged it.
    pub fn emergency_lock(&self, reason: &str) -> bool {
        let engaged = self.lock_down(reason);
        if engaged {
            tracing::error!(reason, "emergency lock requested");
        }
        engaged
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn lock(&self) -> &EmergencyLock {
        &self.lock
    }

    /// Gate state. Reports `LOCKED` as soon as the lock is engaged, even if
    /// the engagement came from outside the manager.
    pub fn state(&self) -> GateState {
        if self.lock.is_engaged() {
            return GateState::Locked;
        }
        self.inner.read().gate.state()
    }

    /// Gate transition log. Lockdowns by the manager and its check-in loop
    /// are recorded; engagements made directly on a shared
    /// [`EmergencyLock`] by other holders are not, though
    /// [`state`](Self::state) still reports them.
    pub fn transitions(&self) -> Vec<GateTransitionRecord> {
        self.inner.read().gate.transitions().to_vec()
    }

    /// The active license. `None` before initialization and after a lock.
    pub fn current_license(&self) -> Option<LicenseRecord> {
        if self.lock.is_engaged() {
            return None;
        }
        self.inner.read().license.clone()
    }

    pub fn node_count(&self) -> u64 {
        self.node_count.load(Ordering::Acquire)
    }

    pub fn check_in_status(&self) -> CheckInStatus {
        self.check_in_status.lock().clone()
    }

    pub fn status(&self) -> GateStatus {
        let license = self.current_license();
        GateStatus {
            state: self.state(),
            license_id: license.as_ref().map(|l| l.id().clone()),
            organization: license.as_ref().map(|l| l.organization().to_string()),
            tier: license.as_ref().map(LicenseRecord::tier),
            node_count: self.node_count(),
            max_nodes: license.as_ref().map(LicenseRecord::max_nodes),
            expires_at: license.as_ref().map(LicenseRecord::expires_at),
            last_check_in: self.check_in_status.lock().last_success,
            locked: self.lock.is_engaged(),
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn validate_source(
        &self,
        source: LicenseSource,
        now: Timestamp,
    ) -> Result<LicenseRecord, LicenseError> {
        let doc = match source {
            LicenseSource::Document(doc) => doc,
            LicenseSource::Json(json) => LicenseDocument::from_json(&json)?,
            LicenseSource::File(path) => load_file(&path).await?,
        };
        let record = LicenseRecord::validate(&doc, self.verifier.as_ref(), now)?;
        record.check_node_count(self.node_count())?;
        Ok(record)
    }

    fn start_check_in(&self, record: &LicenseRecord) {
        *self.check_in_status.lock() = CheckInStatus::default();
        let Some(settings) = &self.check_in else {
            tracing::debug!("check-in not configured");
            return;
        };
        let task = CheckInTask {
            attestor: Arc::clone(&settings.attestor),
            credential: record.id().clone(),
            request: CheckInRequest {
                node_id: settings.node_id.clone(),
                version: settings.version.clone(),
                tier: record.tier().as_str().to_string(),
                org: record.organization().to_string(),
            },
            interval: settings.interval,
            expires_at: record.expires_at(),
            clock: Arc::clone(&self.clock),
            lock: Arc::new(GateLockdown {
                lock: self.lock.clone(),
                inner: Arc::clone(&self.inner),
                clock: Arc::clone(&self.clock),
            }),
            status: Arc::clone(&self.check_in_status),
        };
        *self.scheduler.lock() = Some(CheckInScheduler::start(task));
    }

    /// Log, lock down, and hand the error back for the caller to return.
    fn fail(&self, error: LicenseError) -> LicenseError {
        tracing::error!(error = %error, "license gate failure");
        self.lock_down(&error.to_string());
        error
    }

    /// Engage the lock and move the gate to `LOCKED`, dropping the license
    /// and aborting check-in.
    fn lock_down(&self, reason: &str) -> bool {
        let engaged = seal(&self.lock, &self.inner, self.clock.now(), reason);
        // Dropping the scheduler aborts its task.
        let scheduler = self.scheduler.lock().take();
        drop(scheduler);
        engaged
    }
}

/// Engage `lock`, move the gate to `LOCKED` and drop the license.
fn seal(lock: &EmergencyLock, inner: &RwLock<ManagerInner>, at: Timestamp, reason: &str) -> bool {
    let engaged = lock.engage(reason);
    let mut inner = inner.write();
    if inner.gate.lock(at, reason).is_ok() {
        tracing::info!(state = %GateState::Locked, reason, "gate locked");
    }
    inner.license = None;
    engaged
}

/// The check-in loop's view of the lock: engaging it also locks the gate.
#[derive(Debug)]
struct GateLockdown {
    lock: EmergencyLock,
    inner: Arc<RwLock<ManagerInner>>,
    clock: Arc<dyn Clock>,
}

impl LockSink for GateLockdown {
    fn is_engaged(&self) -> bool {
        self.lock.is_engaged()
    }

    fn engage(&self, reason: &str) {
        seal(&self.lock, &self.inner, self.clock.now(), reason);
    }
}

async fn load_file(path: &Path) -> Result<LicenseDocument, LicenseError> {
    let json = tokio::fs::read_to_string(path).await.map_err(|e| {
        LicenseError::MalformedSource(format!("cannot read {}: {e}", path.display()))
    })?;
    LicenseDocument::from_json(&json)
}
