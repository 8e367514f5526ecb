//! Scenario tests for the Ginvoice sync core.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p ginvoice-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `settings_sync` - Profile working copy, dirty flag and commit
//! - `offline_gate` - Mutations vetoed while offline
//! - `push_refresh` - Ordering, partial failure, timeouts, re-entrancy
//! - `unit_cost` - Historical cost resolution
//! - `local_store` - Persisted format and degradation
//! - `login` - Verification-required contract
//!
//! Everything runs against [`FakeBackend`], an in-process stand-in for the
//! HTTP API that applies pushed deltas to its own copy of the snapshot and
//! can be scripted to fail or stall.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::DateTime;
use ginvoice_core::{
    BusinessProfile, BusinessSnapshot, Product, ProductId, Transaction, TransactionLine,
    UnitVariant,
};
use ginvoice_sync::{
    AuthSession, ConnectivityGate, Credentials, MemoryStore, NoticeLog, PushAck, RemoteBackend,
    RemoteError, SnapshotDelta, SyncCoordinator, Workspace,
};
use rust_decimal::Decimal;
use secrecy::SecretString;

/// A backend call, in the order the fake received it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Push,
    Fetch,
    Login,
}

#[derive(Debug, Default)]
struct FakeState {
    server: BusinessSnapshot,
    calls: Vec<Call>,
    pushes: Vec<SnapshotDelta>,
    push_failures: VecDeque<RemoteError>,
    fetch_failures: VecDeque<RemoteError>,
    push_delay: Option<Duration>,
    fetch_delay: Option<Duration>,
    unverified: bool,
}

/// Scriptable in-process backend. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    #[must_use]
    pub fn new(server: BusinessSnapshot) -> Self {
        let backend = Self::default();
        backend.lock().server = server;
        backend
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Deltas the backend accepted, oldest first.
    #[must_use]
    pub fn pushes(&self) -> Vec<SnapshotDelta> {
        self.lock().pushes.clone()
    }

    #[must_use]
    pub fn server(&self) -> BusinessSnapshot {
        self.lock().server.clone()
    }

    /// Change the server's state behind the device's back.
    pub fn edit_server(&self, f: impl FnOnce(&mut BusinessSnapshot)) {
        f(&mut self.lock().server);
    }

    pub fn fail_next_push(&self, error: RemoteError) {
        self.lock().push_failures.push_back(error);
    }

    pub fn fail_next_fetch(&self, error: RemoteError) {
        self.lock().fetch_failures.push_back(error);
    }

    pub fn delay_pushes(&self, delay: Duration) {
        self.lock().push_delay = Some(delay);
    }

    pub fn delay_fetches(&self, delay: Duration) {
        self.lock().fetch_delay = Some(delay);
    }

    /// Reject logins with `requiresVerification`.
    pub fn require_verification(&self) {
        self.lock().unverified = true;
    }
}

impl RemoteBackend for FakeBackend {
    async fn push(&self, delta: &SnapshotDelta) -> Result<PushAck, RemoteError> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(Call::Push);
            state.push_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if let Some(error) = state.push_failures.pop_front() {
            return Err(error);
        }
        delta.apply_to(&mut state.server);
        state.pushes.push(delta.clone());
        Ok(PushAck {
            revision: u64::try_from(state.pushes.len()).ok(),
            received_at: None,
        })
    }

    async fn fetch_state(&self) -> Result<BusinessSnapshot, RemoteError> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(Call::Fetch);
            state.fetch_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        match state.fetch_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(state.server.clone()),
        }
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthSession, RemoteError> {
        let mut state = self.lock();
        state.calls.push(Call::Login);
        if state.unverified {
            return Err(RemoteError::VerificationRequired);
        }
        if credentials.email.domain() != "business.com" {
            return Err(RemoteError::Unauthorized);
        }
        Ok(AuthSession {
            token: SecretString::from("session-token"),
            business_name: Some(state.server.business.name.clone()),
        })
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Sold in pieces or pairs (×2).
#[must_use]
pub fn sneakers() -> Product {
    Product::new("Sneakers", "Piece", Decimal::from(100), Decimal::from(150))
        .with_id("sneakers")
        .with_category("Footwear")
        .with_stock(Decimal::from(10))
        .with_unit(UnitVariant::new("Pair", Decimal::TWO).unwrap_or_else(|e| panic!("{e}")))
}

/// Sold in cups or bags (×40).
#[must_use]
pub fn rice() -> Product {
    Product::new("Rice", "Cup", Decimal::from(50), Decimal::from(80))
        .with_id("rice")
        .with_category("Grains")
        .with_stock(Decimal::from(400))
        .with_unit(UnitVariant::new("Bag", Decimal::from(40)).unwrap_or_else(|e| panic!("{e}")))
}

/// The registered "Test Business" with a small catalog and one past sale.
#[must_use]
pub fn test_business() -> BusinessSnapshot {
    let business = BusinessProfile {
        name: "Test Business".into(),
        address: "123 Test St".into(),
        phone: "+2348000000000".into(),
        email: "test@business.com".into(),
        ..BusinessProfile::default()
    };
    let mut first_sale = Transaction::new(
        "Ada",
        vec![
            TransactionLine::for_product(&rice(), Some("Cup"), Decimal::from(2))
                .unwrap_or_else(|e| panic!("{e}")),
        ],
    )
    .unwrap_or_else(|e| panic!("{e}"))
    .with_id("tx-1");
    first_sale.created_at = DateTime::from_timestamp(1_767_225_600, 0).unwrap_or_default();

    BusinessSnapshot {
        products: vec![sneakers(), rice()],
        transactions: vec![first_sale],
        business,
        categories: vec!["Footwear".into(), "Grains".into()],
        is_logged_in: true,
        is_registered: true,
        ..BusinessSnapshot::default()
    }
}

/// Device and server wired together for a scenario.
pub struct Harness {
    pub workspace: Workspace<MemoryStore, FakeBackend>,
    pub backend: FakeBackend,
    pub store: MemoryStore,
    pub notices: NoticeLog,
}

impl Harness {
    /// Device and server both hold [`test_business`].
    pub async fn new(online: bool) -> Self {
        let snapshot = test_business();
        Self::with(snapshot.clone(), snapshot, online).await
    }

    /// Device caches `local`; server holds `server`.
    pub async fn with(local: BusinessSnapshot, server: BusinessSnapshot, online: bool) -> Self {
        let store = MemoryStore::with_snapshot(&local).unwrap_or_else(|e| panic!("{e}"));
        Self::with_store(store, server, online, Duration::from_secs(15)).await
    }

    pub async fn with_store(
        store: MemoryStore,
        server: BusinessSnapshot,
        online: bool,
        timeout: Duration,
    ) -> Self {
        let backend = FakeBackend::new(server);
        let notices = NoticeLog::new();
        let gate = ConnectivityGate::new(online, Arc::new(notices.clone()));
        let coordinator = SyncCoordinator::new(store.clone(), backend.clone(), timeout);
        Self {
            workspace: Workspace::open(coordinator, gate).await,
            backend,
            store,
            notices,
        }
    }

    /// A one-line sale of `qty` `unit`s of `product` against the working copy.
    pub async fn sale(&self, product: &str, unit: &str, qty: i64) -> Transaction {
        let working = self.workspace.working().await;
        let product = working
            .product(&ProductId::from(product))
            .unwrap_or_else(|| panic!("no product {product}"));
        let line = TransactionLine::for_product(product, Some(unit), Decimal::from(qty))
            .unwrap_or_else(|e| panic!("{e}"));
        Transaction::new("Walk-in Customer", vec![line]).unwrap_or_else(|e| panic!("{e}"))
    }
}
