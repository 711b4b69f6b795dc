//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! Financial state (escrow book, refund desk) sits behind `parking_lot`
//! mutexes so that validate-then-mutate runs atomically. When both are
//! needed the refund desk is locked first, then the book.
//!
//! Every financial change goes through [`AppState::transact`]. It holds an
//! async write gate from mutation until the [`WriteSet`] is committed, so
//! at most one change is in flight. The mutexes are released before the
//! database write; if that write fails the change is rolled back and the
//! journal never runs ahead of Postgres.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use packs_core::UserId;
use packs_engagement::{MissionBoard, MissionMetric, PricingConfig, SupporterRankings};
use packs_jobs::JobScheduler;
use packs_ledger::{EscrowBook, EscrowRecord, EscrowStatus, TransactionKind};
use packs_refund::RefundDesk;
use packs_rules::{
    AbuseFirewall, FraudDetectionRecord, FraudEngine, SafetyConfig, SafetyEventKind, SafetyScore,
};
use parking_lot::{Mutex, RwLock};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::{AppConfig, PolicyConfig};
use crate::db::WriteSet;
use crate::error::AppError;

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: Uuid, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// List all records.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Update a record, creating it with `init` first if absent.
    pub fn upsert(&self, id: Uuid, init: impl FnOnce() -> T, f: impl FnOnce(&mut T)) -> T {
        let mut guard = self.data.write();
        let entry = guard.entry(id).or_insert_with(init);
        f(entry);
        entry.clone()
    }

    /// Apply `f` to every record. Returns how many records there were.
    pub fn update_all(&self, mut f: impl FnMut(&mut T)) -> usize {
        let mut guard = self.data.write();
        for value in guard.values_mut() {
            f(value);
        }
        guard.len()
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- AppState -----------------------------------------------------------------

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Journal plus escrow records.
    pub book: Arc<Mutex<EscrowBook>>,
    /// Refund requests. Lock before `book` when both are needed.
    pub refunds: Arc<Mutex<RefundDesk>>,
    /// Fraud rules (immutable after startup).
    pub fraud_engine: Arc<FraudEngine>,
    /// Append-only fraud audit log.
    pub fraud_records: Arc<RwLock<Vec<FraudDetectionRecord>>>,
    /// Safety scores keyed by user UUID.
    pub safety_scores: Store<SafetyScore>,
    /// Abuse firewall and offender records.
    pub firewall: Arc<Mutex<AbuseFirewall>>,
    /// Supporter leaderboards.
    pub rankings: Arc<Mutex<SupporterRankings>>,
    /// Creator missions and XP.
    pub missions: Arc<Mutex<MissionBoard>>,
    /// Periodic job schedules.
    pub scheduler: Arc<Mutex<JobScheduler>>,
    /// Active thresholds.
    pub policy: Arc<PolicyConfig>,
    /// Postgres pool. `None` means in-memory only.
    pub db_pool: Option<PgPool>,
    /// Process configuration.
    pub config: AppConfig,
    /// Held from a financial change until its write commits.
    write_gate: Arc<tokio::sync::Mutex<()>>,
    /// Set once stored state is loaded and the journal verified.
    ready: Arc<AtomicBool>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("db_pool", &self.db_pool.as_ref().map(|_| "[connected]"))
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// Default configuration and policy, in-memory only.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None)
    }

    /// Given configuration with the default policy.
    pub fn with_config(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        Self::with_policy(config, PolicyConfig::default(), db_pool)
    }

    /// Given configuration and policy.
    pub fn with_policy(config: AppConfig, policy: PolicyConfig, db_pool: Option<PgPool>) -> Self {
        Self {
            book: Arc::new(Mutex::new(EscrowBook::new(policy.escrow.clone()))),
            refunds: Arc::new(Mutex::new(RefundDesk::new(policy.refund))),
            fraud_engine: Arc::new(FraudEngine::new(policy.fraud.clone())),
            fraud_records: Arc::new(RwLock::new(Vec::new())),
            safety_scores: Store::new(),
            firewall: Arc::new(Mutex::new(AbuseFirewall::new(policy.abuse.clone()))),
            rankings: Arc::new(Mutex::new(SupporterRankings::new())),
            missions: Arc::new(Mutex::new(MissionBoard::default())),
            scheduler: Arc::new(Mutex::new(JobScheduler::new())),
            policy: Arc::new(policy),
            db_pool,
            config,
            write_gate: Arc::new(tokio::sync::Mutex::new(())),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether startup hydration has completed.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Safety decay settings.
    pub fn safety_config(&self) -> SafetyConfig {
        self.policy.safety
    }

    /// Pricing table.
    pub fn pricing(&self) -> &PricingConfig {
        &self.policy.pricing
    }

    /// A user's safety score; users without events score 100 everywhere.
    pub fn safety_score(&self, user: UserId, now: DateTime<Utc>) -> SafetyScore {
        self.safety_scores
            .get(user.as_uuid())
            .unwrap_or_else(|| SafetyScore::new(user, now))
    }

    /// Apply a safety event to a user's score.
    pub fn apply_safety_event(
        &self,
        user: UserId,
        kind: SafetyEventKind,
        now: DateTime<Utc>,
    ) -> SafetyScore {
        let score = self.safety_scores.upsert(
            *user.as_uuid(),
            || SafetyScore::new(user, now),
            |s| s.apply_event(kind, now),
        );
        tracing::info!(
            user = %user,
            event = kind.as_str(),
            overall = score.overall(),
            risk = score.risk_level().as_str(),
            "safety event applied"
        );
        score
    }

    /// Append fraud records to the audit log.
    pub fn record_fraud(&self, records: &[FraudDetectionRecord]) {
        if !records.is_empty() {
            self.fraud_records.write().extend(records.iter().cloned());
        }
    }

    /// Apply a financial change and persist it as one unit.
    ///
    /// `apply` mutates the desk and book and returns its result with the
    /// records to write. If `apply` fails, or the write does, every change
    /// it made is rolled back before the error is returned.
    pub async fn transact<T, F>(&self, apply: F) -> Result<T, AppError>
    where
        T: Send,
        F: FnOnce(&mut RefundDesk, &mut EscrowBook) -> Result<(T, WriteSet), AppError> + Send,
    {
        let _gate = self.write_gate.lock().await;
        let (value, writes) = {
            let mut desk = self.refunds.lock();
            let mut book = self.book.lock();
            desk.begin();
            book.begin();
            match apply(&mut *desk, &mut *book) {
                Ok(done) => done,
                Err(e) => {
                    desk.rollback();
                    book.rollback();
                    return Err(e);
                }
            }
        };

        let written = self.persist(writes).await;
        let mut desk = self.refunds.lock();
        let mut book = self.book.lock();
        match written {
            Ok(()) => {
                desk.commit();
                book.commit();
                Ok(value)
            }
            Err(e) => {
                desk.rollback();
                book.rollback();
                Err(e)
            }
        }
    }

    /// Feed a settled escrow into supporter rankings and creator missions.
    ///
    /// The payer is ranked by what they did not get back; the creator earns
    /// the recipient amount, and a released chat or call counts as one
    /// answered message or completed call.
    pub fn record_settlement(&self, escrow: &EscrowRecord, now: DateTime<Utc>) {
        let Some(settlement) = escrow.settlement else {
            return;
        };
        let spent = escrow.total.saturating_sub(settlement.payer_refund);
        if !spent.is_zero() {
            if let Err(e) =
                self.rankings
                    .lock()
                    .record_spend(escrow.recipient, escrow.payer, spent, now)
            {
                tracing::warn!(escrow_id = %escrow.id, error = %e, "supporter spend not recorded");
            }
        }

        let mut activity = Vec::new();
        if !settlement.recipient_amount.is_zero() {
            activity.push((MissionMetric::TokensEarned, settlement.recipient_amount.value()));
        }
        if escrow.status == EscrowStatus::Released {
            match escrow.kind {
                TransactionKind::Chat => activity.push((MissionMetric::MessagesAnswered, 1)),
                TransactionKind::Call => activity.push((MissionMetric::CallsCompleted, 1)),
                TransactionKind::Event | TransactionKind::Content => {}
            }
        }
        let mut board = self.missions.lock();
        for (metric, amount) in activity {
            if let Err(e) = board.record_activity(escrow.recipient, metric, amount, now) {
                tracing::warn!(escrow_id = %escrow.id, error = %e, "mission activity not recorded");
            }
        }
    }

    /// Write changed records through to Postgres, if connected.
    pub async fn persist(&self, writes: WriteSet) -> Result<(), AppError> {
        let Some(pool) = &self.db_pool else {
            return Ok(());
        };
        crate::db::write(pool, &writes).await.map_err(|e| {
            tracing::error!(error = %e, "failed to persist changes");
            AppError::Internal(format!("database write failed: {e}"))
        })
    }

    /// Reload escrows, journal, refund requests and fraud records from
    /// Postgres. The journal is replayed and its hash chain verified. The
    /// service reports ready once this succeeds.
    pub async fn hydrate_from_db(&self) -> Result<(), String> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => {
                self.book
                    .lock()
                    .verify_chain()
                    .map_err(|e| format!("journal failed verification: {e}"))?;
                self.ready.store(true, Ordering::Release);
                return Ok(());
            }
        };

        let entries = crate::db::ledger::load_all(pool)
            .await
            .map_err(|e| format!("failed to load ledger entries: {e}"))?;
        let escrows = crate::db::escrows::load_all(pool)
            .await
            .map_err(|e| format!("failed to load escrows: {e}"))?;
        let requests = crate::db::refunds::load_all(pool)
            .await
            .map_err(|e| format!("failed to load refund requests: {e}"))?;
        let fraud = crate::db::fraud::load_all(pool)
            .await
            .map_err(|e| format!("failed to load fraud records: {e}"))?;

        let (entry_count, escrow_count, request_count, fraud_count) =
            (entries.len(), escrows.len(), requests.len(), fraud.len());

        let book = EscrowBook::restore(self.policy.escrow.clone(), entries, escrows)
            .map_err(|e| format!("failed to rebuild escrow book: {e}"))?;
        *self.book.lock() = book;
        *self.refunds.lock() = RefundDesk::restore(self.policy.refund, requests);
        *self.fraud_records.write() = fraud;

        tracing::info!(
            ledger_entries = entry_count,
            escrows = escrow_count,
            refund_requests = request_count,
            fraud_records = fraud_count,
            "Hydrated in-memory stores from database"
        );

        self.ready.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packs_core::TokenAmount;
    use packs_ledger::{OpenEscrow, ReleaseTrigger, SplitRatio};

    #[test]
    fn store_upsert_and_update_all() {
        let store: Store<u32> = Store::new();
        let id = Uuid::new_v4();
        assert_eq!(store.upsert(id, || 1, |v| *v += 1), 2);
        assert_eq!(store.upsert(id, || 1, |v| *v += 1), 3);
        assert_eq!(store.update_all(|v| *v *= 10), 1);
        assert_eq!(store.get(&id), Some(30));
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }

    #[test]
    fn safety_events_accumulate() {
        let state = AppState::new();
        let user = UserId::new();
        let now = Utc::now();
        assert_eq!(state.safety_score(user, now).overall(), 100);
        state.apply_safety_event(user, SafetyEventKind::HarassmentConfirmed, now);
        let score = state.apply_safety_event(user, SafetyEventKind::ReportReceived, now);
        assert_eq!(score.conduct, 65);
        assert_eq!(state.safety_score(user, now).conduct, 65);
    }

    #[tokio::test]
    async fn persist_without_pool_is_noop() {
        let state = AppState::new();
        state.persist(WriteSet::default()).await.unwrap();
        state.hydrate_from_db().await.unwrap();
    }

    #[tokio::test]
    async fn failed_write_leaves_book_unchanged() {
        let state = crate::routes::test_support::unreachable_db_state();
        let user = UserId::new();
        let result = state
            .transact(|_, book| {
                let entry = book.credit(user, TokenAmount::new(500), "top-up", Utc::now())?;
                Ok((
                    (),
                    WriteSet {
                        entries: vec![entry],
                        ..WriteSet::default()
                    },
                ))
            })
            .await;
        assert!(matches!(result, Err(AppError::Internal(_))));

        let book = state.book.lock();
        assert_eq!(book.wallet(user).available.value(), 0);
        assert_eq!(book.ledger().len(), 0);
        assert!(book.verify_chain().is_ok());
    }

    #[tokio::test]
    async fn rejected_change_is_undone() {
        let state = AppState::new();
        let user = UserId::new();
        let result: Result<(), AppError> = state
            .transact(|_, book| {
                book.credit(user, TokenAmount::new(500), "top-up", Utc::now())?;
                Err(AppError::Validation("changed our mind".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(state.book.lock().ledger().len(), 0);

        state
            .transact(|_, book| {
                let entry = book.credit(user, TokenAmount::new(500), "top-up", Utc::now())?;
                Ok(((), WriteSet { entries: vec![entry], ..WriteSet::default() }))
            })
            .await
            .unwrap();
        assert_eq!(state.book.lock().wallet(user).available.value(), 500);
    }

    #[tokio::test]
    async fn released_chat_counts_for_supporter_and_creator() {
        let state = AppState::new();
        let (payer, creator) = (UserId::new(), UserId::new());
        let now = Utc::now();
        let escrow = {
            let mut book = state.book.lock();
            book.credit(payer, TokenAmount::new(1000), "top-up", now).unwrap();
            let opened = book
                .open_escrow(
                    OpenEscrow {
                        payer,
                        recipient: creator,
                        kind: TransactionKind::Chat,
                        reference: "msg-9".into(),
                        total: TokenAmount::new(1000),
                        split: SplitRatio::STANDARD,
                    },
                    now,
                )
                .unwrap();
            book.release(&opened.escrow.id, ReleaseTrigger::Payer, now)
                .unwrap()
                .escrow
        };

        state.record_settlement(&escrow, now);

        let rankings = state.rankings.lock();
        let entry = rankings.entry(&creator, &payer).unwrap();
        assert_eq!(entry.rank, 1);
        assert_eq!(entry.total_spent.value(), 1000);
        drop(rankings);

        let missions = state.missions.lock();
        let progress = missions.progress(&creator).unwrap();
        assert_eq!(progress.missions["weekly_earnings"].progress, 650);
        assert_eq!(progress.missions["daily_replies"].progress, 1);
        assert!(!progress.missions.contains_key("daily_call"));
    }

    #[tokio::test]
    async fn ready_only_after_hydration() {
        let state = AppState::new();
        assert!(!state.is_ready());
        state.hydrate_from_db().await.unwrap();
        assert!(state.is_ready());
    }

    #[test]
    fn policy_flows_into_components() {
        let mut policy = PolicyConfig::default();
        policy.refund.escalation_hours = 12;
        let state = AppState::with_policy(AppConfig::default(), policy, None);
        assert_eq!(state.refunds.lock().config().escalation_hours, 12);
    }
}
