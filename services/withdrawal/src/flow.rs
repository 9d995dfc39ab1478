//! Async driver connecting a session to its data collaborators
//!
//! The flow waits for the readiness signal, fetches the pool and the
//! caller's share balance, and keeps the session fed as either changes.
//! Collaborator failures never reach the session: the last valid outputs
//! stay in place and the error is reported to the caller.

use crate::errors::{FlowError, SourceError};
use crate::outputs::DerivedOutputs;
use crate::session::{SessionSettings, WithdrawalSession};
use crate::sources::{BalanceSource, PoolSource};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// A withdrawal session bound to one pool and one account
pub struct WithdrawalFlow<P, B> {
    pools: P,
    balances: B,
    pool_id: String,
    account: String,
    session: WithdrawalSession,
}

impl<P: PoolSource, B: BalanceSource> WithdrawalFlow<P, B> {
    /// Wait until ready, then build and initialize the session
    pub async fn start(
        pools: P,
        balances: B,
        mut ready: watch::Receiver<bool>,
        pool_id: impl Into<String>,
        account: impl Into<String>,
        settings: SessionSettings,
    ) -> Result<Self, FlowError> {
        let pool_id = pool_id.into();
        let account = account.into();

        ready
            .wait_for(|ready| *ready)
            .await
            .map_err(|_| FlowError::ReadinessClosed)?;

        let snapshot = pools.fetch_pool(&pool_id).await?;
        let share_balance = balances.balance(&snapshot.address, &account).await?;

        let mut session = WithdrawalSession::new(Arc::new(snapshot), settings)?;
        session.initialize(share_balance)?;
        info!(pool = %pool_id, %account, %share_balance, "Withdrawal flow started");

        Ok(Self {
            pools,
            balances,
            pool_id,
            account,
            session,
        })
    }

    pub fn session(&self) -> &WithdrawalSession {
        &self.session
    }

    /// Session for applying caller inputs
    pub fn session_mut(&mut self) -> &mut WithdrawalSession {
        &mut self.session
    }

    pub fn outputs(&self) -> &DerivedOutputs {
        self.session.derived_outputs()
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Fetch a fresh snapshot and recompute against it
    ///
    /// Snapshots older than the current block are rejected as stale.
    pub async fn refresh_pool(&mut self) -> Result<&DerivedOutputs, FlowError> {
        let snapshot = match self.pools.fetch_pool(&self.pool_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(pool = %self.pool_id, error = %e, "Pool refresh failed, keeping last outputs");
                return Err(e.into());
            }
        };

        let current = self.session.snapshot().block_number;
        if snapshot.block_number < current {
            let e = SourceError::StaleData {
                pool_id: self.pool_id.clone(),
                received: snapshot.block_number,
                current,
            };
            warn!(pool = %self.pool_id, error = %e, "Stale snapshot, keeping last outputs");
            return Err(e.into());
        }

        if let Err(e) = self.session.replace_snapshot(Arc::new(snapshot)) {
            warn!(pool = %self.pool_id, error = %e, "Rejected snapshot, keeping last outputs");
            return Err(e.into());
        }
        Ok(self.session.derived_outputs())
    }

    /// Re-seed the session from `account`'s share balance
    pub async fn account_changed(
        &mut self,
        account: impl Into<String>,
    ) -> Result<&DerivedOutputs, FlowError> {
        let account = account.into();
        let token = self.session.snapshot().address.clone();
        let share_balance = match self.balances.balance(&token, &account).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(%account, error = %e, "Balance fetch failed, keeping last outputs");
                return Err(e.into());
            }
        };

        self.session.initialize(share_balance)?;
        self.account = account;
        Ok(self.session.derived_outputs())
    }
}
