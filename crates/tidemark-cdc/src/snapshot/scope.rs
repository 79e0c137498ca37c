//! Transaction and tenant scoping
//!
//! Both guards are released by an explicit async call from the coordinator's
//! teardown block. Neither is released on drop: rollback and tenant reset are
//! store round-trips and must be awaited.

use crate::common::{MetadataProvider, Result, SnapshotError};
use tracing::debug;

/// An open transaction on the run's connection.
///
/// Every lock taken while the scope is open belongs to the transaction and is
/// released only by [`TransactionScope::rollback`].
#[derive(Debug)]
#[must_use = "an open transaction must be rolled back"]
pub struct TransactionScope {
    _private: (),
}

impl TransactionScope {
    /// Turn off auto-commit and open a transaction
    pub async fn begin<P: MetadataProvider + ?Sized>(provider: &P) -> Result<Self> {
        provider
            .begin_transaction()
            .await
            .map_err(|e| SnapshotError::transaction(format!("begin failed: {}", e)))?;
        debug!("Transaction opened");
        Ok(Self { _private: () })
    }

    /// Take over a transaction left open by a run that never reached teardown
    pub(crate) fn abandoned() -> Self {
        Self { _private: () }
    }

    /// Roll back, releasing all locks. Consumes the scope.
    pub async fn rollback<P: MetadataProvider + ?Sized>(self, provider: &P) -> Result<()> {
        provider
            .rollback()
            .await
            .map_err(|e| SnapshotError::transaction(format!("rollback failed: {}", e)))?;
        debug!("Transaction rolled back");
        Ok(())
    }
}

/// The session's tenant for the duration of a run.
#[derive(Debug)]
#[must_use = "a selected tenant must be restored"]
pub struct TenantContext {
    tenant: Option<String>,
}

impl TenantContext {
    /// Context for `tenant` without switching the session yet.
    ///
    /// Restoring it resets the session whenever a tenant is configured, even if
    /// [`select`](Self::select) failed or was never called.
    pub fn new(tenant: Option<&str>) -> Self {
        Self {
            tenant: tenant.map(str::to_string),
        }
    }

    /// Switch into `tenant`, or do nothing when none is configured
    pub async fn enter<P: MetadataProvider + ?Sized>(
        provider: &P,
        tenant: Option<&str>,
    ) -> Result<Self> {
        let context = Self::new(tenant);
        context.select(provider).await?;
        Ok(context)
    }

    /// Switch the session into the configured tenant
    pub async fn select<P: MetadataProvider + ?Sized>(&self, provider: &P) -> Result<()> {
        if let Some(name) = &self.tenant {
            provider.select_tenant(name).await.map_err(|e| match e {
                SnapshotError::Config(_) => e,
                other => SnapshotError::query(format!("select tenant {}: {}", name, other)),
            })?;
            debug!("Switched session to tenant {}", name);
        }
        Ok(())
    }

    /// Configured tenant, if any
    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    /// Return the session to the root container. Consumes the context.
    pub async fn restore<P: MetadataProvider + ?Sized>(self, provider: &P) -> Result<()> {
        if let Some(name) = self.tenant {
            provider
                .reset_tenant()
                .await
                .map_err(|e| SnapshotError::query(format!("reset tenant {}: {}", name, e)))?;
            debug!("Session restored from tenant {}", name);
        }
        Ok(())
    }
}
