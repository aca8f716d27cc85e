//! Idempotent "make sure this remote entity exists" helpers shared by every
//! processor.

use crate::context::ProcessorContext;
use permit_api::ApiResult;
use std::fmt;
use std::future::Future;
use tracing::debug;

/// What happened to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// Created by this call
    Created,
    /// Already existed and was refreshed
    Updated,
    /// Already existed and needs no refresh
    AlreadyPresent,
    /// Exists, but refreshing it failed (recorded as a warning)
    Stale,
    /// Could not be created (recorded as an error)
    Failed,
}

impl EnsureOutcome {
    /// Whether the entity can be assumed to exist remotely
    pub fn exists(&self) -> bool {
        !matches!(self, EnsureOutcome::Failed)
    }
}

/// Names an entity in log lines and report entries
#[derive(Debug, Clone, Copy)]
pub struct Entity<'a> {
    pub kind: &'static str,
    pub key: &'a str,
}

impl<'a> Entity<'a> {
    pub fn new(kind: &'static str, key: &'a str) -> Self {
        Self { kind, key }
    }
}

impl fmt::Display for Entity<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.key)
    }
}

/// Create-or-update.
///
/// Entities known to exist go straight to `update`. Otherwise `create` runs
/// and a conflict falls back to `update`. Update failures are warnings, any
/// other create failure is an error.
pub async fn upsert<T, C, CF, U, UF>(
    ctx: &mut ProcessorContext,
    entity: Entity<'_>,
    exists: bool,
    create: C,
    update: U,
) -> EnsureOutcome
where
    C: FnOnce() -> CF,
    CF: Future<Output = ApiResult<T>>,
    U: FnOnce() -> UF,
    UF: Future<Output = ApiResult<T>>,
{
    if exists {
        debug!("{} exists, updating", entity);
        return refresh(ctx, entity, update).await;
    }

    match create().await {
        Ok(_) => {
            debug!("Created {}", entity);
            EnsureOutcome::Created
        }
        Err(e) if e.is_conflict() => {
            debug!("{} already exists, updating instead", entity);
            refresh(ctx, entity, update).await
        }
        Err(e) => {
            ctx.error(format!("Failed to create {}: {}", entity, e));
            EnsureOutcome::Failed
        }
    }
}

/// Create-only; a conflict means the entity is already in place
pub async fn ensure_created<T, C, CF>(
    ctx: &mut ProcessorContext,
    entity: Entity<'_>,
    create: C,
) -> EnsureOutcome
where
    C: FnOnce() -> CF,
    CF: Future<Output = ApiResult<T>>,
{
    match create().await {
        Ok(_) => {
            debug!("Created {}", entity);
            EnsureOutcome::Created
        }
        Err(e) if e.is_conflict() => {
            debug!("{} already exists", entity);
            EnsureOutcome::AlreadyPresent
        }
        Err(e) => {
            ctx.error(format!("Failed to create {}: {}", entity, e));
            EnsureOutcome::Failed
        }
    }
}

async fn refresh<T, U, UF>(ctx: &mut ProcessorContext, entity: Entity<'_>, update: U) -> EnsureOutcome
where
    U: FnOnce() -> UF,
    UF: Future<Output = ApiResult<T>>,
{
    match update().await {
        Ok(_) => EnsureOutcome::Updated,
        Err(e) => {
            ctx.warn(format!("Failed to update existing {}: {}", entity, e));
            EnsureOutcome::Stale
        }
    }
}
