//! External hooks: transition callbacks and custom button handlers.
//!
//! DESIGN
//! ======
//! Board configuration names hooks by string id. Hosts register a handler
//! for each id in a [`HandlerRegistry`] before mounting the board; the
//! engine resolves ids through the registry, and an id with no handler is
//! an explicit `HandlerNotFound` error.
//!
//! Hooks receive a [`BoardHandle`] so they can refresh the board, toggle
//! the work indicator or talk to the record store themselves.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::config::BoardSide;
use crate::error::ErrorCode;
use crate::metadata::LaneOption;
use crate::record::Record;
use crate::record_store::RecordStore;
use crate::services::refresh::{self, RefreshError};
use crate::state::BoardContext;
use crate::store::{Action, BoardState};

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("no handler registered for {0}")]
    HandlerNotFound(String),
    #[error("hook failed: {0}")]
    Failed(String),
}

impl ErrorCode for HookError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::HandlerNotFound(_) => "E_HANDLER_NOT_FOUND",
            Self::Failed(_) => "E_HOOK_FAILED",
        }
    }
}

/// What a transition hook asks the engine to do next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookOutcome {
    /// Skip the record update.
    pub prevent_default: bool,
}

impl HookOutcome {
    #[must_use]
    pub fn proceed() -> Self {
        Self { prevent_default: false }
    }

    #[must_use]
    pub fn prevent() -> Self {
        Self { prevent_default: true }
    }
}

// =============================================================================
// BOARD HANDLE
// =============================================================================

/// Capabilities handed to hooks.
#[derive(Clone)]
pub struct BoardHandle {
    ctx: BoardContext,
}

impl BoardHandle {
    #[must_use]
    pub fn new(ctx: BoardContext) -> Self {
        Self { ctx }
    }

    /// Re-fetch and re-partition the board.
    ///
    /// # Errors
    ///
    /// Returns the refresh error; board data is left as it was.
    pub async fn refresh(&self) -> Result<(), RefreshError> {
        refresh::refresh(&self.ctx).await
    }

    pub fn set_work_indicator(&self, working: bool) {
        self.ctx.store.dispatch(Action::SetWorkIndicator(working));
    }

    #[must_use]
    pub fn record_store(&self) -> &Arc<dyn RecordStore> {
        &self.ctx.records
    }

    #[must_use]
    pub fn state(&self) -> Arc<BoardState> {
        self.ctx.store.snapshot()
    }
}

// =============================================================================
// CONTEXTS
// =============================================================================

/// Passed to a transition hook, one per drop.
#[derive(Clone)]
pub struct TransitionContext {
    /// The dragged record.
    pub data: Record,
    /// Option of the lane the record was dropped on.
    pub target: LaneOption,
    pub side: BoardSide,
    pub board: BoardHandle,
}

/// Passed to a custom button handler.
#[derive(Clone)]
pub struct ButtonContext {
    pub data: Record,
    pub side: BoardSide,
    pub board: BoardHandle,
}

// =============================================================================
// TRAITS
// =============================================================================

#[async_trait::async_trait]
pub trait TransitionHook: Send + Sync {
    async fn on_transition(&self, ctx: TransitionContext) -> Result<HookOutcome, HookError>;
}

#[async_trait::async_trait]
pub trait ButtonHook: Send + Sync {
    async fn on_click(&self, ctx: ButtonContext) -> Result<(), HookError>;
}

struct FnTransitionHook<F>(F);

#[async_trait::async_trait]
impl<F, Fut> TransitionHook for FnTransitionHook<F>
where
    F: Fn(TransitionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HookOutcome, HookError>> + Send + 'static,
{
    async fn on_transition(&self, ctx: TransitionContext) -> Result<HookOutcome, HookError> {
        (self.0)(ctx).await
    }
}

struct FnButtonHook<F>(F);

#[async_trait::async_trait]
impl<F, Fut> ButtonHook for FnButtonHook<F>
where
    F: Fn(ButtonContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HookError>> + Send + 'static,
{
    async fn on_click(&self, ctx: ButtonContext) -> Result<(), HookError> {
        (self.0)(ctx).await
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Handler id → handler. Populated before the board is mounted.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    transitions: HashMap<String, Arc<dyn TransitionHook>>,
    buttons: HashMap<String, Arc<dyn ButtonHook>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_transition(mut self, id: impl Into<String>, hook: Arc<dyn TransitionHook>) -> Self {
        self.transitions.insert(id.into(), hook);
        self
    }

    /// Register an async closure as a transition hook.
    #[must_use]
    pub fn on_transition<F, Fut>(self, id: impl Into<String>, f: F) -> Self
    where
        F: Fn(TransitionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookOutcome, HookError>> + Send + 'static,
    {
        self.with_transition(id, Arc::new(FnTransitionHook(f)))
    }

    #[must_use]
    pub fn with_button(mut self, id: impl Into<String>, hook: Arc<dyn ButtonHook>) -> Self {
        self.buttons.insert(id.into(), hook);
        self
    }

    /// Register an async closure as a button handler.
    #[must_use]
    pub fn on_button<F, Fut>(self, id: impl Into<String>, f: F) -> Self
    where
        F: Fn(ButtonContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.with_button(id, Arc::new(FnButtonHook(f)))
    }

    /// # Errors
    ///
    /// Returns `HandlerNotFound` when nothing is registered under `id`.
    pub fn transition(&self, id: &str) -> Result<Arc<dyn TransitionHook>, HookError> {
        self.transitions
            .get(id)
            .cloned()
            .ok_or_else(|| HookError::HandlerNotFound(id.to_string()))
    }

    /// # Errors
    ///
    /// Returns `HandlerNotFound` when nothing is registered under `id`.
    pub fn button(&self, id: &str) -> Result<Arc<dyn ButtonHook>, HookError> {
        self.buttons
            .get(id)
            .cloned()
            .ok_or_else(|| HookError::HandlerNotFound(id.to_string()))
    }
}

#[cfg(test)]
#[path = "hooks_test.rs"]
mod tests;
