// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Lifecycle state: the single record of whether a server was constructed.

use std::sync::Mutex;

use mcpez_server::McpServer;

use crate::error::StartError;
use crate::lock;

/// Where the server is in its lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Phase {
    /// No server constructed yet; registrations are queued.
    #[default]
    Unstarted,
    /// Server constructed, transport handshake pending.
    Starting,
    /// Transport connected; notifications are delivered.
    Connected,
    /// Transport closed.
    Closed,
}

#[derive(Default)]
struct Inner {
    server: Option<McpServer>,
    phase: Phase,
    generation: u64,
}

/// Holds the live server handle once it exists.
///
/// The handle is set once and never cleared, except by [`LifecycleState::reset`]
/// which exists for test isolation.
#[derive(Default)]
pub struct LifecycleState {
    inner: Mutex<Inner>,
}

impl LifecycleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_server_started(&self) -> bool {
        lock(&self.inner).server.is_some()
    }

    /// Store `server` unconditionally. Callers check
    /// [`has_server_started`](Self::has_server_started) first; a second call
    /// overwrites the first handle.
    pub fn set_server_instance(&self, server: McpServer) {
        let mut inner = lock(&self.inner);
        inner.server = Some(server);
        inner.phase = inner.phase.max(Phase::Starting);
    }

    pub fn get_server_instance(&self) -> Option<McpServer> {
        lock(&self.inner).server.clone()
    }

    pub fn phase(&self) -> Phase {
        lock(&self.inner).phase
    }

    /// Check-and-set used by the start sequence.
    pub(crate) fn install(&self, server: McpServer) -> Result<u64, StartError> {
        let mut inner = lock(&self.inner);
        if inner.server.is_some() {
            return Err(StartError::AlreadyStarted);
        }
        inner.server = Some(server);
        inner.phase = Phase::Starting;
        Ok(inner.generation)
    }

    /// Move to `phase` unless the state was reset since `generation` was issued.
    pub(crate) fn advance(&self, generation: u64, phase: Phase) {
        let mut inner = lock(&self.inner);
        if inner.generation == generation && inner.phase < phase {
            inner.phase = phase;
        }
    }

    pub(crate) fn reset(&self) {
        let mut inner = lock(&self.inner);
        inner.server = None;
        inner.phase = Phase::Unstarted;
        inner.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let state = LifecycleState::new();
        assert!(!state.has_server_started());
        assert!(state.get_server_instance().is_none());
        assert_eq!(state.phase(), Phase::Unstarted);
    }

    #[test]
    fn test_set_server_instance() {
        let state = LifecycleState::new();
        state.set_server_instance(McpServer::new("first"));

        assert!(state.has_server_started());
        assert_eq!(state.phase(), Phase::Starting);
        let server = state.get_server_instance().unwrap();
        assert_eq!(server.info().server_info.name, "first");
    }

    #[test]
    fn test_set_server_instance_overwrites_silently() {
        let state = LifecycleState::new();
        state.set_server_instance(McpServer::new("first"));
        state.set_server_instance(McpServer::new("second"));

        let server = state.get_server_instance().unwrap();
        assert_eq!(server.info().server_info.name, "second");
    }

    #[test]
    fn test_set_server_instance_keeps_later_phase() {
        let state = LifecycleState::new();
        let generation = state.install(McpServer::new("first")).unwrap();
        state.advance(generation, Phase::Closed);

        state.set_server_instance(McpServer::new("second"));
        assert_eq!(state.phase(), Phase::Closed);
        let server = state.get_server_instance().unwrap();
        assert_eq!(server.info().server_info.name, "second");
    }

    #[test]
    fn test_install_refuses_second_server() {
        let state = LifecycleState::new();
        state.install(McpServer::new("first")).unwrap();

        assert!(matches!(
            state.install(McpServer::new("second")),
            Err(StartError::AlreadyStarted)
        ));
        let server = state.get_server_instance().unwrap();
        assert_eq!(server.info().server_info.name, "first");
    }

    #[test]
    fn test_phase_never_moves_backwards() {
        let state = LifecycleState::new();
        let generation = state.install(McpServer::new("s")).unwrap();

        state.advance(generation, Phase::Connected);
        state.advance(generation, Phase::Starting);
        assert_eq!(state.phase(), Phase::Connected);
    }

    #[test]
    fn test_stale_generation_is_ignored_after_reset() {
        let state = LifecycleState::new();
        let generation = state.install(McpServer::new("s")).unwrap();
        state.reset();

        state.advance(generation, Phase::Closed);
        assert_eq!(state.phase(), Phase::Unstarted);
        assert!(!state.has_server_started());
    }
}
