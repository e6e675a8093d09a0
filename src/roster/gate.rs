//! Passphrase confirmation for destructive or protected actions.
//!
//! The shipped check compares against one shared passphrase held in service
//! configuration. That passphrase is a confirmation step, not an access control
//! boundary: anyone who can read the configuration knows it. A real
//! authorization call can replace [`SharedPassphrase`] behind
//! [`AuthorizationCheck`] without changing the confirmation state machine.
//!
//! The gate only covers deletes made through the roster controller. The raw
//! collection endpoint `DELETE /api/members/{id}` removes a record without any
//! passphrase, whatever `delete_gated` says, so anything that can reach the
//! collection surface can delete directly.

use async_trait::async_trait;
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::export::ExportFormat;

pub const INCORRECT_PASSPHRASE: &str = "Incorrect passphrase";

/// Action waiting on a passphrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedAction {
    Delete,
    Export(ExportFormat),
}

/// Decides whether a submitted passphrase unlocks an action.
#[async_trait]
pub trait AuthorizationCheck: Send + Sync {
    async fn authorize(&self, action: GatedAction, passphrase: &str) -> Result<(), AppError>;
}

/// Exact match against a single shared passphrase.
pub struct SharedPassphrase {
    passphrase: String,
}

impl SharedPassphrase {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
        }
    }
}

#[async_trait]
impl AuthorizationCheck for SharedPassphrase {
    async fn authorize(&self, action: GatedAction, passphrase: &str) -> Result<(), AppError> {
        if constant_time_compare(passphrase, &self.passphrase) {
            Ok(())
        } else {
            tracing::warn!("Passphrase mismatch for {:?}", action);
            Err(AppError::Authorization(INCORRECT_PASSPHRASE.to_string()))
        }
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Confirmation modal contents while waiting on the passphrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfirmation<T> {
    pub target: T,
    pub attempts: u32,
    /// Passphrase typed so far
    pub passphrase: String,
    pub error: Option<String>,
}

/// Idle / AwaitingConfirmation state machine shared by delete and export.
///
/// There is no lockout: `attempts` only counts mismatches for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState<T> {
    Idle,
    AwaitingConfirmation(PendingConfirmation<T>),
}

impl<T> Default for GateState<T> {
    fn default() -> Self {
        GateState::Idle
    }
}

impl<T: Clone> GateState<T> {
    pub fn is_idle(&self) -> bool {
        matches!(self, GateState::Idle)
    }

    pub fn pending(&self) -> Option<&PendingConfirmation<T>> {
        match self {
            GateState::Idle => None,
            GateState::AwaitingConfirmation(pending) => Some(pending),
        }
    }

    /// Open the modal for `target`, replacing any earlier pending request.
    pub fn open(&mut self, target: T) {
        *self = GateState::AwaitingConfirmation(PendingConfirmation {
            target,
            attempts: 0,
            passphrase: String::new(),
            error: None,
        });
    }

    pub fn close(&mut self) {
        *self = GateState::Idle;
    }

    pub fn type_passphrase(&mut self, value: impl Into<String>) {
        if let GateState::AwaitingConfirmation(pending) = self {
            pending.passphrase = value.into();
        }
    }

    /// Target and passphrase to check; `submitted` overrides the typed text.
    pub fn attempt(&self, submitted: Option<String>) -> Option<(T, String)> {
        self.pending().map(|pending| {
            let passphrase = submitted.unwrap_or_else(|| pending.passphrase.clone());
            (pending.target.clone(), passphrase)
        })
    }

    pub fn record_mismatch(&mut self) {
        if let GateState::AwaitingConfirmation(pending) = self {
            pending.attempts += 1;
            pending.passphrase.clear();
            pending.error = Some(INCORRECT_PASSPHRASE.to_string());
        }
    }

    /// Keep the modal open after a failure further down the line.
    pub fn record_failure(&mut self, message: impl Into<String>) {
        if let GateState::AwaitingConfirmation(pending) = self {
            pending.passphrase.clear();
            pending.error = Some(message.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("12345", "12345"));
        assert!(!constant_time_compare("1234", "12345"));
        assert!(!constant_time_compare("12346", "12345"));
        assert!(constant_time_compare("", ""));
    }

    #[tokio::test]
    async fn test_shared_passphrase_exact_match() {
        let check = SharedPassphrase::new("12345");
        assert!(check.authorize(GatedAction::Delete, "12345").await.is_ok());

        let err = check
            .authorize(GatedAction::Delete, "1234")
            .await
            .unwrap_err();
        assert_eq!(err, AppError::Authorization(INCORRECT_PASSPHRASE.to_string()));

        assert!(check
            .authorize(GatedAction::Export(ExportFormat::Document), " 12345")
            .await
            .is_err());
    }

    #[test]
    fn test_mismatch_clears_only_passphrase() {
        let mut gate: GateState<String> = GateState::default();
        gate.open("m-1".to_string());
        gate.type_passphrase("1234");
        gate.record_mismatch();

        let pending = gate.pending().unwrap();
        assert_eq!(pending.target, "m-1");
        assert_eq!(pending.attempts, 1);
        assert!(pending.passphrase.is_empty());
        assert_eq!(pending.error.as_deref(), Some(INCORRECT_PASSPHRASE));
    }

    #[test]
    fn test_attempt_prefers_submitted_text() {
        let mut gate: GateState<String> = GateState::default();
        assert!(gate.attempt(None).is_none());

        gate.open("m-1".to_string());
        gate.type_passphrase("typed");
        assert_eq!(
            gate.attempt(None),
            Some(("m-1".to_string(), "typed".to_string()))
        );
        assert_eq!(
            gate.attempt(Some("sent".to_string())),
            Some(("m-1".to_string(), "sent".to_string()))
        );
    }

    #[test]
    fn test_typing_while_idle_is_ignored() {
        let mut gate: GateState<String> = GateState::default();
        gate.type_passphrase("12345");
        assert!(gate.is_idle());
    }

    #[test]
    fn test_no_lockout() {
        let mut gate: GateState<String> = GateState::default();
        gate.open("m-1".to_string());
        for _ in 0..50 {
            gate.record_mismatch();
        }
        assert_eq!(gate.pending().unwrap().attempts, 50);
        assert!(gate.attempt(Some("12345".to_string())).is_some());
    }
}
