//! Uniform `execute -> result` command contract with guaranteed rollback and reset (§4.2).
//!
//! Rather than the teacher's dynamic `match` over an opcode living inside a single god-function,
//! each verb is its own type implementing `MgcpCommand`; `call()` enforces the invariant that
//! `reset` always runs exactly once regardless of which path `execute`/`rollback` took (§9's
//! "abstract base + template method" note, expressed as composition instead of inheritance).

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::CommandError;
use crate::message::{MgcpCommandParameterType, TransactionId, Verb};

/// The result of running a command to completion, ready to be turned into an `MgcpMessage::Response`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MgcpCommandResult {
    pub transaction_id: TransactionId,
    pub code: u16,
    pub message: Option<String>,
    pub parameters: BTreeMap<MgcpCommandParameterType, String>,
}

impl MgcpCommandResult {
    pub fn success(transaction_id: TransactionId, code: u16) -> Self {
        Self { transaction_id, code, message: None, parameters: BTreeMap::new() }
    }

    pub fn failure(transaction_id: TransactionId, err: CommandError) -> Self {
        Self { transaction_id, code: err.code, message: Some(err.message), parameters: BTreeMap::new() }
    }

    pub fn with_parameter(mut self, key: MgcpCommandParameterType, value: impl Into<String>) -> Self {
        self.parameters.insert(key, value.into());
        self
    }
}

/// A unit of work dispatched by the mediator for one transaction.
///
/// `call()` is the only entry point external callers use; `execute`/`rollback`/`reset` are the
/// three pure operations a concrete command supplies. Exactly one of `execute` or `rollback`
/// produces the returned result, and `reset` always runs before `call` returns — on the success
/// path, the failure-and-rollback path, and the rollback-itself-failed path.
#[async_trait]
pub trait MgcpCommand: Send {
    /// Transaction id this command instance was created for.
    fn transaction_id(&self) -> TransactionId;

    /// Attempt the command's effect. On success, returns the result to report back. On failure,
    /// returns the `CommandError` that should drive `rollback`.
    async fn execute(&mut self) -> Result<MgcpCommandResult, CommandError>;

    /// Undo whatever partial effect `execute` had, and produce the result to report back for the
    /// failed transaction. Must not itself fail; a concrete command that cannot cleanly roll back
    /// should fold that into a best-effort result rather than panicking.
    async fn rollback(&mut self, error: CommandError) -> MgcpCommandResult;

    /// Release any resources held for this invocation. Runs exactly once per `call()`, on every
    /// exit path.
    fn reset(&mut self);

    /// Runs the command to completion per the protocol described above.
    async fn call(&mut self) -> MgcpCommandResult {
        let result = match self.execute().await {
            Ok(result) => result,
            Err(err) => self.rollback(err).await,
        };
        self.reset();
        result
    }
}

/// Lets a boxed trait object stand in for `Self::Command` on a `CommandProvider` that resolves
/// different verbs to different concrete types (the gateway binary's provider): `call()`'s default
/// implementation still applies, dispatching through the vtable for `execute`/`rollback`/`reset`.
#[async_trait]
impl MgcpCommand for Box<dyn MgcpCommand> {
    fn transaction_id(&self) -> TransactionId {
        self.as_ref().transaction_id()
    }

    async fn execute(&mut self) -> Result<MgcpCommandResult, CommandError> {
        self.as_mut().execute().await
    }

    async fn rollback(&mut self, error: CommandError) -> MgcpCommandResult {
        self.as_mut().rollback(error).await
    }

    fn reset(&mut self) {
        self.as_mut().reset()
    }
}

/// Resolves a verb to a fresh command instance.
///
/// A closed enumeration rather than a string-keyed dynamic registry (§9): unknown verbs never
/// reach `provide` because `Verb::from_str` already rejects them with `ProtocolError` while
/// parsing the inbound request.
pub trait CommandProvider: Send + Sync {
    type Command: MgcpCommand;

    fn provide(
        &self,
        verb: Verb,
        transaction_id: TransactionId,
        endpoint: crate::endpoint::EndpointId,
        parameters: BTreeMap<MgcpCommandParameterType, String>,
    ) -> Result<Self::Command, CommandError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A command whose `execute` always fails, to exercise the rollback + reset invariant.
    struct AlwaysFails {
        transaction_id: TransactionId,
        reset_count: u32,
    }

    #[async_trait]
    impl MgcpCommand for AlwaysFails {
        fn transaction_id(&self) -> TransactionId {
            self.transaction_id
        }

        async fn execute(&mut self) -> Result<MgcpCommandResult, CommandError> {
            Err(CommandError::new(500, "boom"))
        }

        async fn rollback(&mut self, error: CommandError) -> MgcpCommandResult {
            MgcpCommandResult::failure(self.transaction_id, error)
        }

        fn reset(&mut self) {
            self.reset_count += 1;
        }
    }

    struct AlwaysSucceeds {
        transaction_id: TransactionId,
        reset_count: u32,
    }

    #[async_trait]
    impl MgcpCommand for AlwaysSucceeds {
        fn transaction_id(&self) -> TransactionId {
            self.transaction_id
        }

        async fn execute(&mut self) -> Result<MgcpCommandResult, CommandError> {
            Ok(MgcpCommandResult::success(self.transaction_id, 200))
        }

        async fn rollback(&mut self, error: CommandError) -> MgcpCommandResult {
            MgcpCommandResult::failure(self.transaction_id, error)
        }

        fn reset(&mut self) {
            self.reset_count += 1;
        }
    }

    #[tokio::test]
    async fn reset_runs_exactly_once_on_failure() {
        let mut cmd = AlwaysFails { transaction_id: 1, reset_count: 0 };
        let result = cmd.call().await;
        assert_eq!(result.code, 500);
        assert_eq!(cmd.reset_count, 1);
    }

    #[tokio::test]
    async fn reset_runs_exactly_once_on_success() {
        let mut cmd = AlwaysSucceeds { transaction_id: 1, reset_count: 0 };
        let result = cmd.call().await;
        assert_eq!(result.code, 200);
        assert_eq!(cmd.reset_count, 1);
    }

    #[tokio::test]
    async fn result_is_never_produced_by_both_execute_and_rollback() {
        // AlwaysFails: only rollback contributes to the result (execute returns Err).
        let mut cmd = AlwaysFails { transaction_id: 7, reset_count: 0 };
        let result = cmd.call().await;
        assert_eq!(result.transaction_id, 7);
        assert_eq!(result.code, 500);
    }
}
