// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Lifecycle State Machine
//!
//! # States
//!
//! - NotDeployed: nothing applied (initial and final)
//! - Deploying: create or update in progress
//! - Deployed: last apply succeeded
//! - Failed: an apply or destroy failed
//! - Destroying: removal in progress
//!
//! # Inputs
//!
//! - BeginDeploy: NotDeployed | Deployed → Deploying
//! - Complete: Deploying → Deployed
//! - Fail: Deploying | Destroying → Failed
//! - BeginDestroy: Deployed | Failed → Destroying
//! - CompleteDestroy: Destroying → NotDeployed
//! - Recover: Deploying | Destroying → Failed, for a run that was interrupted
//!   and left the stack mid-transition
//!
//! A failed stack cannot be re-deployed in place; it must be destroyed first.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{StateMachine, TransitionError, TransitionResult};

/// Deployment status of one stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackStatus {
    #[default]
    NotDeployed,
    Deploying,
    Deployed,
    Failed,
    Destroying,
}

impl StackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StackStatus::NotDeployed => "not_deployed",
            StackStatus::Deploying => "deploying",
            StackStatus::Deployed => "deployed",
            StackStatus::Failed => "failed",
            StackStatus::Destroying => "destroying",
        }
    }

    /// Whether resources may exist for this stack
    pub fn is_present(&self) -> bool {
        !matches!(self, StackStatus::NotDeployed)
    }

    /// Whether a deploy or destroy is underway (or was interrupted)
    pub fn is_in_progress(&self) -> bool {
        matches!(self, StackStatus::Deploying | StackStatus::Destroying)
    }

    /// Whether the stack can be safely depended on
    pub fn is_stable(&self) -> bool {
        matches!(self, StackStatus::Deployed)
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle command (FSM input)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackCommand {
    BeginDeploy,
    Complete,
    Fail,
    BeginDestroy,
    CompleteDestroy,
    /// Mark an interrupted in-progress stack as failed
    Recover,
}

/// Transition output
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransitionOutput {
    /// Warnings generated during transition
    pub warnings: Vec<String>,
}

impl TransitionOutput {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            warnings: vec![message.into()],
        }
    }
}

impl StateMachine for StackStatus {
    type Input = StackCommand;
    type Output = TransitionOutput;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use StackCommand::*;
        use StackStatus::*;

        match (self, input) {
            (NotDeployed, BeginDeploy) => Ok((Deploying, TransitionOutput::ok())),
            (Deployed, BeginDeploy) => Ok((Deploying, TransitionOutput::ok())),
            (Deploying, Complete) => Ok((Deployed, TransitionOutput::ok())),
            (Deploying, Fail) => Ok((
                Failed,
                TransitionOutput::warning("Deployment failed; resources may be partially applied"),
            )),
            (Deployed, BeginDestroy) => Ok((Destroying, TransitionOutput::ok())),
            (Failed, BeginDestroy) => Ok((
                Destroying,
                TransitionOutput::warning("Destroying a failed stack"),
            )),
            (Destroying, CompleteDestroy) => Ok((NotDeployed, TransitionOutput::ok())),
            (Destroying, Fail) => Ok((
                Failed,
                TransitionOutput::warning("Destroy failed; resources may remain"),
            )),

            (Deploying, Recover) | (Destroying, Recover) => Ok((
                Failed,
                TransitionOutput::warning(format!(
                    "Interrupted while {}; marked failed, destroy before redeploying",
                    self
                )),
            )),

            (Failed, BeginDeploy) => Err(TransitionError::BusinessRuleViolation(
                "Failed stack must be destroyed before it is deployed again".to_string(),
            )),
            (Deploying, BeginDeploy) | (Destroying, BeginDestroy) => {
                Err(TransitionError::BusinessRuleViolation(format!(
                    "Stack is already {}",
                    self
                )))
            }
            (from, input) => Err(TransitionError::InvalidTransition {
                from: from.to_string(),
                input: format!("{:?}", input),
            }),
        }
    }

    fn valid_inputs(&self) -> Vec<Self::Input> {
        use StackCommand::*;
        use StackStatus::*;

        match self {
            NotDeployed => vec![BeginDeploy],
            Deploying => vec![Complete, Fail, Recover],
            Deployed => vec![BeginDeploy, BeginDestroy],
            Failed => vec![BeginDestroy],
            Destroying => vec![CompleteDestroy, Fail, Recover],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const ALL_STATES: [StackStatus; 5] = [
        StackStatus::NotDeployed,
        StackStatus::Deploying,
        StackStatus::Deployed,
        StackStatus::Failed,
        StackStatus::Destroying,
    ];

    const ALL_COMMANDS: [StackCommand; 6] = [
        StackCommand::BeginDeploy,
        StackCommand::Complete,
        StackCommand::Fail,
        StackCommand::BeginDestroy,
        StackCommand::CompleteDestroy,
        StackCommand::Recover,
    ];

    #[test_case(StackStatus::NotDeployed, StackCommand::BeginDeploy, StackStatus::Deploying)]
    #[test_case(StackStatus::Deploying, StackCommand::Complete, StackStatus::Deployed)]
    #[test_case(StackStatus::Deploying, StackCommand::Fail, StackStatus::Failed)]
    #[test_case(StackStatus::Deployed, StackCommand::BeginDeploy, StackStatus::Deploying)]
    #[test_case(StackStatus::Deployed, StackCommand::BeginDestroy, StackStatus::Destroying)]
    #[test_case(StackStatus::Failed, StackCommand::BeginDestroy, StackStatus::Destroying)]
    #[test_case(StackStatus::Destroying, StackCommand::CompleteDestroy, StackStatus::NotDeployed)]
    #[test_case(StackStatus::Deploying, StackCommand::Recover, StackStatus::Failed)]
    #[test_case(StackStatus::Destroying, StackCommand::Recover, StackStatus::Failed)]
    fn test_valid_transitions(from: StackStatus, command: StackCommand, to: StackStatus) {
        let (next, _) = from.transition(&command).unwrap();
        assert_eq!(next, to);
    }

    #[test_case(StackStatus::NotDeployed, StackCommand::Complete)]
    #[test_case(StackStatus::NotDeployed, StackCommand::BeginDestroy)]
    #[test_case(StackStatus::Failed, StackCommand::BeginDeploy)]
    #[test_case(StackStatus::Deploying, StackCommand::BeginDeploy)]
    #[test_case(StackStatus::Deployed, StackCommand::CompleteDestroy)]
    #[test_case(StackStatus::Deployed, StackCommand::Recover)]
    #[test_case(StackStatus::Failed, StackCommand::Recover)]
    fn test_invalid_transitions(from: StackStatus, command: StackCommand) {
        assert!(from.transition(&command).is_err());
    }

    #[test]
    fn test_valid_inputs_match_transition_table() {
        for state in ALL_STATES {
            let valid = state.valid_inputs();
            for command in ALL_COMMANDS {
                assert_eq!(
                    valid.contains(&command),
                    state.can_transition(&command),
                    "{:?} via {:?}",
                    state,
                    command
                );
            }
        }
    }

    #[test]
    fn test_failure_carries_warning() {
        let (_, output) = StackStatus::Deploying.transition(&StackCommand::Fail).unwrap();
        assert_eq!(output.warnings.len(), 1);
    }
}
