use serde::{Deserialize, Serialize};
use std::fmt;

/// Stages of a provisioning run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowStep {
    Authenticate,
    CreateResourceGroup,
    CreateVault,
    Settle,
    CreateKey,
    ListKeys,
    SetSecret,
    ListSecrets,
    GrantAccess,
    Cleanup,
}

impl WorkflowStep {
    /// Every step before cleanup, in order.
    pub const FORWARD: [WorkflowStep; 9] = [
        WorkflowStep::Authenticate,
        WorkflowStep::CreateResourceGroup,
        WorkflowStep::CreateVault,
        WorkflowStep::Settle,
        WorkflowStep::CreateKey,
        WorkflowStep::ListKeys,
        WorkflowStep::SetSecret,
        WorkflowStep::ListSecrets,
        WorkflowStep::GrantAccess,
    ];

    /// Steps that talk to the vault's own URI.
    pub fn is_data_plane(&self) -> bool {
        matches!(
            self,
            WorkflowStep::CreateKey
                | WorkflowStep::ListKeys
                | WorkflowStep::SetSecret
                | WorkflowStep::ListSecrets
        )
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowStep::Authenticate => "authenticate",
            WorkflowStep::CreateResourceGroup => "create resource group",
            WorkflowStep::CreateVault => "create vault",
            WorkflowStep::Settle => "settle",
            WorkflowStep::CreateKey => "create key",
            WorkflowStep::ListKeys => "list keys",
            WorkflowStep::SetSecret => "set secret",
            WorkflowStep::ListSecrets => "list secrets",
            WorkflowStep::GrantAccess => "grant access",
            WorkflowStep::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}
