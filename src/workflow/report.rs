//! What a run created, observed and tore down

use crate::dataplane::models::{KeyItem, SecretItem, VaultObjectRow};

/// Result of one cleanup deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted,
    Failed(String),
}

impl DeletionOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeletionOutcome::Deleted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub vault: DeletionOutcome,
    pub resource_group: DeletionOutcome,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.vault.is_deleted() && self.resource_group.is_deleted()
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub resource_group: String,
    pub vault_name: String,
    pub vault_uri: String,
    pub key_id: Option<String>,
    pub keys: Vec<KeyItem>,
    pub secret_id: String,
    pub secrets: Vec<SecretItem>,
    /// Length of the vault's access-policy list after the grant step
    pub access_policy_count: usize,
    pub cleanup: CleanupReport,
}

impl RunReport {
    /// Listed keys and secrets as table rows.
    pub fn object_rows(&self) -> Vec<VaultObjectRow> {
        self.keys
            .iter()
            .map(VaultObjectRow::from)
            .chain(self.secrets.iter().map(VaultObjectRow::from))
            .collect()
    }
}
