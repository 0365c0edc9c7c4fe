//! Provisioning workflow orchestrator
//!
//! Runs the provisioning sequence once, strictly in order. The first failing
//! step stops forward progress. Cleanup always runs afterwards, and its two
//! deletions are attempted independently of each other and of the outcome.

use reqwest::Client;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::plan::WorkflowPlan;
use super::progress::{ProgressObserver, StepOutcome};
use super::report::{CleanupReport, DeletionOutcome, RunReport};
use super::step::WorkflowStep;
use crate::arm::ArmClient;
use crate::auth::challenge::TokenProviderAuthenticator;
use crate::auth::provider::{ClientSecretTokenProvider, TokenProvider};
use crate::auth::session::{ManagementLogin, ManagementSession};
use crate::config::settings::{
    RunSettings, WorkflowConfig, ENV_OBJECT_ID, ENV_OBJECT_ID_KEYVAULT_OPERATIONS,
};
use crate::dataplane::models::{KeyItem, SecretItem};
use crate::dataplane::operations::{AzureVaultDataClient, VaultDataOperations};
use crate::error::{ProvisionError, Result};
use crate::group::models::ResourceGroupParameters;
use crate::group::operations::{AzureResourceGroupOperations, ResourceGroupOperations};
use crate::vault::models::{
    AccessLevel, AccessPolicyEntry, Vault, VaultCreateOrUpdateParameters, VaultProperties,
};
use crate::vault::operations::{AzureVaultOperations, VaultOperations};

/// Remote services the workflow drives.
#[derive(Clone)]
pub struct Collaborators {
    pub login: Arc<dyn ManagementLogin>,
    pub resource_groups: Arc<dyn ResourceGroupOperations>,
    pub vaults: Arc<dyn VaultOperations>,
    pub data: Arc<dyn VaultDataOperations>,
}

impl Collaborators {
    /// Azure REST implementations sharing one HTTP client and identity.
    pub fn azure(
        http_client: Client,
        config: &WorkflowConfig,
        settings: &RunSettings,
    ) -> Self {
        let provider: Arc<dyn TokenProvider> = Arc::new(ClientSecretTokenProvider::new(
            http_client.clone(),
            &settings.login_endpoint,
            &config.tenant_id,
            &config.client_id,
            config.client_secret.clone(),
        ));
        let session = Arc::new(ManagementSession::new(provider.clone()));
        let arm = Arc::new(ArmClient::new(
            http_client.clone(),
            session.clone(),
            &settings.management_endpoint,
            &config.subscription_id,
        ));
        let authenticator = Arc::new(TokenProviderAuthenticator::new(provider));

        Self {
            login: session,
            resource_groups: Arc::new(AzureResourceGroupOperations::new(arm.clone())),
            vaults: Arc::new(AzureVaultOperations::new(arm)),
            data: Arc::new(AzureVaultDataClient::new(http_client, authenticator)),
        }
    }
}

pub struct Orchestrator {
    services: Collaborators,
    plan: WorkflowPlan,
    progress: Arc<dyn ProgressObserver>,
}

/// Outputs of the forward steps, threaded into later steps.
struct Provisioned {
    vault_uri: String,
    key_id: Option<String>,
    keys: Vec<KeyItem>,
    secret_id: String,
    secrets: Vec<SecretItem>,
    access_policy_count: usize,
}

impl Orchestrator {
    pub fn new(
        services: Collaborators,
        plan: WorkflowPlan,
        progress: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self {
            services,
            plan,
            progress,
        }
    }

    /// Execute the workflow.
    ///
    /// On failure the returned error is the failing step's own error wrapped
    /// in [`ProvisionError::StepFailed`]; cleanup errors never replace it.
    pub async fn run(&self, config: &WorkflowConfig) -> Result<RunReport> {
        info!(
            resource_group = %self.plan.resource_group,
            vault = %self.plan.vault_name,
            location = %self.plan.location,
            "Starting provisioning run"
        );

        let outcome = self.provision(config).await;
        let cleanup = self.cleanup().await;

        match outcome {
            Ok(provisioned) => {
                if cleanup.is_clean() {
                    info!("Provisioning run completed");
                } else {
                    warn!("Provisioning run completed, but cleanup left resources behind");
                }
                Ok(RunReport {
                    resource_group: self.plan.resource_group.clone(),
                    vault_name: self.plan.vault_name.clone(),
                    vault_uri: provisioned.vault_uri,
                    key_id: provisioned.key_id,
                    keys: provisioned.keys,
                    secret_id: provisioned.secret_id,
                    secrets: provisioned.secrets,
                    access_policy_count: provisioned.access_policy_count,
                    cleanup,
                })
            }
            Err(e) => {
                error!(error = %e, "Provisioning run failed");
                Err(e)
            }
        }
    }

    async fn step<T, F>(&self, step: WorkflowStep, description: String, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.progress.step_started(step, &description);
        info!(step = %step, "{}", description);

        match work.await {
            Ok(value) => {
                self.progress.step_finished(step, StepOutcome::Succeeded);
                Ok(value)
            }
            Err(e) => {
                self.progress.step_finished(step, StepOutcome::Failed);
                if step.is_data_plane() && e.is_transient() {
                    warn!(
                        settle_delay_ms = self.plan.settle_delay.as_millis() as u64,
                        "Vault endpoint unreachable; the settle delay may be too short for DNS registration"
                    );
                }
                Err(ProvisionError::step_failed(step, e))
            }
        }
    }

    async fn provision(&self, config: &WorkflowConfig) -> Result<Provisioned> {
        let plan = &self.plan;

        self.step(
            WorkflowStep::Authenticate,
            format!("Authenticating service principal {}", config.client_id),
            self.services.login.login(),
        )
        .await?;

        self.step(
            WorkflowStep::CreateResourceGroup,
            format!("Creating resource group: {}", plan.resource_group),
            self.services.resource_groups.create_or_update(
                &plan.resource_group,
                &ResourceGroupParameters::new(plan.location.clone()),
            ),
        )
        .await?;

        let vault = self
            .step(
                WorkflowStep::CreateVault,
                format!(
                    "Creating key vault {} in resource group: {}",
                    plan.vault_name, plan.resource_group
                ),
                self.create_vault(config),
            )
            .await?;
        let vault_uri = vault
            .vault_uri()
            .map(str::to_string)
            .ok_or_else(|| {
                ProvisionError::step_failed(
                    WorkflowStep::CreateVault,
                    ProvisionError::serialization("Vault response carried no vaultUri"),
                )
            })?;
        info!(vault_uri = %vault_uri, "Vault created");

        self.step(
            WorkflowStep::Settle,
            format!(
                "Waiting {} ms for vault DNS registration",
                plan.settle_delay.as_millis()
            ),
            async {
                tokio::time::sleep(plan.settle_delay).await;
                Ok(())
            },
        )
        .await?;

        let key = self
            .step(
                WorkflowStep::CreateKey,
                format!("Creating key {} in vault: {}", plan.key.name, plan.vault_name),
                self.services
                    .data
                    .create_key(&vault_uri, &plan.key.name, &plan.key.parameters()),
            )
            .await?;

        let keys = self
            .step(
                WorkflowStep::ListKeys,
                format!("Getting keys from vault: {}", plan.vault_name),
                self.services.data.get_keys(&vault_uri),
            )
            .await?;
        info!(count = keys.len(), "Listed keys");

        let secret = self
            .step(
                WorkflowStep::SetSecret,
                format!(
                    "Setting secret {} in vault: {}",
                    plan.secret.name, plan.vault_name
                ),
                self.services.data.set_secret(
                    &vault_uri,
                    &plan.secret.name,
                    &plan.secret.parameters(),
                ),
            )
            .await?;

        let secrets = self
            .step(
                WorkflowStep::ListSecrets,
                format!("Getting secrets from vault: {}", plan.vault_name),
                self.services.data.get_secrets(&vault_uri),
            )
            .await?;
        info!(count = secrets.len(), "Listed secrets");

        let access_policy_count = match &config.secondary_object_id {
            Some(object_id) => {
                self.step(
                    WorkflowStep::GrantAccess,
                    format!("Updating key vault: {}", plan.vault_name),
                    self.grant_access(config, object_id),
                )
                .await?
            }
            None => {
                let description = format!(
                    "Skipping access grant: {} is not set",
                    ENV_OBJECT_ID_KEYVAULT_OPERATIONS
                );
                self.progress
                    .step_started(WorkflowStep::GrantAccess, &description);
                warn!("{}", description);
                self.progress
                    .step_finished(WorkflowStep::GrantAccess, StepOutcome::Skipped);
                vault.properties.access_policies.len()
            }
        };

        Ok(Provisioned {
            vault_uri,
            key_id: key.key.kid,
            keys,
            secret_id: secret.id,
            secrets,
            access_policy_count,
        })
    }

    async fn create_vault(&self, config: &WorkflowConfig) -> Result<Vault> {
        let object_id = config.object_id.clone().ok_or_else(|| {
            ProvisionError::invalid_argument(format!(
                "{} is required to grant initial vault access",
                ENV_OBJECT_ID
            ))
        })?;

        let entry = AccessPolicyEntry::new(
            config.tenant_id.clone(),
            object_id,
            None,
            AccessLevel::Owner,
        );
        let parameters = VaultCreateOrUpdateParameters {
            location: self.plan.location.clone(),
            properties: VaultProperties::new(config.tenant_id.clone(), vec![entry]),
            tags: Some(HashMap::new()),
        };

        self.services
            .vaults
            .create_or_update(&self.plan.resource_group, &self.plan.vault_name, &parameters)
            .await
    }

    /// Append an entry for the second principal to the current definition.
    /// Returns the resulting policy count.
    async fn grant_access(&self, config: &WorkflowConfig, object_id: &str) -> Result<usize> {
        let current = self
            .services
            .vaults
            .get(&self.plan.resource_group, &self.plan.vault_name)
            .await?;

        let mut parameters = current.to_update_parameters();
        parameters.properties.append_access_policy(AccessPolicyEntry::new(
            config.tenant_id.clone(),
            object_id.to_string(),
            config.secondary_application_id.clone(),
            AccessLevel::Operator,
        ));

        let updated = self
            .services
            .vaults
            .create_or_update(&self.plan.resource_group, &self.plan.vault_name, &parameters)
            .await?;

        Ok(updated.properties.access_policies.len())
    }

    async fn cleanup(&self) -> CleanupReport {
        let plan = &self.plan;
        self.progress.step_started(
            WorkflowStep::Cleanup,
            &format!(
                "Deleting vault {} and resource group {}",
                plan.vault_name, plan.resource_group
            ),
        );

        let vault = match self
            .services
            .vaults
            .delete(&plan.resource_group, &plan.vault_name)
            .await
        {
            Ok(()) => DeletionOutcome::Deleted,
            Err(e) => self.cleanup_failure(&format!("vault {}", plan.vault_name), e),
        };

        let resource_group = match self
            .services
            .resource_groups
            .delete(&plan.resource_group)
            .await
        {
            Ok(()) => DeletionOutcome::Deleted,
            Err(e) => self.cleanup_failure(&format!("resource group {}", plan.resource_group), e),
        };

        let report = CleanupReport {
            vault,
            resource_group,
        };
        let outcome = if report.is_clean() {
            StepOutcome::Succeeded
        } else {
            StepOutcome::Failed
        };
        self.progress.step_finished(WorkflowStep::Cleanup, outcome);
        report
    }

    fn cleanup_failure(&self, resource: &str, e: ProvisionError) -> DeletionOutcome {
        warn!(resource, error = %e, "Encountered error during resource cleanup");
        self.progress.cleanup_failed(resource, &e);
        DeletionOutcome::Failed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::Credential;
    use crate::auth::session::MockManagementLogin;
    use crate::dataplane::models::{JsonWebKey, KeyBundle, SecretBundle};
    use crate::dataplane::operations::MockVaultDataOperations;
    use crate::group::models::ResourceGroup;
    use crate::group::operations::MockResourceGroupOperations;
    use crate::vault::operations::MockVaultOperations;
    use crate::workflow::progress::{ProgressEvent, RecordingProgress};
    use azure_core::auth::AccessToken;
    use mockall::Sequence;
    use std::sync::Mutex;
    use std::time::Duration;
    use time::OffsetDateTime;
    use tokio::time::Instant;

    const VAULT_URI: &str = "https://testkv1.vault.azure.net/";

    fn config() -> WorkflowConfig {
        WorkflowConfig {
            client_id: "client".into(),
            tenant_id: "tenant".into(),
            client_secret: zeroize::Zeroizing::new("secret".into()),
            subscription_id: "sub".into(),
            object_id: Some("object-1".into()),
            secondary_object_id: Some("object-2".into()),
            secondary_application_id: Some("app-2".into()),
        }
    }

    fn credential() -> Credential {
        Credential {
            token_type: "Bearer".into(),
            audience: "https://management.core.windows.net/".into(),
            token: AccessToken::new(
                "mgmt-token".to_string(),
                OffsetDateTime::now_utc() + time::Duration::hours(1),
            ),
        }
    }

    fn group_from(name: &str, params: &ResourceGroupParameters) -> ResourceGroup {
        ResourceGroup {
            id: format!("/subscriptions/sub/resourceGroups/{}", name),
            name: name.to_string(),
            location: params.location.clone(),
            properties: None,
        }
    }

    fn vault_from(parameters: &VaultCreateOrUpdateParameters) -> Vault {
        let mut properties = parameters.properties.clone();
        properties.vault_uri = Some(VAULT_URI.to_string());
        Vault {
            id: "/subscriptions/sub/resourceGroups/testrg1/providers/Microsoft.KeyVault/vaults/testkv1".into(),
            name: "testkv1".into(),
            location: parameters.location.clone(),
            tags: parameters.tags.clone().unwrap_or_default(),
            properties,
        }
    }

    /// The vault as the management plane holds it right after creation.
    fn created_vault() -> Vault {
        vault_from(&VaultCreateOrUpdateParameters {
            location: "westus".into(),
            properties: VaultProperties::new(
                "tenant",
                vec![AccessPolicyEntry::new(
                    "tenant".into(),
                    "object-1".into(),
                    None,
                    AccessLevel::Owner,
                )],
            ),
            tags: Some(HashMap::new()),
        })
    }

    fn failure(step: WorkflowStep) -> ProvisionError {
        ProvisionError::azure_api(format!("injected failure at {}", step))
    }

    struct Harness {
        login: MockManagementLogin,
        groups: MockResourceGroupOperations,
        vaults: MockVaultOperations,
        data: MockVaultDataOperations,
    }

    impl Harness {
        fn empty() -> Self {
            Self {
                login: MockManagementLogin::new(),
                groups: MockResourceGroupOperations::new(),
                vaults: MockVaultOperations::new(),
                data: MockVaultDataOperations::new(),
            }
        }

        /// Every call succeeds except the one at `fail_at`; each cleanup
        /// deletion must happen exactly once.
        fn standard(fail_at: Option<WorkflowStep>) -> Self {
            Self::empty()
                .with_login(fail_at)
                .with_group_create(fail_at)
                .with_vault_writes(fail_at)
                .with_data(fail_at)
                .with_cleanup()
        }

        fn with_login(mut self, fail_at: Option<WorkflowStep>) -> Self {
            self.login.expect_login().returning(move || {
                if fail_at == Some(WorkflowStep::Authenticate) {
                    Err(ProvisionError::authentication("invalid client secret"))
                } else {
                    Ok(credential())
                }
            });
            self
        }

        fn with_group_create(mut self, fail_at: Option<WorkflowStep>) -> Self {
            self.groups
                .expect_create_or_update()
                .returning(move |name, params| {
                    if fail_at == Some(WorkflowStep::CreateResourceGroup) {
                        return Err(failure(WorkflowStep::CreateResourceGroup));
                    }
                    Ok(group_from(name, params))
                });
            self
        }

        fn with_vault_writes(mut self, fail_at: Option<WorkflowStep>) -> Self {
            self.vaults
                .expect_create_or_update()
                .returning(move |_, _, params| {
                    let creating = params.properties.access_policies.len() == 1;
                    if creating && fail_at == Some(WorkflowStep::CreateVault) {
                        return Err(failure(WorkflowStep::CreateVault));
                    }
                    if !creating && fail_at == Some(WorkflowStep::GrantAccess) {
                        return Err(failure(WorkflowStep::GrantAccess));
                    }
                    Ok(vault_from(params))
                });
            self.vaults.expect_get().returning(|_, _| Ok(created_vault()));
            self
        }

        fn with_data(mut self, fail_at: Option<WorkflowStep>) -> Self {
            let fails = move |step: WorkflowStep| fail_at == Some(step);

            self.data
                .expect_create_key()
                .returning(move |_, name, params| {
                    if fails(WorkflowStep::CreateKey) {
                        return Err(failure(WorkflowStep::CreateKey));
                    }
                    Ok(KeyBundle {
                        key: JsonWebKey {
                            kid: Some(format!("{}keys/{}/v1", VAULT_URI, name)),
                            kty: params.kty.clone(),
                            key_ops: params.key_ops.clone(),
                            n: None,
                            e: None,
                        },
                        attributes: params.attributes.clone(),
                    })
                });
            self.data.expect_get_keys().returning(move |_| {
                if fails(WorkflowStep::ListKeys) {
                    return Err(failure(WorkflowStep::ListKeys));
                }
                Ok(vec![KeyItem {
                    kid: format!("{}keys/testkeyrandom99", VAULT_URI),
                    attributes: None,
                }])
            });
            self.data
                .expect_set_secret()
                .returning(move |_, name, params| {
                    if fails(WorkflowStep::SetSecret) {
                        return Err(failure(WorkflowStep::SetSecret));
                    }
                    Ok(SecretBundle {
                        id: format!("{}secrets/{}/v1", VAULT_URI, name),
                        value: Some(params.value.clone()),
                        content_type: params.content_type.clone(),
                        attributes: params.attributes.clone(),
                    })
                });
            self.data.expect_get_secrets().returning(move |_| {
                if fails(WorkflowStep::ListSecrets) {
                    return Err(failure(WorkflowStep::ListSecrets));
                }
                Ok(vec![SecretItem {
                    id: format!("{}secrets/mysecret", VAULT_URI),
                    content_type: Some("test secret".into()),
                    attributes: None,
                }])
            });
            self
        }

        fn with_cleanup(mut self) -> Self {
            self.vaults.expect_delete().times(1).returning(|_, _| Ok(()));
            self.groups.expect_delete().times(1).returning(|_| Ok(()));
            self
        }

        fn orchestrator_with_plan(
            self,
            plan: WorkflowPlan,
            progress: Arc<dyn ProgressObserver>,
        ) -> Orchestrator {
            Orchestrator::new(
                Collaborators {
                    login: Arc::new(self.login),
                    resource_groups: Arc::new(self.groups),
                    vaults: Arc::new(self.vaults),
                    data: Arc::new(self.data),
                },
                plan,
                progress,
            )
        }

        fn orchestrator(self, progress: Arc<dyn ProgressObserver>) -> Orchestrator {
            let plan =
                WorkflowPlan::new("testrg1", "testkv1").with_settle_delay(Duration::from_millis(1));
            self.orchestrator_with_plan(plan, progress)
        }
    }

    #[tokio::test]
    async fn successful_run_reports_everything() {
        let progress = Arc::new(RecordingProgress::new());
        let orchestrator = Harness::standard(None).orchestrator(progress.clone());

        let report = orchestrator.run(&config()).await.unwrap();

        assert_eq!(report.vault_uri, VAULT_URI);
        assert_eq!(
            report.key_id.as_deref(),
            Some("https://testkv1.vault.azure.net/keys/testkeyrandom99/v1")
        );
        assert_eq!(report.keys.len(), 1);
        assert_eq!(report.secrets.len(), 1);
        assert_eq!(report.access_policy_count, 2);
        assert!(report.cleanup.is_clean());

        let mut expected: Vec<WorkflowStep> = WorkflowStep::FORWARD.to_vec();
        expected.push(WorkflowStep::Cleanup);
        assert_eq!(progress.started_steps(), expected);
    }

    #[tokio::test]
    async fn cleanup_runs_once_whichever_step_fails() {
        let failing = [
            WorkflowStep::Authenticate,
            WorkflowStep::CreateResourceGroup,
            WorkflowStep::CreateVault,
            WorkflowStep::CreateKey,
            WorkflowStep::ListKeys,
            WorkflowStep::SetSecret,
            WorkflowStep::ListSecrets,
            WorkflowStep::GrantAccess,
        ];

        for step in failing {
            let progress = Arc::new(RecordingProgress::new());
            let orchestrator = Harness::standard(Some(step)).orchestrator(progress.clone());

            let err = orchestrator.run(&config()).await.unwrap_err();
            assert_eq!(err.failed_step(), Some(step), "wrong step for {step}");

            let started = progress.started_steps();
            let failed_at = started.iter().position(|s| *s == step).unwrap();
            assert_eq!(
                &started[failed_at + 1..],
                &[WorkflowStep::Cleanup],
                "steps ran after {step} failed"
            );
            assert!(progress
                .events()
                .contains(&ProgressEvent::Finished(step, StepOutcome::Failed)));
            // Dropping the mocks verifies each delete ran exactly once.
            drop(orchestrator);
        }
    }

    #[tokio::test]
    async fn key_failure_stops_later_steps_and_keeps_its_error() {
        let mut harness = Harness::empty()
            .with_login(None)
            .with_group_create(None)
            .with_cleanup();
        harness
            .vaults
            .expect_create_or_update()
            .times(1)
            .returning(|_, _, params| Ok(vault_from(params)));
        harness.vaults.expect_get().never();
        harness.data.expect_create_key().times(1).returning(|_, _, _| {
            Err(ProvisionError::azure_api("HTTP 403: key create denied"))
        });
        harness.data.expect_get_keys().never();
        harness.data.expect_set_secret().never();
        harness.data.expect_get_secrets().never();

        let orchestrator = harness.orchestrator(Arc::new(RecordingProgress::new()));
        let err = orchestrator.run(&config()).await.unwrap_err();

        assert_eq!(err.failed_step(), Some(WorkflowStep::CreateKey));
        assert!(matches!(
            err.root_cause(),
            ProvisionError::AzureApiError(msg) if msg.contains("key create denied")
        ));
    }

    #[tokio::test]
    async fn group_is_deleted_even_when_vault_deletion_fails() {
        let mut harness = Harness::empty()
            .with_login(None)
            .with_group_create(None)
            .with_vault_writes(None)
            .with_data(Some(WorkflowStep::ListSecrets));
        harness
            .vaults
            .expect_delete()
            .times(1)
            .returning(|_, _| Err(ProvisionError::azure_api("HTTP 409: vault busy")));
        harness.groups.expect_delete().times(1).returning(|_| Ok(()));

        let progress = Arc::new(RecordingProgress::new());
        let orchestrator = harness.orchestrator(progress.clone());
        let err = orchestrator.run(&config()).await.unwrap_err();

        // The original failure survives the cleanup failure.
        assert_eq!(err.failed_step(), Some(WorkflowStep::ListSecrets));
        assert!(progress
            .events()
            .contains(&ProgressEvent::CleanupFailed("vault testkv1".to_string())));
    }

    #[tokio::test]
    async fn cleanup_failure_after_success_is_reported_not_raised() {
        let mut harness = Harness::empty()
            .with_login(None)
            .with_group_create(None)
            .with_vault_writes(None)
            .with_data(None);
        harness.vaults.expect_delete().times(1).returning(|_, _| Ok(()));
        harness
            .groups
            .expect_delete()
            .times(1)
            .returning(|_| Err(ProvisionError::network("connection reset")));

        let orchestrator = harness.orchestrator(Arc::new(RecordingProgress::new()));
        let report = orchestrator.run(&config()).await.unwrap();

        assert!(report.cleanup.vault.is_deleted());
        assert!(!report.cleanup.resource_group.is_deleted());
        assert!(!report.cleanup.is_clean());
    }

    #[tokio::test]
    async fn authentication_failure_still_attempts_both_deletions() {
        let mut harness = Harness::empty().with_login(Some(WorkflowStep::Authenticate));
        harness.groups.expect_create_or_update().never();
        harness.vaults.expect_create_or_update().never();

        let mut seq = Sequence::new();
        harness
            .vaults
            .expect_delete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(ProvisionError::authentication("no credential")));
        harness
            .groups
            .expect_delete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ProvisionError::authentication("no credential")));

        let progress = Arc::new(RecordingProgress::new());
        let orchestrator = harness.orchestrator(progress.clone());
        let err = orchestrator.run(&config()).await.unwrap_err();

        assert_eq!(err.failed_step(), Some(WorkflowStep::Authenticate));
        assert!(matches!(
            err.root_cause(),
            ProvisionError::AuthenticationError(_)
        ));
        let cleanup_failures = progress
            .events()
            .into_iter()
            .filter(|e| matches!(e, ProgressEvent::CleanupFailed(_)))
            .count();
        assert_eq!(cleanup_failures, 2);
    }

    #[tokio::test]
    async fn access_grant_appends_without_touching_first_entry() {
        let captured: Arc<Mutex<Vec<VaultCreateOrUpdateParameters>>> = Arc::default();
        let sink = captured.clone();

        let mut harness = Harness::empty()
            .with_login(None)
            .with_group_create(None)
            .with_data(None)
            .with_cleanup();
        harness
            .vaults
            .expect_create_or_update()
            .times(2)
            .returning(move |_, _, params| {
                sink.lock().unwrap().push(params.clone());
                Ok(vault_from(params))
            });
        let stored = captured.clone();
        harness.vaults.expect_get().times(1).returning(move |_, _| {
            let first = stored.lock().unwrap()[0].clone();
            Ok(vault_from(&first))
        });

        let orchestrator = harness.orchestrator(Arc::new(RecordingProgress::new()));
        let report = orchestrator.run(&config()).await.unwrap();

        let calls = captured.lock().unwrap();
        let created = &calls[0].properties.access_policies;
        let updated = &calls[1].properties.access_policies;
        assert_eq!(created.len(), 1);
        assert_eq!(updated.len(), created.len() + 1);
        assert_eq!(updated[0], created[0]);
        assert_eq!(updated[1].object_id, "object-2");
        assert_eq!(updated[1].application_id.as_deref(), Some("app-2"));
        assert_eq!(updated[1].permissions.keys, vec!["get", "list", "import"]);
        // The update writes back the server-assigned URI it read.
        assert_eq!(calls[1].properties.vault_uri.as_deref(), Some(VAULT_URI));
        assert_eq!(report.access_policy_count, 2);
    }

    #[tokio::test]
    async fn grant_is_skipped_without_secondary_identity() {
        let mut harness = Harness::empty()
            .with_login(None)
            .with_group_create(None)
            .with_data(None)
            .with_cleanup();
        harness
            .vaults
            .expect_create_or_update()
            .times(1)
            .returning(|_, _, params| Ok(vault_from(params)));
        harness.vaults.expect_get().never();

        let progress = Arc::new(RecordingProgress::new());
        let orchestrator = harness.orchestrator(progress.clone());
        let mut config = config();
        config.secondary_object_id = None;

        let report = orchestrator.run(&config).await.unwrap();
        assert_eq!(report.access_policy_count, 1);
        assert!(progress.events().contains(&ProgressEvent::Finished(
            WorkflowStep::GrantAccess,
            StepOutcome::Skipped
        )));
    }

    #[tokio::test]
    async fn missing_primary_object_id_fails_vault_creation() {
        let mut harness = Harness::empty()
            .with_login(None)
            .with_group_create(None)
            .with_cleanup();
        harness.vaults.expect_create_or_update().never();

        let orchestrator = harness.orchestrator(Arc::new(RecordingProgress::new()));
        let mut config = config();
        config.object_id = None;

        let err = orchestrator.run(&config).await.unwrap_err();
        assert_eq!(err.failed_step(), Some(WorkflowStep::CreateVault));
        assert!(matches!(
            err.root_cause(),
            ProvisionError::InvalidArgument(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_delay_elapses_before_first_data_plane_call() {
        let vault_created: Arc<Mutex<Option<Instant>>> = Arc::default();
        let key_requested: Arc<Mutex<Option<Instant>>> = Arc::default();

        let mut harness = Harness::empty()
            .with_login(None)
            .with_group_create(None)
            .with_cleanup();

        let created = vault_created.clone();
        harness
            .vaults
            .expect_create_or_update()
            .times(1)
            .returning(move |_, _, params| {
                *created.lock().unwrap() = Some(Instant::now());
                Ok(vault_from(params))
            });

        let requested = key_requested.clone();
        harness
            .data
            .expect_create_key()
            .times(1)
            .returning(move |_, _, _| {
                *requested.lock().unwrap() = Some(Instant::now());
                Err(ProvisionError::azure_api("stop after timing the first call"))
            });

        let plan = WorkflowPlan::new("testrg1", "testkv1");
        assert_eq!(plan.settle_delay, Duration::from_millis(5000));
        let orchestrator =
            harness.orchestrator_with_plan(plan, Arc::new(RecordingProgress::new()));

        let err = orchestrator.run(&config()).await.unwrap_err();
        assert_eq!(err.failed_step(), Some(WorkflowStep::CreateKey));

        let created = vault_created.lock().unwrap().expect("vault created");
        let requested = key_requested.lock().unwrap().expect("key requested");
        assert!(requested.duration_since(created) >= Duration::from_millis(5000));
    }
}
