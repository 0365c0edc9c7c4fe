//! Command-line interface
//!
//! Every argument is optional and backed by an environment variable, so the
//! normal invocation takes no arguments at all.

use clap::Parser;
use std::time::Duration;
use zeroize::Zeroizing;

use crate::arm::DEFAULT_MANAGEMENT_ENDPOINT;
use crate::auth::provider::DEFAULT_LOGIN_ENDPOINT;
use crate::config::settings::{
    ConfigSource, RunSettings, DEFAULT_LOCATION, ENV_APPLICATION_SECRET, ENV_CLIENT_ID,
    ENV_DOMAIN, ENV_OBJECT_ID, ENV_OBJECT_ID_KEYVAULT_OPERATIONS, ENV_SP_KEYVAULT_OPERATIONS,
    ENV_SUBSCRIPTION_ID,
};

#[derive(Parser)]
#[command(
    name = "kvprovision",
    version,
    about = "Provision an Azure Key Vault, exercise it, grant access and tear it down"
)]
pub struct Cli {
    /// Service principal client id
    #[arg(long, env = ENV_CLIENT_ID)]
    pub client_id: Option<String>,

    /// Tenant (domain) id
    #[arg(long, env = ENV_DOMAIN)]
    pub domain: Option<String>,

    /// Service principal secret
    #[arg(long, env = ENV_APPLICATION_SECRET, hide_env_values = true)]
    pub application_secret: Option<String>,

    /// Subscription to provision into
    #[arg(long, env = ENV_SUBSCRIPTION_ID)]
    pub subscription_id: Option<String>,

    /// Object id granted access when the vault is created
    #[arg(long, env = ENV_OBJECT_ID)]
    pub object_id: Option<String>,

    /// Object id granted access by the later policy update
    #[arg(long, env = ENV_OBJECT_ID_KEYVAULT_OPERATIONS)]
    pub object_id_keyvault_operations: Option<String>,

    /// Application id of the principal granted access by the policy update
    #[arg(long, env = ENV_SP_KEYVAULT_OPERATIONS)]
    pub sp_keyvault_operations: Option<String>,

    /// Azure region for the resource group and vault
    #[arg(long, env = "KV_LOCATION", default_value = DEFAULT_LOCATION)]
    pub location: String,

    /// Wait after vault creation before the first key or secret call
    #[arg(long, env = "KV_SETTLE_DELAY_MS", default_value_t = 5000)]
    pub settle_delay_ms: u64,

    #[arg(long, env = "KV_MANAGEMENT_ENDPOINT", default_value = DEFAULT_MANAGEMENT_ENDPOINT)]
    pub management_endpoint: String,

    #[arg(long, env = "KV_LOGIN_ENDPOINT", default_value = DEFAULT_LOGIN_ENDPOINT)]
    pub login_endpoint: String,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    pub fn config_source(&self) -> ConfigSource {
        ConfigSource {
            client_id: self.client_id.clone(),
            domain: self.domain.clone(),
            application_secret: self.application_secret.clone().map(Zeroizing::new),
            subscription_id: self.subscription_id.clone(),
            object_id: self.object_id.clone(),
            object_id_keyvault_operations: self.object_id_keyvault_operations.clone(),
            sp_keyvault_operations: self.sp_keyvault_operations.clone(),
        }
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            location: self.location.clone(),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            management_endpoint: self.management_endpoint.clone(),
            login_endpoint: self.login_endpoint.clone(),
            no_color: self.no_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "kvprovision",
            "--client-id",
            "client",
            "--location",
            "eastus",
            "--settle-delay-ms",
            "250",
            "--no-color",
        ])
        .unwrap();

        let settings = cli.run_settings();
        assert_eq!(settings.location, "eastus");
        assert_eq!(settings.settle_delay, Duration::from_millis(250));
        assert!(settings.no_color);
        assert_eq!(cli.config_source().client_id.as_deref(), Some("client"));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
