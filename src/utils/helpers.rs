//! General utility helper functions

use rand::Rng;

/// Generate a resource name from a prefix and a random numeric suffix in `0..10000`.
pub fn generate_random_id(prefix: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
    format!("{}{}", prefix, suffix)
}

/// Join a vault URI and a relative path without doubling or dropping slashes.
pub fn vault_url(vault_uri: &str, path: &str) -> crate::error::Result<url::Url> {
    let base = if vault_uri.ends_with('/') {
        url::Url::parse(vault_uri)?
    } else {
        url::Url::parse(&format!("{}/", vault_uri))?
    };
    Ok(base.join(path.trim_start_matches('/'))?)
}
