#![forbid(unsafe_code)]

use docket_engines::secret_vault::SecretVault;
use docket_kernel_contracts::provider_secrets::ProviderSecretId;

pub fn execute_vault_command(
    vault: &SecretVault,
    subcommand: &str,
    key_id: Option<&str>,
    value: Option<&str>,
) -> Result<String, String> {
    match subcommand {
        "set" => {
            let key = require_key_id(key_id)?;
            let raw = value.ok_or_else(|| "missing secret input value".to_string())?;
            vault
                .set_secret(key.as_str(), raw)
                .map_err(|e| format!("failed to store key: {e}"))?;
            Ok("OK".to_string())
        }
        "has" => {
            let key = require_key_id(key_id)?;
            let has = vault
                .has_secret(key.as_str())
                .map_err(|e| format!("failed to check key: {e}"))?;
            if has {
                Ok("YES".to_string())
            } else {
                Ok("NO".to_string())
            }
        }
        "del" => {
            let key = require_key_id(key_id)?;
            vault
                .delete_secret(key.as_str())
                .map_err(|e| format!("failed to delete key: {e}"))?;
            Ok("OK".to_string())
        }
        "ls" => {
            let keys = vault
                .list_secret_ids()
                .map_err(|e| format!("failed to list keys: {e}"))?;
            Ok(keys.join("\n"))
        }
        _ => Err(format!(
            "unknown vault subcommand: {subcommand}. expected one of: set, has, del, ls"
        )),
    }
}

pub fn parse_provider_secret_id(raw: &str) -> Result<ProviderSecretId, String> {
    ProviderSecretId::parse(raw).ok_or_else(|| {
        let allowed = ProviderSecretId::allowed_key_names().join(", ");
        format!("unknown key id '{raw}'. allowed: {allowed}")
    })
}

fn require_key_id(raw: Option<&str>) -> Result<ProviderSecretId, String> {
    let raw = raw.ok_or_else(|| {
        let allowed = ProviderSecretId::allowed_key_names().join(", ");
        format!("missing key id. allowed: {allowed}")
    })?;
    parse_provider_secret_id(raw)
}
