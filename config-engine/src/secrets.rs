//! Bootstrap-secret resolution for the composition root.
//!
//! The previous generation of this loader walked `BootstrapSecretsConfig`'s
//! fields by reflection, matching a `#[secret(path = "...")]`-style tag to
//! decide which environment variable fed which field. That mapping lived
//! nowhere a reader could see it end-to-end. Here it's an explicit table,
//! built once, read top to bottom.

use crate::error::{ConfigError, Result};
use crate::model::BootstrapSecretsConfig;

/// One row of the bootstrap-secret table: the environment variable a secret
/// is read from, and the setter that applies it to the config struct.
struct SecretBinding {
    env_var: &'static str,
    required: bool,
    set: fn(&mut BootstrapSecretsConfig, String),
}

const BOOTSTRAP_SECRET_BINDINGS: &[SecretBinding] = &[
    SecretBinding {
        env_var: "POLYKEY_MASTER_KEY_B64",
        required: true,
        set: |cfg, v| cfg.master_key_b64 = Some(v),
    },
    SecretBinding {
        env_var: "POLYKEY_JWT_RSA_PRIVATE_KEY_PEM",
        required: true,
        set: |cfg, v| cfg.jwt_rsa_private_key_pem = Some(v),
    },
    SecretBinding {
        env_var: "POLYKEY_DB_URL",
        required: true,
        set: |cfg, v| cfg.db_url = Some(v),
    },
];

/// Applies every binding in [`BOOTSTRAP_SECRET_BINDINGS`] to `cfg`, in
/// order. A value already present in `cfg` (e.g. set directly in a dev
/// config file) is left untouched; the environment only fills gaps.
///
/// Fails with [`ConfigError::MissingSecret`] naming the first unresolved
/// required binding.
pub fn resolve_bootstrap_secrets(cfg: &mut BootstrapSecretsConfig) -> Result<()> {
    for binding in BOOTSTRAP_SECRET_BINDINGS {
        let already_set = field_is_set(cfg, binding);
        if already_set {
            continue;
        }
        match std::env::var(binding.env_var) {
            Ok(value) => (binding.set)(cfg, value),
            Err(_) if binding.required => {
                return Err(ConfigError::MissingSecret(binding.env_var.to_string()))
            }
            Err(_) => {}
        }
    }
    Ok(())
}

fn field_is_set(cfg: &BootstrapSecretsConfig, binding: &SecretBinding) -> bool {
    match binding.env_var {
        "POLYKEY_MASTER_KEY_B64" => cfg.master_key_b64.is_some(),
        "POLYKEY_JWT_RSA_PRIVATE_KEY_PEM" => cfg.jwt_rsa_private_key_pem.is_some(),
        "POLYKEY_DB_URL" => cfg.db_url.is_some(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_secret_is_reported_by_name() {
        // SAFETY: test runs single-threaded within this process's env.
        std::env::remove_var("POLYKEY_MASTER_KEY_B64");
        std::env::remove_var("POLYKEY_JWT_RSA_PRIVATE_KEY_PEM");
        std::env::remove_var("POLYKEY_DB_URL");
        let mut cfg = BootstrapSecretsConfig::default();
        let err = resolve_bootstrap_secrets(&mut cfg).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret(v) if v == "POLYKEY_MASTER_KEY_B64"));
    }

    #[test]
    fn preset_value_is_not_overwritten_by_env() {
        std::env::set_var("POLYKEY_DB_URL", "postgres://env-value");
        let mut cfg = BootstrapSecretsConfig {
            master_key_b64: Some("m".into()),
            jwt_rsa_private_key_pem: Some("k".into()),
            db_url: Some("postgres://preset".into()),
        };
        resolve_bootstrap_secrets(&mut cfg).unwrap();
        assert_eq!(cfg.db_url.as_deref(), Some("postgres://preset"));
    }
}
