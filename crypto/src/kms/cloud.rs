//! Cloud KMS provider: delegates wrap/unwrap to an external HTTP endpoint
//! keyed by a provider-specific key ARN. `aws`/`vault`/etc.
//! configurations differ only in `endpoint` and `key_arn`; they all speak
//! the same minimal wrap/unwrap contract over HTTP.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::kms::traits::{KeyHandle, KmsProvider};
use error_common::Tier;

#[derive(Debug, Clone)]
pub struct CloudKmsConfig {
    pub provider_name: &'static str,
    pub endpoint: String,
    pub key_arn: String,
    /// Tiers this deployment is provisioned to serve. `Tier::kms_provider_name`
    /// routes both `Pro` and `Enterprise` to `"aws"`, but a given cloud
    /// account may only be entitled to serve one of them.
    pub tiers: Vec<Tier>,
}

pub struct CloudKmsProvider {
    config: CloudKmsConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct WrapRequest<'a> {
    key_arn: &'a str,
    key_id: &'a str,
    plaintext_b64: String,
}

#[derive(Deserialize)]
struct WrapResponse {
    ciphertext_b64: String,
}

#[derive(Serialize)]
struct UnwrapRequest<'a> {
    key_arn: &'a str,
    key_id: &'a str,
    ciphertext_b64: String,
}

#[derive(Deserialize)]
struct UnwrapResponse {
    plaintext_b64: String,
}

impl CloudKmsProvider {
    pub fn new(config: CloudKmsConfig) -> Self {
        Self { config, client: reqwest::Client::new() }
    }
}

#[async_trait]
impl KmsProvider for CloudKmsProvider {
    fn name(&self) -> &'static str {
        self.config.provider_name
    }

    fn supports_tier(&self, tier: Tier) -> bool {
        self.config.tiers.contains(&tier)
    }

    async fn wrap(&self, plaintext_dek: &[u8], handle: &KeyHandle) -> CryptoResult<Vec<u8>> {
        let request = WrapRequest {
            key_arn: &self.config.key_arn,
            key_id: &handle.key_id,
            plaintext_b64: BASE64.encode(plaintext_dek),
        };

        let response = self
            .client
            .post(format!("{}/wrap", self.config.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| CryptoError::ProviderUnavailable(format!("{}: {e}", self.config.provider_name)))?
            .json::<WrapResponse>()
            .await
            .map_err(|_| CryptoError::EncryptionFailed)?;

        BASE64
            .decode(response.ciphertext_b64)
            .map_err(|_| CryptoError::InvalidFormat)
    }

    async fn unwrap(&self, ciphertext: &[u8], handle: &KeyHandle) -> CryptoResult<Zeroizing<Vec<u8>>> {
        let request = UnwrapRequest {
            key_arn: &self.config.key_arn,
            key_id: &handle.key_id,
            ciphertext_b64: BASE64.encode(ciphertext),
        };

        let response = self
            .client
            .post(format!("{}/unwrap", self.config.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| CryptoError::ProviderUnavailable(format!("{}: {e}", self.config.provider_name)))?
            .json::<UnwrapResponse>()
            .await
            .map_err(|_| CryptoError::DecryptionFailed)?;

        let plaintext = BASE64
            .decode(response.plaintext_b64)
            .map_err(|_| CryptoError::InvalidFormat)?;
        Ok(Zeroizing::new(plaintext))
    }

    async fn health_check(&self) -> CryptoResult<()> {
        self.client
            .get(format!("{}/health", self.config.endpoint))
            .send()
            .await
            .map_err(|e| CryptoError::ProviderUnavailable(format!("{}: {e}", self.config.provider_name)))?
            .error_for_status()
            .map_err(|e| CryptoError::ProviderUnavailable(format!("{}: {e}", self.config.provider_name)))?;
        Ok(())
    }
}
