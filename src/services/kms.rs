// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud KMS service for encrypting/decrypting Google OAuth tokens.
//!
//! Uses direct KMS encryption (not envelope encryption). Each ciphertext is
//! bound to its owner through the user ID as additional authenticated data,
//! so a token copied onto another user's record fails to decrypt.

use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// KMS encryption service.
#[derive(Clone)]
pub struct KmsService {
    /// Full resource path to the KMS key
    /// Format: projects/{project}/locations/{location}/keyRings/{ring}/cryptoKeys/{key}
    key_path: String,

    /// GCP KMS client. `None` in local mode.
    client: Option<std::sync::Arc<google_cloud_kms::client::Client>>,
}

impl KmsService {
    /// KMS Key Ring Name
    const KEY_RING_NAME: &str = "gym-buddy";

    /// Create a new KMS service.
    /// Connects to GCP KMS.
    pub async fn new(project_id: &str, location: &str, key_name: &str) -> Result<Self, AppError> {
        let key_path = format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            project_id,
            location,
            Self::KEY_RING_NAME,
            key_name
        );

        let config = google_cloud_kms::client::ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to create KMS auth config: {}", e))
            })?;

        let client = google_cloud_kms::client::Client::new(config)
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to create KMS client: {}", e))
            })?;

        tracing::info!(key = %key_path, "KMS service initialized");

        Ok(Self {
            key_path,
            client: Some(std::sync::Arc::new(client)),
        })
    }

    /// Local mode: tokens are only base64-encoded. For development and tests.
    pub fn local() -> Self {
        Self {
            key_path: "local".to_string(),
            client: None,
        }
    }

    pub fn is_local(&self) -> bool {
        self.client.is_none()
    }

    /// Encrypt plaintext for `user_id`.
    /// Returns base64-encoded ciphertext.
    pub async fn encrypt(&self, plaintext: &str, user_id: u64) -> Result<String, AppError> {
        use google_cloud_googleapis::cloud::kms::v1::EncryptRequest;

        let Some(client) = self.client.as_ref() else {
            return Ok(BASE64.encode(plaintext));
        };

        let req = EncryptRequest {
            name: self.key_path.clone(),
            plaintext: plaintext.as_bytes().to_vec(),
            additional_authenticated_data: user_id.to_string().into_bytes(),
            ..Default::default()
        };

        let response = client
            .encrypt(req, None)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("KMS encrypt failed: {}", e)))?;

        Ok(BASE64.encode(response.ciphertext))
    }

    /// Decrypt base64-encoded ciphertext written by [`Self::encrypt`] for
    /// the same `user_id`.
    pub async fn decrypt(&self, ciphertext_b64: &str, user_id: u64) -> Result<String, AppError> {
        use google_cloud_googleapis::cloud::kms::v1::DecryptRequest;

        let ciphertext = BASE64.decode(ciphertext_b64).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Base64 ciphertext decode failed: {}", e))
        })?;

        let plaintext = match self.client.as_ref() {
            None => ciphertext,
            Some(client) => {
                let req = DecryptRequest {
                    name: self.key_path.clone(),
                    ciphertext,
                    additional_authenticated_data: user_id.to_string().into_bytes(),
                    ..Default::default()
                };

                client
                    .decrypt(req, None)
                    .await
                    .map_err(|e| AppError::Internal(anyhow::anyhow!("KMS decrypt failed: {}", e)))?
                    .plaintext
            }
        };

        String::from_utf8(plaintext)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("UTF-8 decode failed: {}", e)))
    }
}

/// Helper to encrypt OAuth tokens before storing.
pub async fn encrypt_tokens(
    kms: &KmsService,
    access_token: &str,
    refresh_token: &str,
    user_id: u64,
) -> Result<(String, String), AppError> {
    let encrypted_access = kms.encrypt(access_token, user_id).await?;
    let encrypted_refresh = kms.encrypt(refresh_token, user_id).await?;
    Ok((encrypted_access, encrypted_refresh))
}

/// Helper to decrypt OAuth tokens after retrieval.
pub async fn decrypt_tokens(
    kms: &KmsService,
    encrypted_access: &str,
    encrypted_refresh: &str,
    user_id: u64,
) -> Result<(String, String), AppError> {
    let access_token = kms.decrypt(encrypted_access, user_id).await?;
    let refresh_token = kms.decrypt(encrypted_refresh, user_id).await?;
    Ok((access_token, refresh_token))
}
