//! RPC handler implementations: one impl struct holding shared state,
//! one method per RPC, delegating everything past request parsing to
//! [`key_service::KeyService`]/[`auth_core`].

use std::time::Duration;

use tonic::{Request, Response, Status};
use uuid::Uuid;

use key_service::BatchItemResult;

use crate::composition::PolykeyServer;
use crate::conversions::{
    domain_create_key_request, key_to_proto_metadata, parse_key_id, patch_from_proto,
};
use crate::error::IntoStatus;
use crate::interceptors::require_authenticated;
use crate::proto;
use crate::proto::polykey_service_server::PolykeyService;
use error_common::Tier;

#[derive(Clone)]
pub struct PolykeyServiceImpl {
    server: PolykeyServer,
}

impl PolykeyServiceImpl {
    pub fn new(server: PolykeyServer) -> Self {
        Self { server }
    }
}

#[tonic::async_trait]
impl PolykeyService for PolykeyServiceImpl {
    async fn health_check(
        &self,
        _request: Request<proto::HealthCheckRequest>,
    ) -> Result<Response<proto::HealthCheckResponse>, Status> {
        let db_healthy = self.server.db_pool.is_healthy().await;
        let kms_healthy = self.server.kms.health_check(Tier::Free).await.is_ok();

        Ok(Response::new(proto::HealthCheckResponse {
            healthy: db_healthy && kms_healthy,
            service_version: self.server.service_version.clone(),
            build_commit: self.server.build_commit.clone(),
        }))
    }

    async fn authenticate(
        &self,
        request: Request<proto::AuthenticateRequest>,
    ) -> Result<Response<proto::AuthenticateResponse>, Status> {
        let req = request.into_inner();
        let record = self
            .server
            .client_store
            .verify_secret(&req.client_id, &req.client_secret)
            .map_err(IntoStatus::into_status)?;

        let ttl = Duration::from_secs(self.server.token_manager_config.default_ttl_seconds as u64);
        let token = self
            .server
            .token_manager
            .issue(&record.id, record.permissions, record.tier, ttl)
            .map_err(IntoStatus::into_status)?;

        Ok(Response::new(proto::AuthenticateResponse {
            access_token: token,
            expires_at: chrono::Utc::now().timestamp() + self.server.token_manager_config.default_ttl_seconds,
        }))
    }

    async fn create_key(
        &self,
        request: Request<proto::CreateKeyRequest>,
    ) -> Result<Response<proto::CreateKeyResponse>, Status> {
        let user = require_authenticated(&request)?;
        let domain_request = domain_create_key_request(request.into_inner())?;
        let key = self.server.key_service.create_key(&user, domain_request).await.map_err(IntoStatus::into_status)?;
        Ok(Response::new(proto::CreateKeyResponse { metadata: Some(key_to_proto_metadata(&key)) }))
    }

    async fn get_key(
        &self,
        request: Request<proto::GetKeyRequest>,
    ) -> Result<Response<proto::GetKeyResponse>, Status> {
        let user = require_authenticated(&request)?;
        let id = parse_key_id(&request.into_inner().id)?;
        let key = self.server.key_service.get_key(&user, id).await.map_err(IntoStatus::into_status)?;
        Ok(Response::new(proto::GetKeyResponse {
            metadata: Some(key_to_proto_metadata(&key)),
            encrypted_dek: key.encrypted_dek.clone(),
        }))
    }

    async fn get_key_metadata(
        &self,
        request: Request<proto::GetKeyMetadataRequest>,
    ) -> Result<Response<proto::GetKeyMetadataResponse>, Status> {
        let user = require_authenticated(&request)?;
        let id = parse_key_id(&request.into_inner().id)?;
        let key = self.server.key_service.get_key(&user, id).await.map_err(IntoStatus::into_status)?;
        Ok(Response::new(proto::GetKeyMetadataResponse { metadata: Some(key_to_proto_metadata(&key)) }))
    }

    async fn update_key_metadata(
        &self,
        request: Request<proto::UpdateKeyMetadataRequest>,
    ) -> Result<Response<proto::UpdateKeyMetadataResponse>, Status> {
        let user = require_authenticated(&request)?;
        let req = request.into_inner();
        let id = parse_key_id(&req.id)?;
        let patch = patch_from_proto(req.patch.unwrap_or_default());
        let key = self.server.key_service.update_metadata(&user, id, patch).await.map_err(IntoStatus::into_status)?;
        Ok(Response::new(proto::UpdateKeyMetadataResponse { metadata: Some(key_to_proto_metadata(&key)) }))
    }

    async fn rotate_key(
        &self,
        request: Request<proto::RotateKeyRequest>,
    ) -> Result<Response<proto::RotateKeyResponse>, Status> {
        let user = require_authenticated(&request)?;
        let req = request.into_inner();
        let id = parse_key_id(&req.id)?;
        let outcome = self
            .server
            .key_service
            .rotate_key(&user, id, req.grace_period_seconds)
            .await
            .map_err(IntoStatus::into_status)?;
        Ok(Response::new(proto::RotateKeyResponse {
            id: outcome.key_id.to_string(),
            previous_version: outcome.previous_version,
            new_version: outcome.new_version,
        }))
    }

    async fn revoke_key(
        &self,
        request: Request<proto::RevokeKeyRequest>,
    ) -> Result<Response<proto::RevokeKeyResponse>, Status> {
        let user = require_authenticated(&request)?;
        let id = parse_key_id(&request.into_inner().id)?;
        let key = self.server.key_service.revoke_key(&user, id).await.map_err(IntoStatus::into_status)?;
        Ok(Response::new(proto::RevokeKeyResponse { metadata: Some(key_to_proto_metadata(&key)) }))
    }

    async fn list_keys(
        &self,
        request: Request<proto::ListKeysRequest>,
    ) -> Result<Response<proto::ListKeysResponse>, Status> {
        let user = require_authenticated(&request)?;
        let req = request.into_inner();
        let page_token = if req.page_token.is_empty() { None } else { Some(req.page_token.as_str()) };
        let (keys, next_page_token) = self
            .server
            .key_service
            .list_keys(&user, page_token, req.page_size)
            .await
            .map_err(IntoStatus::into_status)?;

        Ok(Response::new(proto::ListKeysResponse {
            keys: keys.iter().map(key_to_proto_metadata).collect(),
            next_page_token: next_page_token.unwrap_or_default(),
        }))
    }

    async fn batch_create_keys(
        &self,
        request: Request<proto::BatchCreateKeysRequest>,
    ) -> Result<Response<proto::BatchCreateKeysResponse>, Status> {
        let user = require_authenticated(&request)?;
        let req = request.into_inner();

        let parsed: Vec<Result<key_service::CreateKeyRequest, String>> = req
            .requests
            .into_iter()
            .map(|r| domain_create_key_request(r).map_err(|s| s.message().to_string()))
            .collect();
        let valid: Vec<key_service::CreateKeyRequest> = parsed.iter().filter(|p| p.is_ok()).cloned().map(Result::unwrap).collect();
        let mut service_results = self.server.key_service.batch_create_keys(&user, valid).await.into_iter();

        let results = parsed
            .into_iter()
            .map(|p| match p {
                Err(message) => batch_create_error(message),
                Ok(_) => match service_results.next().expect("one result per valid request") {
                    BatchItemResult::Ok(key) => batch_create_ok(&key),
                    BatchItemResult::Err { message } => batch_create_error(message),
                },
            })
            .collect();

        Ok(Response::new(proto::BatchCreateKeysResponse { results }))
    }

    async fn batch_get_keys(
        &self,
        request: Request<proto::BatchGetKeysRequest>,
    ) -> Result<Response<proto::BatchGetKeysResponse>, Status> {
        let user = require_authenticated(&request)?;
        let req = request.into_inner();

        let parsed: Vec<Result<Uuid, String>> =
            req.ids.iter().map(|id| parse_key_id(id).map_err(|s| s.message().to_string())).collect();
        let valid: Vec<Uuid> = parsed.iter().filter_map(|p| p.as_ref().ok().copied()).collect();
        let mut service_results = self.server.key_service.batch_get_keys(&user, valid).await.into_iter();

        let results = parsed
            .into_iter()
            .map(|p| match p {
                Err(message) => batch_get_error(message),
                Ok(_) => match service_results.next().expect("one result per valid id") {
                    BatchItemResult::Ok(key) => batch_get_ok(&key),
                    BatchItemResult::Err { message } => batch_get_error(message),
                },
            })
            .collect();

        Ok(Response::new(proto::BatchGetKeysResponse { results }))
    }

    async fn batch_rotate_keys(
        &self,
        request: Request<proto::BatchRotateKeysRequest>,
    ) -> Result<Response<proto::BatchRotateKeysResponse>, Status> {
        let user = require_authenticated(&request)?;
        let req = request.into_inner();

        let parsed: Vec<Result<Uuid, String>> =
            req.ids.iter().map(|id| parse_key_id(id).map_err(|s| s.message().to_string())).collect();
        let valid: Vec<Uuid> = parsed.iter().filter_map(|p| p.as_ref().ok().copied()).collect();
        let mut service_results = self.server.key_service.batch_rotate_keys(&user, valid).await.into_iter();

        let results = parsed
            .into_iter()
            .map(|p| match p {
                Err(message) => batch_rotate_error(message),
                Ok(_) => match service_results.next().expect("one result per valid id") {
                    BatchItemResult::Ok(outcome) => proto::BatchRotateKeyResult {
                        outcome: Some(proto::batch_rotate_key_result::Outcome::Rotation(proto::RotateKeyResponse {
                            id: outcome.key_id.to_string(),
                            previous_version: outcome.previous_version,
                            new_version: outcome.new_version,
                        })),
                    },
                    BatchItemResult::Err { message } => batch_rotate_error(message),
                },
            })
            .collect();

        Ok(Response::new(proto::BatchRotateKeysResponse { results }))
    }

    async fn batch_revoke_keys(
        &self,
        request: Request<proto::BatchRevokeKeysRequest>,
    ) -> Result<Response<proto::BatchRevokeKeysResponse>, Status> {
        let user = require_authenticated(&request)?;
        let req = request.into_inner();

        let parsed: Vec<Result<Uuid, String>> =
            req.ids.iter().map(|id| parse_key_id(id).map_err(|s| s.message().to_string())).collect();
        let valid: Vec<Uuid> = parsed.iter().filter_map(|p| p.as_ref().ok().copied()).collect();
        let mut service_results = self.server.key_service.batch_revoke_keys(&user, valid).await.into_iter();

        let results = parsed
            .into_iter()
            .map(|p| match p {
                Err(message) => batch_revoke_error(message),
                Ok(_) => match service_results.next().expect("one result per valid id") {
                    BatchItemResult::Ok(key) => batch_revoke_ok(&key),
                    BatchItemResult::Err { message } => batch_revoke_error(message),
                },
            })
            .collect();

        Ok(Response::new(proto::BatchRevokeKeysResponse { results }))
    }

    async fn batch_update_key_metadata(
        &self,
        request: Request<proto::BatchUpdateKeyMetadataRequest>,
    ) -> Result<Response<proto::BatchUpdateKeyMetadataResponse>, Status> {
        let user = require_authenticated(&request)?;
        let req = request.into_inner();

        let parsed: Vec<Result<(Uuid, persistence::MetadataPatch), String>> = req
            .patches
            .into_iter()
            .map(|item| {
                let id = parse_key_id(&item.id).map_err(|s| s.message().to_string())?;
                Ok((id, patch_from_proto(item.patch.unwrap_or_default())))
            })
            .collect();
        let valid: Vec<(Uuid, persistence::MetadataPatch)> = parsed.iter().filter(|p| p.is_ok()).cloned().map(Result::unwrap).collect();
        let mut service_results = self.server.key_service.batch_update_metadata(&user, valid).await.into_iter();

        let results = parsed
            .into_iter()
            .map(|p| match p {
                Err(message) => batch_update_error(message),
                Ok(_) => match service_results.next().expect("one result per valid patch") {
                    BatchItemResult::Ok(key) => batch_update_ok(&key),
                    BatchItemResult::Err { message } => batch_update_error(message),
                },
            })
            .collect();

        Ok(Response::new(proto::BatchUpdateKeyMetadataResponse { results }))
    }
}

fn batch_create_ok(key: &persistence::Key) -> proto::BatchCreateKeyResult {
    proto::BatchCreateKeyResult {
        outcome: Some(proto::batch_create_key_result::Outcome::Metadata(key_to_proto_metadata(key))),
    }
}

fn batch_create_error(message: String) -> proto::BatchCreateKeyResult {
    proto::BatchCreateKeyResult {
        outcome: Some(proto::batch_create_key_result::Outcome::Error(proto::BatchError { message })),
    }
}

fn batch_get_ok(key: &persistence::Key) -> proto::BatchGetKeyResult {
    proto::BatchGetKeyResult {
        outcome: Some(proto::batch_get_key_result::Outcome::Key(proto::GetKeyResponse {
            metadata: Some(key_to_proto_metadata(key)),
            encrypted_dek: key.encrypted_dek.clone(),
        })),
    }
}

fn batch_get_error(message: String) -> proto::BatchGetKeyResult {
    proto::BatchGetKeyResult {
        outcome: Some(proto::batch_get_key_result::Outcome::Error(proto::BatchError { message })),
    }
}

fn batch_rotate_error(message: String) -> proto::BatchRotateKeyResult {
    proto::BatchRotateKeyResult {
        outcome: Some(proto::batch_rotate_key_result::Outcome::Error(proto::BatchError { message })),
    }
}

fn batch_revoke_ok(key: &persistence::Key) -> proto::BatchRevokeKeyResult {
    proto::BatchRevokeKeyResult {
        outcome: Some(proto::batch_revoke_key_result::Outcome::Metadata(key_to_proto_metadata(key))),
    }
}

fn batch_revoke_error(message: String) -> proto::BatchRevokeKeyResult {
    proto::BatchRevokeKeyResult {
        outcome: Some(proto::batch_revoke_key_result::Outcome::Error(proto::BatchError { message })),
    }
}

fn batch_update_ok(key: &persistence::Key) -> proto::BatchUpdateKeyMetadataResult {
    proto::BatchUpdateKeyMetadataResult {
        outcome: Some(proto::batch_update_key_metadata_result::Outcome::Metadata(key_to_proto_metadata(key))),
    }
}

fn batch_update_error(message: String) -> proto::BatchUpdateKeyMetadataResult {
    proto::BatchUpdateKeyMetadataResult {
        outcome: Some(proto::batch_update_key_metadata_result::Outcome::Error(proto::BatchError { message })),
    }
}
