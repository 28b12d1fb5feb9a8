//! Per-request context attached to the request extensions by the
//! interceptor chain's audit-enrichment stage: request id, origin,
//! user-agent, remote address, collapsed to the fields the audit
//! pipeline and handlers actually consume.

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(client_ip: Option<String>, user_agent: Option<String>) -> Self {
        Self { request_id: Uuid::new_v4(), client_ip, user_agent, received_at: Utc::now() }
    }
}
