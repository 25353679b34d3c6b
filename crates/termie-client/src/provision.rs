//! Bot provisioning: create a bot account and obtain its token.

use reqwest::Method;

use termie_core::error::{Result, TermieError};
use termie_core::protocol::rest::{CreateBotBody, CreatedBot, Reply};

use crate::gateway::{GatewayRequest, RequestGateway, CONTENT_TYPE_JSON};

/// Account fields of the bot to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotProfile {
    pub uid: String,
    pub username: String,
    pub tag: String,
}

/// Credentials of the user that will own the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub uid: String,
    pub password: String,
}

/// `POST /bots/create` on `hostname:port`; the gateway's scheme decides http or https.
pub async fn create_bot(
    gateway: &RequestGateway,
    hostname: &str,
    port: u16,
    profile: &BotProfile,
    owner: &Owner,
) -> Result<CreatedBot> {
    if profile.uid.is_empty() || profile.username.is_empty() || profile.tag.is_empty() {
        return Err(TermieError::Config("bot uid, username and tag are required".into()));
    }
    if hostname.is_empty() || port == 0 {
        return Err(TermieError::Config("provisioning needs a hostname and a non-zero port".into()));
    }
    if owner.uid.is_empty() || owner.password.is_empty() {
        return Err(TermieError::Config("owner uid and password are required".into()));
    }

    let body = CreateBotBody {
        owner_uid: owner.uid.clone(),
        owner_password: owner.password.clone(),
        uid: profile.uid.clone(),
        username: profile.username.clone(),
        tag: profile.tag.clone(),
    };
    let body = serde_json::to_value(body)
        .map_err(|e| TermieError::Internal(format!("body encode failed: {e}")))?;
    let req = GatewayRequest::new(Method::POST, hostname, port, "/bots/create")
        .header("Content-Type", CONTENT_TYPE_JSON)
        .body(body);

    let created: CreatedBot = gateway
        .send(req)
        .await
        .and_then(Reply::decode)
        .map_err(|e| TermieError::CreateBot(e.into()))?;
    tracing::info!(uid = %profile.uid, "bot created");
    Ok(created)
}
