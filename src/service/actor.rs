//! Acting principal for creator/updater metadata.

use crate::error::AppError;
use crate::model::Metadata;
use crate::tenant::Tenant;
use chrono::Utc;

/// Per-request identity taken from headers.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub tenant: Tenant,
    pub user_id: Option<String>,
    pub username: Option<String>,
}

impl RequestContext {
    pub fn new(tenant: Tenant) -> Self {
        RequestContext {
            tenant,
            user_id: None,
            username: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>, username: Option<String>) -> Self {
        self.user_id = Some(user_id.into());
        self.username = username;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub username: Option<String>,
}

pub trait ActorResolver: Send + Sync + 'static {
    fn resolve(&self, ctx: &RequestContext) -> Result<Actor, AppError>;
}

/// Requires a user id; the username is optional.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeaderActorResolver;

impl ActorResolver for HeaderActorResolver {
    fn resolve(&self, ctx: &RequestContext) -> Result<Actor, AppError> {
        let user_id = ctx
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Unauthorized("user id is required".into()))?;
        Ok(Actor {
            user_id: user_id.to_string(),
            username: ctx.username.clone().filter(|s| !s.trim().is_empty()),
        })
    }
}

pub fn created_metadata(actor: &Actor) -> Metadata {
    let now = Utc::now();
    Metadata {
        created_date: Some(now),
        created_by_user_id: Some(actor.user_id.clone()),
        created_by_username: actor.username.clone(),
        updated_date: Some(now),
        updated_by_user_id: Some(actor.user_id.clone()),
        updated_by_username: actor.username.clone(),
    }
}

/// Keep the creator fields from `stored`, stamp the updater.
pub fn updated_metadata(stored: Option<&Metadata>, actor: &Actor) -> Metadata {
    let mut meta = stored.cloned().unwrap_or_default();
    meta.updated_date = Some(Utc::now());
    meta.updated_by_user_id = Some(actor.user_id.clone());
    meta.updated_by_username = actor.username.clone();
    meta
}
