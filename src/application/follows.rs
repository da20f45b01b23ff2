use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("author `{0}` not found")]
    UnknownAuthor(String),
}

/// What a follow request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    SelfFollowIgnored,
}

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    /// Subscribe `viewer` to `username`. Storage has no uniqueness constraint on the
    /// pair, so an existing edge is looked up before inserting.
    pub async fn follow(
        &self,
        viewer: &UserRecord,
        username: &str,
    ) -> Result<FollowOutcome, FollowError> {
        let author = self.author(username).await?;
        if author.id == viewer.id {
            return Ok(FollowOutcome::SelfFollowIgnored);
        }
        if self.follows.is_following(viewer.id, author.id).await? {
            return Ok(FollowOutcome::AlreadyFollowing);
        }
        self.follows.create_follow(viewer.id, author.id).await?;
        debug!(
            target = "yatube::application::follows",
            user_id = viewer.id,
            author_id = author.id,
            "follow created"
        );
        Ok(FollowOutcome::Created)
    }

    /// Remove every edge from `viewer` to `username`; returns how many were removed.
    pub async fn unfollow(&self, viewer: &UserRecord, username: &str) -> Result<u64, FollowError> {
        let author = self.author(username).await?;
        Ok(self.follows.delete_follows(viewer.id, author.id).await?)
    }

    async fn author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| FollowError::UnknownAuthor(username.to_string()))
    }
}
