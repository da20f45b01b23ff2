use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{CreateGroupParams, GroupsRepo, RepoError};
use crate::domain::entities::{DEFAULT_GROUP_TITLE, GroupRecord};
use crate::domain::forms::{FieldError, GROUP_TITLE_MAX, optional_text, slug_field};
use crate::domain::slug::{SlugAsyncError, SlugError, generate_unique_slug_async};

#[derive(Debug, Error)]
pub enum GroupError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("invalid {field}: {error}")]
    Invalid {
        field: &'static str,
        error: FieldError,
    },
    #[error("group `{0}` already exists")]
    SlugTaken(String),
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error("group `{0}` not found")]
    NotFound(String),
}

impl From<SlugAsyncError<RepoError>> for GroupError {
    fn from(err: SlugAsyncError<RepoError>) -> Self {
        match err {
            SlugAsyncError::Slug(err) => GroupError::Slug(err),
            SlugAsyncError::Predicate(err) => GroupError::Repo(err),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateGroupCommand {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: String,
}

#[derive(Clone)]
pub struct GroupService {
    repo: Arc<dyn GroupsRepo>,
}

impl GroupService {
    pub fn new(repo: Arc<dyn GroupsRepo>) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> Result<Vec<GroupRecord>, GroupError> {
        Ok(self.repo.list_groups().await?)
    }

    /// Create a group. A missing slug is derived from the title and suffixed until unique.
    pub async fn create(&self, cmd: CreateGroupCommand) -> Result<GroupRecord, GroupError> {
        let title = optional_text(cmd.title.as_deref().unwrap_or_default(), GROUP_TITLE_MAX)
            .map_err(|error| GroupError::Invalid {
                field: "title",
                error,
            })?;
        let title = if title.is_empty() {
            DEFAULT_GROUP_TITLE.to_string()
        } else {
            title
        };

        let explicit = slug_field(cmd.slug.as_deref().unwrap_or_default())
            .map_err(|error| GroupError::Invalid { field: "slug", error })?;

        let slug = match explicit {
            Some(slug) => {
                if self.repo.find_group_by_slug(&slug).await?.is_some() {
                    return Err(GroupError::SlugTaken(slug));
                }
                slug
            }
            None => {
                let repo = self.repo.clone();
                generate_unique_slug_async(&title, move |candidate| {
                    let repo = repo.clone();
                    let candidate = candidate.to_string();
                    async move {
                        let existing = repo.find_group_by_slug(&candidate).await?;
                        Ok::<bool, RepoError>(existing.is_none())
                    }
                })
                .await?
            }
        };

        let group = self
            .repo
            .create_group(CreateGroupParams {
                title,
                slug: slug.clone(),
                description: cmd.description.trim().to_string(),
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => GroupError::SlugTaken(slug),
                other => GroupError::Repo(other),
            })?;

        info!(
            target = "yatube::application::groups",
            group_id = group.id,
            slug = %group.slug,
            "group created"
        );
        Ok(group)
    }

    pub async fn delete(&self, slug: &str) -> Result<(), GroupError> {
        if !self.repo.delete_group(slug).await? {
            return Err(GroupError::NotFound(slug.to_string()));
        }
        info!(
            target = "yatube::application::groups",
            slug = %slug,
            "group deleted; its posts are now ungrouped"
        );
        Ok(())
    }
}
