//! Post listings, post authoring and comments.

use std::error::Error as StdError;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::pagination::{PageParam, PageWindow, Paginator};
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, FollowsRepo, GroupsRepo, PostScope,
    PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams, UsersRepo,
};
use crate::domain::entities::{
    CommentRecord, CommentWithAuthor, GroupRecord, PostRecord, PostWithRelations, UserRecord,
};
use crate::domain::error::DomainError;
use crate::domain::forms::{
    FieldError, FormErrors, ImageUpload, image_field, optional_choice, required_text,
};

/// Where post images are kept. Stored paths are relative to the media root.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn save_image(
        &self,
        upload: &ImageUpload,
    ) -> Result<String, Box<dyn StdError + Send + Sync>>;

    async fn remove_image(&self, stored_path: &str) -> Result<(), Box<dyn StdError + Send + Sync>>;
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("invalid submission: {0}")]
    Invalid(FormErrors),
    #[error("failed to store image")]
    Media(#[source] Box<dyn StdError + Send + Sync>),
}

/// Raw values of the post form.
#[derive(Debug, Clone, Default)]
pub struct PostSubmission {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<ImageUpload>,
    /// Drop the current image when editing.
    pub clear_image: bool,
}

#[derive(Debug, Clone)]
pub struct GroupPage {
    pub group: GroupRecord,
    pub page: PageWindow<PostWithRelations>,
}

#[derive(Debug, Clone)]
pub struct ProfilePage {
    pub author: UserRecord,
    pub page: PageWindow<PostWithRelations>,
    pub following: bool,
    pub followers: u64,
    pub follows: u64,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostWithRelations,
    pub comments: Vec<CommentWithAuthor>,
    pub author_post_count: u64,
}

struct ValidPost {
    text: String,
    group_id: Option<i64>,
    image: Option<ImageUpload>,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: Arc<dyn FollowsRepo>,
    images: Arc<dyn ImageStore>,
    paginator: Paginator,
}

impl PostService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        comments: Arc<dyn CommentsRepo>,
        follows: Arc<dyn FollowsRepo>,
        images: Arc<dyn ImageStore>,
        paginator: Paginator,
    ) -> Self {
        Self {
            posts,
            writer,
            groups,
            users,
            comments,
            follows,
            images,
            paginator,
        }
    }

    pub async fn index(&self, page: PageParam) -> Result<PageWindow<PostWithRelations>, PostError> {
        self.listing(PostScope::All, page).await
    }

    pub async fn group_posts(&self, slug: &str, page: PageParam) -> Result<GroupPage, PostError> {
        let group = self
            .groups
            .find_group_by_slug(slug)
            .await?
            .ok_or(DomainError::not_found("group"))?;
        let page = self.listing(PostScope::Group(group.id), page).await?;
        Ok(GroupPage { group, page })
    }

    pub async fn profile(
        &self,
        username: &str,
        page: PageParam,
        viewer: Option<&UserRecord>,
    ) -> Result<ProfilePage, PostError> {
        let author = self
            .users
            .find_user_by_username(username)
            .await?
            .ok_or(DomainError::not_found("user"))?;
        let page = self.listing(PostScope::Author(author.id), page).await?;

        let following = match viewer {
            Some(viewer) if viewer.id != author.id => {
                self.follows.is_following(viewer.id, author.id).await?
            }
            _ => false,
        };
        let (followers, follows) = futures::try_join!(
            self.follows.count_followers(author.id),
            self.follows.count_following(author.id),
        )?;

        Ok(ProfilePage {
            author,
            page,
            following,
            followers,
            follows,
        })
    }

    /// Posts by every author `viewer` follows.
    pub async fn follow_feed(
        &self,
        viewer: &UserRecord,
        page: PageParam,
    ) -> Result<PageWindow<PostWithRelations>, PostError> {
        self.listing(PostScope::FollowedBy(viewer.id), page).await
    }

    pub async fn detail(&self, id: i64) -> Result<PostDetail, PostError> {
        let post = self.find(id).await?;
        let (comments, author_post_count) = futures::try_join!(
            self.comments.list_comments(id),
            self.posts.count_posts(PostScope::Author(post.post.author_id)),
        )?;
        Ok(PostDetail {
            post,
            comments,
            author_post_count,
        })
    }

    pub async fn groups(&self) -> Result<Vec<GroupRecord>, PostError> {
        Ok(self.groups.list_groups().await?)
    }

    pub async fn create(
        &self,
        author: &UserRecord,
        submission: PostSubmission,
    ) -> Result<PostRecord, PostError> {
        let valid = self.validate(submission).await?;
        let image = match &valid.image {
            Some(upload) => Some(self.images.save_image(upload).await.map_err(PostError::Media)?),
            None => None,
        };

        let post = self
            .writer
            .create_post(CreatePostParams {
                text: valid.text,
                author_id: author.id,
                group_id: valid.group_id,
                image,
            })
            .await?;

        info!(
            target = "yatube::application::posts",
            post_id = post.id,
            author_id = author.id,
            "post created"
        );
        Ok(post)
    }

    /// Load a post for editing, refusing anyone but its author.
    pub async fn editable(&self, id: i64, editor: &UserRecord) -> Result<PostWithRelations, PostError> {
        let post = self.find(id).await?;
        ensure_author(&post.post, editor)?;
        Ok(post)
    }

    pub async fn update(
        &self,
        id: i64,
        editor: &UserRecord,
        submission: PostSubmission,
    ) -> Result<PostRecord, PostError> {
        let current = self.editable(id, editor).await?;
        let clear_image = submission.clear_image;
        let valid = self.validate(submission).await?;

        let previous_image = current.post.image.clone();
        let image = match &valid.image {
            Some(upload) => Some(self.images.save_image(upload).await.map_err(PostError::Media)?),
            None if clear_image => None,
            None => previous_image.clone(),
        };

        let post = self
            .writer
            .update_post(UpdatePostParams {
                id,
                text: valid.text,
                group_id: valid.group_id,
                image: image.clone(),
            })
            .await?;

        if let Some(old) = previous_image.filter(|old| image.as_deref() != Some(old.as_str())) {
            self.discard_image(&old).await;
        }
        Ok(post)
    }

    pub async fn delete(&self, id: i64, editor: &UserRecord) -> Result<(), PostError> {
        let post = self.editable(id, editor).await?;
        if !self.writer.delete_post(id).await? {
            return Err(DomainError::not_found("post").into());
        }
        if let Some(image) = post.post.image.as_deref() {
            self.discard_image(image).await;
        }
        info!(
            target = "yatube::application::posts",
            post_id = id,
            "post deleted"
        );
        Ok(())
    }

    pub async fn add_comment(
        &self,
        post_id: i64,
        author: &UserRecord,
        text: &str,
    ) -> Result<CommentRecord, PostError> {
        let post = self.find(post_id).await?;
        let text = required_text(text).map_err(|error| {
            let mut errors = FormErrors::new();
            errors.push("text", error);
            PostError::Invalid(errors)
        })?;

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.post.id,
                author_id: author.id,
                text,
            })
            .await?;
        Ok(comment)
    }

    async fn find(&self, id: i64) -> Result<PostWithRelations, PostError> {
        self.posts
            .find_post(id)
            .await?
            .ok_or_else(|| DomainError::not_found("post").into())
    }

    async fn listing(
        &self,
        scope: PostScope,
        page: PageParam,
    ) -> Result<PageWindow<PostWithRelations>, PostError> {
        let total = self.posts.count_posts(scope).await?;
        let posts = self.posts.clone();
        let window = self
            .paginator
            .paginate_with(total, page, move |offset, limit| async move {
                posts.list_posts(scope, offset, limit).await
            })
            .await?;
        Ok(window)
    }

    async fn validate(&self, submission: PostSubmission) -> Result<ValidPost, PostError> {
        let mut errors = FormErrors::new();
        let text = errors.check("text", required_text(&submission.text));

        let mut group_id = errors
            .check("group", optional_choice(submission.group.as_deref()))
            .flatten();
        if let Some(id) = group_id
            && self.groups.find_group_by_id(id).await?.is_none()
        {
            errors.push("group", FieldError::InvalidChoice);
            group_id = None;
        }

        let image = submission.image.filter(|upload| {
            !(upload.filename.is_empty() && upload.bytes.is_empty())
        });
        if let Some(upload) = &image {
            errors.check("image", image_field(upload));
        }

        match text {
            Some(text) if errors.is_empty() => Ok(ValidPost {
                text,
                group_id,
                image,
            }),
            _ => Err(PostError::Invalid(errors)),
        }
    }

    async fn discard_image(&self, stored_path: &str) {
        if let Err(err) = self.images.remove_image(stored_path).await {
            warn!(
                target = "yatube::application::posts",
                stored_path,
                error = %err,
                "failed to remove replaced image"
            );
        }
    }
}

fn ensure_author(post: &PostRecord, editor: &UserRecord) -> Result<(), DomainError> {
    if post.author_id == editor.id {
        Ok(())
    } else {
        Err(DomainError::not_author("post", post.id))
    }
}
