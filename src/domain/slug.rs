//! Group slug rules.
//!
//! A slug is the URL-safe identifier of a group (`/group/<slug>/`). Slugs
//! supplied by a person are validated as-is; omitted slugs are derived from the
//! group title via the `slug` crate, which transliterates non-Latin scripts
//! into ASCII before slugifying. Uniqueness is checked
//! through a caller-supplied predicate so the derivation stays pure.

use std::future::Future;

use slug::slugify;
use thiserror::Error;

/// Upper bound on slug length, shared with the `groups.slug` column.
pub const MAX_SLUG_LEN: usize = 200;

const MAX_SUFFIX_ATTEMPTS: usize = 32;

/// Errors that can occur while validating or generating a slug.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("slug `{slug}` may only contain latin letters, digits, hyphens and underscores")]
    InvalidCharacters { slug: String },
    #[error("slug exceeds {MAX_SLUG_LEN} characters")]
    TooLong,
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

/// Errors that can occur while generating a slug via an async uniqueness check.
#[derive(Debug, Error)]
pub enum SlugAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

/// Check a user-supplied slug against the allowed charset (`[-a-zA-Z0-9_]+`).
pub fn validate_slug(candidate: &str) -> Result<(), SlugError> {
    if candidate.is_empty() {
        return Err(SlugError::EmptyInput);
    }
    if candidate.chars().count() > MAX_SLUG_LEN {
        return Err(SlugError::TooLong);
    }
    let valid = candidate
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    if !valid {
        return Err(SlugError::InvalidCharacters {
            slug: candidate.to_string(),
        });
    }
    Ok(())
}

/// Derive a base slug from the provided human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let mut candidate = slugify(input);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    // Leave room for a `-NN` suffix.
    let limit = MAX_SLUG_LEN - 4;
    if candidate.len() > limit {
        candidate.truncate(limit);
        while candidate.ends_with('-') {
            candidate.pop();
        }
    }

    Ok(candidate)
}

/// Produce a slug that does not collide according to the supplied predicate.
///
/// `is_unique` must resolve to `true` when the slug is free. Collisions are
/// retried with a monotonic suffix (`-2`, `-3`, …).
pub async fn generate_unique_slug_async<F, Fut, E>(
    input: &str,
    mut is_unique: F,
) -> Result<String, SlugAsyncError<E>>
where
    F: FnMut(&str) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = derive_slug(input)?;

    if is_unique(&base).await.map_err(SlugAsyncError::Predicate)? {
        return Ok(base);
    }

    for attempt in 2..=MAX_SUFFIX_ATTEMPTS + 1 {
        let candidate = format!("{base}-{attempt}");
        if is_unique(&candidate)
            .await
            .map_err(SlugAsyncError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(SlugAsyncError::Slug(SlugError::Exhausted { base }))
}
