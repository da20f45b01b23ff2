//! Page cache keys.

use std::fmt;

/// Whose chrome a cached page carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Viewer {
    Anonymous,
    User(i64),
}

impl Viewer {
    pub fn from_user_id(user_id: Option<i64>) -> Self {
        user_id.map_or(Viewer::Anonymous, Viewer::User)
    }
}

/// Identifies one cached page: request path and query, per viewer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub path: String,
    pub query: Option<String>,
    pub viewer: Viewer,
}

impl PageKey {
    pub fn new(path: impl Into<String>, query: Option<&str>, viewer: Viewer) -> Self {
        Self {
            path: path.into(),
            query: query.filter(|value| !value.is_empty()).map(str::to_string),
            viewer,
        }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        match self.viewer {
            Viewer::Anonymous => f.write_str(" [anonymous]"),
            Viewer::User(id) => write!(f, " [user {id}]"),
        }
    }
}
