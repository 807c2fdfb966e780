//! Where sessions and the per-user index live in the tree.
//!
//! ```text
//! {root}/sessions/{sessionId}          -> session record
//! {root}/table/{userId}/{sessionId}    -> mirrored TTL
//! ```

use frsh_store::{StoreError, TreePath};

use crate::error::{Error, Result};

const SESSIONS: &str = "sessions";
const TABLE: &str = "table";

/// Record field holding the owning user.
pub const USER_FIELD: &str = "userId";

/// Record field holding the expiry timestamp.
pub const TTL_FIELD: &str = "TTL";

/// Path layout under a configurable root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLayout {
    sessions: TreePath,
    table: TreePath,
}

impl SessionLayout {
    pub fn new(root: &TreePath) -> Result<Self> {
        Ok(Self {
            sessions: root.child(SESSIONS).map_err(invalid)?,
            table: root.child(TABLE).map_err(invalid)?,
        })
    }

    /// Parent of every session record.
    pub fn sessions(&self) -> &TreePath {
        &self.sessions
    }

    /// Parent of every user's index subtree.
    pub fn table(&self) -> &TreePath {
        &self.table
    }

    pub fn session(&self, session_id: &str) -> Result<TreePath> {
        self.sessions.child(session_id).map_err(invalid)
    }

    pub fn session_ttl(&self, session_id: &str) -> Result<TreePath> {
        self.session(session_id)?.child(TTL_FIELD).map_err(invalid)
    }

    pub fn user_table(&self, user_id: &str) -> Result<TreePath> {
        self.table.child(user_id).map_err(invalid)
    }

    pub fn index_entry(&self, user_id: &str, session_id: &str) -> Result<TreePath> {
        self.user_table(user_id)?.child(session_id).map_err(invalid)
    }
}

fn invalid(err: StoreError) -> Error {
    Error::InvalidArgument(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_under_root() {
        let layout = SessionLayout::new(&TreePath::parse("frsh").unwrap()).unwrap();

        assert_eq!(layout.session("s1").unwrap().to_string(), "/frsh/sessions/s1");
        assert_eq!(
            layout.session_ttl("s1").unwrap().to_string(),
            "/frsh/sessions/s1/TTL"
        );
        assert_eq!(
            layout.index_entry("u1", "s1").unwrap().to_string(),
            "/frsh/table/u1/s1"
        );
    }

    #[test]
    fn test_nested_root() {
        let layout = SessionLayout::new(&TreePath::parse("apps/web").unwrap()).unwrap();
        assert_eq!(layout.table().to_string(), "/apps/web/table");
    }

    #[test]
    fn test_root_layout_has_top_level_spaces() {
        let layout = SessionLayout::new(&TreePath::root()).unwrap();
        assert_eq!(layout.sessions().to_string(), "/sessions");
        assert_eq!(layout.table().to_string(), "/table");
        assert_ne!(layout.sessions(), layout.table());
    }

    #[test]
    fn test_invalid_ids_rejected() {
        let layout = SessionLayout::new(&TreePath::root()).unwrap();
        assert!(matches!(
            layout.user_table("a.b"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            layout.session(""),
            Err(Error::InvalidArgument(_))
        ));
    }
}
