//! User accounts, looked up by email through the secondary index
//!
//! Users carry no key; the `nodes_user_idx` table must index `email`.

use crate::node::{Node, NodeType};
use crate::storage::index::index_table;
use crate::storage::NodeRepository;
use crate::{Error, Result};

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn ensure_email_indexed(repo: &NodeRepository) -> Result<()> {
    let profile = repo.registry().profile(NodeType::User);
    if profile.index_fields.iter().any(|f| f == "email") {
        Ok(())
    } else {
        Err(Error::Config(
            "user lookups need `email` in the [index] user field list".to_string(),
        ))
    }
}

/// Find the user with this email (lowest id on duplicates).
///
/// Stored emails are compared case-insensitively, so users saved without
/// [`register`] are found too.
pub fn find_by_email(repo: &NodeRepository, email: &str) -> Result<Option<Node>> {
    ensure_email_indexed(repo)?;
    let predicate = format!(
        "type = ?1 AND id IN (SELECT id FROM {} WHERE lower(trim(email)) = ?2) ORDER BY id LIMIT 1",
        index_table(NodeType::User)
    );
    let users = repo.find_where(
        &predicate,
        [NodeType::User.as_str().to_string(), normalize_email(email)],
    )?;
    Ok(users.into_iter().next())
}

/// Create an account; fails when the email is taken
pub fn register(repo: &mut NodeRepository, email: &str, display_name: &str) -> Result<Node> {
    if find_by_email(repo, email)?.is_some() {
        return Err(Error::UserExists(normalize_email(email)));
    }
    let user = Node::new(NodeType::User)
        .with("email", normalize_email(email))
        .with("name", display_name);
    repo.save(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    fn repo() -> NodeRepository {
        NodeRepository::open_in_memory(&StoreConfig::default().with_index("user", &["email"])).unwrap()
    }

    #[test]
    fn test_register_and_find() {
        let mut repo = repo();
        let user = register(&mut repo, "Alice@Example.com ", "Alice").unwrap();

        assert_eq!(user.str_attr("email"), Some("alice@example.com"));
        let found = find_by_email(&repo, "alice@example.COM").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(find_by_email(&repo, "bob@example.com").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let mut repo = repo();
        register(&mut repo, "alice@example.com", "Alice").unwrap();
        let err = register(&mut repo, "ALICE@example.com", "Impostor").unwrap_err();
        assert!(matches!(err, Error::UserExists(_)));
    }

    #[test]
    fn test_email_change_follows_index() {
        let mut repo = repo();
        let mut user = register(&mut repo, "old@example.com", "Carol").unwrap();
        user.set("email", "new@example.com").unwrap();
        repo.save(user).unwrap();

        assert!(find_by_email(&repo, "old@example.com").unwrap().is_none());
        assert!(find_by_email(&repo, "new@example.com").unwrap().is_some());
    }

    #[test]
    fn test_finds_user_saved_with_mixed_case_email() {
        let mut repo = repo();
        let user = repo
            .save(Node::new(NodeType::User).with("email", "Dave@Example.com"))
            .unwrap();

        let found = find_by_email(&repo, "dave@example.com").unwrap().unwrap();
        assert_eq!(found.id, user.id);
    }

    #[test]
    fn test_requires_email_index() {
        let repo = NodeRepository::open_in_memory(&StoreConfig::default()).unwrap();
        assert!(matches!(
            find_by_email(&repo, "a@example.com"),
            Err(Error::Config(_))
        ));
    }
}
