//! Authentication service.
//!
//! Registers accounts in the catalog store and exchanges username/password
//! pairs for signed bearer tokens.

mod error;
pub mod password;
pub mod token;

pub use error::AuthError;
pub use token::{ADMIN_ROLE, Claims, TokenError, TokenSigner};

use stockroom_core::{User, UserId, Username};
use tracing::{info, instrument};

use crate::services::seed::SeedSource;
use crate::store::{CatalogStore, StoreError};

/// Authentication service.
///
/// Borrows the store as its user directory and the signer for issuing
/// tokens. Cheap to construct per request.
pub struct AuthService<'a, S> {
    store: &'a CatalogStore<S>,
    tokens: &'a TokenSigner,
    admins: &'a [Username],
}

impl<'a, S: SeedSource> AuthService<'a, S> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(
        store: &'a CatalogStore<S>,
        tokens: &'a TokenSigner,
        admins: &'a [Username],
    ) -> Self {
        Self {
            store,
            tokens,
            admins,
        }
    }

    /// Register a new account and issue a token for it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingField` or `AuthError::InvalidUsername` for
    /// bad input, `AuthError::UserAlreadyExists` if the username is taken.
    #[instrument(skip(self, name, password))]
    pub async fn register(
        &self,
        name: &str,
        username: &str,
        password: &str,
    ) -> Result<String, AuthError> {
        let username = Username::parse(username)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::MissingField("name"));
        }
        let password = password.trim();
        if password.is_empty() {
            return Err(AuthError::MissingField("password"));
        }

        let user = User {
            id: UserId::UNASSIGNED,
            username,
            password: password.to_owned(),
            name: name.to_owned(),
        };
        let user = self.store.save_user(user, true).await.map_err(|e| match e {
            StoreError::DuplicateUser(_) => AuthError::UserAlreadyExists,
            other => AuthError::Store(other),
        })?;

        info!(id = %user.id, "User registered");
        self.issue(&user.username)
    }

    /// Check a username/password pair and issue a token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown user or a wrong
    /// password alike.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let username = Username::parse(username).map_err(|_| AuthError::InvalidCredentials)?;

        let user = self
            .store
            .find_user_by_username(&username)
            .await
            .ok_or(AuthError::InvalidCredentials)?;

        if !password::verify_password(password.trim(), &user.password) {
            return Err(AuthError::InvalidCredentials);
        }

        self.issue(&user.username)
    }

    /// Sign a token, adding the admin role for configured operators.
    fn issue(&self, username: &Username) -> Result<String, AuthError> {
        let role = self.admins.contains(username).then_some(ADMIN_ROLE);
        Ok(self.tokens.sign(username.as_str(), role)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;
    use secrecy::SecretString;
    use stockroom_core::Snapshot;

    use super::*;
    use crate::services::seed::HttpSeedSource;
    use crate::store::{SnapshotFile, StoreOptions};

    struct Fixture {
        _dir: tempfile::TempDir,
        store: CatalogStore,
        signer: TokenSigner,
        admins: Vec<Username>,
    }

    impl Fixture {
        fn service(&self) -> AuthService<'_, HttpSeedSource> {
            AuthService::new(&self.store, &self.signer, &self.admins)
        }
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("catalog.json"));
        file.write(&Snapshot {
            has_started: true,
            ..Snapshot::default()
        })
        .unwrap();
        let source =
            HttpSeedSource::new("http://127.0.0.1:9/", std::time::Duration::from_millis(100))
                .unwrap();
        let store = CatalogStore::open(file, source, StoreOptions::default()).unwrap();
        let signer = TokenSigner::new(
            SecretString::from("k3y-for-tests-9f8a7b6c5d4e3f2a1b0c"),
            TimeDelta::hours(1),
        );

        Fixture {
            _dir: dir,
            store,
            signer,
            admins: vec![Username::parse("root").unwrap()],
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let fx = fixture();
        let auth = fx.service();

        let token = auth.register("Alice", "alice", "secret123").await.unwrap();
        assert_eq!(fx.signer.verify(&token).unwrap().username, "alice");

        let wrong = auth.authenticate("alice", "secret124").await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

        let token = auth.authenticate("alice", "secret123").await.unwrap();
        let claims = fx.signer.verify(&token).unwrap();
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, None);
    }

    #[tokio::test]
    async fn test_unknown_user_same_error_as_wrong_password() {
        let fx = fixture();
        let result = fx.service().authenticate("nobody", "secret123").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let fx = fixture();
        let auth = fx.service();
        auth.register("Alice", "alice", "secret123").await.unwrap();

        let again = auth.register("Alice Two", " alice ", "other").await;
        assert!(matches!(again, Err(AuthError::UserAlreadyExists)));
    }

    #[tokio::test]
    async fn test_register_requires_fields() {
        let fx = fixture();
        let auth = fx.service();

        assert!(matches!(
            auth.register("", "alice", "secret123").await,
            Err(AuthError::MissingField("name"))
        ));
        assert!(matches!(
            auth.register("Alice", "alice", "   ").await,
            Err(AuthError::MissingField("password"))
        ));
        assert!(matches!(
            auth.register("Alice", "", "secret123").await,
            Err(AuthError::InvalidUsername(_))
        ));
    }

    #[tokio::test]
    async fn test_passwords_are_trimmed() {
        let fx = fixture();
        let auth = fx.service();
        auth.register("Alice", "alice", "  secret123 ").await.unwrap();
        assert!(auth.authenticate("alice", "secret123").await.is_ok());
    }

    #[tokio::test]
    async fn test_admin_gets_role() {
        let fx = fixture();
        let auth = fx.service();
        let token = auth.register("Root", "root", "toor-toor").await.unwrap();
        assert!(fx.signer.verify(&token).unwrap().has_role(ADMIN_ROLE));
    }
}
