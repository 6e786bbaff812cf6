/// Account operations outside the session lifecycle
///
/// Registration creates the user record only; it never starts a session.
/// Password changes reuse the same `CredentialVerifier` as login.

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::CredentialVerifier;
use crate::domain::{ChannelProfile, NewUser, UserView, WatchHistoryEntry};
use crate::error::{AppError, DatabaseError, ValidationError};
use crate::media::{LocalFile, MediaUploader, UploadedMedia};
use crate::store::Storage;
use crate::validators::{
    is_valid_email, is_valid_full_name, is_valid_username, require_field, require_secret,
};

/// Everything a registration request carries, files included
#[derive(Debug)]
pub struct Registration<'a> {
    pub full_name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub avatar: Option<LocalFile<'a>>,
    pub cover_image: Option<LocalFile<'a>>,
}

pub struct AccountService {
    store: Arc<dyn Storage>,
    media: Arc<dyn MediaUploader>,
    credentials: CredentialVerifier,
}

fn user_not_found() -> AppError {
    AppError::Database(DatabaseError::NotFound("User does not exist".to_string()))
}

impl AccountService {
    pub fn new(
        store: Arc<dyn Storage>,
        media: Arc<dyn MediaUploader>,
        credentials: CredentialVerifier,
    ) -> Self {
        Self {
            store,
            media,
            credentials,
        }
    }

    /// # Errors
    /// - 400 when a text field is blank or the avatar is missing
    /// - 409 when the username or email is already registered
    pub async fn register(&self, form: Registration<'_>) -> Result<UserView, AppError> {
        let full_name = require_field("fullName", form.full_name)?;
        let email = require_field("email", form.email)?;
        let username = require_field("username", form.username)?;
        let password = require_secret("password", form.password)?;

        let full_name = is_valid_full_name(&full_name)?;
        let email = is_valid_email(&email)?;
        let username = is_valid_username(&username)?;

        if self
            .store
            .find_by_username_or_email(Some(&username), Some(&email))
            .await?
            .is_some()
        {
            return Err(DatabaseError::UniqueConstraintViolation(
                "User with email or username already exists".to_string(),
            )
            .into());
        }

        let avatar_file = form
            .avatar
            .ok_or_else(|| ValidationError::MissingFile("Avatar".to_string()))?;
        let password_hash = self.credentials.hash(&password).await?;

        // Uploads come last so that only the insert can leave them orphaned
        let avatar = self
            .media
            .upload(avatar_file)
            .await?
            .ok_or_else(|| ValidationError::MissingFile("Avatar".to_string()))?;

        let cover_image = match form.cover_image {
            Some(file) => match self.media.upload(file).await {
                Ok(media) => media,
                Err(e) => {
                    self.discard_all(&[&avatar]).await;
                    return Err(e);
                }
            },
            None => None,
        };

        let inserted = self
            .store
            .insert(NewUser {
                username,
                email,
                full_name,
                avatar: avatar.url.clone(),
                cover_image: cover_image.as_ref().map(|media| media.url.clone()),
                password_hash,
            })
            .await;

        let user = match inserted {
            Ok(user) => user,
            Err(e) => {
                let mut uploads = vec![&avatar];
                uploads.extend(cover_image.as_ref());
                self.discard_all(&uploads).await;
                return Err(e);
            }
        };

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user.view())
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<UserView, AppError> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or_else(user_not_found)?;
        Ok(user.view())
    }

    /// Sessions already issued stay valid after a password change
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: Option<&str>,
        new_password: Option<&str>,
    ) -> Result<(), AppError> {
        let old_password = require_secret("oldPassword", old_password)?;
        let new_password = require_secret("newPassword", new_password)?;

        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or_else(user_not_found)?;

        if !self.credentials.verify(&old_password, &user.password_hash).await? {
            return Err(ValidationError::IncorrectPassword.into());
        }

        let password_hash = self.credentials.hash(&new_password).await?;
        self.store.update_password_hash(user.id, &password_hash).await?;

        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    pub async fn update_account(
        &self,
        user_id: Uuid,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<UserView, AppError> {
        let full_name = is_valid_full_name(&require_field("fullName", full_name)?)?;
        let email = is_valid_email(&require_field("email", email)?)?;

        let user = self.store.update_account(user_id, &full_name, &email).await?;
        Ok(user.view())
    }

    pub async fn update_avatar(
        &self,
        user_id: Uuid,
        file: Option<LocalFile<'_>>,
    ) -> Result<UserView, AppError> {
        let media = self.upload_required(file, "Avatar").await?;
        match self.store.update_avatar(user_id, &media.url).await {
            Ok(user) => Ok(user.view()),
            Err(e) => {
                self.discard_all(&[&media]).await;
                Err(e)
            }
        }
    }

    pub async fn update_cover_image(
        &self,
        user_id: Uuid,
        file: Option<LocalFile<'_>>,
    ) -> Result<UserView, AppError> {
        let media = self.upload_required(file, "Cover image").await?;
        match self.store.update_cover_image(user_id, &media.url).await {
            Ok(user) => Ok(user.view()),
            Err(e) => {
                self.discard_all(&[&media]).await;
                Err(e)
            }
        }
    }

    pub async fn channel_profile(
        &self,
        username: &str,
        viewer_id: Uuid,
    ) -> Result<ChannelProfile, AppError> {
        let username = require_field("username", Some(username))?.to_lowercase();

        self.store
            .channel_profile(&username, viewer_id)
            .await?
            .ok_or_else(|| {
                AppError::Database(DatabaseError::NotFound("Channel does not exist".to_string()))
            })
    }

    pub async fn watch_history(&self, user_id: Uuid) -> Result<Vec<WatchHistoryEntry>, AppError> {
        self.store.watch_history(user_id).await
    }

    async fn upload_required(
        &self,
        file: Option<LocalFile<'_>>,
        label: &str,
    ) -> Result<UploadedMedia, AppError> {
        let file = file.ok_or_else(|| ValidationError::MissingFile(label.to_string()))?;
        self.media
            .upload(file)
            .await?
            .ok_or_else(|| ValidationError::MissingFile(label.to_string()).into())
    }

    /// Cleanup after a failed write. The caller's error is what gets reported.
    async fn discard_all(&self, uploads: &[&UploadedMedia]) {
        for media in uploads {
            if let Err(e) = self.media.discard(media).await {
                tracing::warn!(url = %media.url, error = %e, "Failed to discard upload");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, UserRepository};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    const TEST_COST: u32 = 4;

    /// Treats any path whose file name is "empty" as an empty upload
    #[derive(Default)]
    struct FakeUploader {
        discarded: Mutex<Vec<String>>,
        /// Registers "bob" behind the service's back while a file uploads
        racer: Option<Arc<InMemoryStore>>,
    }

    impl FakeUploader {
        fn discarded(&self) -> Vec<String> {
            self.discarded.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MediaUploader for FakeUploader {
        async fn upload(&self, file: LocalFile<'_>) -> Result<Option<UploadedMedia>, AppError> {
            if file.path.ends_with("empty") {
                return Ok(None);
            }
            if let Some(store) = &self.racer {
                let _ = store
                    .insert(NewUser {
                        username: "bob".to_string(),
                        email: "bob@x.com".to_string(),
                        full_name: "Bob".to_string(),
                        avatar: "http://cdn.test/b.png".to_string(),
                        cover_image: None,
                        password_hash: "hash".to_string(),
                    })
                    .await;
            }
            Ok(Some(UploadedMedia {
                url: format!("http://cdn.test/{}", file.original_name.unwrap_or("file")),
            }))
        }

        async fn discard(&self, media: &UploadedMedia) -> Result<(), AppError> {
            self.discarded.lock().unwrap().push(media.url.clone());
            Ok(())
        }
    }

    fn service_with(uploader: Arc<FakeUploader>, store: Arc<InMemoryStore>) -> AccountService {
        AccountService::new(store, uploader, CredentialVerifier::new(TEST_COST))
    }

    fn service() -> (AccountService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let service = service_with(Arc::new(FakeUploader::default()), store.clone());
        (service, store)
    }

    fn avatar() -> LocalFile<'static> {
        LocalFile {
            path: Path::new("/tmp/upload-1"),
            original_name: Some("a.png"),
        }
    }

    fn alice() -> Registration<'static> {
        Registration {
            full_name: Some("Alice"),
            email: Some("alice@x.com"),
            username: Some("alice"),
            password: Some("pw123"),
            avatar: Some(avatar()),
            cover_image: None,
        }
    }

    fn assert_validation(result: Result<impl std::fmt::Debug, AppError>) {
        assert!(
            matches!(result, Err(AppError::Validation(_))),
            "expected validation error, got {:?}",
            result
        );
    }

    #[tokio::test]
    async fn test_register_creates_user_without_session() {
        let (service, store) = service();
        let view = service.register(alice()).await.unwrap();

        assert_eq!(view.username, "alice");
        assert_eq!(view.avatar, "http://cdn.test/a.png");
        assert_eq!(view.cover_image, "");

        let stored = store.find_by_id(view.id).await.unwrap().unwrap();
        assert!(stored.refresh_token.is_none());
        assert_ne!(stored.password_hash, "pw123");
    }

    #[tokio::test]
    async fn test_register_rejects_blank_fields() {
        let (service, _) = service();

        let mut form = alice();
        form.full_name = Some("   ");
        assert_validation(service.register(form).await);

        let mut form = alice();
        form.email = None;
        assert_validation(service.register(form).await);

        let mut form = alice();
        form.username = Some("");
        assert_validation(service.register(form).await);

        let mut form = alice();
        form.password = Some(" ");
        assert_validation(service.register(form).await);
    }

    #[tokio::test]
    async fn test_register_requires_avatar() {
        let (service, _) = service();

        let mut form = alice();
        form.avatar = None;
        assert_validation(service.register(form).await);

        // Uploader returning nothing counts as a missing avatar
        let mut form = alice();
        form.avatar = Some(LocalFile {
            path: Path::new("/tmp/empty"),
            original_name: None,
        });
        assert_validation(service.register(form).await);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_case_insensitively() {
        let (service, _) = service();
        service.register(alice()).await.unwrap();

        let mut form = alice();
        form.username = Some("ALICE");
        form.email = Some("other@x.com");
        let result = service.register(form).await;
        assert!(matches!(
            result,
            Err(AppError::Database(DatabaseError::UniqueConstraintViolation(_)))
        ));

        let mut form = alice();
        form.username = Some("alice2");
        assert!(service.register(form).await.is_err());
    }

    #[tokio::test]
    async fn test_register_conflict_after_upload_discards_files() {
        let store = Arc::new(InMemoryStore::new());
        let uploader = Arc::new(FakeUploader {
            racer: Some(store.clone()),
            ..FakeUploader::default()
        });
        let service = service_with(uploader.clone(), store.clone());

        let mut form = alice();
        form.username = Some("bob");
        form.cover_image = Some(LocalFile {
            path: Path::new("/tmp/upload-2"),
            original_name: Some("c.jpg"),
        });
        let result = service.register(form).await;

        assert!(matches!(
            result,
            Err(AppError::Database(DatabaseError::UniqueConstraintViolation(_)))
        ));
        assert_eq!(
            uploader.discarded(),
            vec!["http://cdn.test/a.png", "http://cdn.test/c.jpg"]
        );
    }

    #[tokio::test]
    async fn test_successful_writes_keep_uploads() {
        let store = Arc::new(InMemoryStore::new());
        let uploader = Arc::new(FakeUploader::default());
        let service = service_with(uploader.clone(), store);

        let view = service.register(alice()).await.unwrap();
        service.update_avatar(view.id, Some(avatar())).await.unwrap();
        assert!(uploader.discarded().is_empty());

        // Unknown user: the fresh upload has nowhere to go
        let missing = service.update_avatar(Uuid::new_v4(), Some(avatar())).await;
        assert!(matches!(
            missing,
            Err(AppError::Database(DatabaseError::NotFound(_)))
        ));
        assert_eq!(uploader.discarded(), vec!["http://cdn.test/a.png"]);
    }

    #[tokio::test]
    async fn test_change_password() {
        let (service, _) = service();
        let view = service.register(alice()).await.unwrap();

        let wrong = service
            .change_password(view.id, Some("nope"), Some("pw456"))
            .await;
        assert!(matches!(
            wrong,
            Err(AppError::Validation(ValidationError::IncorrectPassword))
        ));

        service
            .change_password(view.id, Some("pw123"), Some("pw456"))
            .await
            .unwrap();
        service
            .change_password(view.id, Some("pw456"), Some("pw789"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_account_and_media() {
        let (service, _) = service();
        let view = service.register(alice()).await.unwrap();

        let updated = service
            .update_account(view.id, Some("Alice L."), Some("ALICE@y.com"))
            .await
            .unwrap();
        assert_eq!(updated.full_name, "Alice L.");
        assert_eq!(updated.email, "alice@y.com");

        assert_validation(service.update_account(view.id, Some("Alice"), None).await);

        let cover = LocalFile {
            path: Path::new("/tmp/upload-2"),
            original_name: Some("c.jpg"),
        };
        let updated = service.update_cover_image(view.id, Some(cover)).await.unwrap();
        assert_eq!(updated.cover_image, "http://cdn.test/c.jpg");

        assert_validation(service.update_avatar(view.id, None).await);
    }

    #[tokio::test]
    async fn test_channel_profile_not_found() {
        let (service, _) = service();
        let view = service.register(alice()).await.unwrap();

        let profile = service.channel_profile("Alice", view.id).await.unwrap();
        assert_eq!(profile.username, "alice");

        let missing = service.channel_profile("bob", view.id).await;
        assert!(matches!(
            missing,
            Err(AppError::Database(DatabaseError::NotFound(_)))
        ));
    }
}
