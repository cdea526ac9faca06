//! User repository
//!
//! Registration, profile edits and doctor lookup over the `users` document,
//! plus the single current-user snapshot used for offline profile restore.

use crate::config::{CURRENT_USER_KEY, USERS_KEY};
use crate::error::{AppError, Result};
use crate::models::{validate_email, NewUser, ProfileUpdate, User, UserRole};
use crate::storage::KvStore;
use uuid::Uuid;

/// Repository for the users collection
#[derive(Clone)]
pub struct UserRepository {
    store: KvStore,
}

impl UserRepository {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    async fn load(&self) -> Result<Vec<User>> {
        Ok(self
            .store
            .get_json::<Vec<User>>(USERS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, users: &[User]) -> Result<()> {
        self.store.set_json(USERS_KEY, &users).await
    }

    /// Register a new user
    pub async fn register(&self, new_user: NewUser) -> Result<User> {
        new_user.validate()?;

        let mut users = self.load().await?;
        if users.iter().any(|u| u.email == new_user.email) {
            return Err(AppError::Validation(format!(
                "email '{}' is already registered",
                new_user.email
            )));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: new_user.name,
            email: new_user.email,
            role: new_user.role,
            specialty: new_user.specialty,
            image: new_user.image,
        };

        users.push(user.clone());
        self.save(&users).await?;

        tracing::info!("Registered {} user: {}", user.role, user.id);
        Ok(user)
    }

    /// Get a user by id
    pub async fn get(&self, id: &str) -> Result<User> {
        let users = self.load().await?;
        users
            .into_iter()
            .find(|u| u.id == id)
            .ok_or_else(|| AppError::UserNotFound(id.to_string()))
    }

    /// List every registered user
    pub async fn list(&self) -> Result<Vec<User>> {
        self.load().await
    }

    /// List doctors, optionally restricted to one specialty
    pub async fn list_doctors(&self, specialty: Option<&str>) -> Result<Vec<User>> {
        let users = self.load().await?;
        Ok(users
            .into_iter()
            .filter(|u| u.role == UserRole::Doctor)
            .filter(|u| match specialty {
                Some(s) => u.specialty.as_deref() == Some(s),
                None => true,
            })
            .collect())
    }

    /// Apply a profile edit; only the fields present in `update` change
    pub async fn update_profile(&self, id: &str, update: ProfileUpdate) -> Result<User> {
        let mut users = self.load().await?;

        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| AppError::UserNotFound(id.to_string()))?;

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("name must not be empty".into()));
            }
            user.name = name;
        }
        if let Some(email) = update.email {
            validate_email(&email)?;
            user.email = email;
        }
        if let Some(specialty) = update.specialty {
            user.specialty = Some(specialty);
        }
        if let Some(image) = update.image {
            user.image = image;
        }

        let updated = user.clone();
        self.save(&users).await?;

        tracing::debug!("Updated profile for user: {}", id);

        // Keep the offline snapshot in sync when it belongs to this user
        if let Some(current) = self.current().await? {
            if current.id == id {
                self.set_current(&updated).await?;
            }
        }

        Ok(updated)
    }

    /// Remove a user from the collection (admin action).
    ///
    /// Also drops the offline snapshot when it belongs to the removed user,
    /// so a deleted account cannot be restored from cache.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut users = self.load().await?;
        let before = users.len();

        users.retain(|u| u.id != id);
        if users.len() == before {
            return Err(AppError::UserNotFound(id.to_string()));
        }

        self.save(&users).await?;
        tracing::info!("Deleted user: {}", id);

        if let Some(current) = self.current().await? {
            if current.id == id {
                self.clear_current().await?;
            }
        }

        Ok(())
    }

    /// Persist the signed-in user snapshot under the `user` key
    pub async fn set_current(&self, user: &User) -> Result<()> {
        self.store.set_json(CURRENT_USER_KEY, user).await
    }

    /// Read back the signed-in user snapshot, if any
    pub async fn current(&self) -> Result<Option<User>> {
        self.store.get_json(CURRENT_USER_KEY).await
    }

    /// Drop the signed-in user snapshot
    pub async fn clear_current(&self) -> Result<()> {
        self.store.remove(CURRENT_USER_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::initialize_storage;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_repo() -> UserRepository {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_storage(&pool).await.unwrap();

        UserRepository::new(KvStore::new(pool))
    }

    fn doctor(name: &str, email: &str, specialty: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            role: UserRole::Doctor,
            specialty: Some(specialty.to_string()),
            image: String::new(),
        }
    }

    fn patient(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            role: UserRole::Patient,
            specialty: None,
            image: String::new(),
        }
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let repo = create_test_repo().await;

        let user = repo.register(patient("Ana", "ana@example.com")).await.unwrap();

        let fetched = repo.get(&user.id).await.unwrap();
        assert_eq!(fetched.email, "ana@example.com");
        assert_eq!(fetched.role, UserRole::Patient);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = create_test_repo().await;

        repo.register(patient("Ana", "ana@example.com")).await.unwrap();
        let result = repo.register(patient("Other", "ana@example.com")).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_doctors_by_specialty() {
        let repo = create_test_repo().await;

        repo.register(doctor("Dr. João", "joao@clinic.com", "Cardiologia"))
            .await
            .unwrap();
        repo.register(doctor("Dr. Maria", "maria@clinic.com", "Dermatologia"))
            .await
            .unwrap();
        repo.register(patient("Ana", "ana@example.com")).await.unwrap();

        let all_doctors = repo.list_doctors(None).await.unwrap();
        assert_eq!(all_doctors.len(), 2);

        let cardio = repo.list_doctors(Some("Cardiologia")).await.unwrap();
        assert_eq!(cardio.len(), 1);
        assert_eq!(cardio[0].name, "Dr. João");
    }

    #[tokio::test]
    async fn test_update_profile_partial() {
        let repo = create_test_repo().await;

        let user = repo.register(patient("Ana", "ana@example.com")).await.unwrap();

        let updated = repo
            .update_profile(
                &user.id,
                ProfileUpdate {
                    name: Some("Ana Souza".to_string()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Ana Souza");
        assert_eq!(updated.email, "ana@example.com");
    }

    #[tokio::test]
    async fn test_update_profile_unknown_user() {
        let repo = create_test_repo().await;

        let result = repo
            .update_profile("missing", ProfileUpdate::default())
            .await;

        assert!(matches!(result, Err(AppError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_user_from_collection() {
        let repo = create_test_repo().await;

        let ana = repo.register(patient("Ana", "ana@example.com")).await.unwrap();
        let bia = repo.register(patient("Bia", "bia@example.com")).await.unwrap();

        repo.delete(&ana.id).await.unwrap();

        assert!(matches!(repo.get(&ana.id).await, Err(AppError::UserNotFound(_))));
        let remaining = repo.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, bia.id);
    }

    #[tokio::test]
    async fn test_delete_missing_user_is_not_found() {
        let repo = create_test_repo().await;

        let result = repo.delete("missing").await;
        assert!(matches!(result, Err(AppError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_clears_matching_snapshot() {
        let repo = create_test_repo().await;

        let ana = repo.register(patient("Ana", "ana@example.com")).await.unwrap();
        let bia = repo.register(patient("Bia", "bia@example.com")).await.unwrap();

        repo.set_current(&ana).await.unwrap();
        repo.delete(&ana.id).await.unwrap();
        assert!(repo.current().await.unwrap().is_none());

        // Someone else's snapshot survives a delete
        repo.set_current(&bia).await.unwrap();
        let third = repo.register(patient("Clara", "clara@example.com")).await.unwrap();
        repo.delete(&third.id).await.unwrap();
        assert_eq!(repo.current().await.unwrap().unwrap().id, bia.id);
    }

    #[tokio::test]
    async fn test_update_profile_rejects_malformed_email() {
        let repo = create_test_repo().await;

        let user = repo.register(patient("Ana", "ana@example.com")).await.unwrap();

        let result = repo
            .update_profile(
                &user.id,
                ProfileUpdate {
                    email: Some("still@nodomain".to_string()),
                    ..ProfileUpdate::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));

        // Stored email untouched
        let stored = repo.get(&user.id).await.unwrap();
        assert_eq!(stored.email, "ana@example.com");
    }

    #[tokio::test]
    async fn test_current_user_snapshot() {
        let repo = create_test_repo().await;

        assert!(repo.current().await.unwrap().is_none());

        let user = repo.register(patient("Ana", "ana@example.com")).await.unwrap();
        repo.set_current(&user).await.unwrap();

        let current = repo.current().await.unwrap().unwrap();
        assert_eq!(current.id, user.id);

        repo.clear_current().await.unwrap();
        assert!(repo.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_profile_update_refreshes_snapshot() {
        let repo = create_test_repo().await;

        let user = repo.register(patient("Ana", "ana@example.com")).await.unwrap();
        repo.set_current(&user).await.unwrap();

        repo.update_profile(
            &user.id,
            ProfileUpdate {
                image: Some("https://example.com/ana.png".to_string()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .unwrap();

        let current = repo.current().await.unwrap().unwrap();
        assert_eq!(current.image, "https://example.com/ana.png");
    }
}
