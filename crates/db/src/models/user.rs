use board_protocol::user::User;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
    sea_query::Condition,
};

use crate::{entities::user, retry::retry_on_sqlite_busy};

/// A user row together with the stored password hash, for login checks only.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct UpsertUser {
    pub email: String,
    pub username: Option<String>,
    pub name: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
}

pub struct UserRepository;

impl UserRepository {
    fn from_model(model: user::Model) -> User {
        User {
            id: model.id,
            email: model.email,
            username: model.username,
            name: model.name,
            avatar_url: model.avatar_url,
            created_at: model.created_at,
        }
    }

    async fn find_model<C: ConnectionTrait>(db: &C, id: i64) -> Result<user::Model, DbErr> {
        user::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<User>, DbErr> {
        let record = user::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_ids<C: ConnectionTrait>(db: &C, ids: Vec<i64>) -> Result<Vec<User>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = user::Entity::find()
            .filter(user::Column::Id.is_in(ids))
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    /// Looks a user up by email (case-insensitive) or username.
    pub async fn find_credentials<C: ConnectionTrait>(
        db: &C,
        login: &str,
    ) -> Result<Option<UserCredentials>, DbErr> {
        let login = login.trim();
        let record = user::Entity::find()
            .filter(
                Condition::any()
                    .add(user::Column::Email.eq(login.to_lowercase()))
                    .add(user::Column::Username.eq(login)),
            )
            .one(db)
            .await?;
        Ok(record.map(|model| UserCredentials {
            password_hash: model.password_hash.clone(),
            user: Self::from_model(model),
        }))
    }

    pub async fn password_hash<C: ConnectionTrait>(db: &C, id: i64) -> Result<String, DbErr> {
        Ok(Self::find_model(db, id).await?.password_hash)
    }

    /// Creates the user or, when the email is taken, overwrites its name,
    /// username and password.
    pub async fn upsert<C: ConnectionTrait>(db: &C, data: &UpsertUser) -> Result<User, DbErr> {
        let email = data.email.trim().to_lowercase();
        let existing = user::Entity::find()
            .filter(user::Column::Email.eq(email.clone()))
            .one(db)
            .await?;
        let now = Utc::now();

        let model = retry_on_sqlite_busy(|| {
            let active = match existing.clone() {
                Some(record) => {
                    let mut active: user::ActiveModel = record.into();
                    active.username = Set(data.username.clone());
                    active.name = Set(data.name.clone());
                    active.password_hash = Set(data.password_hash.clone());
                    active.updated_at = Set(now);
                    active
                }
                None => user::ActiveModel {
                    email: Set(email.clone()),
                    username: Set(data.username.clone()),
                    name: Set(data.name.clone()),
                    password_hash: Set(data.password_hash.clone()),
                    avatar_url: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                },
            };
            let is_new = existing.is_none();
            async move {
                if is_new {
                    active.insert(db).await
                } else {
                    active.update(db).await
                }
            }
        })
        .await?;
        Ok(Self::from_model(model))
    }

    pub async fn update_profile<C: ConnectionTrait>(
        db: &C,
        id: i64,
        data: &UpdateProfile,
    ) -> Result<User, DbErr> {
        let record = Self::find_model(db, id).await?;
        let updated = retry_on_sqlite_busy(|| {
            let mut active: user::ActiveModel = record.clone().into();
            if let Some(name) = data.name.clone() {
                active.name = Set(name);
            }
            if let Some(email) = data.email.clone() {
                active.email = Set(email.to_lowercase());
            }
            if let Some(username) = data.username.clone() {
                active.username = Set(Some(username));
            }
            active.updated_at = Set(Utc::now());
            async move { active.update(db).await }
        })
        .await?;
        Ok(Self::from_model(updated))
    }

    pub async fn set_password_hash<C: ConnectionTrait>(
        db: &C,
        id: i64,
        password_hash: &str,
    ) -> Result<(), DbErr> {
        let record = Self::find_model(db, id).await?;
        retry_on_sqlite_busy(|| {
            let mut active: user::ActiveModel = record.clone().into();
            active.password_hash = Set(password_hash.to_string());
            active.updated_at = Set(Utc::now());
            async move { active.update(db).await }
        })
        .await?;
        Ok(())
    }

    pub async fn set_avatar_url<C: ConnectionTrait>(
        db: &C,
        id: i64,
        avatar_url: Option<String>,
    ) -> Result<User, DbErr> {
        let record = Self::find_model(db, id).await?;
        let updated = retry_on_sqlite_busy(|| {
            let mut active: user::ActiveModel = record.clone().into();
            active.avatar_url = Set(avatar_url.clone());
            active.updated_at = Set(Utc::now());
            async move { active.update(db).await }
        })
        .await?;
        Ok(Self::from_model(updated))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::task::tests::setup_db;

    pub(crate) fn new_user(email: &str, username: Option<&str>) -> UpsertUser {
        UpsertUser {
            email: email.to_string(),
            username: username.map(str::to_string),
            name: "Ana".to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_creates_then_updates() {
        let db = setup_db().await;

        let created = UserRepository::upsert(&db, &new_user("Ana@VibeWeb.dev", Some("ana")))
            .await
            .unwrap();
        assert_eq!(created.email, "ana@vibeweb.dev");

        let mut again = new_user("ana@vibeweb.dev", Some("ana"));
        again.name = "Ana Souza".to_string();
        again.password_hash = "other".to_string();
        let updated = UserRepository::upsert(&db, &again).await.unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Ana Souza");
        assert_eq!(
            UserRepository::password_hash(&db, created.id).await.unwrap(),
            "other"
        );
    }

    #[tokio::test]
    async fn credentials_by_email_or_username() {
        let db = setup_db().await;
        let user = UserRepository::upsert(&db, &new_user("ana@vibeweb.dev", Some("ana")))
            .await
            .unwrap();

        let by_email = UserRepository::find_credentials(&db, " ANA@vibeweb.dev ")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.user.id, user.id);
        assert_eq!(by_email.password_hash, "hash");

        let by_username = UserRepository::find_credentials(&db, "ana").await.unwrap();
        assert!(by_username.is_some());
        assert!(UserRepository::find_credentials(&db, "bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn profile_avatar_and_unique_username() {
        let db = setup_db().await;
        let ana = UserRepository::upsert(&db, &new_user("ana@vibeweb.dev", Some("ana")))
            .await
            .unwrap();
        let bob = UserRepository::upsert(&db, &new_user("bob@vibeweb.dev", None))
            .await
            .unwrap();

        let renamed = UserRepository::update_profile(
            &db,
            bob.id,
            &UpdateProfile {
                name: Some("Bob".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(renamed.name, "Bob");

        let clash = UserRepository::update_profile(
            &db,
            bob.id,
            &UpdateProfile {
                username: Some("ana".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(clash.is_err());

        let with_avatar =
            UserRepository::set_avatar_url(&db, ana.id, Some("https://cdn.example/a.png".into()))
                .await
                .unwrap();
        assert_eq!(
            with_avatar.avatar_url.as_deref(),
            Some("https://cdn.example/a.png")
        );
    }
}
