//! Users: the owners of linked accounts and sessions.
//!
//! Deleting a user removes its accounts and sessions through the
//! `ON DELETE CASCADE` foreign keys.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::db::record;
use crate::db::schema::user;
use crate::utils::errors::DatabaseError;

// =============================================================================
// DATA MODELS
// =============================================================================

/// User row.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Identifiable,
)]
#[diesel(table_name = user)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(rename = "emailVerified")]
    pub email_verified: Option<DateTime<Utc>>,
}

/// New user for insertion. The id is generated by the database.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub email_verified: Option<DateTime<Utc>>,
}

impl NewUser {
    pub fn new(name: &str, email: &str) -> Self {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            email_verified: None,
        }
    }

    pub fn verified_at(mut self, at: DateTime<Utc>) -> Self {
        self.email_verified = Some(at);
        self
    }
}

// =============================================================================
// IMPLEMENTATION
// =============================================================================

impl User {
    /// Inserts a user and returns the stored row.
    pub fn create(conn: &mut PgConnection, new_user: NewUser) -> Result<User, DatabaseError> {
        let created = record(
            "user_create",
            diesel::insert_into(user::table)
                .values(&new_user)
                .returning(User::as_returning())
                .get_result(conn),
        )?;

        info!(user_id = %created.id, "User created");
        Ok(created)
    }

    pub fn find(conn: &mut PgConnection, user_id: Uuid) -> Result<User, DatabaseError> {
        record(
            "user_lookup_id",
            user::table.find(user_id).select(User::as_select()).first(conn),
        )
    }

    /// Finds a user by email. Emails are not unique, so the oldest id wins.
    pub fn find_by_email(
        conn: &mut PgConnection,
        email: &str,
    ) -> Result<Option<User>, DatabaseError> {
        record(
            "user_lookup_email",
            user::table
                .filter(user::email.eq(email))
                .order(user::id.asc())
                .select(User::as_select())
                .first(conn)
                .optional(),
        )
    }

    /// Stamps `emailVerified`.
    pub fn mark_email_verified(
        conn: &mut PgConnection,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<User, DatabaseError> {
        record(
            "user_verify_email",
            diesel::update(user::table.find(user_id))
                .set(user::email_verified.eq(Some(at)))
                .returning(User::as_returning())
                .get_result(conn),
        )
    }

    /// Deletes a user together with its accounts and sessions.
    /// Returns the number of user rows removed.
    pub fn delete(conn: &mut PgConnection, user_id: Uuid) -> Result<usize, DatabaseError> {
        let removed = record(
            "user_delete",
            diesel::delete(user::table.find(user_id)).execute(conn),
        )?;

        if removed > 0 {
            info!(user_id = %user_id, "User deleted");
        }
        Ok(removed)
    }

    pub fn is_email_verified(&self) -> bool {
        self.email_verified.is_some()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{connection, insert_user, unique};

    #[test]
    fn test_new_user_defaults() {
        let new_user = NewUser::new("Ada", "ada@example.com");
        assert_eq!(new_user.name, "Ada");
        assert_eq!(new_user.email, "ada@example.com");
        assert!(new_user.email_verified.is_none());

        let now = Utc::now();
        assert_eq!(new_user.verified_at(now).email_verified, Some(now));
    }

    #[test]
    fn test_user_serializes_email_verified_in_camel_case() {
        let user = User {
            id: Uuid::nil(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            email_verified: None,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("emailVerified").is_some());
        assert!(json.get("email_verified").is_none());
        assert!(!user.is_email_verified());
    }

    #[test]
    #[ignore] // requires a running PostgreSQL on TEST_DATABASE_URL
    fn test_create_assigns_random_uuid() {
        let mut conn = connection();
        let a = insert_user(&mut conn);
        let b = insert_user(&mut conn);

        assert_ne!(a.id, b.id);
        assert!(a.email_verified.is_none());
        assert_eq!(User::find(&mut conn, a.id).unwrap(), a);

        User::delete(&mut conn, a.id).unwrap();
        User::delete(&mut conn, b.id).unwrap();
    }

    #[test]
    #[ignore] // requires a running PostgreSQL on TEST_DATABASE_URL
    fn test_find_by_email_and_verify() {
        let mut conn = connection();
        let email = format!("{}@example.com", unique("verify"));
        let created = User::create(&mut conn, NewUser::new("Grace", &email)).unwrap();

        let found = User::find_by_email(&mut conn, &email).unwrap();
        assert_eq!(found.as_ref().map(|u| u.id), Some(created.id));

        let verified = User::mark_email_verified(&mut conn, created.id, Utc::now()).unwrap();
        assert!(verified.is_email_verified());

        assert_eq!(User::delete(&mut conn, created.id).unwrap(), 1);
        assert!(User::find(&mut conn, created.id).unwrap_err().is_not_found());
        assert!(User::find_by_email(&mut conn, &email).unwrap().is_none());
    }
}
