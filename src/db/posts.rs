//! Posts. Independent of the user/account/session tables.
//!
//! `created_at` is filled by the database default. `updated_at` stays NULL
//! until the first update through this module, which stamps it on every
//! write.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::record;
use crate::db::schema::post;
use crate::utils::errors::DatabaseError;

pub const NAME_MAX_LENGTH: usize = 256;

#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Identifiable,
)]
#[diesel(table_name = post)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i32,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Insertable)]
#[diesel(table_name = post)]
pub struct NewPost {
    pub name: Option<String>,
}

impl NewPost {
    pub fn named(name: &str) -> Self {
        NewPost {
            name: Some(name.to_string()),
        }
    }
}

/// Caller-facing edit of a post. `None` leaves a field unchanged;
/// `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PostChanges {
    pub name: Option<Option<String>>,
}

#[derive(AsChangeset)]
#[diesel(table_name = post)]
struct PostChangeset {
    name: Option<Option<String>>,
    updated_at: DateTime<Utc>,
}

impl PostChangeset {
    fn stamped(changes: PostChanges, now: DateTime<Utc>) -> Self {
        PostChangeset {
            name: changes.name,
            updated_at: now,
        }
    }
}

impl Post {
    pub fn create(conn: &mut PgConnection, new_post: NewPost) -> Result<Post, DatabaseError> {
        let created = record(
            "post_create",
            diesel::insert_into(post::table)
                .values(&new_post)
                .returning(Post::as_returning())
                .get_result(conn),
        )?;

        info!(post_id = created.id, "Post created");
        Ok(created)
    }

    pub fn find(conn: &mut PgConnection, post_id: i32) -> Result<Post, DatabaseError> {
        record(
            "post_lookup_id",
            post::table.find(post_id).select(Post::as_select()).first(conn),
        )
    }

    /// Posts with exactly this name, newest first. Served by `name_idx`.
    pub fn find_by_name(
        conn: &mut PgConnection,
        name: &str,
        limit: i64,
    ) -> Result<Vec<Post>, DatabaseError> {
        record(
            "post_lookup_name",
            post::table
                .filter(post::name.eq(name))
                .order((post::created_at.desc(), post::id.desc()))
                .limit(limit)
                .select(Post::as_select())
                .load(conn),
        )
    }

    /// Most recently created posts.
    pub fn latest(conn: &mut PgConnection, limit: i64) -> Result<Vec<Post>, DatabaseError> {
        record(
            "post_latest",
            post::table
                .order((post::created_at.desc(), post::id.desc()))
                .limit(limit)
                .select(Post::as_select())
                .load(conn),
        )
    }

    /// Applies `changes` and stamps `updated_at` with the current time.
    pub fn update(
        conn: &mut PgConnection,
        post_id: i32,
        changes: PostChanges,
    ) -> Result<Post, DatabaseError> {
        let changeset = PostChangeset::stamped(changes, Utc::now());
        record(
            "post_update",
            diesel::update(post::table.find(post_id))
                .set(&changeset)
                .returning(Post::as_returning())
                .get_result(conn),
        )
    }

    pub fn rename(
        conn: &mut PgConnection,
        post_id: i32,
        name: Option<&str>,
    ) -> Result<Post, DatabaseError> {
        Self::update(
            conn,
            post_id,
            PostChanges {
                name: Some(name.map(str::to_string)),
            },
        )
    }

    pub fn delete(conn: &mut PgConnection, post_id: i32) -> Result<usize, DatabaseError> {
        record(
            "post_delete",
            diesel::delete(post::table.find(post_id)).execute(conn),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{connection, unique};
    use chrono::Duration;

    #[test]
    fn test_changeset_always_stamps_updated_at() {
        let now = Utc::now();
        let changeset = PostChangeset::stamped(PostChanges::default(), now);
        assert!(changeset.name.is_none());
        assert_eq!(changeset.updated_at, now);
    }

    #[test]
    fn test_post_serializes_in_camel_case() {
        let post = Post {
            id: 1,
            name: Some("hello".to_string()),
            created_at: Utc::now(),
            updated_at: None,
        };
        let json = serde_json::to_value(&post).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json["updatedAt"].is_null());
    }

    #[test]
    #[ignore] // requires a running PostgreSQL on TEST_DATABASE_URL
    fn test_created_at_defaults_and_updated_at_unset() {
        let mut conn = connection();
        let before = Utc::now() - Duration::seconds(5);
        let created = Post::create(&mut conn, NewPost::named(&unique("post"))).unwrap();

        assert!(created.created_at >= before);
        assert!(created.created_at <= Utc::now() + Duration::seconds(5));
        assert!(created.updated_at.is_none());

        let unnamed = Post::create(&mut conn, NewPost::default()).unwrap();
        assert!(unnamed.name.is_none());
        assert!(unnamed.id > created.id);

        Post::delete(&mut conn, created.id).unwrap();
        Post::delete(&mut conn, unnamed.id).unwrap();
    }

    #[test]
    #[ignore] // requires a running PostgreSQL on TEST_DATABASE_URL
    fn test_update_sets_updated_at() {
        let mut conn = connection();
        let name = unique("draft");
        let created = Post::create(&mut conn, NewPost::named(&name)).unwrap();

        let renamed_to = unique("final");
        let renamed = Post::rename(&mut conn, created.id, Some(&renamed_to)).unwrap();
        assert_eq!(renamed.name.as_deref(), Some(renamed_to.as_str()));
        assert_eq!(renamed.created_at, created.created_at);
        let first_update = renamed.updated_at.expect("updated_at set on update");

        // An update that changes no column still counts as an update.
        let touched = Post::update(&mut conn, created.id, PostChanges::default()).unwrap();
        assert_eq!(touched.name, renamed.name);
        assert!(touched.updated_at.unwrap() >= first_update);

        let cleared = Post::rename(&mut conn, created.id, None).unwrap();
        assert!(cleared.name.is_none());

        assert!(Post::find_by_name(&mut conn, &name, 10).unwrap().is_empty());
        Post::delete(&mut conn, created.id).unwrap();
        assert!(Post::find(&mut conn, created.id).unwrap_err().is_not_found());
    }

    #[test]
    #[ignore] // requires a running PostgreSQL on TEST_DATABASE_URL
    fn test_find_by_name_and_latest() {
        let mut conn = connection();
        let name = unique("shared");
        let a = Post::create(&mut conn, NewPost::named(&name)).unwrap();
        let b = Post::create(&mut conn, NewPost::named(&name)).unwrap();

        let found: Vec<i32> = Post::find_by_name(&mut conn, &name, 10)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(found.len(), 2);
        assert!(found.contains(&a.id) && found.contains(&b.id));

        assert!(!Post::latest(&mut conn, 5).unwrap().is_empty());

        Post::delete(&mut conn, a.id).unwrap();
        Post::delete(&mut conn, b.id).unwrap();
    }

    #[test]
    #[ignore] // requires a running PostgreSQL on TEST_DATABASE_URL
    fn test_name_longer_than_limit_is_rejected() {
        let mut conn = connection();
        let too_long = "n".repeat(NAME_MAX_LENGTH + 1);
        assert!(Post::create(&mut conn, NewPost::named(&too_long)).is_err());
    }
}
