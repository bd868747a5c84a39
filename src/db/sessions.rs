//! Login sessions, looked up by their opaque token.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::record;
use crate::db::schema::{session, user};
use crate::db::users::User;
use crate::utils::errors::DatabaseError;

pub const SESSION_TOKEN_UNIQUE: &str = "session_sessionToken_unique";

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Queryable,
    Selectable,
    Identifiable,
    Associations,
)]
#[diesel(table_name = session)]
#[diesel(belongs_to(User))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_token: String,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = session)]
pub struct NewSession {
    pub user_id: Uuid,
    pub session_token: String,
    pub expires: DateTime<Utc>,
}

impl NewSession {
    pub fn new(user_id: Uuid, session_token: &str, expires: DateTime<Utc>) -> Self {
        NewSession {
            user_id,
            session_token: session_token.to_string(),
            expires,
        }
    }
}

impl Session {
    pub fn create(conn: &mut PgConnection, new_session: NewSession) -> Result<Session, DatabaseError> {
        let created = record(
            "session_create",
            diesel::insert_into(session::table)
                .values(&new_session)
                .returning(Session::as_returning())
                .get_result(conn),
        )?;

        info!(session_id = %created.id, user_id = %created.user_id, "Session created");
        Ok(created)
    }

    /// Finds a session by token. Expired sessions are not returned.
    pub fn find_by_token(
        conn: &mut PgConnection,
        token: &str,
    ) -> Result<Option<Session>, DatabaseError> {
        record(
            "session_lookup_token",
            session::table
                .filter(session::session_token.eq(token))
                .filter(session::expires.gt(Utc::now()))
                .select(Session::as_select())
                .first(conn)
                .optional(),
        )
    }

    /// Finds an unexpired session together with its user.
    pub fn find_with_user(
        conn: &mut PgConnection,
        token: &str,
    ) -> Result<Option<(Session, User)>, DatabaseError> {
        record(
            "session_lookup_with_user",
            session::table
                .inner_join(user::table)
                .filter(session::session_token.eq(token))
                .filter(session::expires.gt(Utc::now()))
                .select((Session::as_select(), User::as_select()))
                .first(conn)
                .optional(),
        )
    }

    /// Moves the expiry of a session. Returns `None` when the token is unknown.
    pub fn extend(
        conn: &mut PgConnection,
        token: &str,
        expires: DateTime<Utc>,
    ) -> Result<Option<Session>, DatabaseError> {
        record(
            "session_extend",
            diesel::update(session::table.filter(session::session_token.eq(token)))
                .set(session::expires.eq(expires))
                .returning(Session::as_returning())
                .get_result(conn)
                .optional(),
        )
    }

    pub fn delete_by_token(conn: &mut PgConnection, token: &str) -> Result<usize, DatabaseError> {
        record(
            "session_delete",
            diesel::delete(session::table.filter(session::session_token.eq(token))).execute(conn),
        )
    }

    /// Removes every session that expired at or before `now`.
    pub fn delete_expired(conn: &mut PgConnection, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let removed = record(
            "session_delete_expired",
            diesel::delete(session::table.filter(session::expires.le(now))).execute(conn),
        )?;

        debug!(removed, "Expired sessions removed");
        Ok(removed)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::accounts::{Account, NewAccount};
    use crate::utils::test_utils::{connection, in_one_day, insert_user, unique};
    use chrono::Duration;

    #[test]
    fn test_is_expired_at() {
        let now = Utc::now();
        let s = Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            session_token: "t".to_string(),
            expires: now,
        };
        assert!(s.is_expired_at(now));
        assert!(!s.is_expired_at(now - Duration::seconds(1)));
    }

    #[test]
    #[ignore] // requires a running PostgreSQL on TEST_DATABASE_URL
    fn test_create_and_find_with_user() {
        let mut conn = connection();
        let owner = insert_user(&mut conn);
        let token = unique("sess");
        let created = Session::create(&mut conn, NewSession::new(owner.id, &token, in_one_day())).unwrap();

        let found = Session::find_by_token(&mut conn, &token).unwrap();
        assert_eq!(found.map(|s| s.id), Some(created.id));

        let (s, u) = Session::find_with_user(&mut conn, &token).unwrap().unwrap();
        assert_eq!(s.id, created.id);
        assert_eq!(u.id, owner.id);

        assert_eq!(Session::delete_by_token(&mut conn, &token).unwrap(), 1);
        assert!(Session::find_by_token(&mut conn, &token).unwrap().is_none());

        User::delete(&mut conn, owner.id).unwrap();
    }

    #[test]
    #[ignore] // requires a running PostgreSQL on TEST_DATABASE_URL
    fn test_duplicate_session_token_is_rejected() {
        let mut conn = connection();
        let first = insert_user(&mut conn);
        let second = insert_user(&mut conn);
        let token = unique("dup");

        Session::create(&mut conn, NewSession::new(first.id, &token, in_one_day())).unwrap();
        let err = Session::create(&mut conn, NewSession::new(second.id, &token, in_one_day()))
            .unwrap_err();

        assert!(err.is_unique_violation());
        assert_eq!(err.constraint_name(), Some(SESSION_TOKEN_UNIQUE));

        User::delete(&mut conn, first.id).unwrap();
        User::delete(&mut conn, second.id).unwrap();
    }

    #[test]
    #[ignore] // requires a running PostgreSQL on TEST_DATABASE_URL
    fn test_session_requires_existing_user() {
        let mut conn = connection();
        let err = Session::create(
            &mut conn,
            NewSession::new(Uuid::new_v4(), &unique("orphan"), in_one_day()),
        )
        .unwrap_err();

        assert!(err.is_foreign_key_violation());
        assert_eq!(err.constraint_name(), Some("session_user_fk"));
    }

    #[test]
    #[ignore] // requires a running PostgreSQL on TEST_DATABASE_URL
    fn test_expired_sessions_are_hidden_and_purged() {
        let mut conn = connection();
        let owner = insert_user(&mut conn);
        let token = unique("old");
        let past = Utc::now() - Duration::hours(1);
        Session::create(&mut conn, NewSession::new(owner.id, &token, past)).unwrap();

        assert!(Session::find_by_token(&mut conn, &token).unwrap().is_none());
        assert!(Session::find_with_user(&mut conn, &token).unwrap().is_none());

        let extended = Session::extend(&mut conn, &token, in_one_day()).unwrap();
        assert!(extended.is_some());
        assert!(Session::find_by_token(&mut conn, &token).unwrap().is_some());

        Session::extend(&mut conn, &token, past).unwrap();
        assert!(Session::delete_expired(&mut conn, Utc::now()).unwrap() >= 1);
        assert!(Session::extend(&mut conn, &token, in_one_day()).unwrap().is_none());

        User::delete(&mut conn, owner.id).unwrap();
    }

    #[test]
    #[ignore] // requires a running PostgreSQL on TEST_DATABASE_URL
    fn test_deleting_user_cascades_to_accounts_and_sessions() {
        let mut conn = connection();
        let owner = insert_user(&mut conn);
        let bystander = insert_user(&mut conn);
        let token = unique("cascade");
        let other_token = unique("keep");
        let provider_id = unique("cascade");

        Session::create(&mut conn, NewSession::new(owner.id, &token, in_one_day())).unwrap();
        Session::create(&mut conn, NewSession::new(bystander.id, &other_token, in_one_day())).unwrap();
        Account::link(&mut conn, NewAccount::new(owner.id, "github", &provider_id)).unwrap();

        assert_eq!(User::delete(&mut conn, owner.id).unwrap(), 1);

        assert!(Session::find_by_token(&mut conn, &token).unwrap().is_none());
        assert!(Account::find_by_provider(&mut conn, "github", &provider_id)
            .unwrap()
            .is_none());
        let remaining: i64 = session::table
            .filter(session::user_id.eq(owner.id))
            .count()
            .get_result(&mut conn)
            .unwrap();
        assert_eq!(remaining, 0);

        // Other users' rows are untouched.
        assert!(Session::find_by_token(&mut conn, &other_token).unwrap().is_some());

        User::delete(&mut conn, bystander.id).unwrap();
    }
}
