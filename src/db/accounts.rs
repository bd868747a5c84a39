//! Provider accounts linked to a user.
//!
//! A `(provider, provider_account_id)` pair can be linked at most once,
//! enforced by `account_provider_providerAccountId_unique`.

use diesel::prelude::*;
use diesel::PgConnection;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::db::record;
use crate::db::schema::account;
use crate::db::users::User;
use crate::log_warn;
use crate::utils::errors::DatabaseError;

pub const PROVIDER_ACCOUNT_UNIQUE: &str = "account_provider_providerAccountId_unique";

// =============================================================================
// DATA MODELS
// =============================================================================

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
#[diesel(table_name = account)]
#[diesel(belongs_to(User))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub provider_account_id: String,
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    pub expires_at: Option<i32>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub id_token: Option<String>,
    pub session_state: Option<String>,
}

/// Account link for insertion.
#[derive(Debug, Clone, Default, Insertable)]
#[diesel(table_name = account)]
pub struct NewAccount {
    pub user_id: Uuid,
    pub provider: String,
    pub provider_account_id: String,
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    pub expires_at: Option<i32>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub id_token: Option<String>,
    pub session_state: Option<String>,
}

impl NewAccount {
    pub fn new(user_id: Uuid, provider: &str, provider_account_id: &str) -> Self {
        NewAccount {
            user_id,
            provider: provider.to_string(),
            provider_account_id: provider_account_id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_tokens(mut self, tokens: AccountTokens) -> Self {
        self.refresh_token = tokens.refresh_token;
        self.access_token = tokens.access_token;
        self.expires_at = tokens.expires_at;
        self.token_type = tokens.token_type;
        self.scope = tokens.scope;
        self.id_token = tokens.id_token;
        self.session_state = tokens.session_state;
        self
    }
}

/// OAuth token fields, written together when a provider refreshes them.
/// `None` clears the column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, AsChangeset)]
#[diesel(table_name = account)]
#[diesel(treat_none_as_null = true)]
pub struct AccountTokens {
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    pub expires_at: Option<i32>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub id_token: Option<String>,
    pub session_state: Option<String>,
}

// =============================================================================
// IMPLEMENTATION
// =============================================================================

impl Account {
    /// Links a provider account to an existing user.
    ///
    /// Fails with `DatabaseError::UniqueViolation` when the provider account is
    /// already linked, and `DatabaseError::ForeignKeyViolation` when the user
    /// does not exist.
    pub fn link(conn: &mut PgConnection, new_account: NewAccount) -> Result<Account, DatabaseError> {
        let linked = record(
            "account_link",
            diesel::insert_into(account::table)
                .values(&new_account)
                .returning(Account::as_returning())
                .get_result(conn),
        )
        .map_err(|e| {
            if e.is_unique_violation() {
                log_warn!(
                    "account_link",
                    &format!("Provider account on {} is already linked", new_account.provider),
                    "unique_violation"
                );
            }
            e
        })?;

        info!(
            account_id = %linked.id,
            user_id = %linked.user_id,
            provider = %linked.provider,
            "Account linked"
        );
        Ok(linked)
    }

    pub fn find_by_provider(
        conn: &mut PgConnection,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<Account>, DatabaseError> {
        record(
            "account_lookup_provider",
            account::table
                .filter(account::provider.eq(provider))
                .filter(account::provider_account_id.eq(provider_account_id))
                .select(Account::as_select())
                .first(conn)
                .optional(),
        )
    }

    /// All accounts linked to `user`, ordered by provider.
    pub fn list_for_user(conn: &mut PgConnection, user: &User) -> Result<Vec<Account>, DatabaseError> {
        record(
            "account_list_user",
            Account::belonging_to(user)
                .order((account::provider.asc(), account::provider_account_id.asc()))
                .select(Account::as_select())
                .load(conn),
        )
    }

    /// Replaces the token fields of an account.
    pub fn update_tokens(
        conn: &mut PgConnection,
        account_id: Uuid,
        tokens: &AccountTokens,
    ) -> Result<Account, DatabaseError> {
        record(
            "account_update_tokens",
            diesel::update(account::table.find(account_id))
                .set(tokens)
                .returning(Account::as_returning())
                .get_result(conn),
        )
    }

    /// Removes a provider link. Returns the number of rows removed.
    pub fn unlink(
        conn: &mut PgConnection,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<usize, DatabaseError> {
        record(
            "account_unlink",
            diesel::delete(
                account::table
                    .filter(account::provider.eq(provider))
                    .filter(account::provider_account_id.eq(provider_account_id)),
            )
            .execute(conn),
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
