//! Static description of every table the application owns.
//!
//! `db::schema` tells diesel how to build queries and `migrations/` tells
//! PostgreSQL how to store rows. This catalog is the third view: plain
//! metadata naming each column's type, nullability and default, plus the
//! primary key, indexes and foreign keys of each table. It is validated at
//! startup so a malformed declaration stops the process before any
//! connection is used, and it can be dumped as JSON for tooling.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::utils::errors::SchemaError;

// =============================================================================
// DEFINITION TYPES
// =============================================================================

/// Column storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ColumnType {
    Integer,
    Uuid,
    /// `None` means no declared length bound.
    Varchar { max_length: Option<u32> },
    /// Timestamp with time zone.
    Timestamptz,
}

impl ColumnType {
    pub fn sql(&self) -> String {
        match self {
            ColumnType::Integer => "integer".to_string(),
            ColumnType::Uuid => "uuid".to_string(),
            ColumnType::Varchar { max_length: Some(n) } => format!("varchar({})", n),
            ColumnType::Varchar { max_length: None } => "varchar".to_string(),
            ColumnType::Timestamptz => "timestamp with time zone".to_string(),
        }
    }

    /// Whether a foreign key column of this type can reference `other`.
    fn references_compatibly(&self, other: &ColumnType) -> bool {
        match (self, other) {
            (ColumnType::Varchar { .. }, ColumnType::Varchar { .. }) => true,
            (a, b) => a == b,
        }
    }
}

/// Value assigned by the database when an insert omits the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnDefault {
    /// `GENERATED BY DEFAULT AS IDENTITY`.
    Identity,
    /// `gen_random_uuid()`.
    RandomUuid,
    /// `CURRENT_TIMESTAMP`.
    CurrentTimestamp,
}

/// Value the application writes on every update of the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnUpdate {
    CurrentTimestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceAction {
    Cascade,
    Restrict,
    SetNull,
    SetDefault,
    NoAction,
}

impl ReferenceAction {
    pub fn sql(&self) -> &'static str {
        match self {
            ReferenceAction::Cascade => "CASCADE",
            ReferenceAction::Restrict => "RESTRICT",
            ReferenceAction::SetNull => "SET NULL",
            ReferenceAction::SetDefault => "SET DEFAULT",
            ReferenceAction::NoAction => "NO ACTION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    /// Name of the column in the database.
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    pub nullable: bool,
    pub default: Option<ColumnDefault>,
    pub on_update: Option<OnUpdate>,
}

impl ColumnDef {
    const fn new(name: &'static str, ty: ColumnType) -> Self {
        ColumnDef {
            name,
            ty,
            nullable: true,
            default: None,
            on_update: None,
        }
    }

    const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    const fn default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    const fn on_update(mut self, on_update: OnUpdate) -> Self {
        self.on_update = Some(on_update);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexDef {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub unique: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForeignKeyDef {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub ref_table: &'static str,
    pub ref_columns: &'static [&'static str],
    pub on_delete: ReferenceAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    pub primary_key: &'static [&'static str],
    pub indexes: &'static [IndexDef],
    pub foreign_keys: &'static [ForeignKeyDef],
}

impl TableDef {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// True when `columns` (in any order) form the primary key or a unique index.
    pub fn is_unique_key(&self, columns: &[&str]) -> bool {
        let wanted: HashSet<&str> = columns.iter().copied().collect();
        let same = |cols: &[&str]| {
            cols.len() == columns.len() && cols.iter().all(|c| wanted.contains(c))
        };

        same(self.primary_key) || self.indexes.iter().any(|i| i.unique && same(i.columns))
    }

    /// True when deleting a `ref_table` row deletes the rows referencing it here.
    pub fn cascades_from(&self, ref_table: &str) -> bool {
        self.foreign_keys
            .iter()
            .any(|fk| fk.ref_table == ref_table && fk.on_delete == ReferenceAction::Cascade)
    }
}

// =============================================================================
// DECLARATIONS
// =============================================================================

const VARCHAR_255: ColumnType = ColumnType::Varchar { max_length: Some(255) };

pub static POST: TableDef = TableDef {
    name: "post",
    columns: &[
        ColumnDef::new("id", ColumnType::Integer)
            .not_null()
            .default(ColumnDefault::Identity),
        ColumnDef::new("name", ColumnType::Varchar { max_length: Some(256) }),
        ColumnDef::new("created_at", ColumnType::Timestamptz)
            .not_null()
            .default(ColumnDefault::CurrentTimestamp),
        ColumnDef::new("updated_at", ColumnType::Timestamptz).on_update(OnUpdate::CurrentTimestamp),
    ],
    primary_key: &["id"],
    indexes: &[IndexDef {
        name: "name_idx",
        columns: &["name"],
        unique: false,
    }],
    foreign_keys: &[],
};

pub static USER: TableDef = TableDef {
    name: "user",
    columns: &[
        ColumnDef::new("id", ColumnType::Uuid)
            .not_null()
            .default(ColumnDefault::RandomUuid),
        ColumnDef::new("name", VARCHAR_255).not_null(),
        ColumnDef::new("email", VARCHAR_255).not_null(),
        ColumnDef::new("emailVerified", ColumnType::Timestamptz),
    ],
    primary_key: &["id"],
    indexes: &[],
    foreign_keys: &[],
};

pub static ACCOUNT: TableDef = TableDef {
    name: "account",
    columns: &[
        ColumnDef::new("id", ColumnType::Uuid)
            .not_null()
            .default(ColumnDefault::RandomUuid),
        ColumnDef::new("user_id", ColumnType::Uuid).not_null(),
        ColumnDef::new("provider", VARCHAR_255).not_null(),
        ColumnDef::new("provider_account_id", VARCHAR_255).not_null(),
        ColumnDef::new("refresh_token", VARCHAR_255),
        ColumnDef::new("access_token", VARCHAR_255),
        ColumnDef::new("expires_at", ColumnType::Integer),
        ColumnDef::new("token_type", VARCHAR_255),
        ColumnDef::new("scope", VARCHAR_255),
        // Unbounded so provider-issued JWTs fit.
        ColumnDef::new("id_token", ColumnType::Varchar { max_length: None }),
        ColumnDef::new("session_state", VARCHAR_255),
    ],
    primary_key: &["id"],
    indexes: &[IndexDef {
        name: "account_provider_providerAccountId_unique",
        columns: &["provider", "provider_account_id"],
        unique: true,
    }],
    foreign_keys: &[ForeignKeyDef {
        name: "account_user_fk",
        columns: &["user_id"],
        ref_table: "user",
        ref_columns: &["id"],
        on_delete: ReferenceAction::Cascade,
    }],
};

pub static SESSION: TableDef = TableDef {
    name: "session",
    columns: &[
        ColumnDef::new("id", ColumnType::Uuid)
            .not_null()
            .default(ColumnDefault::RandomUuid),
        ColumnDef::new("user_id", ColumnType::Uuid).not_null(),
        ColumnDef::new("session_token", VARCHAR_255).not_null(),
        ColumnDef::new("expires", ColumnType::Timestamptz).not_null(),
    ],
    primary_key: &["id"],
    indexes: &[IndexDef {
        name: "session_sessionToken_unique",
        columns: &["session_token"],
        unique: true,
    }],
    foreign_keys: &[ForeignKeyDef {
        name: "session_user_fk",
        columns: &["user_id"],
        ref_table: "user",
        ref_columns: &["id"],
        on_delete: ReferenceAction::Cascade,
    }],
};

/// Every table, in creation order (referenced tables first).
pub fn tables() -> [&'static TableDef; 4] {
    [&POST, &USER, &ACCOUNT, &SESSION]
}

pub fn table(name: &str) -> Option<&'static TableDef> {
    tables().into_iter().find(|t| t.name == name)
}

/// The catalog as JSON, for migration and documentation tooling.
pub fn to_json() -> serde_json::Value {
    serde_json::json!({ "tables": tables() })
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Validates a set of table declarations.
///
/// Checks for:
/// - Duplicate table or column names
/// - Missing or nullable primary key columns
/// - Indexes referencing non-existent columns
/// - Foreign keys referencing non-existent tables or columns
/// - Foreign keys with mismatched arity or column types
/// - Foreign keys whose target is not a primary key or unique index
/// - Index and constraint names reused anywhere in the schema
pub fn validate(schema: &[&TableDef]) -> Result<(), SchemaError> {
    let mut by_name: HashMap<&str, &TableDef> = HashMap::new();
    for &table in schema {
        if by_name.insert(table.name, table).is_some() {
            return Err(SchemaError::DuplicateTable(table.name.to_string()));
        }
    }

    // PostgreSQL index and constraint names share one namespace per schema.
    let mut constraint_names = HashSet::new();

    for &table in schema {
        validate_columns(table)?;
        validate_primary_key(table)?;

        for index in table.indexes {
            if !constraint_names.insert(index.name) {
                return Err(SchemaError::DuplicateConstraintName(index.name.to_string()));
            }
            validate_index(table, index)?;
        }

        for fk in table.foreign_keys {
            if !constraint_names.insert(fk.name) {
                return Err(SchemaError::DuplicateConstraintName(fk.name.to_string()));
            }
            validate_foreign_key(table, fk, &by_name)?;
        }
    }

    Ok(())
}

fn validate_columns(table: &TableDef) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for column in table.columns {
        if !seen.insert(column.name) {
            return Err(SchemaError::DuplicateColumn {
                table: table.name.to_string(),
                column: column.name.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_primary_key(table: &TableDef) -> Result<(), SchemaError> {
    if table.primary_key.is_empty() {
        return Err(SchemaError::MissingPrimaryKey(table.name.to_string()));
    }

    for &name in table.primary_key {
        let column = table
            .column(name)
            .ok_or_else(|| SchemaError::PrimaryKeyColumnNotFound {
                table: table.name.to_string(),
                column: name.to_string(),
            })?;
        if column.nullable {
            return Err(SchemaError::NullablePrimaryKey {
                table: table.name.to_string(),
                column: name.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_index(table: &TableDef, index: &IndexDef) -> Result<(), SchemaError> {
    if index.columns.is_empty() {
        return Err(SchemaError::EmptyIndex {
            table: table.name.to_string(),
            index: index.name.to_string(),
        });
    }

    for &name in index.columns {
        if table.column(name).is_none() {
            return Err(SchemaError::IndexColumnNotFound {
                table: table.name.to_string(),
                index: index.name.to_string(),
                column: name.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_foreign_key(
    table: &TableDef,
    fk: &ForeignKeyDef,
    by_name: &HashMap<&str, &TableDef>,
) -> Result<(), SchemaError> {
    if fk.columns.is_empty() {
        return Err(SchemaError::EmptyForeignKey {
            table: table.name.to_string(),
            constraint: fk.name.to_string(),
        });
    }

    if fk.columns.len() != fk.ref_columns.len() {
        return Err(SchemaError::ForeignKeyArity {
            table: table.name.to_string(),
            constraint: fk.name.to_string(),
            local: fk.columns.len(),
            referenced: fk.ref_columns.len(),
        });
    }

    let target = by_name
        .get(fk.ref_table)
        .ok_or_else(|| SchemaError::ForeignKeyTableNotFound {
            table: table.name.to_string(),
            constraint: fk.name.to_string(),
            ref_table: fk.ref_table.to_string(),
        })?;

    for (&local, &remote) in fk.columns.iter().zip(fk.ref_columns) {
        let local_col = table
            .column(local)
            .ok_or_else(|| SchemaError::ForeignKeyColumnNotFound {
                table: table.name.to_string(),
                constraint: fk.name.to_string(),
                column: local.to_string(),
            })?;
        let remote_col = target
            .column(remote)
            .ok_or_else(|| SchemaError::ForeignKeyRefColumnNotFound {
                table: table.name.to_string(),
                constraint: fk.name.to_string(),
                ref_table: fk.ref_table.to_string(),
                ref_column: remote.to_string(),
            })?;

        if !local_col.ty.references_compatibly(&remote_col.ty) {
            return Err(SchemaError::ForeignKeyTypeMismatch {
                table: table.name.to_string(),
                constraint: fk.name.to_string(),
                column: local.to_string(),
                ref_table: fk.ref_table.to_string(),
                ref_column: remote.to_string(),
            });
        }
    }

    if !target.is_unique_key(fk.ref_columns) {
        return Err(SchemaError::ForeignKeyTargetNotUnique {
            table: table.name.to_string(),
            constraint: fk.name.to_string(),
            ref_table: fk.ref_table.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
