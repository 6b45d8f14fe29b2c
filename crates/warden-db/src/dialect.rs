//! Database dialects a workspace can be isolated on.
//!
//! Everything that differs between backends is looked up in one table,
//! [`DatabaseType::info`], instead of comparing dialect names at call sites.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DbError;

/// Which flavour of driver a connection URL is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverMode {
    /// Consumed by the async `sqlx` pools of this process.
    Async,
    /// Handed to blocking external tooling such as migration runners.
    Sync,
}

/// Backend-specific facts about a dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectInfo {
    /// URL scheme understood by `sqlx`.
    pub async_driver: &'static str,
    /// URL scheme understood by blocking tooling.
    pub sync_driver: &'static str,
    /// The database is a single file on local disk.
    pub file_based: bool,
    /// Port assumed when a URL omits one.
    pub default_port: Option<u16>,
}

/// Database backend of an isolated workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    Postgres,
    Mysql,
    Sqlite,
}

impl DatabaseType {
    /// All supported dialects.
    pub const ALL: [DatabaseType; 3] = [Self::Postgres, Self::Mysql, Self::Sqlite];

    /// Dispatch table entry for this dialect.
    #[must_use]
    pub const fn info(self) -> DialectInfo {
        match self {
            Self::Postgres => DialectInfo {
                async_driver: "postgres",
                sync_driver: "postgresql",
                file_based: false,
                default_port: Some(5432),
            },
            Self::Mysql => DialectInfo {
                async_driver: "mysql",
                sync_driver: "mysql",
                file_based: false,
                default_port: Some(3306),
            },
            Self::Sqlite => DialectInfo {
                async_driver: "sqlite",
                sync_driver: "sqlite",
                file_based: true,
                default_port: None,
            },
        }
    }

    /// Driver name for `mode`. A pure function of its two inputs.
    #[must_use]
    pub const fn driver_name(self, mode: DriverMode) -> &'static str {
        let info = self.info();
        match mode {
            DriverMode::Async => info.async_driver,
            DriverMode::Sync => info.sync_driver,
        }
    }

    /// Whether the database lives in a local file.
    #[must_use]
    pub const fn is_file_based(self) -> bool {
        self.info().file_based
    }

    /// Map a URL scheme back to its dialect.
    pub fn from_scheme(scheme: &str) -> Result<Self, DbError> {
        match scheme.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::Mysql),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(DbError::UnknownDatabaseType(other.to_string())),
        }
    }

    /// Statement that scopes a fresh connection to a workspace schema.
    ///
    /// `schema` is always a canonical UUID string, never user input, but it
    /// is still quoted since hyphens are not valid in bare identifiers.
    /// On MySQL a schema is a database, so the statement is only issued on
    /// the shared database; an isolated MySQL workspace already connects to
    /// its own database.
    #[must_use]
    pub fn scope_statement(self, schema: &str, shared: bool) -> Option<String> {
        match self {
            Self::Postgres => Some(format!("SET search_path TO \"{schema}\"")),
            Self::Mysql if shared => Some(format!("USE `{schema}`")),
            Self::Mysql | Self::Sqlite => None,
        }
    }

    /// Adapt a query written with `$N` placeholders to this dialect.
    ///
    /// Postgres and SQLite take `$N` as is. MySQL only knows positional `?`,
    /// which is equivalent as long as every parameter is used once and in
    /// order, as in all queries of this crate.
    #[must_use]
    pub fn placeholders(self, sql: &str) -> Cow<'_, str> {
        if self != Self::Mysql || !sql.contains('$') {
            return Cow::Borrowed(sql);
        }

        let mut out = String::with_capacity(sql.len());
        let mut chars = sql.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '$' && chars.peek().is_some_and(char::is_ascii_digit) {
                while chars.peek().is_some_and(char::is_ascii_digit) {
                    chars.next();
                }
                out.push('?');
            } else {
                out.push(c);
            }
        }
        Cow::Owned(out)
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::Mysql => write!(f, "mysql"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for DatabaseType {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_scheme(s.trim())
    }
}
