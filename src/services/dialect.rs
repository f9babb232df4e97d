// MySQL -> SQLite dialect translation
//
// Rewrites MySQL-flavoured dump text into something the embedded SQLite engine
// accepts. Every rewrite is a case-insensitive textual substitution; no parsing or
// validation happens here, so malformed SQL surfaces later as an execution error.

use once_cell::sync::Lazy;
use regex::Regex;

/// Trait for rewriting SQL text from one dialect into another
pub trait DialectTranslator: Send + Sync {
    /// Name of the source -> target pair (e.g. "MySQL -> SQLite")
    fn dialect_name(&self) -> &str;

    /// Translate SQL text into the target dialect
    fn translate(&self, sql: &str) -> String;
}

static AUTO_INCREMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bAUTO_INCREMENT\b").expect("valid regex"));
static ENGINE_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)ENGINE\s*=\s*\w+\s*").expect("valid regex"));
static DEFAULT_CHARSET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)DEFAULT CHARSET=\w+").expect("valid regex"));
static CHARACTER_SET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)CHARACTER SET\s+\w+").expect("valid regex"));
static INT_WIDTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bint\(\d+\)").expect("valid regex"));
static UNSIGNED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)UNSIGNED").expect("valid regex"));

/// MySQL dump -> SQLite script translator
pub struct MySqlToSqliteTranslator;

impl MySqlToSqliteTranslator {
    pub fn new() -> Self {
        Self
    }

    /// Strip table options and column modifiers SQLite does not understand
    fn strip_mysql_clauses(&self, sql: &str) -> String {
        let sql = AUTO_INCREMENT.replace_all(sql, "");
        let sql = ENGINE_CLAUSE.replace_all(&sql, "");
        let sql = DEFAULT_CHARSET.replace_all(&sql, "");
        let sql = CHARACTER_SET.replace_all(&sql, "");
        sql.into_owned()
    }

    /// Translate identifier quoting from backticks to double quotes
    fn translate_identifiers(&self, sql: &str) -> String {
        sql.replace('`', "\"")
    }

    /// Map `int(N)` declarations to INTEGER and drop UNSIGNED
    fn translate_integer_types(&self, sql: &str) -> String {
        let sql = INT_WIDTH.replace_all(sql, "INTEGER");
        UNSIGNED.replace_all(&sql, "").into_owned()
    }
}

impl Default for MySqlToSqliteTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl DialectTranslator for MySqlToSqliteTranslator {
    fn dialect_name(&self) -> &str {
        "MySQL -> SQLite"
    }

    fn translate(&self, sql: &str) -> String {
        // Quoting runs after keyword stripping so quoted identifiers are left intact
        let translated = self.strip_mysql_clauses(sql);
        let translated = self.translate_identifiers(&translated);
        self.translate_integer_types(&translated)
    }
}
