//! SQL extraction from model output and read-only validation.
//!
//! These are regex heuristics, not a parser. They reject anything that is
//! not obviously a single tenant-scoped SELECT over the exposed tables.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use invora_shared::TenantId;
use regex::Regex;
use thiserror::Error;
use uuid::Uuid;

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```json\s*(.*?)```").expect("static regex"));
static SQL_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```(?:sql|postgresql)?[ \t]*\r?\n(.*?)```").expect("static regex")
});
static SELECT_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\b(?:SELECT\b|WITH\s+(?:RECURSIVE\s+)?\w+\s*(?:\([^()]*\))?\s+AS\s*\().*")
        .expect("static regex")
});
static STRING_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'(?:[^']|'')*'").expect("static regex"));
static LEADING_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:SELECT|WITH)\b").expect("static regex"));
static FORBIDDEN_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(INSERT|UPDATE|DELETE|MERGE|DROP|ALTER|CREATE|TRUNCATE|GRANT|REVOKE|COPY|CALL|EXECUTE|DO|VACUUM|ANALYZE|LOCK|SET|RESET|LISTEN|NOTIFY|INTO)\b",
    )
    .expect("static regex")
});
static FORBIDDEN_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(pg_sleep\w*|pg_read_file|pg_read_binary_file|pg_ls_dir|pg_stat_file|pg_catalog|information_schema|dblink\w*|lo_import|lo_export|lo_get|set_config|ts_stat|(?:query|table|cursor|schema|database)_to_xml\w*)\b",
    )
    .expect("static regex")
});
// `FROM` inside EXTRACT/SUBSTRING/TRIM/IS DISTINCT FROM does not name a table.
static NON_TABLE_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\bEXTRACT\s*\(\s*\w+|\bIS\s+(?:NOT\s+)?DISTINCT|\bSUBSTRING\s*\([^()]*?|\bTRIM\s*\([^()]*?)\s+FROM\b",
    )
    .expect("static regex")
});
static FROM_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bFROM\s+([^()]*?)(?:\bWHERE\b|\bGROUP\b|\bORDER\b|\bLIMIT\b|\bHAVING\b|\bJOIN\b|\bINNER\b|\bLEFT\b|\bRIGHT\b|\bFULL\b|\bCROSS\b|\bNATURAL\b|\bUNION\b|\bEXCEPT\b|\bINTERSECT\b|\bWINDOW\b|\bOFFSET\b|\bFETCH\b|\(|\)|$)",
    )
    .expect("static regex")
});
static JOIN_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bJOIN\s+([^\s()]+)").expect("static regex"));
static CTE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bWITH(?:\s+RECURSIVE)?|,)\s*([A-Za-z_]\w*)\s*(?:\([^()]*\))?\s+AS\s*(?:NOT\s+)?(?:MATERIALIZED\s*)?\(")
        .expect("static regex")
});
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)?$").expect("static regex")
});
static TENANT_PREDICATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\btenant_id\s*=\s*'([^']*)'").expect("static regex"));
static TRAILING_LIMIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bLIMIT\s+(\d+|ALL)(\s+OFFSET\s+\d+)?\s*$").expect("static regex")
});
// A missing count means one row.
static TRAILING_FETCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bFETCH\s+(?:FIRST|NEXT)\s+(\d+\s+)?ROWS?\s+ONLY\s*$").expect("static regex")
});
static FETCH_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bFETCH\s+(?:FIRST|NEXT)\b").expect("static regex"));
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("static regex"));

/// Why generated SQL was refused. The message is fed back to the model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlError {
    /// No SQL could be found in the response.
    #[error("the response did not contain a SQL query")]
    NoSql,

    /// The query is blank.
    #[error("the query is empty")]
    Empty,

    /// The query contains a comment.
    #[error("comments are not allowed in the query")]
    Comment,

    /// A string literal is not closed.
    #[error("the query has an unterminated string literal")]
    UnterminatedLiteral,

    /// More than one statement.
    #[error("only a single statement is allowed")]
    MultipleStatements,

    /// Not a SELECT or WITH query.
    #[error("the query must start with SELECT or WITH")]
    NotSelect,

    /// A write or session keyword was used.
    #[error("the keyword {0} is not allowed")]
    ForbiddenKeyword(String),

    /// A dangerous function or system schema was referenced.
    #[error("{0} is not allowed")]
    ForbiddenFunction(String),

    /// A table outside the exposed set was referenced.
    #[error("table {0} is not available; use only the listed tables")]
    TableNotAllowed(String),

    /// The query is not restricted to the tenant.
    #[error("every table must be filtered with tenant_id = '<tenant id>'")]
    MissingTenantFilter,

    /// The query filters on a different tenant.
    #[error("tenant_id '{0}' does not match the current tenant")]
    ForeignTenant(String),

    /// A tenant predicate is not a plain AND condition of a WHERE or ON clause.
    #[error(
        "tenant_id = '<tenant id>' must be joined to the other conditions with AND, \
         outside parentheses; do not use OR at the same level"
    )]
    TenantFilterNotConjunctive,

    /// A FETCH clause the row limit cannot be applied to.
    #[error("use LIMIT n instead of FETCH FIRST")]
    UnsupportedFetch,
}

/// A query that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSql {
    /// Final SQL, with the row limit applied.
    pub sql: String,
    /// Exposed tables it reads, sorted.
    pub tables: Vec<String>,
}

/// Pulls SQL out of a model response.
///
/// Tries, in order: a JSON object with a `sql` or `query` field (bare or in
/// a ```json fence), a ```sql or bare ``` fence, then everything from the
/// first SELECT/WITH keyword.
pub fn extract_sql(response: &str) -> Result<String, SqlError> {
    let candidate = json_field(response, &["sql", "query"])
        .or_else(|| {
            SQL_FENCE
                .captures_iter(response)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str().trim())
                .find(|body| !body.is_empty() && !body.starts_with('{'))
                .map(str::to_string)
        })
        .or_else(|| SELECT_START.find(response).map(|m| m.as_str().to_string()))
        .ok_or(SqlError::NoSql)?;

    let sql = strip_terminator(&candidate);
    if sql.is_empty() {
        return Err(SqlError::NoSql);
    }
    Ok(sql.to_string())
}

/// The `explanation` field of a JSON response, if any.
#[must_use]
pub fn extract_explanation(response: &str) -> Option<String> {
    json_field(response, &["explanation"]).filter(|e| !e.trim().is_empty())
}

fn json_field(response: &str, keys: &[&str]) -> Option<String> {
    let fenced = JSON_FENCE
        .captures(response)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str());
    [Some(response.trim()), fenced]
        .into_iter()
        .flatten()
        .filter_map(|text| serde_json::from_str::<serde_json::Value>(text.trim()).ok())
        .find_map(|value| {
            keys.iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(str::to_string))
        })
}

fn strip_terminator(sql: &str) -> &str {
    sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// Replaces string literal contents with underscores, keeping byte offsets.
fn mask_literals(sql: &str) -> Result<String, SqlError> {
    let masked = STRING_LITERAL.replace_all(sql, |caps: &regex::Captures<'_>| {
        let len = caps[0].len();
        format!("'{}'", "_".repeat(len.saturating_sub(2)))
    });
    if masked.matches('\'').count() % 2 != 0 {
        return Err(SqlError::UnterminatedLiteral);
    }
    Ok(masked.into_owned())
}

/// Read-only, tenant-scoped query validator.
#[derive(Debug, Clone)]
pub struct SqlGuard {
    exposed_tables: BTreeSet<String>,
    max_rows: u32,
}

impl SqlGuard {
    /// Creates a guard for the given tables and row ceiling.
    #[must_use]
    pub fn new(exposed_tables: &[String], max_rows: u32) -> Self {
        Self {
            exposed_tables: exposed_tables.iter().map(|t| t.to_lowercase()).collect(),
            max_rows,
        }
    }

    /// Row ceiling.
    #[must_use]
    pub const fn max_rows(&self) -> u32 {
        self.max_rows
    }

    /// Checks that `sql` is a single read-only statement over the exposed
    /// tables, scoped to `tenant_id`, and applies the row limit.
    pub fn validate(&self, sql: &str, tenant_id: TenantId) -> Result<ValidatedSql, SqlError> {
        let sql = strip_terminator(sql);
        if sql.is_empty() {
            return Err(SqlError::Empty);
        }
        if sql.contains("--") || sql.contains("/*") {
            return Err(SqlError::Comment);
        }

        let masked = mask_literals(sql)?;
        if masked.contains(';') {
            return Err(SqlError::MultipleStatements);
        }
        if !LEADING_KEYWORD.is_match(&masked) {
            return Err(SqlError::NotSelect);
        }
        if let Some(m) = FORBIDDEN_KEYWORD.find(&masked) {
            return Err(SqlError::ForbiddenKeyword(m.as_str().to_uppercase()));
        }
        if let Some(m) = FORBIDDEN_FUNCTION.find(&masked) {
            return Err(SqlError::ForbiddenFunction(m.as_str().to_lowercase()));
        }

        let (tables, references) = self.referenced_tables(&masked)?;
        Self::check_tenant_scope(sql, &masked, tenant_id, references)?;

        Ok(ValidatedSql {
            sql: self.apply_limit(sql, &masked)?,
            tables: tables.into_iter().collect(),
        })
    }

    /// Returns the exposed tables read and how many times they are referenced.
    fn referenced_tables(&self, masked: &str) -> Result<(BTreeSet<String>, usize), SqlError> {
        let ctes: BTreeSet<String> = CTE_NAME
            .captures_iter(masked)
            .map(|c| c[1].to_lowercase())
            .collect();
        let scanned = NON_TABLE_FROM.replace_all(masked, "${1} __from__");

        let mut names: Vec<String> = Vec::new();
        for caps in FROM_LIST.captures_iter(&scanned) {
            for item in caps[1].split(',') {
                match item.split_whitespace().next() {
                    Some(name) if !name.eq_ignore_ascii_case("LATERAL") => {
                        names.push(name.to_string());
                    }
                    _ => {}
                }
            }
        }
        for caps in JOIN_TARGET.captures_iter(&scanned) {
            let name = &caps[1];
            if !name.eq_ignore_ascii_case("LATERAL") {
                names.push(name.to_string());
            }
        }

        let mut tables = BTreeSet::new();
        let mut references = 0;
        for name in names {
            if !IDENTIFIER.is_match(&name) {
                return Err(SqlError::TableNotAllowed(name));
            }
            let lowered = name.to_lowercase();
            let bare = lowered.strip_prefix("public.").unwrap_or(&lowered);
            if !bare.contains('.') && ctes.contains(bare) {
                continue;
            }
            if !self.exposed_tables.contains(bare) {
                return Err(SqlError::TableNotAllowed(name));
            }
            tables.insert(bare.to_string());
            references += 1;
        }
        Ok((tables, references))
    }

    /// Each reference to an exposed table needs its own tenant predicate,
    /// every predicate must name the current tenant, and no predicate may be
    /// weakened by an OR.
    fn check_tenant_scope(
        sql: &str,
        masked: &str,
        tenant_id: TenantId,
        references: usize,
    ) -> Result<(), SqlError> {
        let expected: Uuid = tenant_id.into();
        let mut positions = Vec::new();
        for caps in TENANT_PREDICATE.captures_iter(masked) {
            let (Some(whole), Some(value)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let literal = &sql[value.range()];
            match Uuid::parse_str(literal) {
                Ok(id) if id == expected => positions.push(whole.start()),
                _ => return Err(SqlError::ForeignTenant(literal.to_string())),
            }
        }
        if positions.is_empty() || positions.len() < references {
            return Err(SqlError::MissingTenantFilter);
        }

        let depths = paren_depths(masked);
        if positions
            .into_iter()
            .all(|at| is_conjunctive_filter(masked, &depths, at))
        {
            Ok(())
        } else {
            Err(SqlError::TenantFilterNotConjunctive)
        }
    }

    fn apply_limit(&self, sql: &str, masked: &str) -> Result<String, SqlError> {
        let caps = match TRAILING_LIMIT.captures(masked) {
            Some(caps) => caps,
            None => match TRAILING_FETCH.captures(masked) {
                Some(caps) => caps,
                None if FETCH_CLAUSE.is_match(masked) => return Err(SqlError::UnsupportedFetch),
                None => return Ok(format!("{sql} LIMIT {}", self.max_rows)),
            },
        };
        let Some(count) = caps.get(1) else {
            return Ok(sql.to_string());
        };
        let within = count
            .as_str()
            .trim()
            .parse::<u64>()
            .is_ok_and(|n| n <= u64::from(self.max_rows));
        if within {
            return Ok(sql.to_string());
        }
        let number = count.as_str().trim_end();
        let range = count.start()..count.start() + number.len();
        Ok(format!("{}{}{}", &sql[..range.start], self.max_rows, &sql[range.end..]))
    }
}

/// Parenthesis depth of every byte. Parentheses sit at their outer depth.
fn paren_depths(masked: &str) -> Vec<u32> {
    let mut depth = 0u32;
    masked
        .bytes()
        .map(|b| {
            if b == b')' {
                depth = depth.saturating_sub(1);
            }
            let here = depth;
            if b == b'(' {
                depth += 1;
            }
            here
        })
        .collect()
}

/// Whether the predicate at byte `at` filters its statement on its own.
///
/// It must sit directly in a WHERE, ON or HAVING clause of the statement
/// (a subquery counts as its own statement) and no OR may appear at the
/// same depth within that clause.
fn is_conjunctive_filter(masked: &str, depths: &[u32], at: usize) -> bool {
    let depth = depths[at];
    let start = (0..at)
        .rev()
        .find(|&i| depths[i] < depth)
        .map_or(0, |i| i + 1);
    let end = (at..depths.len())
        .find(|&i| depths[i] < depth)
        .unwrap_or(depths.len());

    let group = &masked[start..end];
    if depth > 0 && !LEADING_KEYWORD.is_match(group) {
        return false;
    }

    let words: Vec<(usize, String)> = WORD
        .find_iter(group)
        .map(|m| (start + m.start(), m.as_str().to_uppercase()))
        .filter(|(pos, _)| depths[*pos] == depth)
        .collect();

    let Some(clause_start) = words
        .iter()
        .rposition(|(pos, w)| *pos < at && matches!(w.as_str(), "WHERE" | "ON" | "HAVING"))
    else {
        return false;
    };
    words[clause_start + 1..]
        .iter()
        .take_while(|(pos, w)| {
            *pos < at
                || !matches!(
                    w.as_str(),
                    "WHERE"
                        | "GROUP"
                        | "ORDER"
                        | "LIMIT"
                        | "OFFSET"
                        | "FETCH"
                        | "HAVING"
                        | "WINDOW"
                        | "UNION"
                        | "INTERSECT"
                        | "EXCEPT"
                        | "JOIN"
                        | "INNER"
                        | "LEFT"
                        | "RIGHT"
                        | "FULL"
                        | "CROSS"
                        | "NATURAL"
                )
        })
        .all(|(_, w)| w != "OR")
}

#[cfg(test)]
#[path = "sql_tests.rs"]
mod tests;
