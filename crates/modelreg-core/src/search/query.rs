//! Parameterized SELECT assembly for allow-listed searches.

use super::allow_list::ValidatedSelection;
use super::tokenizer::SearchTerms;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, ToSql};
use tracing::debug;

/// SQL function folding text to lowercase with full Unicode rules.
///
/// SQLite's own `LOWER()` and `LIKE` only fold ASCII. Patterns are folded
/// with `str::to_lowercase`, so columns must be folded the same way.
pub const CASEFOLD_FUNCTION: &str = "casefold";

fn casefold(value: ValueRef<'_>) -> rusqlite::Result<Option<String>> {
    Ok(match value {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) => Some(
            std::str::from_utf8(bytes)
                .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?
                .to_lowercase(),
        ),
    })
}

/// Register [`CASEFOLD_FUNCTION`] on a connection. Every connection that
/// runs a built search query needs it.
pub fn register_search_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        CASEFOLD_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| casefold(ctx.get_raw(0)),
    )
}

/// A bound value. Only literals travel this way; identifiers never do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlArg {
    Text(String),
    Integer(i64),
}

impl ToSql for SqlArg {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlArg::Text(s) => s.to_sql(),
            SqlArg::Integer(i) => i.to_sql(),
        }
    }
}

/// SQL text plus its positional arguments (`?1`, `?2`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    pub sql: String,
    pub args: Vec<SqlArg>,
}

impl BuiltQuery {
    pub fn new(sql: impl Into<String>, args: Vec<SqlArg>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

/// Escape LIKE wildcards so a term matches as a literal substring.
///
/// Pairs with `ESCAPE '\'` in the generated SQL.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `%term%` pattern for substring containment.
pub fn contains_pattern(term: &str) -> String {
    format!("%{}%", escape_like(term))
}

#[derive(Default)]
struct Binder {
    args: Vec<SqlArg>,
}

impl Binder {
    fn bind(&mut self, arg: SqlArg) -> String {
        self.args.push(arg);
        format!("?{}", self.args.len())
    }
}

fn folded(column: &str) -> String {
    format!("{}({})", CASEFOLD_FUNCTION, column)
}

fn ilike(column: &str, placeholder: &str) -> String {
    format!("{} LIKE {} ESCAPE '\\'", folded(column), placeholder)
}

/// Build the search statement.
///
/// Every term must appear in the primary or the secondary search column.
/// Rows are ranked 1 when the primary column contains the whole query text,
/// 2 when the secondary column does, 3 otherwise. Ties sort alphabetically
/// on the folded primary column, then on its raw value.
pub fn build_search_query(
    selection: &ValidatedSelection<'_>,
    terms: &SearchTerms,
    limit: u32,
) -> BuiltQuery {
    let search = selection.search();
    let mut binder = Binder::default();

    let groups: Vec<String> = terms
        .iter()
        .map(|term| {
            let pattern = contains_pattern(term);
            let primary = binder.bind(SqlArg::Text(pattern.clone()));
            let secondary = binder.bind(SqlArg::Text(pattern));
            format!(
                "({} OR {})",
                ilike(&search.primary, &primary),
                ilike(&search.secondary, &secondary)
            )
        })
        .collect();

    let exact = contains_pattern(terms.cleaned());
    let exact_primary = binder.bind(SqlArg::Text(exact.clone()));
    let exact_secondary = binder.bind(SqlArg::Text(exact));
    let limit = binder.bind(SqlArg::Integer(i64::from(limit)));

    let sql = format!(
        "SELECT {fields} FROM {table} WHERE {filter} \
         ORDER BY CASE WHEN {rank1} THEN 1 WHEN {rank2} THEN 2 ELSE 3 END, \
         {folded_primary} ASC, {primary} ASC \
         LIMIT {limit}",
        fields = selection.fields().join(", "),
        table = selection.table(),
        filter = groups.join(" AND "),
        rank1 = ilike(&search.primary, &exact_primary),
        rank2 = ilike(&search.secondary, &exact_secondary),
        folded_primary = folded(&search.primary),
        primary = search.primary,
        limit = limit,
    );

    debug!(
        table = selection.table(),
        terms = groups.len(),
        "Built search query"
    );

    BuiltQuery {
        sql,
        args: binder.args,
    }
}
