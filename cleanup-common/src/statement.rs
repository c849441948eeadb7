use std::fmt;

/// Quote a MySQL identifier with backticks, doubling any backtick it contains.
pub fn quote_identifier(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

/// A single bounded delete against one table.
///
/// The predicate is trusted: it comes from an administrator-maintained config row and is
/// inserted verbatim. A malformed predicate surfaces as a database error when executed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteStatement {
    pub schema: String,
    pub table: String,
    pub predicate: String,
    pub limit: u64,
}

impl DeleteStatement {
    pub fn new(schema: &str, table: &str, predicate: &str, limit: u64) -> Self {
        Self {
            schema: schema.to_owned(),
            table: table.to_owned(),
            predicate: predicate.to_owned(),
            limit,
        }
    }

    pub fn sql(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DeleteStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DELETE FROM {}.{} WHERE {} LIMIT {}",
            quote_identifier(&self.schema),
            quote_identifier(&self.table),
            self.predicate,
            self.limit
        )
    }
}
