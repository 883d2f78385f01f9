use configuration::Driver;

/// SQL flavour spoken by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Transact-SQL (SQL Server).
    TSql,
    Postgres,
}

impl From<Driver> for Dialect {
    fn from(driver: Driver) -> Self {
        match driver {
            Driver::SqlServer => Dialect::TSql,
            Driver::Postgres => Dialect::Postgres,
        }
    }
}

impl Dialect {
    /// Quotes an identifier so it can be spliced into a statement.
    ///
    /// Identifiers cannot be bound as parameters, so table names taken from the
    /// catalog go through here before being formatted into SQL.
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Dialect::TSql => format!("[{}]", ident.replace(']', "]]")),
            Dialect::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// `SELECT *` over the whole table.
    pub fn select_all(&self, table: &str) -> String {
        format!("SELECT * FROM {}", self.quote_ident(table))
    }
}
