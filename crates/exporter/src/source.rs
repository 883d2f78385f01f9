use async_trait::async_trait;
use database::{DbError, DbHandle, repository};
use polars::prelude::DataFrame;

/// Somewhere tables can be listed and read in full.
#[async_trait]
pub trait TableSource: Send {
    /// Names of every table the source exposes.
    async fn table_names(&mut self) -> Result<Vec<String>, DbError>;

    /// Every row of `table`, as a typed frame.
    async fn read_table(&mut self, table: &str) -> Result<DataFrame, DbError>;
}

#[async_trait]
impl TableSource for DbHandle {
    async fn table_names(&mut self) -> Result<Vec<String>, DbError> {
        repository::list_tables(self).await
    }

    async fn read_table(&mut self, table: &str) -> Result<DataFrame, DbError> {
        repository::fetch_table(self, table).await?.into_dataframe()
    }
}
