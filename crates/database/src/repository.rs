use crate::connection::DbHandle;
use crate::dialect::Dialect;
use crate::error::DbError;
use crate::result_set::ResultSet;

/// Base tables of the session's default schema, sorted by name.
pub async fn list_tables(db: &mut DbHandle) -> Result<Vec<String>, DbError> {
    let sql = match db.dialect() {
        Dialect::TSql => {
            r#"
            SELECT TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_TYPE = 'BASE TABLE' AND TABLE_SCHEMA = SCHEMA_NAME()
            ORDER BY TABLE_NAME
            "#
        }
        Dialect::Postgres => {
            r#"
            SELECT table_name::text AS table_name
            FROM information_schema.tables
            WHERE table_type = 'BASE TABLE' AND table_schema = current_schema()
            ORDER BY table_name
            "#
        }
    };

    let result = db.run(sql, &[]).await?;
    let names = result
        .rows
        .into_iter()
        .filter_map(|row| row.into_iter().next())
        .filter_map(|cell| cell.as_str().map(str::to_owned))
        .collect();
    Ok(names)
}

/// Every row of `table`.
pub async fn fetch_table(db: &mut DbHandle, table: &str) -> Result<ResultSet, DbError> {
    let sql = db.dialect().select_all(table);
    db.run(&sql, &[]).await
}

/// `Country`, `CustomerCount`: one row per country.
pub async fn customers_by_country(db: &mut DbHandle) -> Result<ResultSet, DbError> {
    let sql = match db.dialect() {
        Dialect::TSql => {
            r#"
            SELECT Country, COUNT(CustomerId) AS CustomerCount
            FROM Customer
            GROUP BY Country
            "#
        }
        Dialect::Postgres => {
            r#"
            SELECT "Country", COUNT("CustomerId") AS "CustomerCount"
            FROM "Customer"
            GROUP BY "Country"
            "#
        }
    };
    db.run(sql, &[]).await
}

/// One row per (track, invoice month) with `TrackId`, `TrackName`, `ArtistName`,
/// `GenreName`, `QuantitySold`, `SalesAmount`, `InvoiceYear`, `InvoiceMonth`.
pub async fn sales_by_track_month(db: &mut DbHandle) -> Result<ResultSet, DbError> {
    let sql = match db.dialect() {
        Dialect::TSql => {
            r#"
            SELECT il.TrackId, t.Name AS TrackName, a.Name AS ArtistName, g.Name AS GenreName,
                SUM(il.Quantity) AS QuantitySold,
                SUM(il.Quantity * il.UnitPrice) AS SalesAmount,
                YEAR(i.InvoiceDate) AS InvoiceYear,
                MONTH(i.InvoiceDate) AS InvoiceMonth
            FROM InvoiceLine il
            JOIN Invoice i ON il.InvoiceId = i.InvoiceId
            JOIN Track t ON il.TrackId = t.TrackId
            JOIN Album al ON t.AlbumId = al.AlbumId
            JOIN Artist a ON al.ArtistId = a.ArtistId
            JOIN Genre g ON t.GenreId = g.GenreId
            GROUP BY il.TrackId, t.Name, a.Name, g.Name, YEAR(i.InvoiceDate), MONTH(i.InvoiceDate)
            "#
        }
        Dialect::Postgres => {
            r#"
            SELECT il."TrackId", t."Name" AS "TrackName", a."Name" AS "ArtistName", g."Name" AS "GenreName",
                SUM(il."Quantity") AS "QuantitySold",
                SUM(il."Quantity" * il."UnitPrice") AS "SalesAmount",
                EXTRACT(YEAR FROM i."InvoiceDate")::int AS "InvoiceYear",
                EXTRACT(MONTH FROM i."InvoiceDate")::int AS "InvoiceMonth"
            FROM "InvoiceLine" il
            JOIN "Invoice" i ON il."InvoiceId" = i."InvoiceId"
            JOIN "Track" t ON il."TrackId" = t."TrackId"
            JOIN "Album" al ON t."AlbumId" = al."AlbumId"
            JOIN "Artist" a ON al."ArtistId" = a."ArtistId"
            JOIN "Genre" g ON t."GenreId" = g."GenreId"
            GROUP BY il."TrackId", t."Name", a."Name", g."Name",
                EXTRACT(YEAR FROM i."InvoiceDate"), EXTRACT(MONTH FROM i."InvoiceDate")
            "#
        }
    };
    db.run(sql, &[]).await
}
