use crate::domain::{Book, BookId, BookQuery, BookStatus, NewBook};
use crate::ports::catalog::{Catalog as CatalogTrait, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::str::FromStr;

use super::invalid_data;

/// Map a `books` row to a Book
pub(super) fn map_row_to_book(row: &PgRow) -> Result<Book> {
    let status_str: &str = row.get("status");
    let status = BookStatus::from_str(status_str).map_err(invalid_data)?;

    Ok(Book {
        book_id: BookId::new(row.get("id")),
        isbn: row.get("isbn"),
        title: row.get("title"),
        author: row.get("author"),
        year: row.get("year"),
        status,
    })
}

/// PostgreSQL implementation of Catalog
///
/// Books are inserted as available. Status changes go through the UnitOfWork.
pub struct Catalog {
    pool: PgPool,
}

impl Catalog {
    /// Create a new Catalog with a PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogTrait for Catalog {
    async fn create_book(&self, book: NewBook) -> Result<Book> {
        let row = sqlx::query(
            r#"
            INSERT INTO books (isbn, title, author, year, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, isbn, title, author, year, status
            "#,
        )
        .bind(&book.isbn)
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.year)
        .bind(BookStatus::Available.as_str())
        .fetch_one(&self.pool)
        .await?;

        map_row_to_book(&row)
    }

    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query(
            r#"
            SELECT id, isbn, title, author, year, status
            FROM books
            WHERE id = $1
            "#,
        )
        .bind(book_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    async fn book_exists(&self, book_id: BookId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM books WHERE id = $1)")
            .bind(book_id.value())
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn list_books(&self, query: BookQuery) -> Result<Vec<Book>> {
        let rows = sqlx::query(
            r#"
            SELECT id, isbn, title, author, year, status
            FROM books
            WHERE ($1::VARCHAR IS NULL OR title = $1)
              AND ($2::VARCHAR IS NULL OR author = $2)
              AND ($3::VARCHAR IS NULL OR status = $3)
            ORDER BY id ASC
            "#,
        )
        .bind(query.title)
        .bind(query.author)
        .bind(query.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_book).collect()
    }
}
