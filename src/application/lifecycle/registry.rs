//! 書籍と利用者の登録・参照
//!
//! 登録された書籍は常にAvailableから始まり、状態はクライアントから指定できない。

use crate::domain::{self, Book, BookId, BookQuery, User, UserId, UserQuery, commands::*};
use crate::ports::UserCreate;

use super::errors::{LifecycleError, Result};
use super::orchestrator::ServiceDependencies;

/// 書籍を登録する
///
/// ビジネスルール：
/// - 書名は3〜200文字
/// - 著者は必須
/// - 出版年は1900年以降
/// - ISBNは13文字
pub async fn register_book(deps: &ServiceDependencies, cmd: RegisterBook) -> Result<Book> {
    let new_book = domain::book::register_book(&cmd.isbn, &cmd.title, &cmd.author, cmd.year)
        .map_err(|e| LifecycleError::InvalidInput(e.to_string()))?;

    let book = deps
        .catalog
        .create_book(new_book)
        .await
        .map_err(LifecycleError::CatalogError)?;

    tracing::info!(book_id = %book.book_id, isbn = %book.isbn, "Book registered");

    Ok(book)
}

pub async fn get_book(deps: &ServiceDependencies, book_id: BookId) -> Result<Option<Book>> {
    deps.catalog
        .get_book(book_id)
        .await
        .map_err(LifecycleError::CatalogError)
}

pub async fn list_books(deps: &ServiceDependencies, query: BookQuery) -> Result<Vec<Book>> {
    deps.catalog
        .list_books(query)
        .await
        .map_err(LifecycleError::CatalogError)
}

/// 利用者を登録する
///
/// ビジネスルール：
/// - 名前は3文字以上
/// - メールアドレスは200文字以内で、小文字にそろえたうえで一意
pub async fn register_user(deps: &ServiceDependencies, cmd: RegisterUser) -> Result<User> {
    let new_user = domain::user::register_user(&cmd.name, &cmd.email)
        .map_err(|e| LifecycleError::InvalidInput(e.to_string()))?;
    let email = new_user.email.clone();

    let created = deps
        .identity
        .create_user(new_user)
        .await
        .map_err(LifecycleError::IdentityError)?;

    match created {
        UserCreate::Created(user) => {
            tracing::info!(user_id = %user.user_id, "User registered");
            Ok(user)
        }
        UserCreate::EmailTaken => {
            tracing::warn!(email = %email, "Email already registered");
            Err(LifecycleError::EmailTaken(email))
        }
    }
}

pub async fn get_user(deps: &ServiceDependencies, user_id: UserId) -> Result<Option<User>> {
    deps.identity
        .get_user(user_id)
        .await
        .map_err(LifecycleError::IdentityError)
}

pub async fn list_users(deps: &ServiceDependencies, query: UserQuery) -> Result<Vec<User>> {
    deps.identity
        .list_users(query)
        .await
        .map_err(LifecycleError::IdentityError)
}
