use crate::domain::{NewUser, User, UserId, UserQuery};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 利用者登録の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCreate {
    /// 登録できた
    Created(User),
    /// 同じメールアドレスの利用者が既にいる
    EmailTaken,
}

/// 利用者管理ポート
#[async_trait]
pub trait Identity: Send + Sync {
    /// 利用者を登録する
    ///
    /// メールアドレスの重複確認と登録は分割されない。
    async fn create_user(&self, user: NewUser) -> Result<UserCreate>;

    /// IDで利用者を取得する
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>>;

    /// 条件に合う利用者を名前、利用者IDの昇順で取得する
    async fn list_users(&self, query: UserQuery) -> Result<Vec<User>>;
}
