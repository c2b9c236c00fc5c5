use serde::{Deserialize, Serialize};

use super::{RegisterUserError, UserId};

const NAME_MIN_CHARS: usize = 3;
const EMAIL_MAX_CHARS: usize = 200;

/// 利用者（利用者管理が所有する）
///
/// 貸出管理は存在確認にのみ利用する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
}

/// 採番前の利用者
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

impl NewUser {
    pub fn into_user(self, user_id: UserId) -> User {
        User {
            user_id,
            name: self.name,
            email: self.email,
        }
    }
}

/// 利用者一覧の絞り込み条件（部分一致）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UserQuery {
    pub fn matches(&self, user: &User) -> bool {
        self.name.as_ref().is_none_or(|n| user.name.contains(n.as_str()))
            && self.email.as_ref().is_none_or(|e| user.email.contains(e.as_str()))
    }
}

/// 純粋関数：登録する利用者を正規化して検証する
///
/// 名前は前後の空白を除き、メールアドレスはさらに小文字にそろえる。
/// メールアドレスの一意性はストアが保証する。
pub fn register_user(name: &str, email: &str) -> Result<NewUser, RegisterUserError> {
    let name = name.trim();
    let email = email.trim().to_lowercase();

    let name_chars = name.chars().count();
    if name_chars < NAME_MIN_CHARS {
        return Err(RegisterUserError::NameTooShort(name_chars));
    }

    let email_chars = email.chars().count();
    if email_chars > EMAIL_MAX_CHARS {
        return Err(RegisterUserError::EmailTooLong(email_chars));
    }

    if !is_email_address(&email) {
        return Err(RegisterUserError::InvalidEmail(email));
    }

    Ok(NewUser {
        name: name.to_string(),
        email,
    })
}

fn is_email_address(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.split('.').all(|label| !label.is_empty())
        && domain.contains('.')
        && !email.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_user_normalizes() {
        let new_user = register_user("  Ana Souza ", " Ana.Souza@Example.COM ").unwrap();

        assert_eq!(
            new_user,
            NewUser {
                name: "Ana Souza".to_string(),
                email: "ana.souza@example.com".to_string(),
            }
        );
    }

    #[test]
    fn test_register_user_rules() {
        assert_eq!(
            register_user("Al", "al@example.com"),
            Err(RegisterUserError::NameTooShort(2))
        );
        assert_eq!(
            register_user("Alice", "alice.example.com"),
            Err(RegisterUserError::InvalidEmail("alice.example.com".to_string()))
        );
        assert_eq!(
            register_user("Alice", "alice@example"),
            Err(RegisterUserError::InvalidEmail("alice@example".to_string()))
        );
        assert_eq!(
            register_user("Alice", "al ice@example.com"),
            Err(RegisterUserError::InvalidEmail("al ice@example.com".to_string()))
        );

        let long = format!("{}@example.com", "a".repeat(190));
        assert_eq!(
            register_user("Alice", &long),
            Err(RegisterUserError::EmailTooLong(202))
        );
    }

    #[test]
    fn test_user_query_matches_substrings() {
        let user = register_user("Bruno Lima", "bruno@example.com")
            .unwrap()
            .into_user(UserId::new(2));

        assert!(UserQuery::default().matches(&user));
        assert!(
            UserQuery {
                name: Some("Lima".to_string()),
                email: Some("@example".to_string()),
            }
            .matches(&user)
        );
        assert!(
            !UserQuery {
                name: Some("Carla".to_string()),
                ..Default::default()
            }
            .matches(&user)
        );
    }
}
