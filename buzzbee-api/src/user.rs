use std::ops::RangeInclusive;

use crate::{Error, Time};

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    serde::Deserialize,
    serde::Serialize,
)]
pub struct UserId(pub i64);

impl UserId {
    /// What a signed-out viewer sends wherever the backend wants a user id
    pub fn anonymous() -> UserId {
        UserId(0)
    }

    pub fn is_anonymous(&self) -> bool {
        self.0 == 0
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct User {
    pub user_id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub image_name: String,
    pub created_date: Time,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SignIn {
    pub username: String,
    pub password: String,
}

impl SignIn {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.username)?;
        crate::validate_string(&self.password)?;
        Ok(())
    }
}

pub const USERNAME_LEN: RangeInclusive<usize> = 3..=20;
pub const PASSWORD_LEN: RangeInclusive<usize> = 8..=16;
const PASSWORD_SYMBOLS: &str = "!@#$%^&*";

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SignUp {
    pub username: String,
    pub password: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,

    /// One of the stock profile pictures
    pub image_id: i64,
}

impl SignUp {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.username)?;
        crate::validate_string(&self.password)?;
        for s in self.display_name.iter().chain(self.bio.iter()) {
            crate::validate_string(s)?;
        }
        if !USERNAME_LEN.contains(&self.username.trim().chars().count()) {
            return Err(Error::InvalidRequest(format!(
                "username must be {}-{} characters",
                USERNAME_LEN.start(),
                USERNAME_LEN.end()
            )));
        }
        let pass = &self.password;
        if !PASSWORD_LEN.contains(&pass.chars().count()) {
            return Err(Error::InvalidRequest(format!(
                "password must be {}-{} characters",
                PASSWORD_LEN.start(),
                PASSWORD_LEN.end()
            )));
        }
        let symbol = |c: char| PASSWORD_SYMBOLS.contains(c);
        if !pass.chars().all(|c| c.is_ascii_alphanumeric() || symbol(c)) {
            return Err(Error::InvalidRequest(format!(
                "password may only hold letters, digits and {PASSWORD_SYMBOLS}"
            )));
        }
        let has = |f: fn(&char) -> bool| pass.chars().any(|c| f(&c));
        if !(has(char::is_ascii_lowercase)
            && has(char::is_ascii_uppercase)
            && has(char::is_ascii_digit)
            && pass.chars().any(symbol))
        {
            return Err(Error::InvalidRequest(String::from(
                "password needs lower and upper case letters, a digit and a symbol",
            )));
        }
        Ok(())
    }

    pub fn sign_in(&self) -> SignIn {
        SignIn {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// Answer to "is this username taken?"
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct UserExists {
    pub exists: bool,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AuthToken(pub String);

/// Body of a successful login
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LoginResponse {
    pub token: AuthToken,
}

/// Body of a successful token verification
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct TokenInfo {
    pub user_id: UserId,
}
