use anyhow::Context;

use crate::{
    api::{AuthToken, Error as ApiError, SignIn, SignUp, User, UserId},
    Backend, Error,
};

/// What survives between two runs: the token, and the user it was last
/// verified to belong to
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct StoredSession {
    pub token: AuthToken,
    pub user: Option<User>,
}

pub trait SessionStore {
    fn load(&mut self) -> anyhow::Result<Option<StoredSession>>;
    fn save(&mut self, session: &StoredSession) -> anyhow::Result<()>;
    fn clear(&mut self) -> anyhow::Result<()>;
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore(pub Option<StoredSession>);

impl SessionStore for MemoryStore {
    fn load(&mut self) -> anyhow::Result<Option<StoredSession>> {
        Ok(self.0.clone())
    }

    fn save(&mut self, session: &StoredSession) -> anyhow::Result<()> {
        self.0 = Some(session.clone());
        Ok(())
    }

    fn clear(&mut self) -> anyhow::Result<()> {
        self.0 = None;
        Ok(())
    }
}

/// The signed-in user, if any.
///
/// Only `init`, the sign-in and sign-up calls, and `sign_out` change it.
#[derive(Debug)]
pub struct Session<S> {
    store: S,
    current: Option<StoredSession>,
    verified: bool,
}

impl<S: SessionStore> Session<S> {
    /// Rehydrate from `store`. The cached user is trusted until `init` runs.
    pub fn new(mut store: S) -> Result<Session<S>, Error> {
        let current = store.load().context("loading saved session")?;
        Ok(Session {
            store,
            current,
            verified: false,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn user(&self) -> Option<&User> {
        self.current.as_ref().and_then(|s| s.user.as_ref())
    }

    pub fn token(&self) -> Option<&AuthToken> {
        self.current.as_ref().map(|s| &s.token)
    }

    /// Whose point of view reads are made from
    pub fn viewer(&self) -> UserId {
        self.user()
            .map(|u| u.user_id)
            .unwrap_or_else(UserId::anonymous)
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Token and user id for a write, or `PermissionDenied` when signed out
    pub fn credentials(&self) -> Result<(&AuthToken, UserId), Error> {
        match &self.current {
            Some(StoredSession {
                token,
                user: Some(user),
            }) => Ok((token, user.user_id)),
            _ => Err(Error::permission_denied()),
        }
    }

    /// Check the saved token against the backend, once.
    ///
    /// A token the backend rejects, or whose user no longer exists, is
    /// forgotten. On any other failure the cached user is kept, the session
    /// stays unverified and the error is returned.
    pub async fn init<B: Backend + ?Sized>(&mut self, backend: &B) -> Result<Option<&User>, Error> {
        if self.verified {
            return Ok(self.user());
        }
        let token = match &self.current {
            Some(s) => s.token.clone(),
            None => {
                self.verified = true;
                return Ok(None);
            }
        };
        match fetch_session_user(backend, &token).await {
            Ok(user) => {
                self.remember(StoredSession {
                    token,
                    user: Some(user),
                })?;
            }
            Err(Error::Api(e @ (ApiError::PermissionDenied | ApiError::NotFound(_)))) => {
                tracing::warn!(error = %e, "saved session was rejected, signing out");
                self.sign_out()?;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not check saved session, keeping it");
                return Err(e);
            }
        }
        self.verified = true;
        Ok(self.user())
    }

    pub async fn sign_in<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        payload: &SignIn,
    ) -> Result<&User, Error> {
        payload.validate()?;
        let token = backend.sign_in(payload).await?;
        let user = fetch_session_user(backend, &token).await?;
        tracing::debug!(user = ?user.user_id, "signed in");
        self.remember(StoredSession {
            token,
            user: Some(user),
        })?;
        self.verified = true;
        self.user()
            .ok_or_else(|| Error::not_found("signed in user"))
    }

    /// Create an account, then sign into it. A blank display name falls
    /// back to the username.
    pub async fn sign_up<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        payload: &SignUp,
    ) -> Result<&User, Error> {
        payload.validate()?;
        if backend.user_exists(&payload.username).await? {
            return Err(ApiError::NameAlreadyUsed(payload.username.clone()).into());
        }
        let blank = |n: &Option<String>| n.as_deref().map_or(true, |n| n.trim().is_empty());
        let payload = SignUp {
            display_name: match blank(&payload.display_name) {
                true => Some(payload.username.clone()),
                false => payload.display_name.clone(),
            },
            ..payload.clone()
        };
        let id = backend.sign_up(&payload).await?;
        tracing::debug!(user = ?id, "signed up");
        self.sign_in(backend, &payload.sign_in()).await
    }

    pub fn sign_out(&mut self) -> Result<(), Error> {
        self.current = None;
        if let Err(e) = self.store.clear() {
            tracing::error!(error = ?e, "failed clearing saved session");
            return Err(e.context("clearing saved session").into());
        }
        Ok(())
    }

    fn remember(&mut self, session: StoredSession) -> Result<(), Error> {
        self.store
            .save(&session)
            .context("saving session")?;
        self.current = Some(session);
        Ok(())
    }
}

async fn fetch_session_user<B: Backend + ?Sized>(
    backend: &B,
    token: &AuthToken,
) -> Result<User, Error> {
    let info = backend.verify_token(token).await?;
    backend.fetch_user(token, info.user_id).await
}
