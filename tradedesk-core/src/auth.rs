//! Demo sign-in against the backend's user collection.
//!
//! There is no credential service: login scans `/users` for a matching
//! email/password pair and mints a `demo-token-<id>` bearer token.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::api::DeskApi;
use crate::error::{DeskError, DeskResult};
use crate::models::{new_id, User, UserRole};
use crate::session::{Session, SessionContext};
use crate::validation::{LoginForm, ProfileForm, SignupForm};

pub struct AuthService {
    api: Arc<dyn DeskApi>,
    session: Arc<SessionContext>,
}

fn session_for(user: &User) -> Session {
    Session {
        token: format!("demo-token-{}", user.id),
        user_id: user.id.clone(),
        display_name: user.display_name(),
        role: user.role,
    }
}

impl AuthService {
    pub fn new(api: Arc<dyn DeskApi>, session: Arc<SessionContext>) -> Self {
        Self { api, session }
    }

    pub async fn login(&self, form: &LoginForm) -> DeskResult<User> {
        form.validate()?;

        let users = self.api.list_users().await?;
        let user = users
            .into_iter()
            .find(|u| {
                u.email.eq_ignore_ascii_case(form.email.trim())
                    && u.password.as_deref() == Some(form.password.as_str())
            })
            .ok_or(DeskError::InvalidCredentials)?;

        self.session.begin(session_for(&user))?;
        Ok(user.redacted())
    }

    /// Register a customer and sign them in.
    pub async fn signup(&self, form: &SignupForm) -> DeskResult<User> {
        form.validate()?;

        let email = form.email.trim().to_string();
        let users = self.api.list_users().await?;
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(&email)) {
            return Err(DeskError::DuplicateEmail(email));
        }

        let name = form.name.trim();
        let (first, last) = match name.split_once(' ') {
            Some((first, rest)) => (first.to_string(), Some(rest.trim().to_string())),
            None => (name.to_string(), None),
        };
        let draft = User {
            id: new_id(),
            email,
            password: Some(form.password.clone()),
            name: Some(name.to_string()),
            first_name: Some(first),
            last_name: last,
            balance: 0.0,
            verified: false,
            two_factor_enabled: false,
            role: UserRole::Customer,
            ..Default::default()
        };

        let user = self.api.create_user(&draft).await?;
        tracing::info!(user_id = %user.id, "Account registered");
        self.session.begin(session_for(&user))?;
        Ok(user.redacted())
    }

    pub fn logout(&self) -> DeskResult<()> {
        if let Some(s) = self.session.current() {
            tracing::info!(user_id = %s.user_id, "Signing out");
        }
        self.session.end()
    }

    pub async fn profile(&self) -> DeskResult<User> {
        let session = self.session.require()?;
        Ok(self.api.get_user(&session.user_id).await?.redacted())
    }

    pub async fn update_profile(&self, form: &ProfileForm) -> DeskResult<User> {
        self.update_profile_on(form, Utc::now().date_naive()).await
    }

    /// Validate and save the signed-in user's profile. The session's display
    /// name follows the saved first and last name.
    pub async fn update_profile_on(&self, form: &ProfileForm, today: NaiveDate) -> DeskResult<User> {
        let session = self.session.require()?;
        form.validate(today)?;

        let email = form.email.trim();
        let users = self.api.list_users().await?;
        if users
            .iter()
            .any(|u| u.id != session.user_id && u.email.eq_ignore_ascii_case(email))
        {
            return Err(DeskError::DuplicateEmail(email.to_string()));
        }

        let user = self.api.patch_user(&session.user_id, &form.to_patch()).await?;
        tracing::info!(user_id = %user.id, "Profile updated");
        self.session.begin(session_for(&user))?;
        Ok(user.redacted())
    }
}
