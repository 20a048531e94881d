//! User administration, gated purely by role.

use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use tally_core::policy::{authorize, Capability};
use tally_core::validation::{validate_display_name, validate_required_text};
use tally_core::{Actor, CoreError, Role, User, ValidationError, ValidationErrors};

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    /// Identity subject the user authenticates as (the token `sub`). A fresh
    /// UUID when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

pub struct UserAdminService {
    state: AppState,
}

impl UserAdminService {
    pub fn new(state: AppState) -> Self {
        UserAdminService { state }
    }

    pub async fn list_users(&self, actor: &Actor) -> ApiResult<Vec<User>> {
        authorize(actor, Capability::ManageUsers)?;
        Ok(self.state.db.users().list().await?)
    }

    /// Adds a directory entry. Its `display_name` becomes the `user_name` of
    /// every transaction whose lines carry `id`; a taken id is a conflict.
    pub async fn create_user(&self, actor: &Actor, request: &CreateUserRequest) -> ApiResult<User> {
        let id = match request.id.as_deref() {
            Some(id) => validate_required_text("id", id, 100),
            None => Ok(Uuid::new_v4().to_string()),
        };
        let (id, display_name) = match (id, validate_display_name(&request.display_name)) {
            (Ok(id), Ok(display_name)) => (id, display_name),
            (id, display_name) => {
                let mut errors = ValidationErrors::new();
                errors.check(id);
                errors.check(display_name);
                return Err(errors.into());
            }
        };
        authorize(actor, Capability::ManageUsers)?;

        let now = Utc::now();
        let user = User {
            id,
            display_name,
            role: request.role,
            created_at: now,
            updated_at: now,
        };
        self.state.db.users().insert(&user).await?;

        info!(admin_id = %actor.id, user_id = %user.id, role = %user.role, "User created");
        Ok(user)
    }

    /// Grants `role` to a user. Admins cannot demote themselves.
    pub async fn change_role(&self, actor: &Actor, user_id: &str, role: Role) -> ApiResult<User> {
        authorize(actor, Capability::ManageRoles)?;

        if actor.id == user_id && role != Role::Admin {
            return Err(CoreError::from(ValidationError::Rule {
                field: "role".to_string(),
                message: "You cannot remove your own admin role".to_string(),
            })
            .into());
        }

        let users = self.state.db.users();
        users.update_role(user_id, role, Utc::now()).await?;
        let user = users
            .get(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("User", user_id))?;

        info!(admin_id = %actor.id, user_id = %user_id, role = %role, "Role changed");
        Ok(user)
    }
}
