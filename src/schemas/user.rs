use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::core::time::format_primitive;
use crate::db::models::User;
use crate::db::types::UserType;
use crate::repositories::users::{UserListFilter, UserSort};
use crate::services::user_import::ImportReport;

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_registration"))]
pub(crate) struct UserRegister {
    pub(crate) user_type: UserType,
    #[serde(alias = "lastName")]
    #[validate(length(min = 1, max = 100, message = "last_name must not be empty"))]
    pub(crate) last_name: String,
    #[serde(alias = "firstName")]
    #[validate(length(min = 1, max = 100, message = "first_name must not be empty"))]
    pub(crate) first_name: String,
    #[serde(default)]
    #[serde(alias = "middleName")]
    #[validate(length(max = 100))]
    pub(crate) middle_name: Option<String>,
    #[serde(default)]
    #[serde(alias = "groupName")]
    #[validate(length(max = 50))]
    pub(crate) group_name: Option<String>,
}

fn validate_registration(payload: &UserRegister) -> Result<(), ValidationError> {
    if payload.last_name.trim().is_empty() || payload.first_name.trim().is_empty() {
        return Err(ValidationError::new("name_required")
            .with_message("last_name and first_name are required".into()));
    }
    let has_group = payload.group_name.as_deref().is_some_and(|group| !group.trim().is_empty());
    if payload.user_type == UserType::Student && !has_group {
        return Err(ValidationError::new("group_required")
            .with_message("group_name is required for students".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct UserUpdate {
    #[serde(default)]
    #[serde(alias = "lastName")]
    #[validate(length(min = 1, max = 100, message = "last_name must not be empty"))]
    pub(crate) last_name: Option<String>,
    #[serde(default)]
    #[serde(alias = "firstName")]
    #[validate(length(min = 1, max = 100, message = "first_name must not be empty"))]
    pub(crate) first_name: Option<String>,
    #[serde(default)]
    #[serde(alias = "middleName")]
    #[validate(length(max = 100))]
    pub(crate) middle_name: Option<String>,
    #[serde(default)]
    #[serde(alias = "groupName")]
    #[validate(length(max = 50))]
    pub(crate) group_name: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 64, message = "login must not be empty"))]
    pub(crate) login: Option<String>,
    #[serde(default)]
    #[validate(length(min = 6, max = 128, message = "password must be at least 6 characters"))]
    pub(crate) password: Option<String>,
}

/// `user_type=all` and empty values mean "no filter".
#[derive(Debug, Default, Deserialize)]
pub(crate) struct UserListQuery {
    #[serde(default)]
    pub(crate) user_type: Option<String>,
    #[serde(default)]
    pub(crate) group_filter: Option<String>,
    #[serde(default)]
    pub(crate) search: Option<String>,
    #[serde(default)]
    pub(crate) sort_by: Option<String>,
}

impl UserListQuery {
    pub(crate) fn into_filter(self) -> Result<UserListFilter, String> {
        let user_type = match non_empty(self.user_type) {
            None => None,
            Some(value) if value.eq_ignore_ascii_case("all") => None,
            Some(value) => Some(
                UserType::parse(&value).ok_or_else(|| format!("Unknown user_type '{value}'"))?,
            ),
        };
        let sort = match non_empty(self.sort_by).as_deref() {
            None | Some("newest") => UserSort::Newest,
            Some("oldest") => UserSort::Oldest,
            Some("alphabet") => UserSort::Alphabet,
            Some("group") => UserSort::Group,
            Some(other) => return Err(format!("Unknown sort_by '{other}'")),
        };

        Ok(UserListFilter {
            user_type,
            group: non_empty(self.group_filter),
            search: non_empty(self.search),
            sort,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) user_type: UserType,
    pub(crate) last_name: String,
    pub(crate) first_name: String,
    pub(crate) middle_name: Option<String>,
    pub(crate) group_name: Option<String>,
    pub(crate) full_name: String,
    pub(crate) login: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl UserResponse {
    pub(crate) fn from_db(user: User) -> Self {
        let full_name = user.full_name();
        Self {
            id: user.id,
            user_type: user.user_type,
            last_name: user.last_name,
            first_name: user.first_name,
            middle_name: user.middle_name,
            group_name: user.group_name,
            full_name,
            login: user.login,
            created_at: format_primitive(user.created_at),
            updated_at: format_primitive(user.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct UserListResponse {
    pub(crate) admins: Vec<UserResponse>,
    pub(crate) teachers: Vec<UserResponse>,
    pub(crate) students: Vec<UserResponse>,
    pub(crate) available_groups: Vec<String>,
}

/// Returned once when an account is created or its password regenerated.
#[derive(Debug, Serialize)]
pub(crate) struct CredentialsResponse {
    pub(crate) user: UserResponse,
    pub(crate) login: String,
    pub(crate) password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ImportResponse {
    pub(crate) filename: String,
    #[serde(flatten)]
    pub(crate) report: ImportReport,
}
