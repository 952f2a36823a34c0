use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub(crate) enum UserType {
    Admin,
    Teacher,
    Student,
}

impl UserType {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "teacher" => Some(Self::Teacher),
            "student" => Some(Self::Student),
            _ => None,
        }
    }
}

/// Capabilities derived from the user type; every account may take tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct Permissions {
    pub(crate) can_view_tests: bool,
    pub(crate) can_take_tests: bool,
    pub(crate) can_upload_files: bool,
    pub(crate) can_delete_files: bool,
    pub(crate) can_manage_users: bool,
    pub(crate) can_edit_tests: bool,
}

impl Permissions {
    pub(crate) fn for_user_type(user_type: UserType) -> Self {
        let staff = matches!(user_type, UserType::Teacher | UserType::Admin);
        Self {
            can_view_tests: true,
            can_take_tests: true,
            can_upload_files: staff,
            can_delete_files: staff,
            can_manage_users: user_type == UserType::Admin,
            can_edit_tests: staff,
        }
    }
}
