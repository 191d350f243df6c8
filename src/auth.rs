use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    PlatformAdmin,
    UniversityAdmin,
    Dean,
    Hod,
    ExamOfficer,
    Lecturer,
    Student,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::PlatformAdmin,
        Role::UniversityAdmin,
        Role::Dean,
        Role::Hod,
        Role::ExamOfficer,
        Role::Lecturer,
        Role::Student,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "platform_admin" => Some(Self::PlatformAdmin),
            "university_admin" => Some(Self::UniversityAdmin),
            "dean" => Some(Self::Dean),
            "hod" => Some(Self::Hod),
            "exam_officer" => Some(Self::ExamOfficer),
            "lecturer" => Some(Self::Lecturer),
            "student" => Some(Self::Student),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::PlatformAdmin => "platform_admin",
            Self::UniversityAdmin => "university_admin",
            Self::Dean => "dean",
            Self::Hod => "hod",
            Self::ExamOfficer => "exam_officer",
            Self::Lecturer => "lecturer",
            Self::Student => "student",
        }
    }
}

/// The signed-in user, passed explicitly into every check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    #[serde(alias = "user_id")]
    pub user_id: String,
    pub role: Role,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    #[serde(default, alias = "university_id")]
    pub university_id: Option<String>,
    #[serde(default, alias = "faculty_id")]
    pub faculty_id: Option<String>,
    #[serde(default, alias = "department_id")]
    pub department_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    #[default]
    Any,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    University,
    Faculty,
    Department,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequirement {
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default, alias = "required")]
    pub mode: PermissionMode,
    #[serde(default)]
    pub scope: Option<Scope>,
}

impl AccessRequirement {
    pub fn roles(roles: &[Role]) -> Self {
        Self {
            roles: roles.to_vec(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    Granted,
    RedirectLogin,
    AccessDenied,
}

/// Guard checks in order: authentication, role, permissions, then the
/// tenancy scope attached to the requirement.
pub fn authorize(ctx: Option<&AuthContext>, req: &AccessRequirement) -> AccessDecision {
    let Some(user) = ctx else {
        return AccessDecision::RedirectLogin;
    };

    if !req.roles.is_empty() && !req.roles.contains(&user.role) {
        return AccessDecision::AccessDenied;
    }

    if !req.permissions.is_empty() {
        let held = |p: &String| user.permissions.contains(p);
        let ok = match req.mode {
            PermissionMode::All => req.permissions.iter().all(held),
            PermissionMode::Any => req.permissions.iter().any(held),
        };
        if !ok {
            return AccessDecision::AccessDenied;
        }
    }

    let scope_ok = match req.scope {
        None => true,
        Some(Scope::University) => {
            user.role == Role::PlatformAdmin || user.university_id.is_some()
        }
        Some(Scope::Department) => user.role != Role::Hod || user.department_id.is_some(),
        Some(Scope::Faculty) => user.role != Role::Dean || user.faculty_id.is_some(),
    };
    if !scope_ok {
        return AccessDecision::AccessDenied;
    }

    AccessDecision::Granted
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub can_view_results: bool,
    pub can_edit_results: bool,
    pub can_approve_results: bool,
    pub can_manage_users: bool,
    pub can_view_reports: bool,
    pub can_manage_academics: bool,
}

impl Capabilities {
    pub fn for_role(role: Role) -> Self {
        use Role::*;
        Self {
            can_view_results: matches!(
                role,
                Student | Lecturer | Dean | Hod | ExamOfficer | UniversityAdmin
            ),
            can_edit_results: matches!(role, Lecturer | ExamOfficer | UniversityAdmin),
            can_approve_results: matches!(role, Dean | Hod | ExamOfficer | UniversityAdmin),
            can_manage_users: matches!(role, UniversityAdmin),
            can_view_reports: matches!(role, Dean | Hod | ExamOfficer | UniversityAdmin),
            can_manage_academics: matches!(role, UniversityAdmin | Hod),
        }
    }
}
