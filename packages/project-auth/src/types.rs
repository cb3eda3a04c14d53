use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Identity of the calling service. Each identity maps to exactly one credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceIdentity(String);

impl ServiceIdentity {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn pipeline() -> Self {
        Self::new("pipeline")
    }

    pub fn code() -> Self {
        Self::new("code")
    }

    pub fn artifactory() -> Self {
        Self::new("artifactory")
    }

    pub fn ticket() -> Self {
        Self::new("ticket")
    }

    pub fn environment() -> Self {
        Self::new("environment")
    }

    pub fn experience() -> Self {
        Self::new("experience")
    }

    pub fn quality() -> Self {
        Self::new("quality")
    }

    pub fn vs() -> Self {
        Self::new("vs")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceIdentity {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Bearer credential issued by the upstream for one service identity.
///
/// Expiry is only ever discovered reactively (a 403 envelope), so there is no
/// local lifetime here.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Role group within a project, as understood by the `group_code` filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProjectGroup {
    Manager,
    Developer,
    Maintainer,
    Tester,
    Pm,
    Qc,
    CiAdmin,
    CiManager,
    Custom(String),
}

impl ProjectGroup {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Manager => "manager",
            Self::Developer => "developer",
            Self::Maintainer => "maintainer",
            Self::Tester => "tester",
            Self::Pm => "pm",
            Self::Qc => "qc",
            Self::CiAdmin => "ci_admin",
            Self::CiManager => "ci_manager",
            Self::Custom(code) => code,
        }
    }

    pub fn parse(code: &str) -> Self {
        match code {
            "manager" => Self::Manager,
            "developer" => Self::Developer,
            "maintainer" => Self::Maintainer,
            "tester" => Self::Tester,
            "pm" => Self::Pm,
            "qc" => Self::Qc,
            "ci_admin" => Self::CiAdmin,
            "ci_manager" => Self::CiManager,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for ProjectGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A project the directory reports for a user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectRecord {
    #[serde(alias = "projectCode")]
    pub project_code: String,
    #[serde(alias = "projectId")]
    pub project_id: String,
}

/// A project role group together with its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembers {
    #[serde(alias = "displayName", default)]
    pub display_name: String,
    #[serde(alias = "roleId", default)]
    pub role_id: i64,
    #[serde(alias = "roleName", default)]
    pub role_name: String,
    #[serde(alias = "userIdList", default)]
    pub user_id_list: Vec<String>,
    #[serde(rename = "type", default)]
    pub group_type: String,
}

/// Upstream project lifecycle state gating visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    Created,
    Pending,
    Approved,
    Rejected,
    Unknown(i64),
}

impl ApprovalStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Created,
            1 => Self::Pending,
            2 => Self::Approved,
            3 => Self::Rejected,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Created => 0,
            Self::Pending => 1,
            Self::Approved => 2,
            Self::Rejected => 3,
            Self::Unknown(code) => *code,
        }
    }

    /// Pending and approved projects are shown to members.
    pub fn is_visible(&self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }
}

impl<'de> Deserialize<'de> for ApprovalStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(code) => Ok(Self::from_code(code)),
            Raw::Text(text) => text
                .trim()
                .parse::<i64>()
                .map(Self::from_code)
                .map_err(|_| serde::de::Error::custom(format!("invalid approval status '{}'", text))),
        }
    }
}

/// Project metadata owned by the project service. Read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectMetadata {
    #[serde(alias = "projectCode")]
    pub project_code: String,
    #[serde(alias = "projectName")]
    pub project_name: String,
    #[serde(alias = "approvalStatus")]
    pub approval_status: ApprovalStatus,
    #[serde(alias = "isOfflined", default)]
    pub is_offlined: bool,
}
