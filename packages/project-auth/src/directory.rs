use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::error::{AuthError, Result};
use crate::executor::RemoteCallExecutor;
use crate::filter::ProjectFilter;
use crate::transport::RemoteRequest;
use crate::types::{GroupMembers, ProjectGroup, ProjectRecord, ServiceIdentity};

/// Project membership queries against the authorization API.
///
/// An empty list means "no members" or "no projects", never a failure;
/// failures are returned as errors with no partial result.
#[derive(Clone)]
pub struct ProjectDirectoryClient {
    executor: RemoteCallExecutor,
    filter: Option<ProjectFilter>,
}

impl ProjectDirectoryClient {
    pub fn new(executor: RemoteCallExecutor) -> Self {
        Self {
            executor,
            filter: None,
        }
    }

    /// Attach the project filter used by `list_user_available_projects`.
    pub fn with_filter(mut self, filter: ProjectFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn executor(&self) -> &RemoteCallExecutor {
        &self.executor
    }

    /// User ids in a project, optionally narrowed to one role group.
    pub async fn list_project_users(
        &self,
        identity: &ServiceIdentity,
        project_code: &str,
        group: Option<&ProjectGroup>,
    ) -> Result<Vec<String>> {
        let mut request = RemoteRequest::get(["projects", project_code, "users"]);
        if let Some(group) = group {
            request = request.query("group_code", group.as_str());
        }

        let users: Vec<String> = self.executor.call_list(identity, &request).await?;
        debug!(project_code, group = ?group.map(ProjectGroup::as_str), count = users.len(), "Listed project users");
        Ok(users)
    }

    pub async fn is_project_user(
        &self,
        identity: &ServiceIdentity,
        user_id: &str,
        project_code: &str,
        group: Option<&ProjectGroup>,
    ) -> Result<bool> {
        let users = self.list_project_users(identity, project_code, group).await?;
        Ok(users.iter().any(|user| user == user_id))
    }

    /// Every role group of a project with its members.
    pub async fn list_project_groups_with_users(
        &self,
        identity: &ServiceIdentity,
        project_code: &str,
    ) -> Result<Vec<GroupMembers>> {
        // Trailing slash is part of the upstream route.
        let request =
            RemoteRequest::get(["projects", project_code, "roles", ""]).query("fields", "user_list");
        self.executor.call_list(identity, &request).await
    }

    /// Codes of every project the user belongs to.
    pub async fn list_user_project_codes(
        &self,
        identity: &ServiceIdentity,
        user_id: &str,
    ) -> Result<Vec<String>> {
        let request = RemoteRequest::get(["projects"]).query("user_id", user_id);
        let records: Vec<ProjectRecord> = self.executor.call_list(identity, &request).await?;
        Ok(records.into_iter().map(|record| record.project_code).collect())
    }

    /// The user's projects that are approved or pending and not offlined,
    /// keyed by code with the project name as value.
    pub async fn list_user_available_projects(
        &self,
        identity: &ServiceIdentity,
        user_id: &str,
    ) -> Result<BTreeMap<String, String>> {
        let filter = self.filter.as_ref().ok_or_else(|| {
            AuthError::Config("no project metadata lookup configured".into())
        })?;

        let codes = self.list_user_project_codes(identity, user_id).await?;
        let total = codes.len();
        let available = filter.compute_available(codes).await?;
        info!(user_id, total, available = available.len(), "Resolved available projects");
        Ok(available)
    }
}
