//! Narrowing a user's project codes down to the projects they may see.
//!
//! A project is visible when its metadata is present, its approval status is
//! pending or approved, and it is not offlined. Codes without metadata are
//! skipped rather than failing the whole listing: the directory and the
//! project service can briefly disagree, and a partial listing is preferred
//! over none.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::types::ProjectMetadata;

/// Project metadata provider (the project service).
#[async_trait]
pub trait ProjectMetadataLookup: Send + Sync {
    async fn lookup(&self, codes: &BTreeSet<String>) -> Result<HashMap<String, ProjectMetadata>>;
}

/// Apply the visibility policy. Returns project code to project name.
pub fn filter_available<'a, I>(
    codes: I,
    metadata: &HashMap<String, ProjectMetadata>,
) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut available = BTreeMap::new();
    for code in codes {
        let Some(project) = metadata.get(code) else {
            debug!(project_code = %code, "No metadata for project, skipping");
            continue;
        };
        if !project.approval_status.is_visible() || project.is_offlined {
            continue;
        }
        available.insert(code.clone(), project.project_name.clone());
    }
    available
}

#[derive(Clone)]
pub struct ProjectFilter {
    lookup: Arc<dyn ProjectMetadataLookup>,
}

impl ProjectFilter {
    pub fn new(lookup: Arc<dyn ProjectMetadataLookup>) -> Self {
        Self { lookup }
    }

    /// Look up metadata for `codes` and keep the visible projects.
    ///
    /// A lookup failure is returned as is; no partial result.
    pub async fn compute_available<I, S>(&self, codes: I) -> Result<BTreeMap<String, String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codes: BTreeSet<String> = codes.into_iter().map(Into::into).collect();
        if codes.is_empty() {
            return Ok(BTreeMap::new());
        }

        let metadata = self.lookup.lookup(&codes).await?;
        Ok(filter_available(&codes, &metadata))
    }
}
