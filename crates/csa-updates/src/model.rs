//! The Pending Update type (spec §3) and the category/section table that
//! restricts which context-document section each category may target.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    NewResource,
    ConfigurationIssue,
    DriftDetected,
    DependencyDiscovered,
    TopologyChange,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewResource => "new_resource",
            Self::ConfigurationIssue => "configuration_issue",
            Self::DriftDetected => "drift_detected",
            Self::DependencyDiscovered => "dependency_discovered",
            Self::TopologyChange => "topology_change",
        }
    }

    /// Target sections this category is permitted to touch (spec §4.8
    /// category->allowed-section table).
    pub fn allowed_sections(self) -> &'static [&'static str] {
        match self {
            Self::NewResource => {
                &["application_services", "cluster_details", "infrastructure_topology"]
            }
            Self::ConfigurationIssue => &[
                "project_details",
                "terraform_infrastructure",
                "gitops_configuration",
                "application_services",
            ],
            Self::DriftDetected => &[
                "application_services",
                "cluster_details",
                "gitops_configuration",
                "terraform_infrastructure",
            ],
            Self::DependencyDiscovered => &["application_services", "infrastructure_topology"],
            Self::TopologyChange => &["infrastructure_topology", "cluster_details"],
        }
    }

    pub fn allows_section(self, section: &str) -> bool {
        self.allowed_sections().contains(&section)
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new_resource" => Ok(Self::NewResource),
            "configuration_issue" => Ok(Self::ConfigurationIssue),
            "drift_detected" => Ok(Self::DriftDetected),
            "dependency_discovered" => Ok(Self::DependencyDiscovered),
            "topology_change" => Ok(Self::TopologyChange),
            other => Err(format!("invalid pending-update category '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Approved,
    Rejected,
    Applied,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Applied => "applied",
        }
    }

    /// True if `self -> next` is a permitted status transition (spec
    /// invariant/property #7): `pending -> {approved, rejected}`, and
    /// only `approved -> applied`. Everything else, including any
    /// transition out of `applied`, is rejected.
    pub fn can_transition_to(self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Pending, Status::Approved)
                | (Status::Pending, Status::Rejected)
                | (Status::Approved, Status::Applied)
        )
    }
}

/// A discovery submitted by an agent, before content-hash deduplication
/// and category/section validation.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub category: Category,
    pub target_section: String,
    pub proposed_change: Value,
    pub summary: String,
    pub confidence: f64,
    pub agent_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingUpdate {
    pub update_id: String,
    pub content_hash: String,
    pub category: Category,
    pub target_section: String,
    pub proposed_change: Value,
    pub summary: String,
    pub confidence: f64,
    pub status: Status,
    pub seen_count: u32,
    pub seen_by_agents: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
