use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepartmentStatus {
    Online,
    Offline,
}

/// Routing category for tickets. Seeded by the backend, read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    #[serde(deserialize_with = "super::string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: DepartmentStatus,
    #[serde(default)]
    pub response_time: String,
}

impl Department {
    pub fn is_online(&self) -> bool {
        self.status == DepartmentStatus::Online
    }
}
