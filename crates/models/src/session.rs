use serde::{Deserialize, Serialize};

use crate::ParameterMap;

/// DocumentSession is the durable state of one partially assembled document.
///
/// There is no explicit state field: a session is ready to render once
/// `global_parameters` has been set at least once. `group` is frozen at
/// creation and partitions all access to the session.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DocumentSession {
    pub session_id: String,
    pub template_id: String,
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_parameters: Option<ParameterMap>,
    #[serde(default)]
    pub fragments: Vec<FragmentInstance>,
    pub created_at: String,
    pub updated_at: String,
}

impl DocumentSession {
    /// Index of the instance with this guid within `fragments`.
    pub fn fragment_index(&self, instance_guid: &str) -> Option<usize> {
        self.fragments
            .iter()
            .position(|f| f.fragment_instance_guid == instance_guid)
    }
}

/// One placed fragment within a session. The instance guid is the handle
/// for removal and for relative-position insertion.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FragmentInstance {
    pub fragment_instance_guid: String,
    pub fragment_id: String,
    pub parameters: ParameterMap,
    pub created_at: String,
}

/// SessionStatus is the summary returned by status and listing operations.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionStatus {
    pub session_id: String,
    pub template_id: String,
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub has_global_parameters: bool,
    pub fragment_count: usize,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&DocumentSession> for SessionStatus {
    fn from(s: &DocumentSession) -> Self {
        Self {
            session_id: s.session_id.clone(),
            template_id: s.template_id.clone(),
            group: s.group.clone(),
            alias: s.alias.clone(),
            has_global_parameters: s.global_parameters.is_some(),
            fragment_count: s.fragments.len(),
            created_at: s.created_at.clone(),
            updated_at: s.updated_at.clone(),
        }
    }
}
