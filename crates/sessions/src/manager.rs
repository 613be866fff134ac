use std::sync::Arc;

use models::{
    DocumentSession, Error, ErrorCode, FragmentInstance, ParameterMap, SessionStatus,
};
use registry::Registry;
use serde::Serialize;

use crate::SessionStore;

/// Where to insert a fragment within a session's render order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    Start,
    End,
    Before(String),
    After(String),
}

impl Position {
    /// Parse the wire spelling: `start`, `end`, `before:<guid>`, `after:<guid>`.
    pub fn parse(s: &str) -> Result<Self, Error> {
        if s == "start" {
            return Ok(Position::Start);
        }
        if s == "end" {
            return Ok(Position::End);
        }
        if let Some(guid) = s.strip_prefix("before:") {
            return Ok(Position::Before(guid.to_string()));
        }
        if let Some(guid) = s.strip_prefix("after:") {
            return Ok(Position::After(guid.to_string()));
        }
        Err(Error::new(
            ErrorCode::InvalidOperation,
            format!(
                "Invalid position '{s}'. Expected 'start', 'end', 'before:<guid>', or 'after:<guid>'"
            ),
        ))
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct CreateSessionOutput {
    pub session_id: String,
    pub template_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub created_at: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct AddFragmentOutput {
    pub session_id: String,
    pub fragment_instance_guid: String,
    pub fragment_id: String,
    pub position: usize,
}

#[derive(Serialize, Debug, Clone)]
pub struct SessionFragmentInfo {
    pub fragment_instance_guid: String,
    pub fragment_id: String,
    pub fragment_name: String,
    pub position: usize,
    pub parameters: ParameterMap,
}

#[derive(Serialize, Debug, Clone)]
pub struct FragmentListing {
    pub session_id: String,
    pub fragment_count: usize,
    pub fragments: Vec<SessionFragmentInfo>,
}

/// SessionManager drives the session lifecycle over the store and registry.
///
/// Every operation that takes a caller group refuses sessions whose stored
/// group differs, with the same `SESSION_NOT_FOUND` a genuinely missing
/// session produces, so existence cannot be probed across groups.
pub struct SessionManager {
    store: Arc<SessionStore>,
    registry: Arc<Registry>,
}

impl SessionManager {
    pub fn new(store: Arc<SessionStore>, registry: Arc<Registry>) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Create a session over a template of the caller's group, optionally
    /// reserving an alias. The alias is registered atomically with creation:
    /// a failed save releases the reservation.
    pub async fn create_session(
        &self,
        template_id: &str,
        group: &str,
        alias: Option<&str>,
    ) -> Result<CreateSessionOutput, Error> {
        if self.registry.get_template(group, template_id).is_none() {
            return Err(Error::new(
                ErrorCode::TemplateNotFound,
                format!("Template '{template_id}' not found"),
            ));
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let now = models::timestamp_now();

        if let Some(alias) = alias {
            self.store.register_alias(alias, &session_id, group)?;
        }

        let session = DocumentSession {
            session_id: session_id.clone(),
            template_id: template_id.to_string(),
            group: group.to_string(),
            alias: alias.map(String::from),
            global_parameters: None,
            fragments: Vec::new(),
            created_at: now.clone(),
            updated_at: now.clone(),
        };

        if let Err(err) = self.store.save(session).await {
            let _ = self.store.unregister_session(&session_id, group);
            return Err(err);
        }

        tracing::info!(%session_id, template_id, group, "session created");
        Ok(CreateSessionOutput {
            session_id,
            template_id: template_id.to_string(),
            alias: alias.map(String::from),
            created_at: now,
        })
    }

    /// Resolve a session identifier within `group`: alias first, then bare
    /// UUID.
    pub fn resolve(&self, identifier: &str, group: &str) -> Option<String> {
        if let Some(session_id) = self.store.resolve_alias(identifier, group) {
            return Some(session_id);
        }
        models::parse_guid(identifier)
    }

    /// Load the session behind an identifier, enforcing group ownership.
    pub async fn get_session(
        &self,
        identifier: &str,
        group: &str,
    ) -> Result<DocumentSession, Error> {
        let Some(session_id) = self.resolve(identifier, group) else {
            return Err(session_not_found(identifier));
        };
        match self.store.load(&session_id).await? {
            // Absence and cross-group access are deliberately
            // indistinguishable.
            Some(session) if session.group == group => Ok(session),
            _ => Err(session_not_found(identifier)),
        }
    }

    /// Validate and store the session's global parameter map, replacing any
    /// previous value.
    pub async fn set_global_parameters(
        &self,
        identifier: &str,
        group: &str,
        parameters: ParameterMap,
    ) -> Result<(), Error> {
        let mut session = self.get_session(identifier, group).await?;
        let template = self.template_of(&session)?;

        let (ok, errors) =
            registry::validate_parameters(&template.def.global_parameters, &parameters);
        if !ok {
            return Err(Error::new(
                ErrorCode::InvalidOperation,
                format!("Invalid global parameters: {}", errors.join("; ")),
            ));
        }

        session.global_parameters = Some(parameters);
        session.updated_at = models::timestamp_now();
        self.store.save(session).await?;
        tracing::info!(session = identifier, group, "global parameters set");
        Ok(())
    }

    /// Add a fragment instance at a position. The fragment type must be
    /// declared by the session's template and the parameters must pass its
    /// schema; table fragments additionally pass the table validator.
    pub async fn add_fragment(
        &self,
        identifier: &str,
        group: &str,
        fragment_id: &str,
        parameters: ParameterMap,
        position: Position,
    ) -> Result<AddFragmentOutput, Error> {
        let mut session = self.get_session(identifier, group).await?;
        let template = self.template_of(&session)?;

        let Some(fragment_def) = template.def.fragment(fragment_id) else {
            return Err(Error::new(
                ErrorCode::FragmentNotFound,
                format!(
                    "Fragment '{fragment_id}' not found in template '{}'",
                    session.template_id
                ),
            ));
        };

        let (ok, errors) = registry::validate_parameters(&fragment_def.parameters, &parameters);
        if !ok {
            return Err(Error::new(
                ErrorCode::InvalidOperation,
                format!("Invalid fragment parameters: {}", errors.join("; ")),
            ));
        }
        if fragment_id == "table" {
            tabular::validate_table(&parameters)?;
        }

        let index = insert_index(&session, &position)?;
        let fragment_instance_guid = uuid::Uuid::new_v4().to_string();
        session.fragments.insert(
            index,
            FragmentInstance {
                fragment_instance_guid: fragment_instance_guid.clone(),
                fragment_id: fragment_id.to_string(),
                parameters,
                created_at: models::timestamp_now(),
            },
        );
        session.updated_at = models::timestamp_now();

        let session_id = session.session_id.clone();
        self.store.save(session).await?;

        tracing::info!(
            %session_id,
            fragment_id,
            %fragment_instance_guid,
            position = index,
            "fragment added"
        );
        Ok(AddFragmentOutput {
            session_id,
            fragment_instance_guid,
            fragment_id: fragment_id.to_string(),
            position: index,
        })
    }

    /// Remove a fragment instance by guid.
    pub async fn remove_fragment(
        &self,
        identifier: &str,
        group: &str,
        fragment_instance_guid: &str,
    ) -> Result<(), Error> {
        let mut session = self.get_session(identifier, group).await?;

        let Some(index) = session.fragment_index(fragment_instance_guid) else {
            return Err(Error::new(
                ErrorCode::InvalidOperation,
                format!("Fragment instance '{fragment_instance_guid}' not found in session"),
            ));
        };
        session.fragments.remove(index);
        session.updated_at = models::timestamp_now();

        let session_id = session.session_id.clone();
        self.store.save(session).await?;
        tracing::info!(%session_id, %fragment_instance_guid, "fragment removed");
        Ok(())
    }

    /// The session's fragments in render order, with human names joined from
    /// the registry.
    pub async fn list_session_fragments(
        &self,
        identifier: &str,
        group: &str,
    ) -> Result<FragmentListing, Error> {
        let session = self.get_session(identifier, group).await?;
        let template = self.template_of(&session)?;

        let fragments: Vec<SessionFragmentInfo> = session
            .fragments
            .iter()
            .enumerate()
            .map(|(position, instance)| SessionFragmentInfo {
                fragment_instance_guid: instance.fragment_instance_guid.clone(),
                fragment_id: instance.fragment_id.clone(),
                fragment_name: template
                    .def
                    .fragment(&instance.fragment_id)
                    .map(|f| f.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                position,
                parameters: instance.parameters.clone(),
            })
            .collect();

        Ok(FragmentListing {
            session_id: session.session_id,
            fragment_count: fragments.len(),
            fragments,
        })
    }

    /// Delete the persisted session and its alias entries.
    pub async fn abort_session(&self, identifier: &str, group: &str) -> Result<String, Error> {
        let session = self.get_session(identifier, group).await?;
        self.store.delete(&session.session_id).await?;
        self.store.unregister_session(&session.session_id, group)?;
        tracing::info!(session_id = %session.session_id, group, "session aborted");
        Ok(session.session_id)
    }

    pub async fn get_session_status(
        &self,
        identifier: &str,
        group: &str,
    ) -> Result<SessionStatus, Error> {
        let session = self.get_session(identifier, group).await?;
        Ok(SessionStatus::from(&session))
    }

    /// Every session belonging to `group`. Unreadable session files are
    /// skipped with a warning rather than failing the listing.
    pub async fn list_active_sessions(&self, group: &str) -> Result<Vec<SessionStatus>, Error> {
        let mut statuses = Vec::new();
        for session_id in self.store.list().await? {
            match self.store.load(&session_id).await {
                Ok(Some(session)) if session.group == group => {
                    statuses.push(SessionStatus::from(&session));
                }
                Ok(_) => (),
                Err(error) => {
                    tracing::warn!(%session_id, ?error, "skipping unreadable session");
                }
            }
        }
        Ok(statuses)
    }

    /// A session renders iff its global parameters have been set.
    pub fn validate_session_for_render(&self, session: &DocumentSession) -> Result<(), Error> {
        if session.global_parameters.is_none() {
            return Err(Error::new(
                ErrorCode::SessionNotReady,
                "Global parameters not set. Call set_global_parameters before rendering.",
            ));
        }
        Ok(())
    }

    fn template_of(&self, session: &DocumentSession) -> Result<&registry::TemplateEntry, Error> {
        self.registry
            .get_template(&session.group, &session.template_id)
            .ok_or_else(|| {
                Error::new(
                    ErrorCode::TemplateNotFound,
                    format!(
                        "Template '{}' no longer exists in group '{}'",
                        session.template_id, session.group
                    ),
                )
            })
    }
}

fn insert_index(session: &DocumentSession, position: &Position) -> Result<usize, Error> {
    match position {
        Position::Start => Ok(0),
        Position::End => Ok(session.fragments.len()),
        Position::Before(guid) => session
            .fragment_index(guid)
            .ok_or_else(|| unknown_reference(guid)),
        Position::After(guid) => session
            .fragment_index(guid)
            .map(|i| i + 1)
            .ok_or_else(|| unknown_reference(guid)),
    }
}

fn unknown_reference(guid: &str) -> Error {
    Error::new(
        ErrorCode::InvalidOperation,
        format!("Fragment instance '{guid}' not found in session"),
    )
}

fn session_not_found(identifier: &str) -> Error {
    Error::new(
        ErrorCode::SessionNotFound,
        format!("Session '{identifier}' not found"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_parsing() {
        assert_eq!(Position::parse("start").unwrap(), Position::Start);
        assert_eq!(Position::parse("end").unwrap(), Position::End);
        assert_eq!(
            Position::parse("before:abc").unwrap(),
            Position::Before("abc".to_string())
        );
        assert_eq!(
            Position::parse("after:abc").unwrap(),
            Position::After("abc".to_string())
        );
        let err = Position::parse("middle").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOperation);
    }
}
