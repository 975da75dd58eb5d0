use thiserror::Error;

/// Service-level errors shared by every subsystem.
///
/// Transport layers map `code()` to a status; the core never encodes
/// transport codes itself. Store failures are wrapped with the operation
/// category and carry the underlying cause as text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("failed to authenticate credentials")]
    Authentication,

    #[error("unauthorized access")]
    Authorization,

    #[error("entity not found")]
    NotFound,

    #[error("entity already exists")]
    Conflict,

    #[error("malformed entity: {0}")]
    MalformedEntity(String),

    #[error("invalid issue time for key")]
    InvalidKeyIssuedAt,

    #[error("api key expired")]
    ApiKeyExpired,

    #[error("invite already expired")]
    InviteExpired,

    #[error("invite is no longer pending")]
    InvalidInviteState,

    #[error("user already has a pending invite for this org")]
    UserAlreadyInvited,

    #[error("user is already a member of this org")]
    OrgMembershipExists,

    #[error("unknown access subject")]
    UnknownSubject,

    #[error("failed to create entity: {0}")]
    CreateEntity(String),

    #[error("failed to retrieve entity: {0}")]
    RetrieveEntity(String),

    #[error("failed to update entity: {0}")]
    UpdateEntity(String),

    #[error("failed to remove entity: {0}")]
    RemoveEntity(String),
}

impl Error {
    /// Stable machine-readable code for boundary mapping.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Authentication => "AUTHENTICATION",
            Error::Authorization => "AUTHORIZATION",
            Error::NotFound => "NOT_FOUND",
            Error::Conflict => "CONFLICT",
            Error::MalformedEntity(_) => "MALFORMED_ENTITY",
            Error::InvalidKeyIssuedAt => "INVALID_KEY_ISSUED_AT",
            Error::ApiKeyExpired => "API_KEY_EXPIRED",
            Error::InviteExpired => "INVITE_EXPIRED",
            Error::InvalidInviteState => "INVALID_INVITE_STATE",
            Error::UserAlreadyInvited => "USER_ALREADY_INVITED",
            Error::OrgMembershipExists => "ORG_MEMBERSHIP_EXISTS",
            Error::UnknownSubject => "UNKNOWN_SUBJECT",
            Error::CreateEntity(_) => "CREATE_ENTITY",
            Error::RetrieveEntity(_) => "RETRIEVE_ENTITY",
            Error::UpdateEntity(_) => "UPDATE_ENTITY",
            Error::RemoveEntity(_) => "REMOVE_ENTITY",
        }
    }

    /// Wrap a store failure under the create category.
    pub fn create_entity(err: impl std::fmt::Display) -> Self {
        Error::CreateEntity(err.to_string())
    }

    /// Wrap a store failure under the retrieve category.
    pub fn retrieve_entity(err: impl std::fmt::Display) -> Self {
        Error::RetrieveEntity(err.to_string())
    }

    /// Wrap a store failure under the update category.
    pub fn update_entity(err: impl std::fmt::Display) -> Self {
        Error::UpdateEntity(err.to_string())
    }

    /// Wrap a store failure under the remove category.
    pub fn remove_entity(err: impl std::fmt::Display) -> Self {
        Error::RemoveEntity(err.to_string())
    }
}
