use super::error::ApiError;
use super::session::Session;
use uuid::Uuid;

/// Resource ownership check. Callers must establish that the resource exists
/// before invoking this, so missing resources surface as 404 and never leak
/// through a 403.
pub fn ensure_owner(session: &Session, owner_id: Uuid) -> Result<(), ApiError> {
    if session.user_id == owner_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "You do not own this resource".to_string(),
        ))
    }
}
