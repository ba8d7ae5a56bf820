use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims carried by session tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    /// Token id, recorded on sign-out to revoke the token.
    pub jti: Uuid,
    pub exp: usize,
}
