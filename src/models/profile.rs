use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role attached to a profile row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Patient,
    Radiologist,
}

/// The authenticated subject of the current session, as issued by the
/// auth collaborator. Read-only to this system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

/// `profiles` row: display info and role for one identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    #[serde(rename = "user_type")]
    pub role: UserRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&UserRole::Patient).unwrap(), "\"patient\"");
        assert_eq!(
            serde_json::to_string(&UserRole::Radiologist).unwrap(),
            "\"radiologist\"",
        );
    }

    #[test]
    fn profile_row_uses_user_type_column() {
        let json = r#"{
            "id": "7f7b9a70-0a0e-4d2b-9a3e-111111111111",
            "full_name": "John Anderson",
            "email": "john@example.com",
            "user_type": "patient"
        }"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.role, UserRole::Patient);
        assert_eq!(profile.full_name, "John Anderson");
    }
}
