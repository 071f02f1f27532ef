use serde::{Deserialize, Serialize};

/// The signed-in user as reported by the identity endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Body returned by the identity/permission endpoint on success.
///
/// Both fields are optional on the wire. An absent `permissions` field and an
/// empty list mean the same thing: the viewer holds no permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

impl VerifyResponse {
    /// Permission list with absent collapsed to empty.
    pub fn permissions(&self) -> &[String] {
        self.permissions.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_decode_as_none() {
        let v: VerifyResponse = serde_json::from_str("{}").unwrap();
        assert!(v.user.is_none());
        assert!(v.permissions.is_none());
        assert!(v.permissions().is_empty());
    }

    #[test]
    fn permissions_decode_in_order() {
        let v: VerifyResponse = serde_json::from_str(
            r#"{"user":{"username":"abcd12"},"permissions":["bar.manage","events.manage"]}"#,
        )
        .unwrap();
        assert_eq!(v.user.unwrap().username, "abcd12");
        assert_eq!(v.permissions.unwrap(), vec!["bar.manage", "events.manage"]);
    }
}
