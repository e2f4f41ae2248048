//! Typed records returned by the content API.
//!
//! Field names are camelCase on the wire; dates arrive as ISO-8601 strings
//! and are rendered as-is, so they stay `String` here.

use serde::{Deserialize, Serialize};

/// One work-experience entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub id: String,
    pub company: String,
    pub position: String,
    pub logo: String,
    pub start_date: String,
    pub end_date: String,
    pub tags: Vec<String>,
    pub description: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One education entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    pub id: String,
    pub institution: String,
    pub degree: String,
    pub logo: String,
    pub start_date: String,
    pub end_date: String,
    pub gpa: String,
    pub achievements: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One portfolio project. Returned both paginated and as a bare record from
/// the detail endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub image: String,
    pub tags: Vec<String>,
    pub demo_url: String,
    pub github_url: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Body of the contact-form write endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailPayload {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_decodes_camel_case_fields() {
        let raw = r#"{
            "id": "p1",
            "title": "folio",
            "subtitle": "data fetching",
            "description": "caching client",
            "image": "/img/folio.png",
            "tags": ["rust", "tokio"],
            "demoUrl": "https://example.com",
            "githubUrl": "https://github.com/example/folio",
            "createdAt": "2025-01-01T00:00:00.000Z",
            "updatedAt": "2025-02-01T00:00:00.000Z"
        }"#;
        let project: Project = serde_json::from_str(raw).unwrap();
        assert_eq!(project.demo_url, "https://example.com");
        assert_eq!(project.tags, vec!["rust", "tokio"]);
    }

    #[test]
    fn experience_decodes_camel_case_fields() {
        let raw = r#"{
            "id": "e1",
            "company": "Acme",
            "position": "Engineer",
            "logo": "/img/acme.png",
            "startDate": "2023-01-01",
            "endDate": "2024-06-01",
            "tags": ["backend"],
            "description": ["Built things"],
            "createdAt": "2025-01-01T00:00:00.000Z",
            "updatedAt": "2025-01-01T00:00:00.000Z"
        }"#;
        let experience: Experience = serde_json::from_str(raw).unwrap();
        assert_eq!(experience.start_date, "2023-01-01");
        assert_eq!(experience.description, vec!["Built things"]);
    }

    #[test]
    fn mail_payload_serializes_flat() {
        let payload = MailPayload {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            subject: "Hi".into(),
            message: "Hello there".into(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "name": "Ada",
                "email": "ada@example.com",
                "subject": "Hi",
                "message": "Hello there"
            })
        );
    }
}
