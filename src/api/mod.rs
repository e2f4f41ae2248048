//! Resource definitions for the portfolio content API.
//!
//! One constructor per endpoint, mirroring the remote surface: paginated
//! experience/education/project collections, the project detail lookup, and
//! the contact-mail write. Section views call these instead of spelling out
//! paths and cache identities themselves.

pub mod models;

pub use models::{Education, Experience, MailPayload, Project};

use serde::Deserialize;

use crate::cache::ParamValue;
use crate::mutation::MutationRequest;
use crate::query::{Query, QueryEngine, ResourceRequest};

/// Default page number for collection reads.
pub const DEFAULT_PAGE: i64 = 1;

/// Default page size for collection reads.
pub const DEFAULT_LIMIT: i64 = 10;

/// Pagination metadata attached to every collection response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

/// The `{data, meta}` envelope collection endpoints respond with.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

/// One page of work experience: `GET /experience?page&limit`.
pub fn experience_page(page: i64, limit: i64) -> ResourceRequest {
    ResourceRequest::new("experience", "/experience")
        .param("page", page)
        .param("limit", limit)
}

/// One page of education history: `GET /education?page&limit`.
pub fn education_page(page: i64, limit: i64) -> ResourceRequest {
    ResourceRequest::new("education", "/education")
        .param("page", page)
        .param("limit", limit)
}

/// One page of projects: `GET /project?page&limit`.
pub fn projects_page(page: i64, limit: i64) -> ResourceRequest {
    ResourceRequest::new("projects", "/project")
        .param("page", page)
        .param("limit", limit)
}

/// The dependent project-detail query: `GET /project/{id}`, gated on a
/// selection actually existing. With `id = None` the query stays disabled
/// under the `("project", null)` key and never fetches.
pub fn project_detail(engine: &QueryEngine, id: Option<&str>) -> Query {
    let request = match id {
        Some(id) => {
            ResourceRequest::new("project", format!("/project/{id}")).key_component(id)
        }
        None => ResourceRequest::new("project", "/project").key_component(ParamValue::Null),
    };
    engine.query_when(request, id.is_some())
}

/// The contact-form write: `POST /mail`.
pub fn send_mail() -> MutationRequest {
    MutationRequest::post("/mail")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResourceKey;

    #[test]
    fn collection_keys_carry_page_and_limit() {
        let request = projects_page(DEFAULT_PAGE, DEFAULT_LIMIT);
        assert_eq!(
            request.key(),
            ResourceKey::new("projects", vec![1.into(), 10.into()])
        );
        assert_ne!(
            experience_page(1, 10).key(),
            education_page(1, 10).key()
        );
    }

    #[test]
    fn detail_key_is_the_selected_id() {
        let request = ResourceRequest::new("project", "/project/abc").key_component("abc");
        assert_eq!(
            request.key(),
            ResourceKey::new("project", vec!["abc".into()])
        );
    }

    #[test]
    fn paginated_envelope_decodes() {
        let raw = r#"{
            "data": [{
                "id": "e1",
                "company": "Acme",
                "position": "Engineer",
                "logo": "/img/acme.png",
                "startDate": "2023-01-01",
                "endDate": "2024-06-01",
                "tags": [],
                "description": [],
                "createdAt": "2025-01-01T00:00:00.000Z",
                "updatedAt": "2025-01-01T00:00:00.000Z"
            }],
            "meta": {"total": 1, "page": 1, "limit": 10, "totalPages": 1}
        }"#;
        let page: Paginated<Experience> = serde_json::from_str(raw).unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].company, "Acme");
        assert_eq!(page.meta.total_pages, 1);
    }
}
