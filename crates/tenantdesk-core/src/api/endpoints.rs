//! Typed wrappers for the admin endpoints the dashboard uses.
//!
//! Every call goes through `ApiClient::request`, so credentials and token
//! refresh are handled the same way as for raw requests.

use serde::Serialize;
use tracing::{debug, info};

use super::client::ApiClient;
use super::error::ApiResult;
use super::ApiError;
use crate::models::{
    group_permissions, page_params, toggle_group, toggle_permission, DashboardSummary,
    Organization, Page, Permission, Role, User,
};

const ME_PATH: &str = "/api/v1/auth/me";
const ORGANIZATIONS_PATH: &str = "/api/v1/organizations";
const USERS_PATH: &str = "/api/v1/admin/users";
const ROLES_PATH: &str = "/api/v1/rbac/roles";
const PERMISSIONS_PATH: &str = "/api/v1/rbac/permissions";

/// Page size used when only a total count is needed
const SUMMARY_PAGE_LIMIT: u32 = 1;

#[derive(Debug, Serialize)]
struct RolePermissionsUpdate<'a> {
    permission_ids: &'a [i64],
}

fn paged_path(base: &str, page: u32, limit: u32) -> String {
    let (page, limit) = page_params(page, limit);
    format!("{}?page={}&limit={}", base, page, limit)
}

impl ApiClient {
    /// The account behind the current access token
    pub async fn current_user(&self) -> ApiResult<User> {
        self.get(ME_PATH).await
    }

    pub async fn list_organizations(&self, page: u32, limit: u32) -> ApiResult<Page<Organization>> {
        self.get(&paged_path(ORGANIZATIONS_PATH, page, limit)).await
    }

    pub async fn get_organization(&self, id: i64) -> ApiResult<Organization> {
        self.get(&format!("{}/{}", ORGANIZATIONS_PATH, id)).await
    }

    pub async fn list_users(&self, page: u32, limit: u32) -> ApiResult<Page<User>> {
        self.get(&paged_path(USERS_PATH, page, limit)).await
    }

    pub async fn list_roles(&self) -> ApiResult<Vec<Role>> {
        self.get(ROLES_PATH).await
    }

    pub async fn list_permissions(&self) -> ApiResult<Vec<Permission>> {
        self.get(PERMISSIONS_PATH).await
    }

    /// Replace the permission set of a role
    pub async fn set_role_permissions(&self, role_id: i64, permission_ids: &[i64]) -> ApiResult<Role> {
        let path = format!("{}/{}/permissions", ROLES_PATH, role_id);
        self.put(&path, &RolePermissionsUpdate { permission_ids }).await
    }

    /// Flip individual permissions and whole modules on a role's current
    /// checklist, then save the result. Unknown ids or modules are rejected
    /// before anything is sent.
    pub async fn toggle_role_permissions(
        &self,
        role_id: i64,
        permission_ids: &[i64],
        modules: &[String],
    ) -> ApiResult<Role> {
        let (roles, permissions) = tokio::join!(self.list_roles(), self.list_permissions());
        let role = roles?
            .into_iter()
            .find(|r| r.id == role_id)
            .ok_or_else(|| ApiError::InvalidRequest(format!("role {} not found", role_id)))?;
        let permissions = permissions?;
        let groups = group_permissions(&permissions);

        let mut selected = role.permission_ids();
        for &id in permission_ids {
            if !permissions.iter().any(|p| p.id == id) {
                return Err(ApiError::InvalidRequest(format!("permission {} not found", id)));
            }
            toggle_permission(&mut selected, id);
        }
        for module in modules {
            let group = groups
                .iter()
                .find(|g| g.module.eq_ignore_ascii_case(module))
                .ok_or_else(|| ApiError::InvalidRequest(format!("permission module {} not found", module)))?;
            toggle_group(&mut selected, group);
        }

        let ids: Vec<i64> = selected.into_iter().collect();
        info!(role_id, count = ids.len(), "Updating role permissions");
        self.set_role_permissions(role_id, &ids).await
    }

    /// Counts for the dashboard landing page, fetched concurrently
    pub async fn dashboard_summary(&self) -> ApiResult<DashboardSummary> {
        let (orgs, users, roles) = tokio::join!(
            self.list_organizations(1, SUMMARY_PAGE_LIMIT),
            self.list_users(1, SUMMARY_PAGE_LIMIT),
            self.list_roles(),
        );

        let summary = DashboardSummary {
            organizations: orgs?.total,
            users: users?.total,
            roles: roles?.len() as u64,
        };
        debug!(?summary, "Dashboard summary loaded");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::auth::Session;

    async fn logged_in_client(server: &MockServer) -> ApiClient {
        let session = Session::in_memory();
        session.set_tokens("A1", "R1").unwrap();
        ApiClient::new(&server.uri(), session).unwrap()
    }

    #[test]
    fn test_paged_path_clamps() {
        assert_eq!(paged_path(USERS_PATH, 0, 1000), "/api/v1/admin/users?page=1&limit=100");
        assert_eq!(paged_path(ORGANIZATIONS_PATH, 2, 25), "/api/v1/organizations?page=2&limit=25");
    }

    #[tokio::test]
    async fn test_list_organizations() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ORGANIZATIONS_PATH))
            .and(query_param("page", "2"))
            .and(query_param("limit", "10"))
            .and(header("Authorization", "Bearer A1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "id": 1, "name": "Acme" }, { "id": 2, "name": "Globex", "is_active": false }],
                "total": 12,
                "page": 2,
                "limit": 10
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = logged_in_client(&server).await;
        let page = client.list_organizations(2, 10).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[1].name, "Globex");
        assert!(!page.has_next());
    }

    async fn mount_rbac_catalog(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(ROLES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 4, "name": "support", "permissions": [{ "id": 1, "name": "users:read" }] }
            ])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(PERMISSIONS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 1, "name": "users:read" },
                { "id": 2, "name": "users:write" },
                { "id": 3, "name": "orgs:read" },
                { "id": 5, "name": "orgs:manage" }
            ])))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_get_organization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/organizations/9"))
            .and(header("Authorization", "Bearer A1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 9, "name": "Acme", "slug": "acme" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = logged_in_client(&server).await;
        let org = client.get_organization(9).await.unwrap();
        assert_eq!(org.name, "Acme");
        assert_eq!(org.slug.as_deref(), Some("acme"));
    }

    #[tokio::test]
    async fn test_toggle_role_permissions_saves_new_selection() {
        let server = MockServer::start().await;
        mount_rbac_catalog(&server).await;
        // Role has {1}; toggling 1 off and the orgs module on gives {3, 5}
        Mock::given(method("PUT"))
            .and(path("/api/v1/rbac/roles/4/permissions"))
            .and(body_json(json!({ "permission_ids": [3, 5] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 4,
                "name": "support",
                "permissions": [{ "id": 3, "name": "orgs:read" }, { "id": 5, "name": "orgs:manage" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = logged_in_client(&server).await;
        let role = client
            .toggle_role_permissions(4, &[1], &["Orgs".to_string()])
            .await
            .unwrap();
        assert_eq!(role.permission_ids(), BTreeSet::from([3, 5]));
    }

    #[tokio::test]
    async fn test_toggle_role_permissions_rejects_unknown_module() {
        let server = MockServer::start().await;
        mount_rbac_catalog(&server).await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = logged_in_client(&server).await;
        let err = client
            .toggle_role_permissions(4, &[], &["billing".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)), "got {err:?}");

        let err = client.toggle_role_permissions(4, &[99], &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)), "got {err:?}");

        let err = client.toggle_role_permissions(77, &[1], &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_set_role_permissions() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/rbac/roles/4/permissions"))
            .and(body_json(json!({ "permission_ids": [1, 3] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 4,
                "name": "support",
                "permissions": [{ "id": 1, "name": "users:read" }, { "id": 3, "name": "orgs:read" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = logged_in_client(&server).await;
        let role = client.set_role_permissions(4, &[1, 3]).await.unwrap();
        assert_eq!(role.permission_ids(), BTreeSet::from([1, 3]));
    }

    #[tokio::test]
    async fn test_list_permissions_and_group() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PERMISSIONS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 1, "name": "users:read" },
                { "id": 2, "name": "orgs:manage" },
                { "id": 3, "name": "users:write" }
            ])))
            .mount(&server)
            .await;

        let client = logged_in_client(&server).await;
        let permissions = client.list_permissions().await.unwrap();
        let groups = group_permissions(&permissions);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].module, "users");
        assert_eq!(groups[1].permissions.len(), 2);
    }

    #[tokio::test]
    async fn test_dashboard_summary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ORGANIZATIONS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [], "total": 7 })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(USERS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [], "total": 42 })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(ROLES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 1, "name": "admin" },
                { "id": 2, "name": "viewer" }
            ])))
            .mount(&server)
            .await;

        let client = logged_in_client(&server).await;
        let summary = client.dashboard_summary().await.unwrap();
        assert_eq!(summary, DashboardSummary { organizations: 7, users: 42, roles: 2 });
    }

    #[tokio::test]
    async fn test_concurrent_requests_each_refresh() {
        // No single-flight lock: both calls may refresh independently
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("Authorization", "Bearer A1"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "A2" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(ME_PATH))
            .and(header("Authorization", "Bearer A2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "email": "root@acme.test" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(ROLES_PATH))
            .and(header("Authorization", "Bearer A2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = logged_in_client(&server).await;
        let (me, roles) = tokio::join!(client.current_user(), client.list_roles());
        assert_eq!(me.unwrap().email, "root@acme.test");
        assert!(roles.unwrap().is_empty());
        assert_eq!(client.session().access_token().as_deref(), Some("A2"));

        let requests = server.received_requests().await.unwrap();
        let refreshes = requests.iter().filter(|r| r.url.path() == "/api/v1/auth/refresh").count();
        assert!((1..=2).contains(&refreshes));
    }
}
