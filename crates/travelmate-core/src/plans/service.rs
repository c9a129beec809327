use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::cache::FallbackCache;
use crate::models::{PlanRecord, PlanRequest, PlanResponse, TravelPlan};

const PLAN_PREFIX: &str = "/api/plan";

#[derive(Error, Debug)]
pub enum PlanError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Local plan cache failed: {0:#}")]
    Cache(#[from] anyhow::Error),

    #[error("Could not encode plan: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Travel-plan reads and writes.
///
/// Writes and single reads fall back to the local cache only when the server
/// gave no response at all. An error status from the server is returned to
/// the caller. In offline mode the server is never contacted.
pub struct PlanService {
    client: ApiClient,
    cache: FallbackCache,
    offline: bool,
}

impl PlanService {
    pub fn new(client: ApiClient, cache: FallbackCache) -> Self {
        Self {
            client,
            cache,
            offline: false,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn cache(&self) -> &FallbackCache {
        &self.cache
    }

    /// Create a plan on the server, or locally when the server is unreachable.
    pub async fn save(&self, plan: &TravelPlan) -> Result<PlanRecord, PlanError> {
        if self.offline {
            return Ok(self.cache.store(plan)?);
        }

        let request = PlanRequest::from_plan(plan)?;
        match self.client.post::<PlanResponse, _>(PLAN_PREFIX, &request).await {
            Ok(response) => {
                let record = response.into_record(&plan.user_id);
                info!(plan_id = %record.plan_id, "Plan saved");
                Ok(record)
            }
            Err(e) if e.is_unreachable() => {
                warn!(error = %e, "Server unreachable, saving plan locally");
                Ok(self.cache.store(plan)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a plan. A server 404 is a definite `None`.
    pub async fn get(&self, plan_id: &str) -> Result<Option<PlanRecord>, PlanError> {
        if self.offline {
            return self.get_local(plan_id);
        }

        let path = format!("{}/by-plan-id/{}", PLAN_PREFIX, urlencoding::encode(plan_id));
        match self.client.get::<PlanResponse>(&path).await {
            Ok(response) => Ok(Some(response.into_record(""))),
            Err(e) if e.is_not_found() => {
                debug!(plan_id, "Plan not found on server");
                Ok(None)
            }
            Err(e) if e.is_unreachable() => {
                warn!(error = %e, "Server unreachable, reading plan from local cache");
                self.get_local(plan_id)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_local(&self, plan_id: &str) -> Result<Option<PlanRecord>, PlanError> {
        Ok(self.cache.load_plan(plan_id)?.map(|cached| cached.data))
    }

    /// Plans owned by `owner`: whatever the server returns, followed by the
    /// locally saved ones. The two sources are not deduplicated.
    pub async fn list_by_owner(&self, owner: &str) -> Result<Vec<PlanRecord>, PlanError> {
        let mut plans = if self.offline {
            Vec::new()
        } else {
            let path = format!("{}?userId={}", PLAN_PREFIX, urlencoding::encode(owner));
            match self.client.get::<Vec<PlanResponse>>(&path).await {
                Ok(remote) => remote
                    .into_iter()
                    .map(|response| response.into_record(owner))
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "Listing plans from server failed, using local plans only");
                    Vec::new()
                }
            }
        };

        let local = self.cache.owned_by(owner)?;
        debug!(remote = plans.len(), local = local.len(), "Listed plans");
        plans.extend(local);
        Ok(plans)
    }

    /// Plans open for matching. Empty on any failure.
    pub async fn list_matching(&self) -> Vec<PlanRecord> {
        if self.offline {
            return Vec::new();
        }

        let path = format!("{}/matching", PLAN_PREFIX);
        match self.client.get::<Vec<PlanResponse>>(&path).await {
            Ok(remote) => remote
                .into_iter()
                .map(|response| response.into_record(""))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Listing matching plans failed");
                Vec::new()
            }
        }
    }

    /// Delete a plan. Returns false when the server does not know it.
    ///
    /// In offline mode only the local copy is removed.
    pub async fn delete(&self, plan_id: &str, owner: &str) -> Result<bool, PlanError> {
        if self.offline {
            return Ok(self.cache.remove(plan_id)?);
        }

        let path = format!(
            "{}/{}?userId={}",
            PLAN_PREFIX,
            urlencoding::encode(plan_id),
            urlencoding::encode(owner)
        );
        match self.client.delete(&path).await {
            Ok(()) => {
                info!(plan_id, "Plan deleted");
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the plan service answers at all.
    pub async fn health_check(&self) -> bool {
        let path = format!("{}/health", PLAN_PREFIX);
        match self.client.ping(&path).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Plan service health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::unreachable_url;
    use crate::store::CredentialStore;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn plan_service(base_url: &str) -> (TempDir, PlanService) {
        let dir = TempDir::new().unwrap();
        let client = ApiClient::new(base_url, CredentialStore::in_memory()).unwrap();
        let cache = FallbackCache::new(dir.path().to_path_buf()).unwrap();
        (dir, PlanService::new(client, cache))
    }

    fn plan(owner: &str, title: &str) -> TravelPlan {
        TravelPlan {
            user_id: owner.into(),
            title: title.into(),
            destination: "Gyeongju".into(),
            people: "3".into(),
            ..Default::default()
        }
    }

    /// A plan as the server serializes it: numeric counts, list fields as
    /// JSON text, no owner.
    fn server_plan(id: i64, plan_id: &str, title: &str) -> serde_json::Value {
        json!({
            "id": id,
            "location": "Gyeongju",
            "startDate": "2026-11-01",
            "endDate": "2026-11-02",
            "description": format!("{title} 여행 계획"),
            "interests": "역사,맛집",
            "title": title,
            "budget": 150000,
            "destination": null,
            "numberOfPeople": 3,
            "createdAt": "2026-10-18T10:00:00",
            "planId": plan_id,
            "matchingEnabled": true,
            "imageUrl": null,
            "aiHashtags": "[\"#경주\"]",
            "nearbyRecommendations": "[]",
            "schedules": "{\"day1\":[{\"time\":\"10:00\",\"place\":\"Bulguksa\",\"activity\":\"tour\"}]}"
        })
    }

    #[tokio::test]
    async fn test_save_posts_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/plan"))
            .respond_with(ResponseTemplate::new(200).set_body_json(server_plan(7, "plan_7_1", "trip")))
            .expect(1)
            .mount(&server)
            .await;

        let (_dir, service) = plan_service(&server.uri());
        let record = service.save(&plan("a@x.com", "trip")).await.unwrap();
        assert_eq!(record.plan_id, "plan_7_1");
        assert_eq!(record.plan.user_id, "a@x.com");
        assert_eq!(record.plan.budget, "150000");
        assert_eq!(record.plan.people, "3");
        assert_eq!(record.plan.schedules["day1"][0].place, "Bulguksa");

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["location"], "Gyeongju");
        assert_eq!(body["numberOfPeople"], 3);
        assert!(service.cache().latest().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_save_is_readable_immediately() {
        let (_dir, service) = plan_service(&unreachable_url());
        let original = plan("a@x.com", "offline trip");

        let saved = service.save(&original).await.unwrap();
        let read = service.get(&saved.plan_id).await.unwrap().unwrap();

        assert_eq!(read, saved);
        assert_eq!(read.plan, original);
    }

    #[tokio::test]
    async fn test_save_error_status_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad"))
            .mount(&server)
            .await;

        let (_dir, service) = plan_service(&server.uri());
        let err = service.save(&plan("a@x.com", "trip")).await.unwrap_err();
        assert!(matches!(err, PlanError::Api(ApiError::InvalidResponse(_))));
        assert!(service.cache().latest().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_not_found_does_not_fall_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (_dir, service) = plan_service(&server.uri());
        let mut draft = plan("a@x.com", "local");
        draft.plan_id = Some("plan_1".into());
        service.cache().store(&draft).unwrap();

        assert!(service.get("plan_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_owner_unions_without_dedup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/plan"))
            .and(query_param("userId", "a@x.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                server_plan(9, "plan_9", "remote")
            ])))
            .mount(&server)
            .await;

        let (_dir, service) = plan_service(&server.uri());
        let mut draft = plan("a@x.com", "local");
        draft.plan_id = Some("plan_9".into());
        service.cache().store(&draft).unwrap();
        service.cache().store(&plan("b@x.com", "other")).unwrap();

        let plans = service.list_by_owner("a@x.com").await.unwrap();
        let ids: Vec<_> = plans.iter().map(|p| p.plan_id.as_str()).collect();
        assert_eq!(ids, vec!["plan_9", "plan_9"]);
        assert_eq!(plans[0].plan.title, "remote");
        assert_eq!(plans[0].plan.user_id, "a@x.com");
        assert_eq!(plans[0].plan.style_labels, vec!["역사", "맛집"]);
        assert_eq!(plans[1].plan.title, "local");
    }

    #[tokio::test]
    async fn test_get_decodes_server_plan() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/plan/by-plan-id/plan_4_2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(server_plan(4, "plan_4_2", "Gyeongju trip")))
            .expect(1)
            .mount(&server)
            .await;

        let (_dir, service) = plan_service(&server.uri());
        let record = service.get("plan_4_2").await.unwrap().unwrap();
        assert_eq!(record.plan_id, "plan_4_2");
        assert_eq!(record.created_at, "2026-10-18T10:00:00");
        assert_eq!(record.plan.destination, "Gyeongju");
        assert_eq!(record.plan.ai_hashtags, Some(vec!["#경주".to_string()]));
        assert_eq!(record.plan.nearby_recommendations, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_list_matching_decodes_server_plans() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/plan/matching"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                server_plan(1, "plan_1", "first"),
                server_plan(2, "", "second")
            ])))
            .mount(&server)
            .await;

        let (_dir, service) = plan_service(&server.uri());
        let plans = service.list_matching().await;
        let ids: Vec<_> = plans.iter().map(|p| p.plan_id.as_str()).collect();
        assert_eq!(ids, vec!["plan_1", "2"]);
        assert!(plans.iter().all(|p| p.matching_enabled));
    }

    #[tokio::test]
    async fn test_list_by_owner_unreachable_uses_local() {
        let (_dir, service) = plan_service(&unreachable_url());
        service.cache().store(&plan("a@x.com", "local")).unwrap();

        let plans = service.list_by_owner("a@x.com").await.unwrap();
        assert_eq!(plans.len(), 1);
    }

    #[tokio::test]
    async fn test_list_matching_swallows_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/plan/matching"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (_dir, service) = plan_service(&server.uri());
        assert!(service.list_matching().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_reports_not_found_as_false() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/plan/1"))
            .and(query_param("userId", "a@x.com"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/plan/2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (_dir, service) = plan_service(&server.uri());
        assert!(service.delete("1", "a@x.com").await.unwrap());
        assert!(!service.delete("2", "a@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_offline_mode_never_calls_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (_dir, mut service) = plan_service(&server.uri());
        service.set_offline(true);

        let saved = service.save(&plan("a@x.com", "trip")).await.unwrap();
        assert_eq!(service.get(&saved.plan_id).await.unwrap().unwrap(), saved);
        assert!(service.delete(&saved.plan_id, "a@x.com").await.unwrap());
        assert!(service.list_by_owner("a@x.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/plan/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .mount(&server)
            .await;

        let (_dir, service) = plan_service(&server.uri());
        assert!(service.health_check().await);

        let (_dir, down) = plan_service(&unreachable_url());
        assert!(!down.health_check().await);
    }
}
