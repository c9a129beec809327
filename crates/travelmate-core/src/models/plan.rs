use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Default matching preference sent when none is given.
const ANY_PREFERENCE: &str = "상관없음";

/// Default preferred language sent when none is given.
const DEFAULT_LANGUAGE: &str = "한국어";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchingInfo {
    #[serde(rename = "preferredGender", default, skip_serializing_if = "Option::is_none")]
    pub preferred_gender: Option<String>,
    #[serde(rename = "preferredAge", default, skip_serializing_if = "Option::is_none")]
    pub preferred_age: Option<String>,
    #[serde(rename = "preferredLanguage", default, skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<String>,
    #[serde(rename = "matchingMemo", default, skip_serializing_if = "Option::is_none")]
    pub matching_memo: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "profileImage", default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub time: String,
    pub place: String,
    pub activity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendedPlace {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// A travel plan as written by the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TravelPlan {
    #[serde(rename = "planId", default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(rename = "userId", default)]
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub destination: String,
    #[serde(rename = "startDate", default)]
    pub start_date: String,
    #[serde(rename = "endDate", default)]
    pub end_date: String,
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub budget: String,
    #[serde(default)]
    pub people: String,
    #[serde(default)]
    pub styles: Vec<String>,
    #[serde(rename = "styleLabels", default)]
    pub style_labels: Vec<String>,
    #[serde(rename = "matchingInfo", default, skip_serializing_if = "Option::is_none")]
    pub matching_info: Option<MatchingInfo>,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub schedules: BTreeMap<String, Vec<ScheduleItem>>,
    #[serde(rename = "aiHashtags", default, skip_serializing_if = "Option::is_none")]
    pub ai_hashtags: Option<Vec<String>>,
    #[serde(
        rename = "nearbyRecommendations",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub nearby_recommendations: Option<Vec<RecommendedPlace>>,
    #[serde(rename = "imageUrl", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "accommodationInfo", default, skip_serializing_if = "Option::is_none")]
    pub accommodation_info: Option<String>,
    #[serde(rename = "transportationInfo", default, skip_serializing_if = "Option::is_none")]
    pub transportation_info: Option<String>,
    #[serde(rename = "extraMemo", default, skip_serializing_if = "Option::is_none")]
    pub extra_memo: Option<String>,
}

/// A travel plan after it has been persisted, remotely or locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRecord {
    #[serde(rename = "planId")]
    pub plan_id: String,
    #[serde(rename = "matchingEnabled", default)]
    pub matching_enabled: bool,
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: String,
    #[serde(flatten)]
    pub plan: TravelPlan,
}

/// Body of `POST /api/plan`.
///
/// The server stores list-valued fields as JSON text, so those are encoded
/// here rather than sent as arrays.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub title: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    pub description: String,
    pub interests: String,
    pub number_of_people: i64,
    pub budget: i64,
    pub preferred_gender: String,
    pub preferred_age_range: String,
    pub preferred_language: String,
    pub matching_note: String,
    pub accommodation_info: String,
    pub transportation_info: String,
    pub extra_memo: String,
    pub matching_enabled: bool,
    pub days: Vec<serde_json::Value>,
    pub styles: String,
    pub style_labels: String,
    pub schedules: String,
    pub ai_hashtags: String,
    pub nearby_recommendations: String,
    pub image_url: String,
}

/// Leading integer of a free-text number field, e.g. "3명" -> 3.
fn leading_int(text: &str) -> Option<i64> {
    let digits: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

impl PlanRequest {
    pub fn from_plan(plan: &TravelPlan) -> Result<Self, serde_json::Error> {
        let matching = plan.matching_info.clone().unwrap_or_default();
        let interests = if plan.style_labels.is_empty() {
            plan.styles.join(",")
        } else {
            plan.style_labels.join(",")
        };

        Ok(Self {
            title: plan.title.clone(),
            location: plan.destination.clone(),
            start_date: plan.start_date.clone(),
            end_date: plan.end_date.clone(),
            description: format!("{} 여행 계획", plan.title),
            interests,
            number_of_people: leading_int(&plan.people).filter(|n| *n > 0).unwrap_or(1),
            budget: leading_int(&plan.budget).unwrap_or(0),
            preferred_gender: matching
                .preferred_gender
                .unwrap_or_else(|| ANY_PREFERENCE.to_string()),
            preferred_age_range: matching
                .preferred_age
                .unwrap_or_else(|| ANY_PREFERENCE.to_string()),
            preferred_language: matching
                .preferred_language
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            matching_note: matching.matching_memo.unwrap_or_default(),
            accommodation_info: plan.accommodation_info.clone().unwrap_or_default(),
            transportation_info: plan.transportation_info.clone().unwrap_or_default(),
            extra_memo: plan.extra_memo.clone().unwrap_or_default(),
            matching_enabled: true,
            days: Vec::new(),
            styles: serde_json::to_string(&plan.styles)?,
            style_labels: serde_json::to_string(&plan.style_labels)?,
            schedules: serde_json::to_string(&plan.schedules)?,
            ai_hashtags: serde_json::to_string(plan.ai_hashtags.as_deref().unwrap_or_default())?,
            nearby_recommendations: serde_json::to_string(
                plan.nearby_recommendations.as_deref().unwrap_or_default(),
            )?,
            image_url: plan.image_url.clone().unwrap_or_default(),
        })
    }
}

/// A plan as the server returns it from create, lookup, and list calls.
///
/// Counts are numbers and list-valued fields come back as the JSON text
/// that `PlanRequest` sent. Dates arrive either as ISO strings or as
/// component arrays depending on the server's date serializer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub start_date: Option<Value>,
    #[serde(default)]
    pub end_date: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub interests: Option<String>,
    #[serde(default)]
    pub budget: Option<i64>,
    #[serde(default)]
    pub number_of_people: Option<i64>,
    #[serde(default)]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub matching_enabled: Option<bool>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub ai_hashtags: Option<String>,
    #[serde(default)]
    pub nearby_recommendations: Option<String>,
    #[serde(default)]
    pub schedules: Option<String>,
}

/// Text form of a date-like value: strings as-is, anything else as JSON.
fn value_text(value: Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
    }
}

/// Decode a list field the server keeps as JSON text. Blank or malformed
/// text yields the default.
fn decode_text<T: DeserializeOwned + Default>(field: &str, raw: Option<&str>) -> T {
    match raw.map(str::trim).filter(|text| !text.is_empty()) {
        None => T::default(),
        Some(text) => serde_json::from_str(text).unwrap_or_else(|e| {
            warn!(field, error = %e, "Ignoring malformed plan field");
            T::default()
        }),
    }
}

impl PlanResponse {
    /// Convert to the client's record shape. The server does not echo the
    /// owner, so the caller supplies it.
    pub fn into_record(self, owner: &str) -> PlanRecord {
        let plan_id = self
            .plan_id
            .filter(|id| !id.is_empty())
            .or_else(|| self.id.map(|id| id.to_string()))
            .unwrap_or_default();
        let created_at = value_text(self.created_at);
        let style_labels = self
            .interests
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .collect();

        let plan = TravelPlan {
            plan_id: None,
            user_id: owner.to_string(),
            title: self.title.unwrap_or_default(),
            destination: self.destination.or(self.location).unwrap_or_default(),
            start_date: value_text(self.start_date),
            end_date: value_text(self.end_date),
            budget: self.budget.unwrap_or(0).to_string(),
            people: self
                .number_of_people
                .map(|n| n.to_string())
                .unwrap_or_default(),
            style_labels,
            schedules: decode_text("schedules", self.schedules.as_deref()),
            ai_hashtags: decode_text("aiHashtags", self.ai_hashtags.as_deref()),
            nearby_recommendations: decode_text(
                "nearbyRecommendations",
                self.nearby_recommendations.as_deref(),
            ),
            image_url: self.image_url.filter(|url| !url.is_empty()),
            ..Default::default()
        };

        PlanRecord {
            plan_id,
            matching_enabled: self.matching_enabled.unwrap_or(false),
            updated_at: created_at.clone(),
            created_at,
            plan,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> TravelPlan {
        TravelPlan {
            user_id: "a@x.com".into(),
            title: "Jeju".into(),
            destination: "Jeju-do".into(),
            start_date: "2026-11-01".into(),
            end_date: "2026-11-03".into(),
            budget: "300000".into(),
            people: "2명".into(),
            styles: vec!["food".into()],
            style_labels: vec!["맛집".into(), "자연".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_request_maps_fields_and_defaults() {
        let req = PlanRequest::from_plan(&sample_plan()).unwrap();
        assert_eq!(req.location, "Jeju-do");
        assert_eq!(req.interests, "맛집,자연");
        assert_eq!(req.number_of_people, 2);
        assert_eq!(req.budget, 300000);
        assert_eq!(req.preferred_gender, ANY_PREFERENCE);
        assert_eq!(req.preferred_language, DEFAULT_LANGUAGE);
        assert_eq!(req.styles, r#"["food"]"#);
        assert_eq!(req.ai_hashtags, "[]");
        assert!(req.matching_enabled);
    }

    #[test]
    fn test_request_people_defaults_to_one() {
        let mut plan = sample_plan();
        plan.people = "several".into();
        plan.style_labels.clear();
        let req = PlanRequest::from_plan(&plan).unwrap();
        assert_eq!(req.number_of_people, 1);
        assert_eq!(req.interests, "food");
    }

    #[test]
    fn test_record_parses_camel_case_response() {
        let raw = r#"{"planId":"42","userId":"a@x.com","title":"Jeju","matchingEnabled":true,
                      "createdAt":"2026-10-01T00:00:00","destination":"Jeju-do"}"#;
        let record: PlanRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.plan_id, "42");
        assert!(record.matching_enabled);
        assert_eq!(record.plan.destination, "Jeju-do");
        assert_eq!(record.plan.plan_id, None);
    }

    fn server_response() -> &'static str {
        r##"{
            "id": 12,
            "location": "Jeju-do",
            "startDate": "2026-11-01",
            "endDate": "2026-11-03",
            "description": "Jeju 여행 계획",
            "interests": "맛집, 자연",
            "title": "Jeju",
            "budget": 300000,
            "destination": null,
            "numberOfPeople": 2,
            "createdAt": "2026-10-01T09:30:00",
            "planId": "plan_12_1",
            "matchingEnabled": true,
            "imageUrl": null,
            "aiHashtags": "[\"#제주\",\"#맛집\"]",
            "nearbyRecommendations": "[{\"name\":\"Seongsan\",\"category\":\"nature\"}]",
            "schedules": "{\"day1\":[{\"time\":\"09:00\",\"place\":\"Airport\",\"activity\":\"arrive\"}]}"
        }"##
    }

    #[test]
    fn test_server_response_decodes_into_record() {
        let response: PlanResponse = serde_json::from_str(server_response()).unwrap();
        let record = response.into_record("a@x.com");

        assert_eq!(record.plan_id, "plan_12_1");
        assert!(record.matching_enabled);
        assert_eq!(record.created_at, "2026-10-01T09:30:00");
        assert_eq!(record.updated_at, record.created_at);

        let plan = &record.plan;
        assert_eq!(plan.user_id, "a@x.com");
        assert_eq!(plan.destination, "Jeju-do");
        assert_eq!(plan.budget, "300000");
        assert_eq!(plan.people, "2");
        assert_eq!(plan.start_date, "2026-11-01");
        assert_eq!(plan.style_labels, vec!["맛집", "자연"]);
        assert_eq!(plan.ai_hashtags.as_deref(), Some(&["#제주".to_string(), "#맛집".to_string()][..]));
        assert_eq!(plan.nearby_recommendations.as_ref().unwrap()[0].name, "Seongsan");
        assert_eq!(plan.schedules["day1"][0].place, "Airport");
        assert_eq!(plan.image_url, None);
        assert_eq!(plan.plan_id, None);
    }

    #[test]
    fn test_server_response_tolerates_bad_text_fields() {
        let raw = r#"{"id": 5, "budget": 0, "schedules": "not json", "aiHashtags": "",
                      "startDate": [2026, 11, 1], "createdAt": [2026, 10, 1, 9, 30]}"#;
        let record = serde_json::from_str::<PlanResponse>(raw)
            .unwrap()
            .into_record("");

        assert_eq!(record.plan_id, "5");
        assert!(!record.matching_enabled);
        assert!(record.plan.schedules.is_empty());
        assert_eq!(record.plan.ai_hashtags, None);
        assert_eq!(record.plan.start_date, "[2026,11,1]");
        assert_eq!(record.created_at, "[2026,10,1,9,30]");
        assert_eq!(record.plan.people, "");
    }

    #[test]
    fn test_response_round_trips_request_encoding() {
        let plan = TravelPlan {
            ai_hashtags: Some(vec!["#경주".into()]),
            ..sample_plan()
        };
        let req = PlanRequest::from_plan(&plan).unwrap();
        let echoed = serde_json::json!({
            "id": 3,
            "planId": "plan_3",
            "title": req.title,
            "location": req.location,
            "interests": req.interests,
            "budget": req.budget,
            "numberOfPeople": req.number_of_people,
            "aiHashtags": req.ai_hashtags,
            "schedules": req.schedules,
        });

        let record = serde_json::from_value::<PlanResponse>(echoed)
            .unwrap()
            .into_record(&plan.user_id);
        assert_eq!(record.plan.destination, plan.destination);
        assert_eq!(record.plan.style_labels, plan.style_labels);
        assert_eq!(record.plan.ai_hashtags, plan.ai_hashtags);
        assert_eq!(record.plan.budget, plan.budget);
        assert_eq!(record.plan.people, "2");
    }
}
