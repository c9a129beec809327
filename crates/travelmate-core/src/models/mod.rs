//! Data models shared across the crate.
//!
//! - `StoredUser`, `UserPatch`: the cached user record and partial updates
//! - `LoginGrant`, `Profile`, `ProfileUpdate`: identity-service payloads
//! - `TravelPlan`, `PlanRecord`, `PlanRequest`, `PlanResponse`: travel-plan writes and reads

pub mod plan;
pub mod user;

pub use plan::{Author, MatchingInfo, PlanRecord, PlanRequest, PlanResponse, RecommendedPlace, ScheduleItem, TravelPlan};
pub use user::{LoginGrant, Profile, ProfileUpdate, StoredUser, UserPatch, ADMIN_ROLE};
