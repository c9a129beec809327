pub mod plan;
pub mod session;

use std::path::PathBuf;

use anyhow::Result;
use travelmate_core::SessionContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Status,
    Login {
        email: Option<String>,
        admin: bool,
        remember: bool,
    },
    Logout,
    Profile,
    Nickname {
        name: String,
    },
    Plan(PlanAction),
    Offline {
        enabled: bool,
    },
    Health,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    Save { file: PathBuf },
    Get { id: String },
    List { owner: Option<String> },
    Matching,
    Delete { id: String, owner: Option<String> },
}

/// Run `action` against the session context
pub async fn handle(action: Action, ctx: &mut SessionContext) -> Result<()> {
    match action {
        Action::Status => session::status(ctx),
        Action::Login {
            email,
            admin,
            remember,
        } => session::login(ctx, email, admin, remember).await,
        Action::Logout => session::logout(ctx),
        Action::Profile => session::profile(ctx).await,
        Action::Nickname { name } => session::nickname(ctx, name).await,
        Action::Offline { enabled } => session::offline(ctx, enabled),
        Action::Health => plan::health(ctx).await,
        Action::Plan(plan_action) => plan::handle(plan_action, ctx).await,
    }
}
