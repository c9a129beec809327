use anyhow::{anyhow, Context, Result};
use travelmate_core::models::TravelPlan;
use travelmate_core::SessionContext;

use super::PlanAction;

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// The explicit owner, or the signed-in user's email.
fn resolve_owner(ctx: &SessionContext, owner: Option<String>) -> Result<String> {
    owner
        .or_else(|| ctx.session().user().map(|user| user.email.clone()))
        .ok_or_else(|| anyhow!("No owner given and not signed in; pass --owner"))
}

pub async fn handle(action: PlanAction, ctx: &mut SessionContext) -> Result<()> {
    let result = run(action, ctx).await;
    ctx.pump_events();
    result
}

async fn run(action: PlanAction, ctx: &SessionContext) -> Result<()> {
    match action {
        PlanAction::Save { file } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read plan file: {}", file.display()))?;
            let mut plan: TravelPlan = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse plan file: {}", file.display()))?;
            if plan.user_id.is_empty() {
                plan.user_id = resolve_owner(ctx, None)?;
            }

            let record = ctx.plans().save(&plan).await?;
            print_json(&record)
        }
        PlanAction::Get { id } => match ctx.plans().get(&id).await? {
            Some(record) => print_json(&record),
            None => Err(anyhow!("Plan not found: {}", id)),
        },
        PlanAction::List { owner } => {
            let owner = resolve_owner(ctx, owner)?;
            print_json(&ctx.plans().list_by_owner(&owner).await?)
        }
        PlanAction::Matching => print_json(&ctx.plans().list_matching().await),
        PlanAction::Delete { id, owner } => {
            let owner = resolve_owner(ctx, owner)?;
            if ctx.plans().delete(&id, &owner).await? {
                println!("Deleted {}", id);
                Ok(())
            } else {
                Err(anyhow!("Plan not found: {}", id))
            }
        }
    }
}

pub async fn health(ctx: &SessionContext) -> Result<()> {
    if ctx.plans().health_check().await {
        println!("ok: {}", ctx.config().api_base_url);
        Ok(())
    } else {
        Err(anyhow!("Plan service unreachable at {}", ctx.config().api_base_url))
    }
}
