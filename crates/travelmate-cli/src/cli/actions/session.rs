use std::io::{self, Write};

use anyhow::{bail, Result};
use serde_json::json;
use tracing::{info, warn};
use travelmate_core::auth::Keychain;
use travelmate_core::models::ProfileUpdate;
use travelmate_core::{Config, SessionContext};

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn prompt_email() -> Result<String> {
    print!("Email: ");
    io::stdout().flush()?;

    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    Ok(email.trim().to_string())
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    Ok(password)
}

pub fn status(ctx: &SessionContext) -> Result<()> {
    let session = ctx.session().session();
    let slot = ctx.session().bearer_slot()?;
    let latest = ctx.plans().cache().latest()?.map(|cached| {
        json!({
            "planId": cached.data.plan_id,
            "title": cached.data.plan.title,
            "saved": cached.age_display(),
        })
    });

    print_json(&json!({
        "state": format!("{:?}", ctx.session().state()),
        "isAuthenticated": session.is_authenticated,
        "isAdmin": session.is_admin,
        "user": session.user,
        "tokenSource": slot.map(|s| s.to_string()),
        "apiBaseUrl": ctx.config().api_base_url,
        "offline": ctx.config().offline_mode,
        "lastLocalPlan": latest,
    }))
}

pub async fn login(
    ctx: &mut SessionContext,
    email: Option<String>,
    admin: bool,
    remember: bool,
) -> Result<()> {
    let email = match email.or_else(|| ctx.config().last_email.clone()) {
        Some(email) => email,
        None => prompt_email()?,
    };
    if email.is_empty() {
        bail!("Email required");
    }

    let remembered = Keychain::remembered_password(&email);
    let from_keychain = remembered.is_some();
    let password = match remembered {
        Some(password) => password,
        None => prompt_password()?,
    };
    if password.is_empty() {
        bail!("Password required");
    }

    let state = match ctx.login(&email, &password, admin).await {
        Ok(state) => state,
        Err(e) => {
            if from_keychain {
                warn!("Login with remembered password failed, forgetting it");
                if let Err(forget) = Keychain::forget_password(&email) {
                    warn!(error = %forget, "Failed to forget remembered password");
                }
            }
            return Err(e);
        }
    };

    if remember && !from_keychain {
        if let Err(e) = Keychain::remember_password(&email, &password) {
            warn!(error = %e, "Failed to remember password");
        }
    }
    if let Err(e) = Config::update_saved(|config| config.last_email = Some(email.clone())) {
        warn!(error = %e, "Failed to save last used email");
    }

    info!(?state, "Login complete");
    println!("Signed in as {} ({:?})", email, state);
    Ok(())
}

pub fn logout(ctx: &mut SessionContext) -> Result<()> {
    ctx.logout()?;
    println!("Signed out");
    Ok(())
}

pub async fn profile(ctx: &mut SessionContext) -> Result<()> {
    if !ctx.session().is_authenticated() {
        bail!("Not signed in. Run `travelmate login` first.");
    }

    let fetched = ctx.client().fetch_my_profile().await;
    ctx.pump_events();
    print_json(&fetched?)
}

pub async fn nickname(ctx: &mut SessionContext, name: String) -> Result<()> {
    if !ctx.session().is_authenticated() {
        bail!("Not signed in. Run `travelmate login` first.");
    }

    let update = ProfileUpdate {
        nickname: Some(name),
        ..Default::default()
    };
    ctx.update_profile(&update).await?;
    print_json(&ctx.session().user())
}

pub fn offline(ctx: &mut SessionContext, enabled: bool) -> Result<()> {
    Config::update_saved(|config| config.offline_mode = enabled)?;
    ctx.set_offline(enabled);
    println!("Offline mode {}", if enabled { "on" } else { "off" });
    Ok(())
}
