use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;

use crate::cli::actions::{Action, PlanAction};

fn owned(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.get_one::<String>(id).cloned()
}

fn required(matches: &ArgMatches, id: &str) -> Result<String> {
    owned(matches, id).ok_or_else(|| anyhow!("missing required argument: {}", id))
}

fn plan_handler(matches: &ArgMatches) -> Result<PlanAction> {
    let (name, sub_m) = matches.subcommand().context("missing plan subcommand")?;
    Ok(match name {
        "save" => PlanAction::Save {
            file: sub_m
                .get_one::<PathBuf>("file")
                .cloned()
                .ok_or_else(|| anyhow!("missing required argument: file"))?,
        },
        "get" => PlanAction::Get {
            id: required(sub_m, "id")?,
        },
        "list" => PlanAction::List {
            owner: owned(sub_m, "owner"),
        },
        "matching" => PlanAction::Matching,
        "delete" => PlanAction::Delete {
            id: required(sub_m, "id")?,
            owner: owned(sub_m, "owner"),
        },
        other => return Err(anyhow!("unknown plan subcommand: {}", other)),
    })
}

pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let (name, sub_m) = matches.subcommand().context("missing subcommand")?;
    Ok(match name {
        "status" => Action::Status,
        "login" => Action::Login {
            email: owned(sub_m, "email"),
            admin: sub_m.get_flag("admin"),
            remember: sub_m.get_flag("remember"),
        },
        "logout" => Action::Logout,
        "profile" => Action::Profile,
        "nickname" => Action::Nickname {
            name: required(sub_m, "name")?,
        },
        "plan" => Action::Plan(plan_handler(sub_m)?),
        "offline" => Action::Offline {
            enabled: required(sub_m, "mode")? == "on",
        },
        "health" => Action::Health,
        other => return Err(anyhow!("unknown subcommand: {}", other)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    fn action(args: &[&str]) -> Action {
        let mut argv = vec!["travelmate"];
        argv.extend_from_slice(args);
        handler(&commands::new().get_matches_from(argv)).unwrap()
    }

    #[test]
    fn test_dispatch_session_commands() {
        assert_eq!(action(&["status"]), Action::Status);
        assert_eq!(action(&["logout"]), Action::Logout);
        assert_eq!(
            action(&["login", "--admin"]),
            Action::Login {
                email: None,
                admin: true,
                remember: false
            }
        );
        assert_eq!(
            action(&["nickname", "kim"]),
            Action::Nickname { name: "kim".into() }
        );
        assert_eq!(action(&["offline", "on"]), Action::Offline { enabled: true });
        assert_eq!(action(&["offline", "off"]), Action::Offline { enabled: false });
    }

    #[test]
    fn test_dispatch_plan_commands() {
        assert_eq!(
            action(&["plan", "save", "trip.json"]),
            Action::Plan(PlanAction::Save {
                file: PathBuf::from("trip.json")
            })
        );
        assert_eq!(
            action(&["plan", "list", "--owner", "b@x.com"]),
            Action::Plan(PlanAction::List {
                owner: Some("b@x.com".into())
            })
        );
        assert_eq!(
            action(&["plan", "delete", "plan_1"]),
            Action::Plan(PlanAction::Delete {
                id: "plan_1".into(),
                owner: None
            })
        );
        assert_eq!(action(&["plan", "matching"]), Action::Plan(PlanAction::Matching));
    }
}
