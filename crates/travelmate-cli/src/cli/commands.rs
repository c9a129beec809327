use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};

fn plan_command() -> Command {
    Command::new("plan")
        .about("Save, read, list and delete travel plans")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("save")
                .about("Save a travel plan from a JSON file")
                .arg(
                    Arg::new("file")
                        .help("Path to the plan JSON")
                        .required(true)
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            Command::new("get")
                .about("Show one plan")
                .arg(Arg::new("id").help("Plan id").required(true)),
        )
        .subcommand(
            Command::new("list")
                .about("List plans owned by a user, remote and locally saved")
                .arg(
                    Arg::new("owner")
                        .long("owner")
                        .help("Owner id, defaults to the signed-in user"),
                ),
        )
        .subcommand(Command::new("matching").about("List plans open for travel-mate matching"))
        .subcommand(
            Command::new("delete")
                .about("Delete a plan")
                .arg(Arg::new("id").help("Plan id").required(true))
                .arg(
                    Arg::new("owner")
                        .long("owner")
                        .help("Owner id, defaults to the signed-in user"),
                ),
        )
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("travelmate")
        .about("TravelMate session and travel plans")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .help("API base URL, overrides the config file")
                .env("TRAVELMATE_API_URL")
                .global(true),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Log more; repeat for more detail (RUST_LOG takes precedence)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(Command::new("status").about("Show the recovered session"))
        .subcommand(
            Command::new("login")
                .about("Sign in with email and password")
                .arg(
                    Arg::new("email")
                        .short('e')
                        .long("email")
                        .help("Account email, defaults to the last one used"),
                )
                .arg(
                    Arg::new("admin")
                        .long("admin")
                        .help("Use the administrator login endpoint")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("remember")
                        .long("remember")
                        .help("Keep the password in the OS keychain")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("logout").about("Sign out and clear the stored session"))
        .subcommand(Command::new("profile").about("Show the signed-in user's profile"))
        .subcommand(
            Command::new("nickname")
                .about("Change the signed-in user's nickname")
                .arg(Arg::new("name").help("New nickname").required(true)),
        )
        .subcommand(plan_command())
        .subcommand(
            Command::new("offline")
                .about("Turn offline mode on or off")
                .arg(
                    Arg::new("mode")
                        .required(true)
                        .value_parser(["on", "off"]),
                ),
        )
        .subcommand(Command::new("health").about("Check whether the plan service answers"))
}
