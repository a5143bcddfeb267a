use std::env;

const PLAIN_ENVS: [&str; 12] = [
    "RUST_LOG",
    "DUKA_HOST",
    "DUKA_PORT",
    "DUKA_DATABASE_URL",
    "DUKA_APP_URL",
    "DUKA_REALTIME_URL",
    "DUKA_PROVIDER_FEE_BPS",
    "DUKA_PLATFORM_FEE_BPS",
    "DUKA_TOKEN_TTL_HOURS",
    "DUKA_SUBSCRIPTION_CHECK_INTERVAL",
    "DUKA_PAYPACK_URL",
    "DUKA_PAYPACK_WEBHOOK_MODE",
];

/// Only reported as set or not set.
const SECRET_ENVS: [&str; 5] = [
    "DUKA_SESSION_SECRET",
    "DUKA_WEBHOOK_SECRET",
    "DUKA_CRON_SECRET",
    "DUKA_PAYPACK_CLIENT_ID",
    "DUKA_PAYPACK_CLIENT_SECRET",
];

/// The server takes no arguments. Any argument at all prints the help text and the current configuration, and
/// returns `true` so that `main` exits without starting the server.
pub fn handle_command_line_args() -> bool {
    if env::args().len() <= 1 {
        return false;
    }
    println!("\n{}\n", include_str!("./cli-help.txt"));
    println!("Current environment:");
    for name in PLAIN_ENVS {
        let value = match env::var_os(name) {
            Some(v) => v.to_string_lossy().into_owned(),
            None => "Not set".into(),
        };
        println!("  {name:<35} {value}");
    }
    for name in SECRET_ENVS {
        let value = if env::var_os(name).is_some_and(|v| !v.is_empty()) { "Set (hidden)" } else { "Not set" };
        println!("  {name:<35} {value}");
    }
    true
}
