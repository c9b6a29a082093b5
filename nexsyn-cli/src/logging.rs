use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::settings::Settings;

const OWN_TARGETS: [&str; 2] = ["nexsyn_client", "nexsyn_cli"];

/// Логи в stderr, чтобы не мешать выводу команд (в том числе `--json`).
pub fn init_logging(settings: &Settings) -> Result<()> {
    let directives = filter_directives(&settings.log_level);
    let filter = EnvFilter::try_new(&directives)
        .map_err(|e| anyhow!("invalid LOG_LEVEL `{}`: {e}", settings.log_level))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(())
}

/// Голый уровень (`debug`) относится только к нашим крейтам, HTTP-стек
/// остаётся на `warn`. Строка с `=` или `,` считается готовой директивой.
fn filter_directives(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }

    let level = if level.is_empty() { "info" } else { level };
    let mut directives = vec!["warn".to_string()];
    directives.extend(OWN_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.join(",")
}
