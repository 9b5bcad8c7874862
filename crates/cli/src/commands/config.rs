use serde::Serialize;

use super::Context;
use crate::config::Config;
use crate::error::CliError;
use crate::output::print_json;
use crate::OutputFormat;

#[derive(Serialize)]
struct EffectiveConfig<'a> {
    store_root: String,
    config_path: String,
    config_loaded: bool,
    #[serde(flatten)]
    config: &'a Config,
}

/// Print the settings this invocation resolved to. Never opens the store.
pub(crate) fn cmd_config(ctx: &Context) -> Result<(), CliError> {
    let s = &ctx.settings;
    match ctx.output {
        OutputFormat::Json => print_json(&EffectiveConfig {
            store_root: s.store_root.display().to_string(),
            config_path: s.config_path.display().to_string(),
            config_loaded: s.config_loaded,
            config: &s.config,
        }),
        OutputFormat::Text => {
            let source = if s.config_loaded { "" } else { " (not found, using defaults)" };
            println!("# store root: {}", s.store_root.display());
            println!("# config: {}{}", s.config_path.display(), source);
            let text = toml::to_string_pretty(&s.config).map_err(|e| {
                CliError::failed(1, "internal", format!("failed to render config: {}", e))
            })?;
            print!("{}", text);
        }
    }
    Ok(())
}
