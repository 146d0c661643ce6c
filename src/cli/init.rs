use std::path::Path;

use crate::categorizer::starter_rules;
use crate::error::{Result, TallyError};
use crate::settings::{save_settings, Settings};

/// Does not read the existing settings, so `--force` can repair a broken file.
pub fn run(settings_file: &Path, force: bool) -> Result<()> {
    if settings_file.exists() && !force {
        return Err(TallyError::Other(format!(
            "{} already exists (use --force to overwrite)",
            settings_file.display()
        )));
    }

    let settings = Settings {
        rules_file: Some("rules.json".to_string()),
        ..Settings::default()
    };
    save_settings(settings_file, &settings)?;
    println!("Wrote settings to {}", settings_file.display());

    if let Some(rules_path) = settings.rules_path(settings_file) {
        if rules_path.exists() && !force {
            println!("Keeping existing rules at {}", rules_path.display());
        } else {
            let json = serde_json::to_string_pretty(&starter_rules())?;
            std::fs::write(&rules_path, format!("{json}\n"))?;
            println!("Wrote starter rules to {}", rules_path.display());
        }
    }
    Ok(())
}
