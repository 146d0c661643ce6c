use std::path::PathBuf;

use crate::error::{Result, TallyError};
use crate::importer::write_template;
use crate::settings::expand_tilde;

pub fn run(output: Option<&str>) -> Result<()> {
    let Some(output) = output else {
        return write_template(std::io::stdout().lock());
    };

    let path = PathBuf::from(expand_tilde(output));
    if path.exists() {
        return Err(TallyError::Other(format!(
            "{} already exists, not overwriting",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_template(std::fs::File::create(&path)?)?;
    println!("Wrote template to {}", path.display());
    Ok(())
}
