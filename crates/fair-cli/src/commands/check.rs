use std::path::Path;

use fair_core::SorterConfig;

pub fn check(path: &str) -> anyhow::Result<()> {
    let normalized = normalize(Path::new(path))?;
    println!("✓ {path} is valid");
    print!("{normalized}");
    Ok(())
}

/// Parse and validate a sorter config, returning it re-serialized.
pub fn normalize(path: &Path) -> anyhow::Result<String> {
    let config = SorterConfig::from_file(path)?;
    Ok(config.to_toml_string()?)
}
