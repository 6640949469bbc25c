//! Step configuration and on-disk layout.
//!
//! The step file is a flat JSON object. Keys of the form `Step[<n>]` carry
//! reference image paths; everything else is ignored. Dropped images are
//! copied into the staging directory before use.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;

/// Flat key-value step file in the working directory.
pub const STEP_FILE: &str = "steps.json";
/// Dropped images are copied here before they are decoded.
pub const STAGING_DIR: &str = "detect";
/// Ensured to exist at startup.
pub const CACHE_DIR: &str = "cache";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

/// Create the staging and cache directories if they are missing.
pub fn ensure_directories() -> Result<()> {
    for dir in [STAGING_DIR, CACHE_DIR] {
        fs::create_dir_all(dir).with_context(|| format!("creating {dir}/"))?;
    }
    Ok(())
}

/// Create an empty step file if none exists yet.
pub fn ensure_step_file(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::write(path, "{}").with_context(|| format!("creating {}", path.display()))?;
        log::info!("created empty step file at {}", path.display());
    }
    Ok(())
}

/// Load the flat step document. A parse failure of an existing file is an
/// error; it is not silently replaced.
pub fn load_step_config(path: &Path) -> Result<HashMap<String, Value>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

/// Index of a `Step[<n>]` key, if the key has that exact shape.
fn step_index(key: &str) -> Option<u32> {
    key.strip_prefix("Step[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// Highest `Step[<n>]` index present in the document, 0 if none.
pub fn max_step_index(config: &HashMap<String, Value>) -> u32 {
    config.keys().filter_map(|k| step_index(k)).max().unwrap_or(0)
}

/// Collect step values for indices 1..=max, in order.
///
/// A missing intermediate index is skipped silently, so the result can be
/// shorter than the highest index and loses index alignment. That matches the
/// historical step-file behavior; callers must not assume the list is gapless.
pub fn derive_step_list(config: &HashMap<String, Value>) -> Vec<String> {
    let max = max_step_index(config);
    (1..=max)
        .filter_map(|i| config.get(&format!("Step[{i}]")))
        .filter_map(|v| v.as_str().map(str::to_owned))
        .collect()
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Copy a dropped image into the staging directory, creating it on demand.
/// Only files with a recognized image extension are accepted.
pub fn stage_image(source: &Path) -> Result<PathBuf> {
    anyhow::ensure!(source.is_file(), "{} is not a file", source.display());
    anyhow::ensure!(
        is_image_file(source),
        "{} does not have an image extension",
        source.display()
    );

    fs::create_dir_all(STAGING_DIR).with_context(|| format!("creating {STAGING_DIR}/"))?;
    let file_name = source
        .file_name()
        .with_context(|| format!("{} has no file name", source.display()))?;
    let destination = Path::new(STAGING_DIR).join(file_name);
    fs::copy(source, &destination).with_context(|| {
        format!(
            "copying {} to {}",
            source.display(),
            destination.display()
        )
    })?;
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_from(value: Value) -> HashMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn step_index_parses_exact_shape_only() {
        assert_eq!(step_index("Step[1]"), Some(1));
        assert_eq!(step_index("Step[42]"), Some(42));
        assert_eq!(step_index("Step[]"), None);
        assert_eq!(step_index("Step[x]"), None);
        assert_eq!(step_index("step[1]"), None);
        assert_eq!(step_index("Step[1] "), None);
    }

    #[test]
    fn missing_intermediate_index_shortens_the_list() {
        let config = config_from(json!({
            "Step[1]": "a.png",
            "Step[3]": "c.png",
        }));

        assert_eq!(max_step_index(&config), 3);
        // Index 2 is absent, so only "a.png" survives; the derived list does
        // not preserve index alignment.
        assert_eq!(derive_step_list(&config), vec!["a.png".to_string()]);
    }

    #[test]
    fn contiguous_steps_come_out_in_order() {
        let config = config_from(json!({
            "Step[2]": "b.png",
            "Step[1]": "a.png",
            "Step[3]": "c.png",
            "Delay": 500,
            "Name": "demo",
        }));

        assert_eq!(
            derive_step_list(&config),
            vec!["a.png".to_string(), "b.png".to_string(), "c.png".to_string()]
        );
    }

    #[test]
    fn empty_document_yields_no_steps() {
        let config = config_from(json!({}));
        assert_eq!(max_step_index(&config), 0);
        assert!(derive_step_list(&config).is_empty());
    }

    #[test]
    fn non_string_step_values_are_skipped() {
        let config = config_from(json!({
            "Step[1]": 7,
            "Step[2]": "b.png",
        }));
        assert_eq!(derive_step_list(&config), vec!["b.png".to_string()]);
    }

    #[test]
    fn image_extension_filter_is_case_insensitive() {
        assert!(is_image_file(Path::new("shot.PNG")));
        assert!(is_image_file(Path::new("photo.jpeg")));
        assert!(is_image_file(Path::new("anim.gif")));
        assert!(!is_image_file(Path::new("notes.txt")));
        assert!(!is_image_file(Path::new("archive.tar.gz")));
        assert!(!is_image_file(Path::new("no_extension")));
    }
}
