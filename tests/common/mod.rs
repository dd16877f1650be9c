//! Common test utilities for finetune-gateway E2E tests

#[allow(dead_code)]
pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::*;

use finetune_gateway::{Config, Gateway};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Build a gateway whose standard pipeline runs the given scripts with `sh`
///
/// `smart` and `finetune` become `generate_jsonl_smart.py` and
/// `prepare_finetune_dataset.py` in a temp scripts directory. Extra
/// environment overrides are applied through `Config::from_lookup`.
pub async fn create_script_gateway(
    smart: &str,
    finetune: &str,
    overrides: &[(&str, &str)],
) -> (Arc<Gateway>, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let scripts = temp_dir.path().join("scripts");
    std::fs::create_dir(&scripts).expect("Failed to create scripts dir");
    write_script(&scripts, "generate_jsonl_smart.py", smart);
    write_script(&scripts, "prepare_finetune_dataset.py", finetune);

    let mut env: HashMap<String, String> = HashMap::from([
        ("PYTHON_PATH".to_string(), "sh".to_string()),
        (
            "SCRIPTS_DIR".to_string(),
            scripts.to_string_lossy().into_owned(),
        ),
        (
            "UPLOAD_DIR".to_string(),
            temp_dir.path().join("uploads").to_string_lossy().into_owned(),
        ),
        ("HOST".to_string(), "127.0.0.1".to_string()),
        ("PORT".to_string(), "0".to_string()),
    ]);
    for (key, value) in overrides {
        env.insert(key.to_string(), value.to_string());
    }

    let config = Config::from_lookup(|key| env.get(key).cloned()).expect("Invalid test config");
    let gateway = Gateway::new(config).await.expect("Failed to create gateway");
    (Arc::new(gateway), temp_dir)
}

fn write_script(dir: &Path, name: &str, body: &str) {
    let script = format!("{ARG_PARSER}\n{body}\n");
    std::fs::write(dir.join(name), script).expect("Failed to write script");
}
