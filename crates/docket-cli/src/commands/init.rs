use crate::support::{
    COVERAGE_FILE, DIRECTORY_FILE, EVENTS_FILE, GRANTS_FILE, REQUESTS_FILE, SETTINGS_FILE,
    print_json,
};
use docket_engine::EngineSettings;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

pub fn run(dir: String, json_output: bool) {
    match init_layout(&dir) {
        Ok(created) => {
            if json_output {
                print_json(&json!({
                    "action": "init",
                    "dir": dir,
                    "created": created,
                }));
            } else {
                println!("docket init\n  Dir: {dir}");
                if created.is_empty() {
                    println!("  Created: (nothing, already initialized)");
                } else {
                    println!("  Created: {}", created.join(", "));
                }
            }
        }
        Err(message) => {
            eprintln!("error: {message}");
            std::process::exit(1);
        }
    }
}

/// Lay out the workspace directory. Existing files are left untouched;
/// the returned list names what was created.
fn init_layout(dir: &str) -> Result<Vec<String>, String> {
    let root = PathBuf::from(dir);
    if !root.exists() {
        fs::create_dir_all(&root)
            .map_err(|e| format!("failed to create {}: {e}", root.display()))?;
    }
    if !root.is_dir() {
        return Err(format!("init path is not a directory: {}", root.display()));
    }

    let mut created = Vec::new();

    for file in [REQUESTS_FILE, EVENTS_FILE] {
        if touch_empty(&root.join(file))? {
            created.push(file.to_string());
        }
    }

    let settings_path = root.join(SETTINGS_FILE);
    if !settings_path.exists() {
        EngineSettings::default()
            .save(&settings_path)
            .map_err(|e| e.to_string())?;
        created.push(SETTINGS_FILE.to_string());
    }

    for file in [DIRECTORY_FILE, GRANTS_FILE, COVERAGE_FILE] {
        let path = root.join(file);
        if !path.exists() {
            fs::write(&path, "{}\n")
                .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
            created.push(file.to_string());
        }
    }

    Ok(created)
}

fn touch_empty(path: &Path) -> Result<bool, String> {
    if path.exists() {
        return Ok(false);
    }
    fs::write(path, "").map_err(|e| format!("failed to write {}: {e}", path.display()))?;
    Ok(true)
}
