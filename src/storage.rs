use crate::model::SweepResult;
use anyhow::{Context, Result};
use std::path::Path;

/// Write the sweep result as pretty JSON, creating parent directories.
pub fn export_json(path: &Path, result: &SweepResult) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create export directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(result).context("serialize sweep result")?;
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeviceRecord, RestartOutcome};

    #[test]
    fn export_writes_readable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sweep.json");
        let result = SweepResult {
            timestamp_utc: "2026-10-19T08:00:00Z".into(),
            server: "ucm-pub".into(),
            target_ip: "10.0.0.5".into(),
            restart_enabled: true,
            total_devices_found: Some(1),
            devices: vec![DeviceRecord {
                name: "SEP001122334455".into(),
                description: "Lobby".into(),
                directory_number: None,
                ip_address: Some("10.0.0.5".into()),
                node: Some("cucm-sub1".into()),
                status: Some("Registered".into()),
            }],
            restarts: vec![RestartOutcome {
                name: "SEP001122334455".into(),
                ok: true,
                detail: "{uuid}".into(),
            }],
            emailed: true,
        };

        export_json(&path, &result).unwrap();
        let back: SweepResult =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.devices, result.devices);
        assert_eq!(back.restarts, result.restarts);
        assert!(back.emailed);
    }
}
