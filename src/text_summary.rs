//! Text report builder for stdout and the email body.
//!
//! Columns are fixed width: each value is left-justified, then padded or
//! truncated so every row lines up under the header.

use crate::model::{DeviceRecord, SweepResult};

pub const REPORT_TITLE: &str = "Phones registered via COLO Expressway";
const RESTART_NOTICE: &str =
    "This script will automatically restart these phones, to register them to the HQ Expressway.";

/// Name, Description, DN, IP.
pub const COLUMN_WIDTHS: [usize; 4] = [18, 30, 9, 18];
const RULE_WIDTH: usize = 75;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

impl TextSummary {
    /// Lines joined for use as an email body.
    pub fn body(&self) -> String {
        let mut body = self.lines.join("\n");
        body.push('\n');
        body
    }
}

fn fit(value: &str, width: usize) -> String {
    let clipped: String = value.chars().take(width).collect();
    format!("{:<width$}", clipped, width = width)
}

pub(crate) fn fixed_width_row(columns: [&str; 4]) -> String {
    columns
        .iter()
        .zip(COLUMN_WIDTHS)
        .map(|(value, width)| fit(value, width))
        .collect()
}

pub(crate) fn device_row(device: &DeviceRecord) -> String {
    fixed_width_row([
        device.name.as_str(),
        device.description.as_str(),
        device.dn_or_placeholder(),
        device.ip_or_placeholder(),
    ])
}

/// Build the report from a finished sweep.
pub(crate) fn build_text_summary(result: &SweepResult) -> TextSummary {
    let rule = "=".repeat(RULE_WIDTH);
    let mut lines = vec![REPORT_TITLE.to_string(), String::new()];
    if result.restart_enabled {
        lines.push(RESTART_NOTICE.to_string());
        lines.push(String::new());
    }
    lines.push(rule.clone());
    lines.push(fixed_width_row(["Name", "Description", "DN", "IP"]));
    lines.push(rule);
    lines.extend(result.devices.iter().map(device_row));

    if result.restart_enabled && !result.restarts.is_empty() {
        let failed: Vec<_> = result.failed_restarts().collect();
        lines.push(String::new());
        lines.push(format!(
            "Restarts: {} restarted, {} failed",
            result.restarts.len() - failed.len(),
            failed.len()
        ));
        for f in failed {
            lines.push(format!("  FAILED {}: {}", f.name, f.detail));
        }
    }

    TextSummary { lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RestartOutcome;

    fn device(name: &str, desc: &str, dn: Option<&str>, ip: Option<&str>) -> DeviceRecord {
        DeviceRecord {
            name: name.into(),
            description: desc.into(),
            directory_number: dn.map(Into::into),
            ip_address: ip.map(Into::into),
            node: None,
            status: None,
        }
    }

    fn result(devices: Vec<DeviceRecord>, restart_enabled: bool) -> SweepResult {
        SweepResult {
            timestamp_utc: "2026-10-19T08:00:00Z".into(),
            server: "ucm".into(),
            target_ip: "10.0.0.5".into(),
            restart_enabled,
            total_devices_found: Some(devices.len() as u32),
            devices,
            restarts: Vec::new(),
            emailed: false,
        }
    }

    #[test]
    fn header_only_for_no_devices() {
        let summary = build_text_summary(&result(Vec::new(), false));
        assert_eq!(
            summary.lines,
            vec![
                REPORT_TITLE.to_string(),
                String::new(),
                "=".repeat(75),
                format!("{:18}{:30}{:9}{:18}", "Name", "Description", "DN", "IP"),
                "=".repeat(75),
            ]
        );
    }

    #[test]
    fn one_row_per_device_in_order() {
        let devices = vec![
            device("SEP000000000001", "Lobby", Some("1001"), Some("10.0.0.5")),
            device("SEP000000000002", "Front desk", Some("1002"), Some("10.0.0.5")),
            device("SEP000000000003", "Warehouse", Some("1003"), Some("10.0.0.5")),
        ];
        let summary = build_text_summary(&result(devices, false));
        let rows = &summary.lines[5..];
        assert_eq!(rows.len(), 3);
        assert!(rows[0].starts_with("SEP000000000001"));
        assert!(rows[1].starts_with("SEP000000000002"));
        assert!(rows[2].starts_with("SEP000000000003"));
    }

    #[test]
    fn columns_pad_and_truncate_to_header() {
        let row = device_row(&device(
            "SEP0123456789ABCDEF01",
            "A description that is much longer than thirty characters",
            Some("1234567890123"),
            Some("192.168.100.200"),
        ));
        assert_eq!(row.chars().count(), 75);
        assert_eq!(&row[0..18], "SEP0123456789ABCDE");
        assert_eq!(&row[18..48], "A description that is much lon");
        assert_eq!(&row[48..57], "123456789");
        assert_eq!(&row[57..75], "192.168.100.200   ");

        let header = fixed_width_row(["Name", "Description", "DN", "IP"]);
        assert_eq!(&header[0..18], "Name              ");
        assert_eq!(&header[48..57], "DN       ");
    }

    #[test]
    fn missing_dn_and_ip_render_placeholder() {
        let row = device_row(&device("SEP000000000009", "", None, None));
        assert_eq!(&row[48..57], "-        ");
        assert_eq!(&row[57..75], "-                 ");
    }

    #[test]
    fn restart_summary_lists_failures() {
        let mut r = result(
            vec![
                device("SEP000000000001", "a", Some("1"), Some("10.0.0.5")),
                device("SEP000000000002", "b", Some("2"), Some("10.0.0.5")),
            ],
            true,
        );
        r.restarts = vec![
            RestartOutcome {
                name: "SEP000000000001".into(),
                ok: true,
                detail: "{uuid}".into(),
            },
            RestartOutcome {
                name: "SEP000000000002".into(),
                ok: false,
                detail: "SOAP fault soapenv:Server: not found".into(),
            },
        ];
        let summary = build_text_summary(&r);
        assert_eq!(summary.lines[2], RESTART_NOTICE);
        assert!(summary.lines.contains(&"Restarts: 1 restarted, 1 failed".to_string()));
        assert_eq!(
            summary.lines.last().unwrap(),
            "  FAILED SEP000000000002: SOAP fault soapenv:Server: not found"
        );
        assert!(summary.body().ends_with('\n'));
    }
}
