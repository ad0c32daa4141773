use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder rendered when a device reports no line or no address.
pub const MISSING_FIELD: &str = "-";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub server: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub axl_version: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
    pub target_ip: String,
    pub restart_enabled: bool,
    pub mail: Option<MailSettings>,
}

impl RunConfig {
    pub fn ris_url(&self) -> String {
        format!(
            "https://{}:8443/realtimeservice2/services/RISService70",
            self.server
        )
    }

    pub fn axl_url(&self) -> String {
        format!("https://{}:8443/axl/", self.server)
    }

    pub fn selection_criteria(&self) -> SelectionCriteria {
        SelectionCriteria::by_ipv4(&self.target_ip)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailSettings {
    pub from: String,
    pub to: String,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub starttls: bool,
    pub subject: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// `CmSelectionCriteria` for a RisPort70 `selectCmDeviceExt` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SelectionCriteria {
    pub max_returned_devices: u32,
    pub device_class: String,
    pub model: String,
    pub status: String,
    pub node_name: String,
    pub select_by: String,
    pub select_items: Vec<String>,
    pub protocol: String,
    pub download_status: String,
}

impl SelectionCriteria {
    /// Phones of any model whose registration address is `ip`.
    pub fn by_ipv4(ip: &str) -> Self {
        Self {
            max_returned_devices: 1000,
            device_class: "Phone".into(),
            model: "255".into(),
            status: "Any".into(),
            node_name: String::new(),
            select_by: "IPV4Address".into(),
            select_items: vec![ip.to_string()],
            protocol: "Any".into(),
            download_status: "Any".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub name: String,
    pub description: String,
    pub directory_number: Option<String>,
    pub ip_address: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl DeviceRecord {
    pub fn dn_or_placeholder(&self) -> &str {
        self.directory_number.as_deref().unwrap_or(MISSING_FIELD)
    }

    pub fn ip_or_placeholder(&self) -> &str {
        self.ip_address.as_deref().unwrap_or(MISSING_FIELD)
    }
}

/// Flattened result of one status query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOutcome {
    pub devices: Vec<DeviceRecord>,
    /// Device entries in the response, including ones skipped for lacking a name.
    pub items_returned: usize,
    pub total_devices_found: Option<u32>,
    pub state_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartOutcome {
    pub name: String,
    pub ok: bool,
    /// Returned UUID on success, error text on failure.
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResult {
    pub timestamp_utc: String,
    pub server: String,
    pub target_ip: String,
    pub restart_enabled: bool,
    pub total_devices_found: Option<u32>,
    pub devices: Vec<DeviceRecord>,
    pub restarts: Vec<RestartOutcome>,
    pub emailed: bool,
}

impl SweepResult {
    pub fn failed_restarts(&self) -> impl Iterator<Item = &RestartOutcome> {
        self.restarts.iter().filter(|r| !r.ok)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Query,
    Restart,
    Mail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SweepEvent {
    PhaseStarted {
        phase: Phase,
    },
    DeviceFound {
        device: DeviceRecord,
    },
    RestartIssued {
        outcome: RestartOutcome,
    },
    /// The finished report, before it is mailed.
    ReportReady {
        lines: Vec<String>,
    },
    Info(InfoEvent),
}

/// Structured info events emitted by the engine and consumed by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InfoEvent {
    Truncated { returned: usize, total: u32 },
    MailSent { recipients: String },
    MailSkipped,
}

impl InfoEvent {
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Truncated { returned, total } => format!(
                "Query returned {} of {} matching devices (page size limit)",
                returned, total
            ),
            InfoEvent::MailSent { recipients } => format!("Report emailed to {}", recipients),
            InfoEvent::MailSkipped => "Email disabled, report not sent".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criteria_target_single_ip() {
        let c = SelectionCriteria::by_ipv4("10.20.30.40");
        assert_eq!(c.max_returned_devices, 1000);
        assert_eq!(c.select_by, "IPV4Address");
        assert_eq!(c.select_items, vec!["10.20.30.40".to_string()]);
        assert_eq!(c.device_class, "Phone");
        assert_eq!(c.model, "255");
    }

    #[test]
    fn missing_fields_use_placeholder() {
        let d = DeviceRecord {
            name: "SEP001122334455".into(),
            description: String::new(),
            directory_number: None,
            ip_address: Some("10.1.1.1".into()),
            node: None,
            status: None,
        };
        assert_eq!(d.dn_or_placeholder(), "-");
        assert_eq!(d.ip_or_placeholder(), "10.1.1.1");
    }
}
