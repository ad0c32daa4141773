use crate::engine::soap::{self, SoapClient, SoapError};
use crate::engine::xml::Element;
use crate::engine::DeviceStatusSource;
use crate::model::{DeviceRecord, QueryOutcome, RunConfig, SelectionCriteria};
use async_trait::async_trait;

const RIS_NS: &str = "http://schemas.cisco.com/ast/soap";
const SELECT_ACTION: &str = "selectCmDeviceExt";

/// RisPort70 real-time status client.
pub struct RisClient {
    soap: SoapClient,
}

impl RisClient {
    pub fn new(cfg: &RunConfig) -> Result<Self, SoapError> {
        Ok(Self {
            soap: SoapClient::new(cfg.ris_url(), cfg)?,
        })
    }

    pub async fn select_cm_device_ext(
        &self,
        criteria: &SelectionCriteria,
        state_info: &str,
    ) -> Result<QueryOutcome, SoapError> {
        let body = self
            .soap
            .call(SELECT_ACTION, select_request(criteria, state_info))
            .await?;
        parse_select_response(&body)
    }
}

#[async_trait]
impl DeviceStatusSource for RisClient {
    async fn select_devices(&self, criteria: &SelectionCriteria) -> Result<QueryOutcome, SoapError> {
        self.select_cm_device_ext(criteria, "").await
    }

    fn dump_history(&self) {
        self.soap.dump_history();
    }
}

pub(crate) fn select_request(criteria: &SelectionCriteria, state_info: &str) -> String {
    let items: String = criteria
        .select_items
        .iter()
        .map(|i| format!("<soap:item>{}</soap:item>", soap::text_element("soap:Item", i)))
        .collect();

    let body = [
        "<soap:selectCmDeviceExt>".to_string(),
        soap::text_element("soap:StateInfo", state_info),
        "<soap:CmSelectionCriteria>".to_string(),
        soap::text_element(
            "soap:MaxReturnedDevices",
            &criteria.max_returned_devices.to_string(),
        ),
        soap::text_element("soap:DeviceClass", &criteria.device_class),
        soap::text_element("soap:Model", &criteria.model),
        soap::text_element("soap:Status", &criteria.status),
        soap::text_element("soap:NodeName", &criteria.node_name),
        soap::text_element("soap:SelectBy", &criteria.select_by),
        format!("<soap:SelectItems>{}</soap:SelectItems>", items),
        soap::text_element("soap:Protocol", &criteria.protocol),
        soap::text_element("soap:DownloadStatus", &criteria.download_status),
        "</soap:CmSelectionCriteria>".to_string(),
        "</soap:selectCmDeviceExt>".to_string(),
    ]
    .concat();

    soap::envelope(&[("soap", RIS_NS)], &body)
}

/// Flatten `CmNodes/item/CmDevices/item` into records, node order first.
pub(crate) fn parse_select_response(body: &Element) -> Result<QueryOutcome, SoapError> {
    let result = body
        .find("SelectCmDeviceResult")
        .ok_or(SoapError::MissingElement("SelectCmDeviceResult"))?;

    let total_devices_found = result
        .child_text("TotalDevicesFound")
        .and_then(|t| t.parse().ok());
    let state_info = body
        .find("selectCmDeviceReturn")
        .and_then(|r| r.child_text("StateInfo"))
        .map(str::to_string);

    let mut devices = Vec::new();
    let mut items_returned = 0;
    if let Some(nodes) = result.child("CmNodes") {
        for node in nodes.children_named("item") {
            let node_name = node.child_text("Name");
            let Some(cm_devices) = node.child("CmDevices") else {
                continue;
            };
            for item in cm_devices.children_named("item") {
                items_returned += 1;
                if let Some(record) = device_record(item, node_name) {
                    devices.push(record);
                }
            }
        }
    }

    Ok(QueryOutcome {
        devices,
        items_returned,
        total_devices_found,
        state_info,
    })
}

fn device_record(item: &Element, node: Option<&str>) -> Option<DeviceRecord> {
    let Some(name) = item.child_text("Name") else {
        tracing::warn!(node = node.unwrap_or("?"), "skipping device entry without a name");
        return None;
    };

    let directory_number = first_item_text(item, "LinesStatus", "DirectoryNumber");
    if directory_number.is_none() {
        tracing::warn!(device = name, "device reports no line, using placeholder DN");
    }
    let ip_address = first_item_text(item, "IPAddress", "IP");
    if ip_address.is_none() {
        tracing::warn!(device = name, "device reports no IP address, using placeholder");
    }

    Some(DeviceRecord {
        name: name.to_string(),
        description: item.child_raw_text("Description").unwrap_or_default().to_string(),
        directory_number,
        ip_address,
        node: node.map(str::to_string),
        status: item.child_text("Status").map(str::to_string),
    })
}

/// Text of `field` in the first `item` under `list`.
fn first_item_text(parent: &Element, list: &str, field: &str) -> Option<String> {
    parent
        .child(list)?
        .children_named("item")
        .next()?
        .child_text(field)
        .map(str::to_string)
}
