use crate::engine::soap::{self, SoapClient, SoapError};
use crate::engine::xml::Element;
use crate::engine::PhoneRestarter;
use crate::model::RunConfig;
use async_trait::async_trait;

/// AXL administrative client. Only `restartPhone` is used.
pub struct AxlClient {
    soap: SoapClient,
    version: String,
}

impl AxlClient {
    pub fn new(cfg: &RunConfig) -> Result<Self, SoapError> {
        Ok(Self {
            soap: SoapClient::new(cfg.axl_url(), cfg)?,
            version: cfg.axl_version.clone(),
        })
    }

    /// Ask UCM to restart the named phone. Returns the UUID UCM echoes back.
    pub async fn restart_phone(&self, name: &str) -> Result<String, SoapError> {
        let action = format!("CUCM:DB ver={} restartPhone", self.version);
        let body = self
            .soap
            .call(&action, restart_request(&self.version, name))
            .await?;
        tracing::debug!(url = self.soap.url(), device = name, "restartPhone accepted");
        parse_restart_response(&body)
    }
}

#[async_trait]
impl PhoneRestarter for AxlClient {
    async fn restart_phone(&self, name: &str) -> Result<String, SoapError> {
        AxlClient::restart_phone(self, name).await
    }
}

pub(crate) fn restart_request(version: &str, name: &str) -> String {
    let ns = format!("http://www.cisco.com/AXL/API/{}", version);
    let body = format!(
        "<ns:restartPhone>{}</ns:restartPhone>",
        soap::text_element("name", name)
    );
    soap::envelope(&[("ns", &ns)], &body)
}

pub(crate) fn parse_restart_response(body: &Element) -> Result<String, SoapError> {
    let resp = body
        .find("restartPhoneResponse")
        .ok_or(SoapError::MissingElement("restartPhoneResponse"))?;
    Ok(resp.child_text("return").unwrap_or_default().to_string())
}
