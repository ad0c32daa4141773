//! SOAP 1.1 over HTTPS with Basic auth, shared by the RIS and AXL clients.

use crate::engine::xml::Element;
use crate::model::RunConfig;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::Mutex;
use thiserror::Error;

pub const ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Number of exchanges kept for diagnostics.
const HISTORY_LEN: usize = 2;
/// Longest response body quoted in an error.
const ERROR_BODY_CHARS: usize = 512;

#[derive(Error, Debug)]
pub enum SoapError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("credentials rejected by {url} (HTTP 401)")]
    Unauthorized { url: String },

    #[error("HTTP {status} from {url}: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },

    #[error("SOAP fault {code}: {message}")]
    Fault { code: String, message: String },

    #[error("malformed XML in response: {0}")]
    Xml(String),

    #[error("response is missing <{0}>")]
    MissingElement(&'static str),
}

/// One request/response pair as sent and received on the wire.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub action: String,
    pub request: String,
    pub status: Option<u16>,
    pub response: Option<String>,
}

pub struct SoapClient {
    http: reqwest::Client,
    url: String,
    username: String,
    password: String,
    history: Mutex<VecDeque<Exchange>>,
}

impl SoapClient {
    pub fn new(url: String, cfg: &RunConfig) -> Result<Self, SoapError> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .danger_accept_invalid_certs(cfg.accept_invalid_certs)
            .no_proxy()
            .user_agent(format!("colo-phones/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            url,
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            history: Mutex::new(VecDeque::with_capacity(HISTORY_LEN)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST an envelope and return the response `Body` element.
    ///
    /// A `Fault` in the body wins over the HTTP status, since UCM answers
    /// faults with HTTP 500.
    pub async fn call(&self, action: &str, envelope: String) -> Result<Element, SoapError> {
        tracing::debug!(url = %self.url, action, "sending SOAP request");
        self.record(Exchange {
            action: action.to_string(),
            request: envelope.clone(),
            status: None,
            response: None,
        });

        let resp = self
            .http
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", format!("\"{}\"", action))
            .body(envelope)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        tracing::debug!(status = status.as_u16(), bytes = body.len(), "SOAP response received");
        self.complete_last(status, &body);

        interpret_response(&self.url, status, &body)
    }

    pub fn history(&self) -> Vec<Exchange> {
        self.history
            .lock()
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Log the retained exchanges at error level.
    pub fn dump_history(&self) {
        for ex in self.history() {
            tracing::error!(
                url = %self.url,
                action = %ex.action,
                "SOAP request sent:\n{}",
                ex.request
            );
            match (ex.status, ex.response.as_deref()) {
                (Some(status), Some(body)) => {
                    tracing::error!(status, "SOAP response received:\n{}", body)
                }
                _ => tracing::error!("no response received"),
            }
        }
    }

    fn record(&self, ex: Exchange) {
        if let Ok(mut h) = self.history.lock() {
            if h.len() == HISTORY_LEN {
                h.pop_front();
            }
            h.push_back(ex);
        }
    }

    fn complete_last(&self, status: StatusCode, body: &str) {
        if let Ok(mut h) = self.history.lock() {
            if let Some(last) = h.back_mut() {
                last.status = Some(status.as_u16());
                last.response = Some(body.to_string());
            }
        }
    }
}

pub(crate) fn interpret_response(
    url: &str,
    status: StatusCode,
    body: &str,
) -> Result<Element, SoapError> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(SoapError::Unauthorized {
            url: url.to_string(),
        });
    }

    let http_error = || SoapError::Http {
        url: url.to_string(),
        status: status.as_u16(),
        body: body.chars().take(ERROR_BODY_CHARS).collect(),
    };

    let doc = match Element::parse(body) {
        Ok(doc) => doc,
        Err(_) if !status.is_success() => return Err(http_error()),
        Err(e) => return Err(SoapError::Xml(e)),
    };

    let body_el = doc.children.into_iter().find(|c| c.name == "Body");

    // SOAP 1.1 puts a fault directly under Body.
    if let Some(fault) = body_el.as_ref().and_then(|b| b.child("Fault")) {
        return Err(SoapError::Fault {
            code: fault.child_text("faultcode").unwrap_or("unknown").to_string(),
            message: fault
                .child_text("faultstring")
                .unwrap_or_default()
                .to_string(),
        });
    }
    if !status.is_success() {
        return Err(http_error());
    }

    body_el.ok_or(SoapError::MissingElement("Body"))
}

/// Wrap `body` in a SOAP 1.1 envelope declaring `soapenv` plus `extra_ns`.
pub fn envelope(extra_ns: &[(&str, &str)], body: &str) -> String {
    let mut ns = format!(r#"xmlns:soapenv="{}""#, ENVELOPE_NS);
    for (prefix, uri) in extra_ns {
        ns.push_str(&format!(r#" xmlns:{}="{}""#, prefix, uri));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><soapenv:Envelope {}><soapenv:Header/><soapenv:Body>{}</soapenv:Body></soapenv:Envelope>"#,
        ns, body
    )
}

/// `<tag>value</tag>` with the value escaped.
pub fn text_element(tag: &str, value: &str) -> String {
    format!("<{0}>{1}</{0}>", tag, quick_xml::escape::escape(value))
}
