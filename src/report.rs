use serde::Serialize;
use std::collections::BTreeMap;

/// Canonical error report posted to the collection endpoint.
///
/// Both exception and message reports share this schema. Every field is
/// always serialized; field names match the collector's JSON contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub stack: String,
    pub source: String,
    pub line: u32,
    pub col: u32,
    pub fingerprint: String,
    pub url: String,
    #[serde(rename = "userAgent")]
    pub user_agent: String,
    pub browser: String,
    #[serde(rename = "browserVersion")]
    pub browser_version: String,
    pub os: String,
    #[serde(rename = "osVersion")]
    pub os_version: String,
    #[serde(rename = "screenWidth")]
    pub screen_width: u32,
    #[serde(rename = "screenHeight")]
    pub screen_height: u32,
    pub framework: String,
    #[serde(rename = "sdkVersion")]
    pub sdk_version: String,
    pub environment: String,
    pub tags: BTreeMap<String, String>,
    /// Reserved; always empty.
    pub breadcrumbs: Vec<serde_json::Value>,
    pub timestamp: String,
    #[serde(rename = "deviceType")]
    pub device_type: String,
}

/// Wire names of every [`ErrorReport`] field, in serialization order.
pub const REPORT_FIELDS: [&str; 22] = [
    "message",
    "type",
    "stack",
    "source",
    "line",
    "col",
    "fingerprint",
    "url",
    "userAgent",
    "browser",
    "browserVersion",
    "os",
    "osVersion",
    "screenWidth",
    "screenHeight",
    "framework",
    "sdkVersion",
    "environment",
    "tags",
    "breadcrumbs",
    "timestamp",
    "deviceType",
];
