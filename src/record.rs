//! Company record model.
//!
//! Every nested block has a fixed shape with empty-string leaves, so a record
//! can always be built no matter which fields the source object omitted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One table row as read from the listing page, before JSON parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTableRow {
    pub domain: String,
    pub version: String,
    /// Raw text of the details cell, still wrapped in the page's show/close markers.
    pub details_text: String,
}

impl RawTableRow {
    pub fn new(
        domain: impl Into<String>,
        version: impl Into<String>,
        details_text: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            version: version.into(),
            details_text: details_text.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub street: String,
    pub city: String,
    pub zip: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaInfo {
    pub title: String,
    pub url: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenGraphInfo {
    pub title: String,
    pub description: String,
    pub image: String,
    pub site_name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebsiteImage {
    pub src: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebsiteInfo {
    pub meta: MetaInfo,
    pub og: OpenGraphInfo,
    pub images: Vec<WebsiteImage>,
}

/// Canonical company entity produced by the scrape pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRecord {
    pub domain: String,
    pub version: String,
    pub name: String,
    pub first_company_name: String,
    pub category: String,
    pub contact: Contact,
    pub website_info: WebsiteInfo,
    pub created: String,
    pub person: String,
    /// The parsed source object, kept verbatim.
    pub raw: Value,
}

impl CompanyRecord {
    /// Builds a record from the table columns and the parsed details object.
    ///
    /// Absent or mistyped fields fall back to empty values; this never fails.
    pub fn from_source(domain: &str, version: &str, source: Value) -> Self {
        let empty = Map::new();
        let obj = source.as_object().unwrap_or(&empty);

        let contact = Contact {
            street: string_field(obj, "street"),
            city: string_field(obj, "city"),
            zip: string_field(obj, "zip"),
            phone: string_field(obj, "phone"),
            email: string_field(obj, "email"),
        };

        let website_info = obj
            .get("websiteInfo")
            .map(WebsiteInfo::from_value)
            .unwrap_or_default();

        Self {
            domain: domain.to_string(),
            version: version.to_string(),
            name: string_field(obj, "name"),
            first_company_name: string_field(obj, "firstCompanyName"),
            category: string_field(obj, "category"),
            contact,
            website_info,
            created: string_field(obj, "utc_time_create"),
            person: string_field(obj, "person"),
            raw: source,
        }
    }

    /// Semicolon-joined image sources, empty when there are none.
    pub fn image_sources(&self) -> String {
        self.website_info
            .images
            .iter()
            .map(|img| img.src.as_str())
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl WebsiteInfo {
    fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let meta = obj
            .get("meta")
            .and_then(Value::as_object)
            .map(|m| MetaInfo {
                title: string_field(m, "title"),
                url: string_field(m, "url"),
                description: string_field(m, "description"),
            })
            .unwrap_or_default();

        let og = obj
            .get("og")
            .and_then(Value::as_object)
            .map(|o| OpenGraphInfo {
                title: string_field(o, "title"),
                description: string_field(o, "description"),
                image: string_field(o, "image"),
                site_name: string_field(o, "site_name"),
                url: string_field(o, "url"),
            })
            .unwrap_or_default();

        let images = obj
            .get("images")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(WebsiteImage::from_value).collect())
            .unwrap_or_default();

        Self { meta, og, images }
    }
}

impl WebsiteImage {
    fn from_value(value: &Value) -> Self {
        let src = match value {
            Value::Object(obj) => string_field(obj, "src"),
            Value::String(s) => s.clone(),
            _ => String::new(),
        };
        Self { src }
    }
}

/// Reads `key` as display text: strings as-is, null/missing as empty,
/// anything else as its JSON text.
fn string_field(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
