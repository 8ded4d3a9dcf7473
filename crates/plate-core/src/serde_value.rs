use serde::{Deserialize, Serialize};

use crate::core::Document;

/// Versioned envelope for a document stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateValue {
    #[serde(default = "PlateValue::current_schema")]
    pub schema: String,
    #[serde(default = "PlateValue::current_version")]
    pub version: u32,
    pub document: Document,
}

impl PlateValue {
    pub const SCHEMA: &'static str = "plate";
    pub const VERSION: u32 = 1;

    fn current_schema() -> String {
        Self::SCHEMA.to_string()
    }

    fn current_version() -> u32 {
        Self::VERSION
    }

    pub fn from_document(document: Document) -> Self {
        Self {
            schema: Self::current_schema(),
            version: Self::VERSION,
            document,
        }
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reads either an envelope or a bare `{ "children": [...] }` document.
    pub fn load_document(json: &str) -> Result<Document, serde_json::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Stored {
            Enveloped(PlateValue),
            Bare(Document),
        }

        match serde_json::from_str(json)? {
            Stored::Enveloped(value) => Ok(value.into_document()),
            Stored::Bare(document) => Ok(document),
        }
    }
}

impl From<Document> for PlateValue {
    fn from(document: Document) -> Self {
        Self::from_document(document)
    }
}
