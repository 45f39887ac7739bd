//! Source-side entities as served by the source API
//!
//! Characters arrive enriched with their quotes (`sampleQuotes`) after the
//! source client joins the character, quote and movie endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw character record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub race: Option<Value>,
    #[serde(default)]
    pub gender: Option<Value>,
    #[serde(default)]
    pub birth: Option<Value>,
    #[serde(default)]
    pub death: Option<Value>,
    #[serde(default)]
    pub realm: Option<Value>,
    #[serde(default)]
    pub wiki_url: Option<Value>,
    #[serde(default)]
    pub height: Option<Value>,
    #[serde(default)]
    pub hair: Option<Value>,
    #[serde(default)]
    pub spouse: Option<Value>,
    #[serde(default)]
    pub quote_count: u64,
    #[serde(default)]
    pub sample_quotes: Vec<QuoteFragment>,
}

impl Character {
    /// Character with an id and a name and nothing else
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_quote(mut self, dialog: impl Into<String>, movie: impl Into<String>) -> Self {
        self.sample_quotes.push(QuoteFragment {
            dialog: Some(dialog.into()),
            movie: Some(movie.into()),
        });
        self.quote_count = self.sample_quotes.len() as u64;
        self
    }
}

/// One line of dialog attached to a character
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteFragment {
    #[serde(default)]
    pub dialog: Option<String>,
    /// Resolved movie name
    #[serde(default)]
    pub movie: Option<String>,
}

/// Quote as served by the quote endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceQuote {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub dialog: Option<String>,
    /// Movie id
    #[serde(default)]
    pub movie: Option<String>,
    /// Character id
    #[serde(default)]
    pub character: Option<String>,
}

/// Movie as served by the movie endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_in_minutes: Option<Value>,
}
