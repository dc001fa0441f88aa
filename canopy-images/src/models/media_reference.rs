//! Published image references attached to records

use serde::{Deserialize, Serialize};

/// A normalized image ready for the map front end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    /// Public URL: storage prefix plus local file name
    pub url: String,
    /// Who holds the rights to the photograph
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Attribution>,
}

/// Attribution metadata for a photograph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    /// Rights holder name; empty when the source omits it
    pub name: String,
    /// Page crediting the source
    pub url: String,
}
