//! The build-info record reported for `buildinfo` commands.

use bson::{Document, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};

use docmock_core::error::StoreError;

use crate::error::FacadeResult;

/// Static server build information.
///
/// The Store does not simulate `buildinfo`; database facades answer it with this record,
/// which is configured per client and inherited by every database of that client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub ok: f64,
    pub version: String,
    pub version_array: Vec<i32>,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::new("5.0.5")
    }
}

impl BuildInfo {
    /// A record for `version`, padding the version array to four components.
    pub fn new(version: impl Into<String>) -> Self {
        let version = version.into();
        let mut version_array = version
            .split('.')
            .map(|part| part.parse::<i32>().unwrap_or(0))
            .collect::<Vec<_>>();
        version_array.resize(4.max(version_array.len()), 0);

        Self {
            ok: 1.0,
            version,
            version_array,
        }
    }

    pub fn to_document(&self) -> FacadeResult<Document> {
        let bson = serialize_to_bson(self).map_err(StoreError::from)?;

        match bson.as_document() {
            Some(document) => Ok(document.clone()),
            None => Err(StoreError::Serialization("build info must serialize to a document".into()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_record() {
        assert_eq!(
            BuildInfo::default().to_document().unwrap(),
            doc! { "ok": 1.0, "version": "5.0.5", "versionArray": [5, 0, 5, 0] }
        );
    }

    #[test]
    fn test_custom_version() {
        assert_eq!(BuildInfo::new("6.0").version_array, vec![6, 0, 0, 0]);
    }
}
