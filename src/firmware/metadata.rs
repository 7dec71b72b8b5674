use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

use crate::types::AgentError;

use super::hook::run_hook;

const PRODUCT_UID_FILE: &str = "product-uid";
const VERSION_HOOK: &str = "version";
const HARDWARE_HOOK: &str = "hardware";
const DEVICE_IDENTITY_DIR: &str = "device-identity.d";
const DEVICE_ATTRIBUTES_DIR: &str = "device-attributes.d";

/// `key=value` pairs collected from hook output; keys may repeat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataValue(pub BTreeMap<String, Vec<String>>);

impl FromStr for MetadataValue {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for line in s.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let (key, value) = line.split_once('=').ok_or_else(|| {
                AgentError::Metadata(format!("Invalid metadata line `{line}`"))
            })?;
            values
                .entry(key.trim().to_string())
                .or_default()
                .push(value.trim().to_string());
        }
        Ok(Self(values))
    }
}

/// What the device reports about itself when probing the update server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FirmwareMetadata {
    pub product_uid: String,
    pub version: String,
    pub hardware: String,
    pub device_identity: MetadataValue,
    pub device_attributes: MetadataValue,
}

impl FirmwareMetadata {
    pub async fn load(dir: &Path) -> Result<Self, AgentError> {
        let product_uid = run_hook(&dir.join(PRODUCT_UID_FILE)).await?;
        if product_uid.is_empty() {
            return Err(AgentError::Metadata(format!(
                "Missing product uid in {}",
                dir.display()
            )));
        }

        let version = run_hook(&dir.join(VERSION_HOOK)).await?;
        if version.is_empty() {
            return Err(AgentError::Metadata(format!(
                "Missing firmware version in {}",
                dir.display()
            )));
        }

        let metadata = Self {
            product_uid,
            version,
            hardware: run_hook(&dir.join(HARDWARE_HOOK)).await?,
            device_identity: run_hooks_from_dir(&dir.join(DEVICE_IDENTITY_DIR)).await?,
            device_attributes: run_hooks_from_dir(&dir.join(DEVICE_ATTRIBUTES_DIR)).await?,
        };

        info!(
            product = %metadata.product_uid,
            version = %metadata.version,
            hardware = %metadata.hardware,
            "Loaded firmware metadata"
        );
        Ok(metadata)
    }
}

async fn run_hooks_from_dir(dir: &Path) -> Result<MetadataValue, AgentError> {
    if !dir.is_dir() {
        return Ok(MetadataValue::default());
    }

    let mut entries = Vec::new();
    let mut read_dir = fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        entries.push(entry.path());
    }
    entries.sort();

    let mut outputs = Vec::with_capacity(entries.len());
    for path in entries {
        outputs.push(run_hook(&path).await?);
    }

    outputs.join("\n").parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn metadata_value_collects_repeated_keys() {
        let value: MetadataValue = "id1=a\nid2=b\nid1=c\n".parse().unwrap();
        assert_eq!(value.0["id1"], vec!["a", "c"]);
        assert_eq!(value.0["id2"], vec!["b"]);
    }

    #[test]
    fn metadata_value_rejects_garbage() {
        assert!("no equals sign".parse::<MetadataValue>().is_err());
    }

    #[tokio::test]
    async fn loads_metadata_directory() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), PRODUCT_UID_FILE, "229ffd7e\n");
        write(dir.path(), VERSION_HOOK, "1.0.0");
        write(dir.path(), HARDWARE_HOOK, "board");
        std::fs::create_dir(dir.path().join(DEVICE_IDENTITY_DIR)).unwrap();
        write(
            &dir.path().join(DEVICE_IDENTITY_DIR),
            "serial",
            "serial=0001",
        );

        let metadata = FirmwareMetadata::load(dir.path()).await.unwrap();
        assert_eq!(metadata.product_uid, "229ffd7e");
        assert_eq!(metadata.version, "1.0.0");
        assert_eq!(metadata.hardware, "board");
        assert_eq!(metadata.device_identity.0["serial"], vec!["0001"]);
        assert!(metadata.device_attributes.0.is_empty());
    }

    #[tokio::test]
    async fn missing_product_uid_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), VERSION_HOOK, "1.0.0");

        let err = FirmwareMetadata::load(dir.path()).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
