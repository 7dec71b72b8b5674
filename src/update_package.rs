//! Update package description returned by the update server.

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::checksum::sha256_bytes;
use crate::firmware::FirmwareMetadata;
use crate::types::AgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallMode {
    Copy,
    Tarball,
    Zip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SupportedHardware {
    Any(AnyHardware),
    List(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnyHardware {
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UpdateObject {
    pub filename: String,
    pub sha256sum: String,
    #[serde(default)]
    pub size: u64,
    pub mode: InstallMode,
    pub target_path: String,
    #[serde(default)]
    pub install_if_different: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageManifest {
    pub product_uid: String,
    pub version: String,
    pub supported_hardware: SupportedHardware,
    #[serde(default)]
    pub objects: Vec<UpdateObject>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePackage {
    manifest: PackageManifest,
    package_uid: String,
}

impl UpdatePackage {
    /// Parse the raw manifest; the package uid is the digest of these bytes.
    pub fn parse(raw: &[u8]) -> Result<Self, AgentError> {
        let manifest: PackageManifest = serde_json::from_slice(raw)?;
        Ok(Self {
            manifest,
            package_uid: sha256_bytes(raw),
        })
    }

    pub fn package_uid(&self) -> &str {
        &self.package_uid
    }

    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    pub fn objects(&self) -> &[UpdateObject] {
        &self.manifest.objects
    }

    pub fn compatible_with(&self, firmware: &FirmwareMetadata) -> Result<(), AgentError> {
        if self.manifest.product_uid != firmware.product_uid {
            return Err(AgentError::Incompatible(format!(
                "product uid {} does not match {}",
                self.manifest.product_uid, firmware.product_uid
            )));
        }

        match &self.manifest.supported_hardware {
            SupportedHardware::Any(_) => Ok(()),
            SupportedHardware::List(list) if list.iter().any(|hw| hw == &firmware.hardware) => {
                Ok(())
            }
            SupportedHardware::List(_) => Err(AgentError::Incompatible(format!(
                "hardware {} is not supported",
                firmware.hardware
            ))),
        }
    }

    /// Semver versions must be strictly newer; anything else just has to differ.
    pub fn is_newer_than(&self, current: &str) -> bool {
        match (Version::parse(self.version()), Version::parse(current)) {
            (Ok(candidate), Ok(current)) => candidate > current,
            _ => self.version() != current,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const OBJECT_SHA256: &str =
        "c775e7b757ede630cd0aa1113bd102661ab38829ca52a6422ab782862f268646";

    pub(crate) fn manifest_json(product_uid: &str, version: &str, hardware: &str) -> String {
        format!(
            r#"{{
                "product-uid": "{product_uid}",
                "version": "{version}",
                "supported-hardware": {hardware},
                "objects": [{{
                    "filename": "rootfs.img",
                    "sha256sum": "{OBJECT_SHA256}",
                    "size": 10,
                    "mode": "copy",
                    "target-path": "/tmp/rootfs.img",
                    "install-if-different": true
                }}]
            }}"#
        )
    }

    fn firmware(hardware: &str) -> FirmwareMetadata {
        FirmwareMetadata {
            product_uid: "product".into(),
            version: "1.0.0".into(),
            hardware: hardware.into(),
            ..Default::default()
        }
    }

    #[test]
    fn parses_manifest() {
        let raw = manifest_json("product", "1.1.0", r#""any""#);
        let package = UpdatePackage::parse(raw.as_bytes()).unwrap();

        assert_eq!(package.version(), "1.1.0");
        assert_eq!(package.objects().len(), 1);
        assert_eq!(package.objects()[0].mode, InstallMode::Copy);
        assert!(package.objects()[0].install_if_different);
        assert_eq!(package.package_uid(), sha256_bytes(raw.as_bytes()));
    }

    #[test]
    fn hardware_compatibility() {
        let any = UpdatePackage::parse(manifest_json("product", "1.1.0", r#""any""#).as_bytes())
            .unwrap();
        assert!(any.compatible_with(&firmware("board-x")).is_ok());

        let listed = UpdatePackage::parse(
            manifest_json("product", "1.1.0", r#"["board-a", "board-b"]"#).as_bytes(),
        )
        .unwrap();
        assert!(listed.compatible_with(&firmware("board-b")).is_ok());
        assert!(listed.compatible_with(&firmware("board-x")).is_err());
    }

    #[test]
    fn product_mismatch() {
        let package =
            UpdatePackage::parse(manifest_json("other", "1.1.0", r#""any""#).as_bytes()).unwrap();
        assert!(matches!(
            package.compatible_with(&firmware("board")),
            Err(AgentError::Incompatible(_))
        ));
    }

    #[test]
    fn version_ordering() {
        let package =
            UpdatePackage::parse(manifest_json("product", "1.1.0", r#""any""#).as_bytes()).unwrap();
        assert!(package.is_newer_than("1.0.9"));
        assert!(!package.is_newer_than("1.1.0"));
        assert!(!package.is_newer_than("2.0.0"));
        assert!(package.is_newer_than("build-42"));
    }
}
