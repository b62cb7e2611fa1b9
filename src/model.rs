//! Payloads served by the mesh manager's Babel endpoints.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshService {
    pub url: String,
    pub protocol: String,
    pub name: String,
    #[serde(default)]
    pub should_link: bool,
    #[serde(rename = "type", default)]
    pub tag: String,
}

/// A host advertised on the mesh, without its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostData {
    pub hostname: String,
    pub ip: IpAddr,
    #[serde(default, deserialize_with = "null_as_default")]
    pub services: Vec<MeshService>,
}

/// A mesh node together with the child hosts announced behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub hostname: String,
    pub ip: IpAddr,
    #[serde(default, deserialize_with = "null_as_default")]
    pub services: Vec<MeshService>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub children: Vec<HostData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostsPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<Host>,
    #[serde(default)]
    pub total: usize,
}

/// Installed-route metrics keyed by IPv4 prefix (`10.1.2.3/32`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EtxResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub etx: FxHashMap<String, i64>,
}

// Go encodes nil slices and maps as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_hosts_page() {
        let json = r#"{
            "nodes": [
                {
                    "hostname": "KI5VMF-oklahoma",
                    "ip": "10.54.25.1",
                    "services": [
                        {
                            "url": "http://KI5VMF-oklahoma.local.mesh:8080/",
                            "protocol": "tcp",
                            "name": "Meshchat",
                            "should_link": true,
                            "type": "chat"
                        }
                    ],
                    "children": [
                        {"hostname": "cam1", "ip": "10.54.25.2", "services": null}
                    ]
                }
            ],
            "total": 1
        }"#;

        let page: HostsPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.total, 1);
        let host = &page.nodes[0];
        assert_eq!(host.hostname, "KI5VMF-oklahoma");
        assert_eq!(host.ip, "10.54.25.1".parse::<IpAddr>().unwrap());
        assert_eq!(host.services[0].tag, "chat");
        assert_eq!(host.children.len(), 1);
        assert!(host.children[0].services.is_empty());
    }

    #[test]
    fn null_collections_become_empty() {
        let json = r#"{"hostname": "n0call", "ip": "10.0.0.1", "services": null, "children": null}"#;
        let host: Host = serde_json::from_str(json).unwrap();
        assert!(host.services.is_empty());
        assert!(host.children.is_empty());

        let etx: EtxResponse = serde_json::from_str(r#"{"etx": null}"#).unwrap();
        assert!(etx.etx.is_empty());
    }

    #[test]
    fn decodes_etx_response() {
        let json = r#"{"etx": {"10.54.25.1/32": 256, "10.0.0.0/8": 1024}}"#;
        let etx: EtxResponse = serde_json::from_str(json).unwrap();
        assert_eq!(etx.etx.get("10.54.25.1/32"), Some(&256));
        assert_eq!(etx.etx.len(), 2);
    }
}
