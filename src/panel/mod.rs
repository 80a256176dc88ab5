//! Record editor: the client-side half of the panel.
//!
//! [`Panel`] is the state container for the selected zone and its records, [`RecordForm`]
//! collects and validates a single record, and [`RelayApi`] is the seam to the relay service.

pub mod client;
pub mod form;
pub mod state;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use client::{HttpRelayClient, PanelError, RelayApi};
pub use form::{Field, RecordForm};
pub use state::{FormMode, Panel};

/// TTL value the upstream uses for "automatic".
pub const AUTO_TTL: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Mx,
    Txt,
    Srv,
    Ns,
    Ptr,
}

impl RecordType {
    pub const ALL: [RecordType; 8] = [
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Cname,
        RecordType::Mx,
        RecordType::Txt,
        RecordType::Srv,
        RecordType::Ns,
        RecordType::Ptr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Txt => "TXT",
            RecordType::Srv => "SRV",
            RecordType::Ns => "NS",
            RecordType::Ptr => "PTR",
        }
    }

    /// Only address records can be routed through the proxy.
    pub fn is_proxiable(&self) -> bool {
        matches!(self, RecordType::A | RecordType::Aaaa)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unsupported record type: {}", s))
    }
}

/// A record as listed by the upstream. The type is kept as a string so that record kinds
/// the editor does not handle (CAA, HTTPS, ...) still show up in the table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub ttl: u32,
    #[serde(default)]
    pub proxied: Option<bool>,
}

impl DnsRecord {
    pub fn kind(&self) -> Option<RecordType> {
        self.record_type.parse().ok()
    }

    pub fn ttl_label(&self) -> String {
        if self.ttl == AUTO_TTL {
            "Auto".to_string()
        } else {
            self.ttl.to_string()
        }
    }

    pub fn proxy_label(&self) -> &'static str {
        if self.proxied.unwrap_or(false) {
            "Proxied"
        } else {
            "DNS only"
        }
    }
}

/// Payload submitted for create and update. `proxied` is only ever set for A/AAAA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordInput {
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub name: String,
    pub content: String,
    pub ttl: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,
}
