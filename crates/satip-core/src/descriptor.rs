//! SAT>IP device descriptor parsing
//!
//! A SAT>IP server publishes a UPnP device description. Two fields are read
//! from it: the UPnP `friendlyName` and the SAT>IP `X_SATIPCAP` capability
//! list, e.g. `DVBS2-2,DVBT-4`.

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use std::net::Ipv4Addr;
use thiserror::Error;
use tracing::trace;

use crate::device::{DeviceRecord, FrontendCapabilities};

/// Namespace of the UPnP device description
pub const UPNP_DEVICE_NS: &str = "urn:schemas-upnp-org:device-1-0";
/// Namespace of the SAT>IP extensions
pub const SATIP_NS: &str = "urn:ses-com:satip";
/// Misspelled SAT>IP namespace used by some Panasonic firmware
pub const SATIP_NS_FALLBACK: &str = "urn-ses-com:satip";

/// Fields must sit below a child of the root element (`root/device/field`)
const FIELD_MIN_DEPTH: usize = 3;

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("Failed to parse descriptor XML: {0}")]
    Xml(String),
    #[error("Descriptor is missing required field {0}")]
    MissingField(&'static str),
    #[error("Invalid capability entry {entry:?}: {reason}")]
    InvalidCapability { entry: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    FriendlyName,
    SatipCap,
    SatipCapFallback,
}

impl Field {
    fn classify(ns: &ResolveResult, local_name: &[u8]) -> Option<Self> {
        let ResolveResult::Bound(Namespace(ns)) = ns else {
            return None;
        };
        match (*ns, local_name) {
            (ns, b"friendlyName") if ns == UPNP_DEVICE_NS.as_bytes() => Some(Self::FriendlyName),
            (ns, b"X_SATIPCAP") if ns == SATIP_NS.as_bytes() => Some(Self::SatipCap),
            (ns, b"X_SATIPCAP") if ns == SATIP_NS_FALLBACK.as_bytes() => {
                Some(Self::SatipCapFallback)
            }
            _ => None,
        }
    }
}

/// First occurrence of each field of interest
#[derive(Debug, Default)]
struct Fields {
    friendly_name: Option<String>,
    satip_cap: Option<String>,
    satip_cap_fallback: Option<String>,
}

impl Fields {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::FriendlyName => &mut self.friendly_name,
            Field::SatipCap => &mut self.satip_cap,
            Field::SatipCapFallback => &mut self.satip_cap_fallback,
        }
    }

    fn wants(&mut self, field: Field) -> bool {
        self.slot(field).is_none()
    }

    fn set(&mut self, field: Field, text: String) {
        let slot = self.slot(field);
        if slot.is_none() {
            *slot = Some(text);
        }
    }
}

/// Parse a descriptor document into a device record.
///
/// An empty body yields a record with no name and no frontends. Otherwise
/// both the friendly name and a capability field are required.
pub fn parse_descriptor(
    data: &[u8],
    url: &str,
    host_ip: Ipv4Addr,
) -> Result<DeviceRecord, DescriptorError> {
    let mut record = DeviceRecord::empty(url, host_ip);
    if data.is_empty() {
        trace!(url = %url, "Empty descriptor body");
        return Ok(record);
    }

    let mut fields = scan_fields(data)?;

    record.name = fields
        .friendly_name
        .take()
        .ok_or(DescriptorError::MissingField("friendlyName"))?;

    let caps = fields
        .satip_cap
        .take()
        .or_else(|| fields.satip_cap_fallback.take())
        .ok_or(DescriptorError::MissingField("X_SATIPCAP"))?;
    record.frontends = parse_capabilities(&caps)?;

    Ok(record)
}

/// Parse an `X_SATIPCAP` value such as `DVBS2-2,DVBT-4`.
///
/// Counts of repeated delivery systems are summed.
pub fn parse_capabilities(text: &str) -> Result<FrontendCapabilities, DescriptorError> {
    let mut caps = FrontendCapabilities::new();

    for entry in text.split(',') {
        let mut parts = entry.split('-');
        let system = parts.next().unwrap_or_default().trim();
        let count = parts
            .next()
            .ok_or_else(|| DescriptorError::InvalidCapability {
                entry: entry.to_string(),
                reason: "missing tuner count".to_string(),
            })?
            .trim()
            .parse::<u32>()
            .map_err(|e| DescriptorError::InvalidCapability {
                entry: entry.to_string(),
                reason: e.to_string(),
            })?;

        let total = caps.entry(system.to_string()).or_insert(0);
        *total = total.saturating_add(count);
    }

    Ok(caps)
}

fn scan_fields(data: &[u8]) -> Result<Fields, DescriptorError> {
    let mut reader = NsReader::from_reader(data);
    reader.config_mut().trim_text(true);

    let mut fields = Fields::default();
    let mut depth = 0usize;
    let mut root_seen = false;
    // Field being read, the depth of its element, and the text so far
    let mut capture: Option<(Field, usize, String)> = None;

    loop {
        let event = reader
            .read_resolved_event()
            .map_err(|e| DescriptorError::Xml(e.to_string()))?;

        match event {
            (ns, Event::Start(e)) => {
                if depth == 0 {
                    check_single_root(&mut root_seen)?;
                }
                depth += 1;
                if capture.is_none() && depth >= FIELD_MIN_DEPTH {
                    if let Some(field) = Field::classify(&ns, e.local_name().as_ref()) {
                        if fields.wants(field) {
                            capture = Some((field, depth, String::new()));
                        }
                    }
                }
            }
            (ns, Event::Empty(e)) => {
                if depth == 0 {
                    check_single_root(&mut root_seen)?;
                }
                if capture.is_none() && depth + 1 >= FIELD_MIN_DEPTH {
                    if let Some(field) = Field::classify(&ns, e.local_name().as_ref()) {
                        fields.set(field, String::new());
                    }
                }
            }
            (_, Event::Text(t)) => {
                if depth == 0 && !is_blank(&t) {
                    return Err(DescriptorError::Xml(
                        "text outside the root element".to_string(),
                    ));
                }
                if let Some((_, _, text)) = capture.as_mut() {
                    let unescaped = t
                        .unescape()
                        .map_err(|e| DescriptorError::Xml(e.to_string()))?;
                    text.push_str(&unescaped);
                }
            }
            (_, Event::CData(c)) => {
                if let Some((_, _, text)) = capture.as_mut() {
                    let raw = std::str::from_utf8(&c)
                        .map_err(|e| DescriptorError::Xml(e.to_string()))?;
                    text.push_str(raw);
                }
            }
            (_, Event::End(_)) => {
                if capture.as_ref().is_some_and(|(_, d, _)| *d == depth) {
                    if let Some((field, _, text)) = capture.take() {
                        fields.set(field, text);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            (_, Event::Eof) => {
                if depth != 0 {
                    return Err(DescriptorError::Xml(format!(
                        "document ends with {depth} unclosed elements"
                    )));
                }
                if !root_seen {
                    return Err(DescriptorError::Xml("no root element".to_string()));
                }
                break;
            }
            _ => {}
        }
    }

    Ok(fields)
}

fn is_blank(raw: &[u8]) -> bool {
    String::from_utf8_lossy(raw)
        .trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
        .is_empty()
}

/// A document has exactly one top-level element
fn check_single_root(root_seen: &mut bool) -> Result<(), DescriptorError> {
    if *root_seen {
        return Err(DescriptorError::Xml(
            "content after the root element".to_string(),
        ));
    }
    *root_seen = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);
    const URL: &str = "http://10.0.0.9/desc.xml";

    fn descriptor(caps: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0" configId="0">
    <specVersion><major>1</major><minor>1</minor></specVersion>
    <device>
        <deviceType>urn:ses-com:device:SatIPServer:1</deviceType>
        <friendlyName>TunerBox</friendlyName>
        <manufacturer>ACME</manufacturer>
        {caps}
    </device>
</root>"#
        )
    }

    #[test]
    fn test_parse_descriptor() {
        let xml = descriptor(
            r#"<satip:X_SATIPCAP xmlns:satip="urn:ses-com:satip">DVBS2-4</satip:X_SATIPCAP>"#,
        );

        let record = parse_descriptor(xml.as_bytes(), URL, HOST).unwrap();
        assert_eq!(record.name, "TunerBox");
        assert_eq!(record.frontends.get("DVBS2"), Some(&4));
        assert_eq!(record.frontends.len(), 1);
        assert_eq!(record.url, URL);
        assert_eq!(record.detected_via_host_ip, HOST);
    }

    #[test]
    fn test_repeated_systems_are_summed() {
        let xml = descriptor(
            r#"<satip:X_SATIPCAP xmlns:satip="urn:ses-com:satip">DVBS2-2,DVBS2-1,DVBT-4</satip:X_SATIPCAP>"#,
        );

        let record = parse_descriptor(xml.as_bytes(), URL, HOST).unwrap();
        assert_eq!(record.frontends.get("DVBS2"), Some(&3));
        assert_eq!(record.frontends.get("DVBT"), Some(&4));
        assert_eq!(record.frontends.len(), 2);
    }

    #[test]
    fn test_empty_body() {
        let record = parse_descriptor(b"", URL, HOST).unwrap();
        assert_eq!(record.name, "");
        assert!(record.frontends.is_empty());
        assert_eq!(record.url, URL);
        assert_eq!(record.detected_via_host_ip, HOST);
    }

    #[test]
    fn test_fallback_namespace() {
        let xml = descriptor(
            r#"<satip:X_SATIPCAP xmlns:satip="urn-ses-com:satip">DVBC-2</satip:X_SATIPCAP>"#,
        );

        let record = parse_descriptor(xml.as_bytes(), URL, HOST).unwrap();
        assert_eq!(record.frontends.get("DVBC"), Some(&2));
    }

    #[test]
    fn test_primary_namespace_wins_over_fallback() {
        let xml = descriptor(
            r#"<bad:X_SATIPCAP xmlns:bad="urn-ses-com:satip">DVBC-2</bad:X_SATIPCAP>
        <satip:X_SATIPCAP xmlns:satip="urn:ses-com:satip">DVBT2-8</satip:X_SATIPCAP>"#,
        );

        let record = parse_descriptor(xml.as_bytes(), URL, HOST).unwrap();
        assert_eq!(record.frontends.get("DVBT2"), Some(&8));
        assert!(!record.frontends.contains_key("DVBC"));
    }

    #[test]
    fn test_missing_capabilities() {
        let xml = descriptor("");
        let err = parse_descriptor(xml.as_bytes(), URL, HOST).unwrap_err();
        assert!(matches!(err, DescriptorError::MissingField("X_SATIPCAP")));
    }

    #[test]
    fn test_capability_without_namespace_is_ignored() {
        let xml = descriptor("<X_SATIPCAP xmlns=\"\">DVBS2-4</X_SATIPCAP>");
        let err = parse_descriptor(xml.as_bytes(), URL, HOST).unwrap_err();
        assert!(matches!(err, DescriptorError::MissingField("X_SATIPCAP")));
    }

    #[test]
    fn test_missing_friendly_name() {
        let xml = r#"<root xmlns="urn:schemas-upnp-org:device-1-0">
    <device>
        <satip:X_SATIPCAP xmlns:satip="urn:ses-com:satip">DVBS2-4</satip:X_SATIPCAP>
    </device>
</root>"#;
        let err = parse_descriptor(xml.as_bytes(), URL, HOST).unwrap_err();
        assert!(matches!(err, DescriptorError::MissingField("friendlyName")));
    }

    #[test]
    fn test_invalid_xml() {
        let err = parse_descriptor(b"<root><device></root>", URL, HOST).unwrap_err();
        assert!(matches!(err, DescriptorError::Xml(_)));
    }

    #[test]
    fn test_truncated_document() {
        let xml = r#"<root xmlns="urn:schemas-upnp-org:device-1-0"><device><friendlyName>A</friendlyName><s:X_SATIPCAP xmlns:s="urn:ses-com:satip">DVBT-1</s:X_SATIPCAP>"#;
        let err = parse_descriptor(xml.as_bytes(), URL, HOST).unwrap_err();
        assert!(matches!(err, DescriptorError::Xml(_)));
    }

    #[test]
    fn test_content_after_root() {
        let valid = descriptor(
            r#"<satip:X_SATIPCAP xmlns:satip="urn:ses-com:satip">DVBS2-4</satip:X_SATIPCAP>"#,
        );
        assert!(parse_descriptor(valid.as_bytes(), URL, HOST).is_ok());

        for trailer in ["<garbage>x</garbage>", "<garbage/>", "junk"] {
            let xml = format!("{valid}\n{trailer}");
            let err = parse_descriptor(xml.as_bytes(), URL, HOST).unwrap_err();
            assert!(matches!(err, DescriptorError::Xml(_)), "trailer {trailer:?}");
        }
    }

    #[test]
    fn test_no_root_element() {
        let err = parse_descriptor(b"<?xml version=\"1.0\"?>", URL, HOST).unwrap_err();
        assert!(matches!(err, DescriptorError::Xml(_)));
    }

    #[test]
    fn test_invalid_count() {
        let xml = descriptor(
            r#"<satip:X_SATIPCAP xmlns:satip="urn:ses-com:satip">DVBS2-two</satip:X_SATIPCAP>"#,
        );
        let err = parse_descriptor(xml.as_bytes(), URL, HOST).unwrap_err();
        assert!(matches!(err, DescriptorError::InvalidCapability { .. }));
    }

    #[test]
    fn test_parse_capabilities() {
        let caps = parse_capabilities("DVBS2-2, DVBT-1,DVBT2-1").unwrap();
        assert_eq!(caps.get("DVBS2"), Some(&2));
        assert_eq!(caps.get("DVBT"), Some(&1));
        assert_eq!(caps.get("DVBT2"), Some(&1));

        assert!(parse_capabilities("DVBS2").is_err());
        assert!(parse_capabilities("DVBS2-2,").is_err());
    }
}
