//! `nmap` backed network probe.
//!
//! Runs a UDP scan of one port and reads the XML report from stdout
//! (`-oX -`). Only the `<status state=..>` and IPv4 `<address addr=..>`
//! children of each `<host>` element are used.

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::net::Ipv4Addr;
use tokio::process::Command;
use tracing::{debug, trace};

use super::{HostState, HostStatus, NetworkProbe, ScanTarget};
use crate::error::{FusionError, Result};

/// Probe that shells out to `nmap`
#[derive(Debug, Clone)]
pub struct NmapProbe {
    program: String,
}

impl NmapProbe {
    /// Creates a probe that runs `program` (usually just `"nmap"`).
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Command line arguments for a UDP scan of `port` across `target`.
    pub fn scan_args(target: &ScanTarget, port: u16) -> Vec<String> {
        vec![
            "-sU".to_string(),
            "-p".to_string(),
            port.to_string(),
            "-oX".to_string(),
            "-".to_string(),
            target.to_string(),
        ]
    }
}

#[async_trait]
impl NetworkProbe for NmapProbe {
    async fn probe(&self, target: &ScanTarget, port: u16) -> Result<Vec<HostStatus>> {
        let args = Self::scan_args(target, port);
        debug!("Running {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| FusionError::Probe(format!("Failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(FusionError::Probe(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_nmap_xml(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parses an nmap XML report into per-host results, in report order.
///
/// Hosts without an IPv4 address are skipped. A host without a `<status>`
/// element is reported as [`HostState::Unknown`].
///
/// # Errors
///
/// Returns `ProbeOutput` if the document is not well-formed.
pub fn parse_nmap_xml(xml: &str) -> Result<Vec<HostStatus>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut hosts = Vec::new();
    let mut current: Option<(Option<Ipv4Addr>, Option<HostState>)> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"host" => {
                current = Some((None, None));
            }
            Event::Start(e) | Event::Empty(e) => {
                if let Some((addr, state)) = current.as_mut() {
                    match e.name().as_ref() {
                        b"status" => {
                            if let Some(value) = attribute(&e, b"state")? {
                                *state = Some(HostState::parse(&value));
                            }
                        }
                        b"address" => {
                            let is_ipv4 = attribute(&e, b"addrtype")?.as_deref() == Some("ipv4");
                            if is_ipv4 {
                                *addr = attribute(&e, b"addr")?.and_then(|a| a.parse().ok());
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::End(e) if e.name().as_ref() == b"host" => {
                match current.take() {
                    Some((Some(addr), state)) => hosts.push(HostStatus {
                        addr,
                        state: state.unwrap_or(HostState::Unknown),
                    }),
                    _ => trace!("Skipping host entry without an IPv4 address"),
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(hosts)
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes().flatten() {
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<?xml-stylesheet href="file:///usr/bin/../share/nmap/nmap.xsl" type="text/xsl"?>
<nmaprun scanner="nmap" args="nmap -sU -p 1234 -oX - 192.168.1.2-254" start="1700000000" version="7.94" xmloutputversion="1.05">
<scaninfo type="udp" protocol="udp" numservices="1" services="1234"/>
<host starttime="1700000001" endtime="1700000002"><status state="down" reason="no-response" reason_ttl="0"/>
<address addr="192.168.1.2" addrtype="ipv4"/>
</host>
<host starttime="1700000001" endtime="1700000002"><status state="up" reason="arp-response" reason_ttl="0"/>
<address addr="192.168.1.17" addrtype="ipv4"/>
<address addr="AA:BB:CC:DD:EE:FF" addrtype="mac" vendor="Raspberry Pi Trading"/>
<hostnames>
</hostnames>
<ports><port protocol="udp" portid="1234"><state state="open|filtered" reason="no-response" reason_ttl="0"/><service name="search-agent" method="table" conf="3"/></port>
</ports>
</host>
<host><status state="up" reason="arp-response" reason_ttl="0"/>
<address addr="192.168.1.40" addrtype="ipv4"/>
</host>
<runstats><finished time="1700000010" elapsed="9.00" exit="success"/><hosts up="2" down="1" total="3"/>
</runstats>
</nmaprun>
"#;

    #[test]
    fn test_parse_report_in_order() {
        let hosts = parse_nmap_xml(REPORT).unwrap();
        assert_eq!(
            hosts,
            vec![
                HostStatus { addr: Ipv4Addr::new(192, 168, 1, 2), state: HostState::Down },
                HostStatus { addr: Ipv4Addr::new(192, 168, 1, 17), state: HostState::Up },
                HostStatus { addr: Ipv4Addr::new(192, 168, 1, 40), state: HostState::Up },
            ]
        );
    }

    #[test]
    fn test_parse_host_without_status_is_unknown() {
        let xml = r#"<nmaprun><host><address addr="10.0.0.9" addrtype="ipv4"/></host></nmaprun>"#;
        let hosts = parse_nmap_xml(xml).unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].state, HostState::Unknown);
    }

    #[test]
    fn test_parse_skips_host_without_ipv4() {
        let xml = r#"<nmaprun><host><status state="up"/><address addr="fe80::1" addrtype="ipv6"/></host></nmaprun>"#;
        assert!(parse_nmap_xml(xml).unwrap().is_empty());
    }

    #[test]
    fn test_parse_empty_report() {
        let xml = r#"<nmaprun><runstats><hosts up="0" down="254" total="254"/></runstats></nmaprun>"#;
        assert!(parse_nmap_xml(xml).unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed_report() {
        let result = parse_nmap_xml("<nmaprun><host></nmaprun>");
        assert!(matches!(result, Err(FusionError::ProbeOutput(_))));
    }

    #[test]
    fn test_scan_args() {
        let target = ScanTarget::for_subnet(Ipv4Addr::new(192, 168, 1, 33), false);
        assert_eq!(
            NmapProbe::scan_args(&target, 1234),
            vec!["-sU", "-p", "1234", "-oX", "-", "192.168.1.2-254"]
        );
    }

    #[tokio::test]
    async fn test_probe_missing_program() {
        let probe = NmapProbe::new("/nonexistent/nmap");
        let target = ScanTarget::for_subnet(Ipv4Addr::new(10, 0, 0, 5), false);

        match probe.probe(&target, 1234).await {
            Err(FusionError::Probe(msg)) => assert!(msg.contains("/nonexistent/nmap")),
            other => panic!("Expected Probe error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_probe_failing_program() {
        let probe = NmapProbe::new("false");
        let target = ScanTarget::for_subnet(Ipv4Addr::new(10, 0, 0, 5), false);

        assert!(matches!(
            probe.probe(&target, 1234).await,
            Err(FusionError::Probe(_))
        ));
    }
}
