//! # Peer Discovery Module
//!
//! Finds the telemetry sink on the local /24 subnet.
//!
//! This module handles:
//! - Detecting the machine's own non-loopback IPv4 address
//! - Deriving the scan range for its /24 subnet
//! - Running a UDP reachability probe restricted to the sink's port
//! - Picking the first host the probe reports as up
//!
//! Discovery runs once at startup. Any failure along the way means "no peer":
//! the caller keeps running and telemetry frames are dropped.

pub mod nmap;

pub use nmap::NmapProbe;

use async_trait::async_trait;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use tracing::{debug, info, warn};

use crate::error::{FusionError, Result};

/// First host octet scanned; `.0` is the network and `.1` is usually the router
const FIRST_HOST_OCTET: u8 = 2;

/// Public address used only to select the outbound route when no interface
/// address qualifies; nothing is sent to it
const ROUTE_PROBE_ADDR: &str = "8.8.8.8:80";

/// Reachability state reported by the probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Up,
    Down,
    Unknown,
}

impl HostState {
    /// Parses a probe state string; anything other than `up`/`down` is unknown.
    pub fn parse(value: &str) -> Self {
        match value {
            "up" => Self::Up,
            "down" => Self::Down,
            _ => Self::Unknown,
        }
    }
}

/// One host entry of a probe report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostStatus {
    pub addr: Ipv4Addr,
    pub state: HostState,
}

/// Address of the telemetry sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddress {
    ip: Ipv4Addr,
    port: u16,
}

impl PeerAddress {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(self.ip), self.port)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Contiguous host range within one /24 subnet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTarget {
    network: Ipv4Addr,
    first: u8,
    last: u8,
}

impl ScanTarget {
    /// Scan range for the /24 subnet containing `addr`.
    ///
    /// Covers `.2` through `.254`, or through `.255` when `include_broadcast`
    /// is set.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::net::Ipv4Addr;
    /// use range_fusion::discovery::ScanTarget;
    ///
    /// let target = ScanTarget::for_subnet(Ipv4Addr::new(192, 168, 1, 33), false);
    /// assert_eq!(target.to_string(), "192.168.1.2-254");
    /// ```
    pub fn for_subnet(addr: Ipv4Addr, include_broadcast: bool) -> Self {
        let [a, b, c, _] = addr.octets();
        Self {
            network: Ipv4Addr::new(a, b, c, 0),
            first: FIRST_HOST_OCTET,
            last: if include_broadcast { 255 } else { 254 },
        }
    }

    /// Network address of the subnet (`a.b.c.0`)
    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// Whether `addr` falls inside the scanned range
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let [a, b, c, d] = addr.octets();
        let [na, nb, nc, _] = self.network.octets();
        (a, b, c) == (na, nb, nc) && (self.first..=self.last).contains(&d)
    }

    /// Number of addresses scanned
    pub fn host_count(&self) -> usize {
        usize::from(self.last - self.first) + 1
    }
}

/// Renders nmap range syntax, e.g. `192.168.1.2-254`
impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, _] = self.network.octets();
        write!(f, "{}.{}.{}.{}-{}", a, b, c, self.first, self.last)
    }
}

/// Active reachability probe for a target range and a single UDP port
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    /// Classify every address in `target`, in the order the probe reports them.
    async fn probe(&self, target: &ScanTarget, port: u16) -> Result<Vec<HostStatus>>;
}

/// Detects the machine's non-loopback IPv4 address.
///
/// Interface addresses are checked first (see [`select_interface_ipv4`]), so
/// an isolated LAN without a default route still resolves. Only when no
/// interface qualifies is the outbound route consulted. With several LANs
/// attached, set `discovery.local_address` to pick one.
///
/// # Errors
///
/// Returns `LocalAddress` if neither source yields a usable IPv4 address.
pub fn local_ipv4() -> Result<Ipv4Addr> {
    match if_addrs::get_if_addrs() {
        Ok(interfaces) => {
            let found = select_interface_ipv4(interfaces.iter().map(|iface| iface.ip()));
            if let Some(ip) = found {
                return Ok(ip);
            }
            debug!("No usable interface address; falling back to route lookup");
        }
        Err(e) => debug!("Interface enumeration failed: {}", e),
    }

    route_ipv4()
}

/// Picks the local address to scan from.
///
/// Loopback, unspecified, link-local and IPv6 addresses are skipped. A
/// private (RFC 1918) address wins over a public one; otherwise the first
/// remaining address is used.
///
/// # Examples
///
/// ```
/// use std::net::{IpAddr, Ipv4Addr};
/// use range_fusion::discovery::select_interface_ipv4;
///
/// let addrs = [
///     IpAddr::V4(Ipv4Addr::LOCALHOST),
///     IpAddr::V4(Ipv4Addr::new(192, 168, 1, 33)),
/// ];
/// assert_eq!(select_interface_ipv4(addrs), Some(Ipv4Addr::new(192, 168, 1, 33)));
/// ```
pub fn select_interface_ipv4<I>(addrs: I) -> Option<Ipv4Addr>
where
    I: IntoIterator<Item = IpAddr>,
{
    let usable: Vec<Ipv4Addr> = addrs
        .into_iter()
        .filter_map(|addr| match addr {
            IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() && !ip.is_link_local() => {
                Some(ip)
            }
            _ => None,
        })
        .collect();

    usable
        .iter()
        .copied()
        .find(Ipv4Addr::is_private)
        .or_else(|| usable.first().copied())
}

/// Connecting a UDP socket selects the outbound interface without sending
/// any packets; the socket's local address is the interface address.
fn route_ipv4() -> Result<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket
        .connect(ROUTE_PROBE_ADDR)
        .map_err(|e| FusionError::LocalAddress(format!("No IPv4 route: {}", e)))?;

    match socket.local_addr()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Ok(ip),
        other => Err(FusionError::LocalAddress(format!(
            "No non-loopback IPv4 address (got {})",
            other
        ))),
    }
}

/// Picks the first host reported as up.
pub fn select_peer(hosts: &[HostStatus]) -> Option<Ipv4Addr> {
    hosts
        .iter()
        .find(|host| host.state == HostState::Up)
        .map(|host| host.addr)
}

/// Scans `target` for a host listening on `port`.
///
/// Never fails: a probe error or an empty result both yield `None`.
pub async fn discover<P>(probe: &P, target: &ScanTarget, port: u16) -> Option<PeerAddress>
where
    P: NetworkProbe + ?Sized,
{
    info!("Scanning {} (UDP port {}) for the telemetry sink", target, port);

    let hosts = match probe.probe(target, port).await {
        Ok(hosts) => hosts,
        Err(e) => {
            warn!("Peer discovery failed: {}", e);
            return None;
        }
    };
    debug!("Probe reported {} hosts", hosts.len());

    match select_peer(&hosts) {
        Some(ip) => {
            let peer = PeerAddress::new(ip, port);
            info!("Telemetry sink found: {}", peer);
            Some(peer)
        }
        None => {
            warn!("No telemetry sink found on {}; frames will be dropped", target);
            None
        }
    }
}

/// Runs the whole discovery phase: local address, scan range, probe.
///
/// `local_override` skips address detection.
pub async fn discover_peer<P>(
    probe: &P,
    local_override: Option<Ipv4Addr>,
    include_broadcast: bool,
    port: u16,
) -> Option<PeerAddress>
where
    P: NetworkProbe + ?Sized,
{
    let local = match local_override {
        Some(ip) => ip,
        None => match local_ipv4() {
            Ok(ip) => ip,
            Err(e) => {
                warn!("Peer discovery failed: {}", e);
                return None;
            }
        },
    };
    debug!("Local address {}", local);

    let target = ScanTarget::for_subnet(local, include_broadcast);
    discover(probe, &target, port).await
}
