// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Opaque identifier of a network element, e.g. `of:000000000000000a`.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub struct PortNumber(pub u32);

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A port on a device.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub struct ConnectPoint {
    pub device: DeviceId,
    pub port: PortNumber,
}

impl ConnectPoint {
    pub fn new(device: impl Into<DeviceId>, port: u32) -> Self {
        Self {
            device: device.into(),
            port: PortNumber(port),
        }
    }
}

impl fmt::Display for ConnectPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.port)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Active,
    Inactive,
}

/// A directed link between two connect points. The state is refreshed by
/// the topology service; identity is the endpoint pair.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub struct Link {
    pub src: ConnectPoint,
    pub dst: ConnectPoint,
    pub state: LinkState,
}

impl Link {
    pub fn new(src: ConnectPoint, dst: ConnectPoint) -> Self {
        Self {
            src,
            dst,
            state: LinkState::Active,
        }
    }

    pub fn with_state(mut self, state: LinkState) -> Self {
        self.state = state;
        self
    }

    pub fn is_active(&self) -> bool {
        self.state == LinkState::Active
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

/// End host identifier as reported by host discovery, typically
/// `<mac>/<vlan>`.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub struct HostId(pub String);

impl HostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bandwidth in whole kilobits per second.
///
/// Real-valued Mbps figures are converted by multiplying by 1000 and
/// flooring, so a weight never overstates what a link can carry. NaN and
/// non-positive values become zero.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub struct Bandwidth(u64);

impl Bandwidth {
    pub const ZERO: Bandwidth = Bandwidth(0);

    /// Bottleneck of an empty path.
    pub const UNBOUNDED: Bandwidth = Bandwidth(u64::MAX);

    pub fn from_kbps(kbps: u64) -> Self {
        Self(kbps)
    }

    pub fn from_mbps(mbps: f64) -> Self {
        if mbps.is_nan() || mbps <= 0.0 {
            return Self::ZERO;
        }
        // float to int casts saturate
        Self((mbps * 1000.0).floor() as u64)
    }

    pub fn kbps(self) -> u64 {
        self.0
    }

    pub fn as_mbps(self) -> f64 {
        self.0 as f64 / 1000.0
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::UNBOUNDED {
            write!(f, "unbounded")
        } else {
            write!(f, "{:.3} Mbps", self.as_mbps())
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

/// A single match criterion of a flow selector.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    InPort(PortNumber),
    EthSrc(MacAddr),
    EthDst(MacAddr),
    EthType(u16),
    VlanId(u16),
    IpProto(u8),
    Ipv4Src(Ipv4Addr),
    Ipv4Dst(Ipv4Addr),
    Ipv6Src(Ipv6Addr),
    Ipv6Dst(Ipv6Addr),
    TcpSrc(u16),
    TcpDst(u16),
    UdpSrc(u16),
    UdpDst(u16),
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::InPort(p) => write!(f, "in_port={p}"),
            Criterion::EthSrc(m) => write!(f, "eth_src={m}"),
            Criterion::EthDst(m) => write!(f, "eth_dst={m}"),
            Criterion::EthType(t) => write!(f, "eth_type=0x{t:04x}"),
            Criterion::VlanId(v) => write!(f, "vlan={v}"),
            Criterion::IpProto(p) => write!(f, "ip_proto={p}"),
            Criterion::Ipv4Src(a) => write!(f, "ipv4_src={a}"),
            Criterion::Ipv4Dst(a) => write!(f, "ipv4_dst={a}"),
            Criterion::Ipv6Src(a) => write!(f, "ipv6_src={a}"),
            Criterion::Ipv6Dst(a) => write!(f, "ipv6_dst={a}"),
            Criterion::TcpSrc(p) => write!(f, "tcp_src={p}"),
            Criterion::TcpDst(p) => write!(f, "tcp_dst={p}"),
            Criterion::UdpSrc(p) => write!(f, "udp_src={p}"),
            Criterion::UdpDst(p) => write!(f, "udp_dst={p}"),
        }
    }
}

/// The match criteria identifying a flow. Two keys are equal when they hold
/// the same set of criteria, regardless of the order they were given in.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub struct FlowKey(BTreeSet<Criterion>);

impl FlowKey {
    pub fn new<I: IntoIterator<Item = Criterion>>(criteria: I) -> Self {
        Self(criteria.into_iter().collect())
    }

    pub fn criteria(&self) -> &BTreeSet<Criterion> {
        &self.0
    }
}

impl FromIterator<Criterion> for FlowKey {
    fn from_iter<I: IntoIterator<Item = Criterion>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, "}}")
    }
}

/// Identifier the installer assigns to a piece of forwarding state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub struct IntentId(pub u64);

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Forwarding state requested for one flow: traffic matching `key` enters
/// at `ingress`, follows `links` in order and leaves at `egress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PathIntent {
    pub key: FlowKey,
    pub ingress: ConnectPoint,
    pub egress: ConnectPoint,
    pub links: Vec<Link>,
    pub bottleneck: Bandwidth,
}

/// Handle to forwarding state that the installer has accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InstalledPath {
    pub id: IntentId,
    pub key: FlowKey,
    pub links: Vec<Link>,
}

/// A new-flow notification from the packet-in path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FlowEvent {
    pub key: FlowKey,
    pub src: HostId,
    pub dst: HostId,
}
