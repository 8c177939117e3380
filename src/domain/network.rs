// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Value Objects with Validation Invariants

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Network validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("Invalid prefix length: {0} (must be 0-32 for IPv4)")]
    InvalidPrefixLength(u8),

    #[error("CIDR block has host bits set: {0}")]
    MisalignedCidr(String),

    #[error("Cannot carve {requested} /{prefix} blocks out of {parent}")]
    AddressSpaceExhausted {
        parent: String,
        prefix: u8,
        requested: usize,
    },
}

/// IPv4 CIDR block value object
///
/// Invariants:
/// - Valid IPv4 network address
/// - Prefix length 0-32
/// - No host bits set (the address is the network address)
///
/// # Examples
///
/// ```rust
/// use gateway_infra::domain::Ipv4Cidr;
///
/// let vpc = Ipv4Cidr::new("10.0.0.0/16").unwrap();
/// let subnet = Ipv4Cidr::new("10.0.16.0/20").unwrap();
/// assert!(vpc.contains(&subnet));
/// assert!(Ipv4Cidr::new("10.0.0.1/16").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix_length: u8,
}

impl Ipv4Cidr {
    /// Parse a CIDR block such as `10.0.0.0/16`
    pub fn new(cidr: impl AsRef<str>) -> Result<Self, NetworkError> {
        let cidr = cidr.as_ref();

        let (addr_str, prefix_str) = cidr
            .split_once('/')
            .ok_or_else(|| NetworkError::InvalidCidr(cidr.to_string()))?;

        let network = Ipv4Addr::from_str(addr_str)
            .map_err(|_| NetworkError::InvalidIpAddress(addr_str.to_string()))?;

        let prefix_length = prefix_str
            .parse::<u8>()
            .map_err(|_| NetworkError::InvalidCidr(cidr.to_string()))?;

        Self::from_parts(network, prefix_length)
    }

    /// Create from a network address and prefix length
    pub fn from_parts(network: Ipv4Addr, prefix_length: u8) -> Result<Self, NetworkError> {
        if prefix_length > 32 {
            return Err(NetworkError::InvalidPrefixLength(prefix_length));
        }

        if u32::from(network) & !Self::mask(prefix_length) != 0 {
            return Err(NetworkError::MisalignedCidr(format!(
                "{}/{}",
                network, prefix_length
            )));
        }

        Ok(Self {
            network,
            prefix_length,
        })
    }

    fn mask(prefix_length: u8) -> u32 {
        if prefix_length == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix_length))
        }
    }

    /// The conventional private block `10.0.0.0/16`
    pub const fn default_vpc() -> Self {
        Self {
            network: Ipv4Addr::new(10, 0, 0, 0),
            prefix_length: 16,
        }
    }

    /// Get the network address
    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// Get the prefix length
    pub fn prefix_length(&self) -> u8 {
        self.prefix_length
    }

    /// Number of addresses in the block
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix_length))
    }

    fn first(&self) -> u64 {
        u64::from(u32::from(self.network))
    }

    fn last(&self) -> u64 {
        self.first() + self.size() - 1
    }

    /// Check whether `other` lies entirely within this block
    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.first() >= self.first() && other.last() <= self.last()
    }

    /// Check whether the two blocks share any address
    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        self.first() <= other.last() && other.first() <= self.last()
    }

    /// Carve the first `count` consecutive `/prefix` blocks out of this one
    pub fn subdivide(&self, prefix: u8, count: usize) -> Result<Vec<Ipv4Cidr>, NetworkError> {
        if prefix > 32 {
            return Err(NetworkError::InvalidPrefixLength(prefix));
        }

        let exhausted = || NetworkError::AddressSpaceExhausted {
            parent: self.as_cidr(),
            prefix,
            requested: count,
        };

        if prefix < self.prefix_length {
            return Err(exhausted());
        }

        let available = 1u64 << u32::from(prefix - self.prefix_length);
        if count as u64 > available {
            return Err(exhausted());
        }

        let step = 1u64 << (32 - u32::from(prefix));
        (0..count as u64)
            .map(|i| {
                let start = self.first() + i * step;
                let addr = u32::try_from(start).map_err(|_| exhausted())?;
                Ipv4Cidr::from_parts(Ipv4Addr::from(addr), prefix)
            })
            .collect()
    }

    /// Get as CIDR notation string
    pub fn as_cidr(&self) -> String {
        format!("{}/{}", self.network, self.prefix_length)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_cidr())
    }
}

impl FromStr for Ipv4Cidr {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Ipv4Cidr {
    type Error = NetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Ipv4Cidr> for String {
    fn from(cidr: Ipv4Cidr) -> Self {
        cidr.as_cidr()
    }
}

/// Subnet routing tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetTier {
    /// Routed to the internet gateway
    Public,
    /// Egress through NAT, no inbound internet route
    Private,
    /// No route outside the VPC
    Isolated,
}

impl SubnetTier {
    /// All tiers in layout order
    pub const ALL: [SubnetTier; 3] = [SubnetTier::Public, SubnetTier::Private, SubnetTier::Isolated];

    /// Get the canonical string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SubnetTier::Public => "public",
            SubnetTier::Private => "private",
            SubnetTier::Isolated => "isolated",
        }
    }

    /// Prefix used in logical ids and export names
    pub fn label(&self) -> &'static str {
        match self {
            SubnetTier::Public => "Public",
            SubnetTier::Private => "Private",
            SubnetTier::Isolated => "Isolated",
        }
    }
}

impl fmt::Display for SubnetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One subnet slot in a VPC layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetSlot {
    pub tier: SubnetTier,
    /// Zero-based availability zone index
    pub zone: usize,
    pub cidr: Ipv4Cidr,
}

/// Partition of a VPC block into tiered, per-zone subnets
///
/// Blocks are assigned tier-major: all public subnets first, then private,
/// then isolated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetLayout {
    vpc: Ipv4Cidr,
    slots: Vec<SubnetSlot>,
}

impl SubnetLayout {
    /// Plan `zones` subnets of size `/prefix` for each tier
    pub fn plan(vpc: Ipv4Cidr, zones: usize, prefix: u8) -> Result<Self, NetworkError> {
        let blocks = vpc.subdivide(prefix, SubnetTier::ALL.len() * zones)?;

        let slots = SubnetTier::ALL
            .iter()
            .enumerate()
            .flat_map(|(t, tier)| {
                let blocks = &blocks;
                (0..zones).map(move |zone| SubnetSlot {
                    tier: *tier,
                    zone,
                    cidr: blocks[t * zones + zone],
                })
            })
            .collect();

        Ok(Self { vpc, slots })
    }

    /// The parent VPC block
    pub fn vpc(&self) -> Ipv4Cidr {
        self.vpc
    }

    /// All slots in layout order
    pub fn slots(&self) -> &[SubnetSlot] {
        &self.slots
    }

    /// Slots belonging to one tier, ordered by zone
    pub fn tier(&self, tier: SubnetTier) -> impl Iterator<Item = &SubnetSlot> {
        self.slots.iter().filter(move |slot| slot.tier == tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cidr_parse() {
        let cidr = Ipv4Cidr::new("10.0.0.0/16").unwrap();
        assert_eq!(cidr.network(), Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(cidr.prefix_length(), 16);
        assert_eq!(cidr.size(), 65536);
        assert_eq!(cidr.as_cidr(), "10.0.0.0/16");
    }

    #[test]
    fn test_invalid_cidr() {
        assert!(Ipv4Cidr::new("10.0.0.0").is_err());
        assert!(Ipv4Cidr::new("999.0.0.0/8").is_err());
        assert!(Ipv4Cidr::new("10.0.0.0/33").is_err());
        assert!(matches!(
            Ipv4Cidr::new("10.0.0.5/24"),
            Err(NetworkError::MisalignedCidr(_))
        ));
    }

    #[test]
    fn test_contains_and_overlaps() {
        let vpc = Ipv4Cidr::new("10.0.0.0/16").unwrap();
        let a = Ipv4Cidr::new("10.0.0.0/20").unwrap();
        let b = Ipv4Cidr::new("10.0.16.0/20").unwrap();
        let wide = Ipv4Cidr::new("10.0.0.0/19").unwrap();
        let outside = Ipv4Cidr::new("10.1.0.0/20").unwrap();

        assert!(vpc.contains(&a));
        assert!(!vpc.contains(&outside));
        assert!(!a.overlaps(&b));
        assert!(wide.overlaps(&b));
        assert!(!vpc.overlaps(&outside));
    }

    #[test]
    fn test_subdivide() {
        let vpc = Ipv4Cidr::new("10.0.0.0/16").unwrap();
        let blocks = vpc.subdivide(20, 3).unwrap();
        let rendered: Vec<String> = blocks.iter().map(|b| b.as_cidr()).collect();
        assert_eq!(rendered, vec!["10.0.0.0/20", "10.0.16.0/20", "10.0.32.0/20"]);

        assert!(vpc.subdivide(20, 17).is_err());
        assert!(vpc.subdivide(8, 1).is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let cidr = Ipv4Cidr::new("172.16.0.0/12").unwrap();
        let json = serde_json::to_string(&cidr).unwrap();
        assert_eq!(json, "\"172.16.0.0/12\"");
        let back: Ipv4Cidr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cidr);
        assert!(serde_json::from_str::<Ipv4Cidr>("\"172.16.0.1/12\"").is_err());
    }

    #[test]
    fn test_subnet_layout() {
        let vpc = Ipv4Cidr::new("10.0.0.0/16").unwrap();
        let layout = SubnetLayout::plan(vpc, 2, 20).unwrap();
        assert_eq!(layout.slots().len(), 6);

        let isolated: Vec<String> = layout
            .tier(SubnetTier::Isolated)
            .map(|s| s.cidr.as_cidr())
            .collect();
        assert_eq!(isolated, vec!["10.0.64.0/20", "10.0.80.0/20"]);

        for (i, a) in layout.slots().iter().enumerate() {
            assert!(vpc.contains(&a.cidr));
            for b in &layout.slots()[i + 1..] {
                assert!(!a.cidr.overlaps(&b.cidr));
            }
        }
    }
}
