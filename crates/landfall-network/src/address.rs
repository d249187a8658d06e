//! Address planning
//!
//! An [`AddressBlock`] is the network's CIDR plus the prefix length every
//! subnet gets. Its [`SubnetPlan`] divides the block into equal pieces that
//! are addressed by index rather than handed out from a shrinking list, so a
//! given (zone, tier) pair always receives the same range.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;

use landfall_common::{Error, Result};

/// A CIDR block and the prefix length of the subnets carved from it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressBlock {
    network: Ipv4Net,
    subnet_prefix: u8,
}

/// Read a prefix length from a subnet mask.
///
/// Accepts a dotted netmask (`255.255.240.0`), a dotted hostmask
/// (`0.0.15.255`) or a prefix length (`20`, `/20`). A dotted mask is
/// validated by building a zero-address network with it; the netmask reading
/// wins when both apply.
pub fn mask_prefix_len(subnet_mask: &str) -> Result<u8> {
    let trimmed = subnet_mask.trim();
    if let Ok(prefix) = trimmed.trim_start_matches('/').parse::<u8>() {
        return Ipv4Net::new(Ipv4Addr::UNSPECIFIED, prefix)
            .map(|net| net.prefix_len())
            .map_err(|_| {
                Error::addressing(subnet_mask, format!("prefix length {} exceeds 32", prefix))
            });
    }
    let mask = Ipv4Addr::from_str(trimmed).map_err(|e| {
        Error::addressing(subnet_mask, format!("invalid subnet mask: {}", e))
    })?;
    Ipv4Net::with_netmask(Ipv4Addr::UNSPECIFIED, mask)
        .or_else(|_| {
            let hostmask = Ipv4Addr::from(!u32::from(mask));
            Ipv4Net::with_netmask(Ipv4Addr::UNSPECIFIED, hostmask)
        })
        .map(|net| net.prefix_len())
        .map_err(|_| Error::addressing(subnet_mask, "subnet mask is not contiguous"))
}

impl AddressBlock {
    /// Parse a CIDR block and subnet mask.
    ///
    /// The block must not have host bits set, and the mask must be no
    /// coarser than the block's own prefix.
    pub fn parse(cidr_block: &str, subnet_mask: &str) -> Result<Self> {
        let network = Ipv4Net::from_str(cidr_block.trim())
            .map_err(|e| Error::addressing(cidr_block, format!("invalid CIDR block: {}", e)))?;
        if network.addr() != network.network() {
            return Err(Error::addressing(
                cidr_block,
                format!("host bits set, did you mean {}?", network.trunc()),
            ));
        }
        let subnet_prefix = mask_prefix_len(subnet_mask)?;
        Self::new(network, subnet_prefix)
    }

    /// Build a block from an already parsed network
    pub fn new(network: Ipv4Net, subnet_prefix: u8) -> Result<Self> {
        if subnet_prefix < network.prefix_len() {
            return Err(Error::addressing(
                network.to_string(),
                format!(
                    "subnet prefix /{} is coarser than the block prefix /{}",
                    subnet_prefix,
                    network.prefix_len()
                ),
            ));
        }
        if subnet_prefix > 32 {
            return Err(Error::addressing(
                network.to_string(),
                format!("subnet prefix /{} exceeds 32", subnet_prefix),
            ));
        }
        Ok(Self {
            network: network.trunc(),
            subnet_prefix,
        })
    }

    /// The whole block
    pub fn network(&self) -> Ipv4Net {
        self.network
    }

    /// Prefix length of each subnet
    pub fn subnet_prefix(&self) -> u8 {
        self.subnet_prefix
    }

    /// Number of subnets: `2^(subnet_prefix - block_prefix)`
    pub fn subnet_count(&self) -> u64 {
        1u64 << (self.subnet_prefix - self.network.prefix_len())
    }

    /// The block's subnet plan
    pub fn plan(&self) -> SubnetPlan {
        SubnetPlan { block: *self }
    }

    /// The address at `offset` from the start of the block, if inside it
    pub fn host(&self, offset: u32) -> Option<Ipv4Addr> {
        let size = 1u64 << (32 - self.network.prefix_len());
        if u64::from(offset) >= size {
            return None;
        }
        Some(Ipv4Addr::from(u32::from(self.network.network()) + offset))
    }
}

impl fmt::Display for AddressBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} split into /{}", self.network, self.subnet_prefix)
    }
}

/// Which half of a zone's allocation a subnet belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubnetTier {
    /// Routed to the internet gateway
    Public,
    /// No internet route
    Private,
}

impl SubnetTier {
    fn offset(self) -> u64 {
        match self {
            SubnetTier::Public => 0,
            SubnetTier::Private => 1,
        }
    }
}

impl fmt::Display for SubnetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubnetTier::Public => write!(f, "public"),
            SubnetTier::Private => write!(f, "private"),
        }
    }
}

/// The public and private range assigned to one availability zone
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneAllocation {
    /// Availability zone name
    pub zone: String,
    /// Public subnet range
    pub public: Ipv4Net,
    /// Private subnet range
    pub private: Ipv4Net,
}

/// Equal-sized, non-overlapping subnets covering an [`AddressBlock`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubnetPlan {
    block: AddressBlock,
}

impl SubnetPlan {
    /// Number of subnets in the plan
    pub fn len(&self) -> u64 {
        self.block.subnet_count()
    }

    /// Always false: a valid block has at least one subnet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The subnet at `index`, in address order
    pub fn get(&self, index: u64) -> Option<Ipv4Net> {
        if index >= self.len() {
            return None;
        }
        let size = 1u64 << (32 - self.block.subnet_prefix);
        let base = u64::from(u32::from(self.block.network.network()));
        let start = u32::try_from(base + index * size).ok()?;
        Ipv4Net::new(Ipv4Addr::from(start), self.block.subnet_prefix).ok()
    }

    /// Every subnet in address order
    pub fn iter(&self) -> impl Iterator<Item = Ipv4Net> + '_ {
        (0..self.len()).map_while(move |i| self.get(i))
    }

    /// The subnet for the `zone_index`-th zone and `tier`.
    ///
    /// Zone `i` owns indices `2i` (public) and `2i + 1` (private).
    pub fn subnet_for(&self, zone_index: usize, tier: SubnetTier) -> Result<Ipv4Net> {
        let index = (zone_index as u64) * 2 + tier.offset();
        self.get(index).ok_or_else(|| {
            Error::addressing(
                self.block.network.to_string(),
                format!(
                    "no {} subnet for zone #{}: plan holds {} subnets of /{}",
                    tier,
                    zone_index,
                    self.len(),
                    self.block.subnet_prefix
                ),
            )
        })
    }

    /// Assign a public and a private subnet to each zone, in zone order
    pub fn allocate(&self, zones: &[String]) -> Result<Vec<ZoneAllocation>> {
        if zones.is_empty() {
            return Err(Error::addressing(
                self.block.network.to_string(),
                "no availability zones to allocate subnets for",
            ));
        }
        let needed = zones.len() as u64 * 2;
        if needed > self.len() {
            return Err(Error::addressing(
                self.block.network.to_string(),
                format!(
                    "{} zones need {} subnets but /{} only yields {}",
                    zones.len(),
                    needed,
                    self.block.subnet_prefix,
                    self.len()
                ),
            ));
        }
        zones
            .iter()
            .enumerate()
            .map(|(i, zone)| {
                Ok(ZoneAllocation {
                    zone: zone.clone(),
                    public: self.subnet_for(i, SubnetTier::Public)?,
                    private: self.subnet_for(i, SubnetTier::Private)?,
                })
            })
            .collect()
    }
}
