//! IPv4 CIDR blocks and port ranges, parsed with `nom`.
//!
//! The network template carves subnets out of its address space with
//! [`CidrAllocator`]; filter rules use [`Ipv4Cidr::contains`] and
//! [`Ipv4Cidr::overlaps`] to decide whether a peer lies inside the network
//! and whether it reaches a public subnet.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use nom::{
    IResult, Parser,
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res, opt},
    sequence::{preceded, separated_pair},
};
use serde::{Deserialize, Serialize};

fn octet(input: &str) -> IResult<&str, u8> {
    map_res(digit1, |s: &str| s.parse::<u8>()).parse(input)
}

fn ipv4(input: &str) -> IResult<&str, Ipv4Addr> {
    let (input, (a, _, b, _, c, _, d)) = (
        octet,
        char('.'),
        octet,
        char('.'),
        octet,
        char('.'),
        octet,
    )
        .parse(input)?;
    Ok((input, Ipv4Addr::new(a, b, c, d)))
}

fn cidr(input: &str) -> IResult<&str, (Ipv4Addr, u8)> {
    separated_pair(ipv4, char('/'), map_res(digit1, |s: &str| s.parse::<u8>())).parse(input)
}

fn port(input: &str) -> IResult<&str, u16> {
    map_res(digit1, |s: &str| s.parse::<u16>()).parse(input)
}

fn port_range(input: &str) -> IResult<&str, (u16, Option<u16>)> {
    (port, opt(preceded(char('-'), port))).parse(input)
}

const fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    }
}

/// An IPv4 network in CIDR notation with no host bits set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    addr: u32,
    prefix: u8,
}

impl Ipv4Cidr {
    /// Returns the prefix length.
    #[must_use]
    pub const fn prefix(self) -> u8 {
        self.prefix
    }

    /// Returns the network address.
    #[must_use]
    pub const fn network(self) -> Ipv4Addr {
        Ipv4Addr::from_bits(self.addr)
    }

    /// Returns the number of addresses covered by the block.
    #[must_use]
    pub const fn size(self) -> u64 {
        1u64 << (32 - self.prefix)
    }

    fn end_exclusive(self) -> u64 {
        u64::from(self.addr) + self.size()
    }

    /// Returns `true` if `other` lies entirely inside this block.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        other.prefix >= self.prefix && other.addr & mask(self.prefix) == self.addr
    }

    /// Returns `true` if the two blocks share any address. Aligned blocks
    /// either nest or are disjoint.
    #[must_use]
    pub const fn overlaps(self, other: Self) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// Returns `true` for `0.0.0.0/0`.
    #[must_use]
    pub const fn is_any(self) -> bool {
        self.prefix == 0
    }
}

impl FromStr for Ipv4Cidr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (_, (addr, prefix)) = all_consuming(cidr)
            .parse(s.trim())
            .map_err(|_| format!("malformed CIDR block: {s:?}"))?;
        if prefix > 32 {
            return Err(format!("prefix length out of range in {s:?}"));
        }
        let bits = addr.to_bits();
        if bits & !mask(prefix) != 0 {
            return Err(format!("CIDR block {s:?} has host bits set"));
        }
        Ok(Self { addr: bits, prefix })
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix)
    }
}

/// Hands out consecutive, aligned sub-blocks of an address space.
#[derive(Debug)]
pub struct CidrAllocator {
    base: Ipv4Cidr,
    cursor: u64,
}

impl CidrAllocator {
    /// Starts allocating at the beginning of `base`.
    #[must_use]
    pub fn new(base: Ipv4Cidr) -> Self {
        Self {
            base,
            cursor: u64::from(base.addr),
        }
    }

    /// Allocates the next free block with the given prefix length.
    ///
    /// Returns `None` if the prefix is shorter than the base prefix, longer
    /// than `/32`, or the address space is exhausted.
    pub fn allocate(&mut self, prefix: u8) -> Option<Ipv4Cidr> {
        if prefix < self.base.prefix || prefix > 32 {
            return None;
        }
        let size = 1u64 << (32 - prefix);
        let start = self.cursor.div_ceil(size) * size;
        let end = start + size;
        if end > self.base.end_exclusive() {
            return None;
        }
        self.cursor = end;
        Some(Ipv4Cidr {
            addr: u32::try_from(start).ok()?,
            prefix,
        })
    }
}

/// Inclusive range of ports, written `443` or `1024-65535`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PortRangeRepr", into = "String")]
pub struct PortRange {
    from: u16,
    to: u16,
}

impl PortRange {
    /// Creates a range, rejecting inverted bounds.
    ///
    /// # Errors
    ///
    /// Returns a message if `from > to`.
    pub fn new(from: u16, to: u16) -> Result<Self, String> {
        if from > to {
            return Err(format!("port range {from}-{to} is inverted"));
        }
        Ok(Self { from, to })
    }

    /// A range covering one port.
    #[must_use]
    pub const fn single(port: u16) -> Self {
        Self {
            from: port,
            to: port,
        }
    }

    /// Lower bound.
    #[must_use]
    pub const fn from_port(self) -> u16 {
        self.from
    }

    /// Upper bound.
    #[must_use]
    pub const fn to_port(self) -> u16 {
        self.to
    }
}

impl FromStr for PortRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (_, (from, to)) = all_consuming(port_range)
            .parse(s.trim())
            .map_err(|_| format!("malformed port range: {s:?}"))?;
        Self::new(from, to.unwrap_or(from))
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from == self.to {
            write!(f, "{}", self.from)
        } else {
            write!(f, "{}-{}", self.from, self.to)
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortRangeRepr {
    Single(u16),
    Text(String),
}

impl TryFrom<PortRangeRepr> for PortRange {
    type Error = String;

    fn try_from(value: PortRangeRepr) -> Result<Self, Self::Error> {
        match value {
            PortRangeRepr::Single(port) => Ok(Self::single(port)),
            PortRangeRepr::Text(text) => text.parse(),
        }
    }
}

impl From<PortRange> for String {
    fn from(range: PortRange) -> Self {
        range.to_string()
    }
}
