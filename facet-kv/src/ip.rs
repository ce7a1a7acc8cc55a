use core::fmt;
use core::net::{AddrParseError, IpAddr, Ipv4Addr};
use core::str::FromStr;

use facet::Facet;

/// A network mask written in address notation, such as `255.255.255.0` or `ffff:ffff::`.
///
/// Fields of this type decode from dotted (IPv4) or colon (IPv6) text. An empty value
/// decodes to the unspecified address.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpMask(pub IpAddr);

impl IpMask {
    /// The all-zero IPv4 mask.
    pub const UNSPECIFIED: IpMask = IpMask(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    /// Returns the address form of the mask.
    pub fn addr(&self) -> IpAddr {
        self.0
    }

    /// Returns the number of leading one bits, or `None` when the mask is not canonical
    /// (ones followed by zeros).
    pub fn prefix_len(&self) -> Option<u32> {
        let (bits, width) = match self.0 {
            IpAddr::V4(v4) => (u128::from(u32::from(v4)) << 96, 32),
            IpAddr::V6(v6) => (u128::from(v6), 128),
        };
        let ones = bits.leading_ones();
        let rest = bits.checked_shl(ones).unwrap_or(0);
        (rest == 0 && ones <= width).then_some(ones)
    }
}

impl Default for IpMask {
    fn default() -> Self {
        Self::UNSPECIFIED
    }
}

impl FromStr for IpMask {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(IpMask)
    }
}

impl fmt::Display for IpMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<IpAddr> for IpMask {
    fn from(addr: IpAddr) -> Self {
        IpMask(addr)
    }
}
