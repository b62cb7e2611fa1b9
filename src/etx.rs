use rustc_hash::FxHashMap;
use std::net::{IpAddr, Ipv4Addr};

const IPV4_BITS: u8 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Prefix {
    network: u32,
    len: u8,
}

impl Prefix {
    fn new(addr: Ipv4Addr, len: u8) -> Self {
        let mask = prefix_mask(len);
        Self {
            network: u32::from(addr) & mask,
            len,
        }
    }

    const fn contains(self, addr: u32) -> bool {
        addr & prefix_mask(self.len) == self.network
    }
}

const fn prefix_mask(len: u8) -> u32 {
    if len == 0 {
        0
    } else {
        u32::MAX << (IPV4_BITS - len)
    }
}

/// ETX metrics per IPv4 prefix, resolved by longest-prefix match.
#[derive(Debug, Clone, Default)]
pub struct EtxIndex {
    // Sorted by descending prefix length so the first hit is the most specific.
    entries: Vec<(Prefix, i64)>,
}

impl EtxIndex {
    pub fn from_prefixes<'a, I>(metrics: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a i64)>,
    {
        let mut best: FxHashMap<(u32, u8), i64> = FxHashMap::default();
        for (key, &metric) in metrics {
            let Some(prefix) = parse_prefix(key) else {
                tracing::warn!(prefix = %key, "skipping ETX entry with an unparsable IPv4 prefix");
                continue;
            };
            best.entry((prefix.network, prefix.len))
                .and_modify(|existing| *existing = (*existing).min(metric))
                .or_insert(metric);
        }

        let mut entries: Vec<(Prefix, i64)> = best
            .into_iter()
            .map(|((network, len), metric)| (Prefix { network, len }, metric))
            .collect();
        entries.sort_by(|(a, _), (b, _)| b.len.cmp(&a.len).then(a.network.cmp(&b.network)));
        tracing::debug!(prefixes = entries.len(), "built ETX index");
        Self { entries }
    }

    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, ip: IpAddr) -> Option<i64> {
        let IpAddr::V4(v4) = ip else {
            return None;
        };
        let addr = u32::from(v4);
        self.entries
            .iter()
            .find(|(prefix, _)| prefix.contains(addr))
            .map(|&(_, metric)| metric)
    }
}

fn parse_prefix(key: &str) -> Option<Prefix> {
    let key = key.trim();
    let (addr, len) = match key.split_once('/') {
        Some((addr, len)) => (addr, len.parse::<u8>().ok()?),
        None => (key, IPV4_BITS),
    };
    if len > IPV4_BITS {
        return None;
    }
    let addr = addr.parse::<Ipv4Addr>().ok()?;
    Some(Prefix::new(addr, len))
}
