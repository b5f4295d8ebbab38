//! Textual rendering of addresses carried in Z/IP payloads.
//!
//! Node Advertisements carry a raw 16-octet address which is either a native
//! IPv6 address or an IPv4-mapped one. These helpers produce the canonical
//! text form used to reach the node.

use super::constants::IPV6_ADDRESS_SIZE;

/// Number of 16-bit groups in an IPv6 address.
const IPV6_GROUPS: usize = IPV6_ADDRESS_SIZE / 2;

/// Render four octets in dotted-decimal notation.
pub fn format_ipv4(octets: &[u8; 4]) -> String {
    format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3])
}

/// Check whether a 16-octet address is IPv4-mapped (`::ffff:a.b.c.d`).
pub fn is_ipv4_mapped(octets: &[u8; IPV6_ADDRESS_SIZE]) -> bool {
    octets[..10].iter().all(|&b| b == 0) && octets[10] == 0xff && octets[11] == 0xff
}

/// Extract the embedded IPv4 address of an IPv4-mapped address.
pub fn mapped_ipv4(octets: &[u8; IPV6_ADDRESS_SIZE]) -> Option<[u8; 4]> {
    if !is_ipv4_mapped(octets) {
        return None;
    }
    Some([octets[12], octets[13], octets[14], octets[15]])
}

/// Render a 16-octet address in canonical text form.
///
/// IPv4-mapped addresses keep their dotted tail. Otherwise the longest run
/// of at least two zero groups collapses to `::` (the leftmost run wins a
/// tie) and each remaining group is lowercase hex without leading zeros.
pub fn format_ipv6(octets: &[u8; IPV6_ADDRESS_SIZE]) -> String {
    if let Some(v4) = mapped_ipv4(octets) {
        return format!("::ffff:{}", format_ipv4(&v4));
    }

    let mut groups = [0u16; IPV6_GROUPS];
    for (i, group) in groups.iter_mut().enumerate() {
        *group = u16::from_be_bytes([octets[2 * i], octets[2 * i + 1]]);
    }

    match longest_zero_run(&groups) {
        Some((start, len)) => format!(
            "{}::{}",
            join_groups(&groups[..start]),
            join_groups(&groups[start + len..])
        ),
        None => join_groups(&groups),
    }
}

/// Find `(start, len)` of the longest run of zero groups longer than one.
fn longest_zero_run(groups: &[u16; IPV6_GROUPS]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut i = 0;

    while i < groups.len() {
        if groups[i] != 0 {
            i += 1;
            continue;
        }

        let start = i;
        while i < groups.len() && groups[i] == 0 {
            i += 1;
        }
        let len = i - start;

        // strictly greater keeps the leftmost run on ties
        if len > 1 && best.is_none_or(|(_, best_len)| len > best_len) {
            best = Some((start, len));
        }
    }

    best
}

fn join_groups(groups: &[u16]) -> String {
    groups
        .iter()
        .map(|g| format!("{g:x}"))
        .collect::<Vec<_>>()
        .join(":")
}
