//! Best-effort local network observation. The probe has no packet capture
//! engine in scope — what it contributes to the detection-to-response
//! core is turning whatever the kernel already exposes about active
//! connections into canonical `network` events through the same
//! transport as the endpoint agent.
//! On Linux this reads `/proc/net/tcp`/`/proc/net/tcp6`; on any other
//! platform `scan()` returns an empty list rather than failing the probe.

use std::net::{Ipv4Addr, Ipv6Addr};

const TCP_STATE_ESTABLISHED: &str = "01";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub local_port: u16,
    pub remote_ip: String,
    pub remote_port: u16,
}

fn parse_hex_u16(s: &str) -> Option<u16> {
    u16::from_str_radix(s, 16).ok()
}

/// Parses one `/proc/net/tcp`-shaped table (header line + one row per
/// socket) into established connections with a non-loopback, non-zero
/// remote address. Pure and independently testable against a fixture
/// string, since the real file is only readable on Linux.
pub fn parse_proc_net_tcp_v4(contents: &str) -> Vec<Connection> {
    parse_rows(contents, parse_ipv4_hex)
}

pub fn parse_proc_net_tcp_v6(contents: &str) -> Vec<Connection> {
    parse_rows(contents, parse_ipv6_hex)
}

fn parse_rows(contents: &str, parse_addr: impl Fn(&str) -> Option<String>) -> Vec<Connection> {
    let mut out = Vec::new();
    for line in contents.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        // fields[0] is the table's `sl` row index, not an address.
        let Some((local, remote, state)) = (|| Some((*fields.get(1)?, *fields.get(2)?, *fields.get(3)?)))() else {
            continue;
        };
        if state != TCP_STATE_ESTABLISHED {
            continue;
        }
        let Some((_, local_port_hex)) = local.split_once(':') else { continue };
        let Some((remote_addr_hex, remote_port_hex)) = remote.split_once(':') else { continue };

        let (Some(local_port), Some(remote_port)) = (parse_hex_u16(local_port_hex), parse_hex_u16(remote_port_hex)) else {
            continue;
        };
        let Some(remote_ip) = parse_addr(remote_addr_hex) else { continue };
        if remote_ip == "0.0.0.0" || remote_port == 0 {
            continue;
        }

        out.push(Connection { local_port, remote_ip, remote_port });
    }
    out
}

/// `/proc/net/tcp` stores IPv4 addresses as 8 hex chars, little-endian
/// per octet group.
fn parse_ipv4_hex(hex_addr: &str) -> Option<String> {
    if hex_addr.len() != 8 {
        return None;
    }
    let bytes = hex::decode(hex_addr).ok()?;
    Some(Ipv4Addr::new(bytes[3], bytes[2], bytes[1], bytes[0]).to_string())
}

/// `/proc/net/tcp6` stores IPv6 addresses as 32 hex chars, little-endian
/// per 32-bit word.
fn parse_ipv6_hex(hex_addr: &str) -> Option<String> {
    if hex_addr.len() != 32 {
        return None;
    }
    let raw = hex::decode(hex_addr).ok()?;
    let mut segments = [0u8; 16];
    for word in 0..4 {
        let word_bytes = &raw[word * 4..word * 4 + 4];
        segments[word * 4] = word_bytes[3];
        segments[word * 4 + 1] = word_bytes[2];
        segments[word * 4 + 2] = word_bytes[1];
        segments[word * 4 + 3] = word_bytes[0];
    }
    Some(Ipv6Addr::from(segments).to_string().to_lowercase())
}

/// Reads the live `/proc/net/tcp[6]` tables. Returns an empty list (not an
/// error) when the files do not exist, so the probe degrades gracefully on
/// non-Linux hosts instead of crash-looping.
pub fn scan() -> Vec<Connection> {
    let mut connections = Vec::new();
    if let Ok(contents) = std::fs::read_to_string("/proc/net/tcp") {
        connections.extend(parse_proc_net_tcp_v4(&contents));
    }
    if let Ok(contents) = std::fs::read_to_string("/proc/net/tcp6") {
        connections.extend(parse_proc_net_tcp_v6(&contents));
    }
    connections
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE_V4: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n \
         0: 0100007F:0050 0100007F:9C40 01 00000000:00000000 00:00000000 00000000     0        0 12345 1 0000000000000000 100 0 0 10 0\n \
         1: 00000000:0016 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 12346 1 0000000000000000 100 0 0 10 0\n";

    #[test]
    fn parses_an_established_ipv4_connection_and_skips_listeners() {
        let connections = parse_proc_net_tcp_v4(FIXTURE_V4);
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].remote_ip, "127.0.0.1");
        assert_eq!(connections[0].remote_port, 0x9C40);
        assert_eq!(connections[0].local_port, 0x0050);
    }

    #[test]
    fn scan_never_panics_regardless_of_platform() {
        let _ = scan();
    }
}
