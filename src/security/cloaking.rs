//! Host cloaking.
//!
//! With `server.cloak_secret` set, the host shown to other users is an
//! HMAC-SHA256 digest of the client's /24 (IPv4) or /48 (IPv6) network, so
//! bans on the cloak still cover a neighbourhood while the real address stays
//! private. K/Z-lines always match the real address.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

type HmacSha256 = Hmac<Sha256>;

const BASE32_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";

fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 8 / 5 + 1);
    let mut bits = 0u32;
    let mut count = 0u8;
    for &byte in data {
        bits = (bits << 8) | u32::from(byte);
        count += 8;
        while count >= 5 {
            count -= 5;
            out.push(BASE32_ALPHABET[((bits >> count) & 0x1f) as usize] as char);
        }
    }
    if count > 0 {
        out.push(BASE32_ALPHABET[((bits << (5 - count)) & 0x1f) as usize] as char);
    }
    out
}

fn network_of(ip: &IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, _] = v4.octets();
            IpAddr::V4(Ipv4Addr::new(a, b, c, 0))
        }
        IpAddr::V6(v6) => {
            let s = v6.segments();
            IpAddr::V6(Ipv6Addr::new(s[0], s[1], s[2], 0, 0, 0, 0, 0))
        }
    }
}

/// Cloak an address, e.g. `abcde.fghij.klmno.ip`.
pub fn cloak_ip(ip: &IpAddr, secret: &str) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return ip.to_string();
    };
    mac.update(network_of(ip).to_string().as_bytes());
    let digest = mac.finalize().into_bytes();
    let segments = [
        base32_encode(&digest[0..3]),
        base32_encode(&digest[3..6]),
        base32_encode(&digest[6..9]),
    ];
    match ip {
        IpAddr::V4(_) => format!("{}.ip", segments.join(".")),
        IpAddr::V6(_) => format!("{}:ip", segments.join(":")),
    }
}
