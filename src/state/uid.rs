//! Connection identifiers.
//!
//! Every accepted connection gets a UID before its first line is read: the
//! server's SID followed by a six-character base-36 serial, e.g. `0LNAAAAAC`.
//! UIDs never change over a connection's life, unlike nicknames.

use std::sync::atomic::{AtomicU64, Ordering};

pub type Uid = String;

const ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug)]
pub struct UidGenerator {
    sid: String,
    serial: AtomicU64,
}

impl UidGenerator {
    pub fn new(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            serial: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> Uid {
        let n = self.serial.fetch_add(1, Ordering::Relaxed);
        let mut uid = String::with_capacity(self.sid.len() + 6);
        uid.push_str(&self.sid);
        uid.push_str(&serial_chars(n));
        uid
    }
}

fn serial_chars(mut n: u64) -> String {
    let mut out = [b'A'; 6];
    for slot in out.iter_mut().rev() {
        *slot = ALPHABET[(n % 36) as usize];
        n /= 36;
    }
    out.iter().map(|&b| b as char).collect()
}
