//! Encodes one payload as a complete, self-delimited, checksummed frame.

use crate::checksum::{CrcCcitt, Fletcher16};
use crate::stuffing::{stuff_byte, FLAG};

/// Appends the wire encoding of `payload` to `out`: a leading `FLAG`, the
/// stuffed four-octet length, the stuffed payload, and the stuffed
/// Fletcher-16 and CRC-CCITT trailers. No trailing `FLAG` — the next frame's
/// leading `FLAG` (or end of transmission) delimits this one, matching the
/// receiver's resynchronize-on-`FLAG` behavior.
pub fn encode(payload: &[u8], out: &mut Vec<u8>) {
    out.push(FLAG);

    for b in (payload.len() as u32).to_be_bytes() {
        stuff_byte(b, out);
    }

    let mut fletcher = Fletcher16::new();
    let mut crc = CrcCcitt::new();
    for &b in payload {
        fletcher.update(b);
        crc.update(b);
        stuff_byte(b, out);
    }

    for b in fletcher.finish() {
        stuff_byte(b, out);
    }
    for b in crc.finish() {
        stuff_byte(b, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_still_carries_both_trailers() {
        let mut out = Vec::new();
        encode(b"", &mut out);
        // FLAG + 4 length octets (all zero, none reserved) + 2 fletcher + 4 crc
        assert_eq!(out[0], FLAG);
        assert_eq!(out.len(), 1 + 4 + 2 + 4);
    }

    #[test]
    fn reserved_octet_in_payload_is_stuffed() {
        let mut out = Vec::new();
        encode(&[FLAG], &mut out);
        assert!(out[1..].windows(1).all(|w| w[0] != FLAG));
    }
}
