//! Packet integrity codec, shared by both engines.

use sr_lab_abstract::Packet;

/// Additive checksum over the header fields and every payload byte. Any
/// single-field change produces a different value; this detects corruption,
/// it does not correct it.
pub fn compute_checksum(packet: &Packet) -> i32 {
    let mut checksum = packet.seqnum.wrapping_add(packet.acknum);
    for &byte in &packet.payload {
        checksum = checksum.wrapping_add(byte as i32);
    }
    checksum
}

/// True iff the carried checksum does not match the recomputed one.
pub fn is_corrupted(packet: &Packet) -> bool {
    packet.checksum != compute_checksum(packet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sr_lab_abstract::NOT_IN_USE;

    fn sealed(mut packet: Packet) -> Packet {
        packet.checksum = compute_checksum(&packet);
        packet
    }

    #[test]
    fn intact_packet_is_not_corrupted() {
        let packet = sealed(Packet::data(3, *b"abcdefghijabcdefghij"));
        assert!(!is_corrupted(&packet));
    }

    #[test]
    fn payload_change_is_detected() {
        let mut packet = sealed(Packet::data(3, *b"abcdefghijabcdefghij"));
        packet.payload[7] ^= 0xff;
        assert!(is_corrupted(&packet));
    }

    #[test]
    fn header_change_is_detected() {
        let mut packet = sealed(Packet::ack(1, 5));
        packet.acknum = 6;
        assert!(is_corrupted(&packet));
    }

    #[test]
    fn checksum_covers_the_sentinel_acknum() {
        let with_sentinel = sealed(Packet::data(0, [b'x'; 20]));
        assert_eq!(with_sentinel.acknum, NOT_IN_USE);
        let mut reused = with_sentinel.clone();
        reused.acknum = 0;
        assert_ne!(compute_checksum(&reused), with_sentinel.checksum);
    }
}
