//! Sequence-number arithmetic over the finite sequence space.

/// Maximum number of packets the sender may have outstanding, and the
/// capacity of the receiver's reorder buffer.
pub const WINDOW_SIZE: usize = 6;

/// Size of the sequence space. Selective Repeat requires at least twice the
/// window size, otherwise an old packet and a new one occupying the same
/// slot are indistinguishable.
pub const SEQ_SPACE: i32 = 12;

const _: () = assert!(SEQ_SPACE as usize >= 2 * WINDOW_SIZE);

/// Next sequence number, wrapping back to 0 at the end of the space.
pub fn advance(seq: i32) -> i32 {
    (seq + 1) % SEQ_SPACE
}

/// Circular containment test for the inclusive range `[first, last]`.
/// `first > last` means the range straddles the wraparound point.
pub fn in_window(first: i32, last: i32, seq: i32) -> bool {
    if first <= last {
        seq >= first && seq <= last
    } else {
        seq >= first || seq <= last
    }
}
