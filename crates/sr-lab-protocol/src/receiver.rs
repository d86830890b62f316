//! Receiver half of the Selective Repeat protocol.

use crate::checksum::{compute_checksum, is_corrupted};
use crate::seq::{SEQ_SPACE, WINDOW_SIZE, advance, in_window};
use sr_lab_abstract::{Packet, SystemContext, TransportProtocol};

/// Counters the receiver exposes as observable side effects for reporting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverCounters {
    /// Structurally valid data packets received, duplicates included.
    pub packets_received: u64,
}

/// Receiver engine. Buffers in-range packets that arrive out of order and
/// delivers contiguous runs to the application, acknowledging every valid
/// arrival whether or not it is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrReceiver {
    buffer: [Option<Packet>; WINDOW_SIZE],
    window_first: usize,
    expected_seq: i32,
    next_seq: i32,
    counters: ReceiverCounters,
}

impl Default for SrReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl SrReceiver {
    pub fn new() -> Self {
        Self {
            buffer: [const { None }; WINDOW_SIZE],
            window_first: 0,
            expected_seq: 0,
            // the receiver's own packets start at 1
            next_seq: 1,
            counters: ReceiverCounters::default(),
        }
    }

    pub fn counters(&self) -> ReceiverCounters {
        self.counters
    }

    /// Next sequence number the application is waiting for.
    pub fn expected_seq(&self) -> i32 {
        self.expected_seq
    }
}

impl TransportProtocol for SrReceiver {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        *self = Self::new();
        ctx.log("SR receiver ready");
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        // A corrupted packet gets no ACK at all; the sender's timeout
        // recovers it.
        if is_corrupted(&packet) {
            ctx.log("corrupted packet received, do nothing");
            return;
        }
        ctx.log(&format!(
            "packet {} is correctly received, send ACK",
            packet.seqnum
        ));
        self.counters.packets_received += 1;

        // Every valid arrival is acknowledged, in range or not, otherwise a
        // lost ACK would leave the sender retransmitting forever.
        let mut ack = Packet::ack(self.next_seq, packet.seqnum);
        ack.checksum = compute_checksum(&ack);
        self.next_seq = advance(self.next_seq);
        ctx.send_packet(ack);

        let range_last = (self.expected_seq + WINDOW_SIZE as i32 - 1) % SEQ_SPACE;
        if !in_window(self.expected_seq, range_last, packet.seqnum) {
            // duplicate of already-delivered data; the ACK above is all it
            // needed
            return;
        }

        let seqnum = packet.seqnum;
        self.buffer[seqnum as usize % WINDOW_SIZE] = Some(packet);

        if seqnum == self.expected_seq {
            // deliver the contiguous run starting at the buffer base
            while self.buffer[self.window_first]
                .as_ref()
                .is_some_and(|p| p.seqnum == self.expected_seq)
            {
                if let Some(buffered) = self.buffer[self.window_first].take() {
                    ctx.log(&format!(
                        "delivering packet {} to the application",
                        buffered.seqnum
                    ));
                    ctx.deliver_data(&buffered.payload);
                }
                self.window_first = (self.window_first + 1) % WINDOW_SIZE;
                self.expected_seq = advance(self.expected_seq);
            }
        }
    }

    fn on_timer(&mut self, _ctx: &mut dyn SystemContext, _timer_id: u32) {
        // the receiver arms no timers
    }

    fn on_app_data(&mut self, _ctx: &mut dyn SystemContext, _data: &[u8]) {
        // simplex transfer; the receiver never originates data
    }
}
