//! Sender half of the Selective Repeat protocol.

use crate::checksum::{compute_checksum, is_corrupted};
use crate::seq::{WINDOW_SIZE, advance, in_window};
use sr_lab_abstract::{Packet, SystemContext, TransportProtocol};

/// Retransmission timeout, matched to the channel's round-trip time.
pub const RETRANSMIT_TIMEOUT: u64 = 15;

/// Id of the sender's single logical timer.
const RETRANSMIT_TIMER: u32 = 0;

/// Counters the sender exposes as observable side effects for reporting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SenderCounters {
    /// Every uncorrupted ACK that reached the sender, duplicates included.
    pub total_acks_received: u64,
    /// ACKs that newly acknowledged an outstanding packet.
    pub new_acks: u64,
    /// Data packets retransmitted after a timeout.
    pub packets_resent: u64,
    /// Messages rejected because the send window was full.
    pub window_full: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SendSlot {
    packet: Packet,
    acked: bool,
}

/// Sender engine. Owns the outbound sliding window: a circular buffer of
/// `WINDOW_SIZE` slots holding packets that were transmitted but have not
/// yet been acknowledged and slid out.
///
/// Occupied slots are contiguous from `window_first` to `window_last`.
/// `window_count` counts occupied slots still awaiting an ACK; `ack_count`
/// counts occupied slots already acknowledged but stuck behind an older
/// outstanding packet. A new message is admitted only while
/// `window_count + ack_count < WINDOW_SIZE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrSender {
    window: [Option<SendSlot>; WINDOW_SIZE],
    window_first: usize,
    window_last: usize,
    window_count: usize,
    ack_count: usize,
    next_seq: i32,
    timer_armed: bool,
    counters: SenderCounters,
}

impl Default for SrSender {
    fn default() -> Self {
        Self::new()
    }
}

impl SrSender {
    pub fn new() -> Self {
        Self {
            window: [const { None }; WINDOW_SIZE],
            window_first: 0,
            // the first insertion lands at (window_last + 1) % WINDOW_SIZE
            window_last: WINDOW_SIZE - 1,
            window_count: 0,
            ack_count: 0,
            next_seq: 0,
            timer_armed: false,
            counters: SenderCounters::default(),
        }
    }

    pub fn counters(&self) -> SenderCounters {
        self.counters
    }

    /// Occupied slots still awaiting an ACK.
    pub fn window_count(&self) -> usize {
        self.window_count
    }

    /// Occupied slots acknowledged but not yet slid out.
    pub fn ack_count(&self) -> usize {
        self.ack_count
    }

    pub fn timer_armed(&self) -> bool {
        self.timer_armed
    }

    fn arm_timer(&mut self, ctx: &mut dyn SystemContext) {
        debug_assert!(!self.timer_armed, "timer armed twice");
        ctx.start_timer(RETRANSMIT_TIMEOUT, RETRANSMIT_TIMER);
        self.timer_armed = true;
    }

    fn disarm_timer(&mut self, ctx: &mut dyn SystemContext) {
        debug_assert!(self.timer_armed, "timer stopped while stopped");
        ctx.cancel_timer(RETRANSMIT_TIMER);
        self.timer_armed = false;
    }

    /// Slide the window base forward across every consecutively acknowledged
    /// slot, vacating each one as it leaves the window.
    fn slide_window(&mut self) {
        while let Some(slot) = &self.window[self.window_first] {
            if !slot.acked {
                break;
            }
            self.window[self.window_first] = None;
            self.window_first = (self.window_first + 1) % WINDOW_SIZE;
            self.ack_count -= 1;
        }
    }
}

impl TransportProtocol for SrSender {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        *self = Self::new();
        ctx.log("SR sender ready");
    }

    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, data: &[u8]) {
        // Admission test. Acknowledged-but-not-slid packets still occupy
        // slots, so they count against the window. A rejected message is
        // dropped outright, not queued.
        if self.window_count + self.ack_count >= WINDOW_SIZE {
            ctx.log("new message arrives but send window is full, dropping it");
            self.counters.window_full += 1;
            return;
        }

        ctx.log(&format!(
            "new message arrives, sending packet {} to the channel",
            self.next_seq
        ));
        let mut packet = Packet::data(self.next_seq, Packet::pad_payload(data));
        packet.checksum = compute_checksum(&packet);

        self.window_last = (self.window_last + 1) % WINDOW_SIZE;
        debug_assert!(self.window[self.window_last].is_none());
        self.window[self.window_last] = Some(SendSlot {
            packet: packet.clone(),
            acked: false,
        });
        self.window_count += 1;

        ctx.send_packet(packet);
        ctx.record_metric(
            "send_window_occupancy",
            (self.window_count + self.ack_count) as f64,
        );

        if self.window_count == 1 {
            self.arm_timer(ctx);
        }
        self.next_seq = advance(self.next_seq);
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if is_corrupted(&packet) {
            ctx.log("corrupted ACK received, do nothing");
            return;
        }
        ctx.log(&format!("uncorrupted ACK {} received", packet.acknum));
        self.counters.total_acks_received += 1;

        // The return direction carries acknowledgments only; a packet with
        // the sentinel acknum has nothing for us.
        if self.window_count == 0 || !packet.is_ack() {
            return;
        }

        let Some(first_slot) = &self.window[self.window_first] else {
            return;
        };
        let Some(last_slot) = &self.window[self.window_last] else {
            return;
        };
        let seq_first = first_slot.packet.seqnum;
        let seq_last = last_slot.packet.seqnum;

        if !in_window(seq_first, seq_last, packet.acknum) {
            ctx.log(&format!("ACK {} is a duplicate, do nothing", packet.acknum));
            return;
        }

        // Sequence numbers and slot indexes advance in lockstep, so the
        // targeted slot is always acknum mod WINDOW_SIZE.
        let slot_index = packet.acknum as usize % WINDOW_SIZE;
        let newly_acked = match &mut self.window[slot_index] {
            Some(slot) if !slot.acked => {
                slot.acked = true;
                true
            }
            _ => false,
        };
        if !newly_acked {
            ctx.log(&format!("ACK {} is a duplicate, do nothing", packet.acknum));
            return;
        }

        ctx.log(&format!("ACK {} is not a duplicate", packet.acknum));
        self.counters.new_acks += 1;
        self.ack_count += 1;
        self.window_count -= 1;

        if packet.acknum == seq_first {
            self.slide_window();
        }

        // Stop-before-start discipline: every accepted new ACK stops the
        // timer, and it is re-armed only while packets remain outstanding.
        self.disarm_timer(ctx);
        if self.window_count >= 1 {
            self.arm_timer(ctx);
        }
        ctx.record_metric(
            "send_window_occupancy",
            (self.window_count + self.ack_count) as f64,
        );
    }

    fn on_timer(&mut self, ctx: &mut dyn SystemContext, timer_id: u32) {
        if timer_id != RETRANSMIT_TIMER {
            return;
        }
        self.timer_armed = false;

        // Retransmit exactly the oldest unacknowledged packet, never the
        // whole window.
        for offset in 0..WINDOW_SIZE {
            let index = (self.window_first + offset) % WINDOW_SIZE;
            let resend = match &self.window[index] {
                Some(slot) if !slot.acked => Some(slot.packet.clone()),
                _ => None,
            };
            if let Some(packet) = resend {
                ctx.log(&format!("timeout, resending packet {}", packet.seqnum));
                ctx.send_packet(packet);
                self.counters.packets_resent += 1;
                self.arm_timer(ctx);
                return;
            }
        }
        // No unacked slot left; a correctly stopped timer should not get
        // here, but an expiry racing the last ACK is harmless.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::SEQ_SPACE;

    #[derive(Default)]
    struct RecordingContext {
        sent: Vec<Packet>,
        timers_started: Vec<(u64, u32)>,
        timers_cancelled: Vec<u32>,
    }

    impl SystemContext for RecordingContext {
        fn send_packet(&mut self, packet: Packet) {
            self.sent.push(packet);
        }
        fn start_timer(&mut self, delay: u64, timer_id: u32) {
            self.timers_started.push((delay, timer_id));
        }
        fn cancel_timer(&mut self, timer_id: u32) {
            self.timers_cancelled.push(timer_id);
        }
        fn deliver_data(&mut self, _data: &[u8]) {}
        fn log(&mut self, _message: &str) {}
        fn now(&self) -> u64 {
            0
        }
    }

    fn submit(sender: &mut SrSender, ctx: &mut RecordingContext, count: usize) {
        for i in 0..count {
            sender.on_app_data(ctx, format!("message {i}").as_bytes());
        }
    }

    fn ack(acknum: i32) -> Packet {
        let mut packet = Packet::ack(0, acknum);
        packet.checksum = compute_checksum(&packet);
        packet
    }

    #[test]
    fn fills_window_then_rejects() {
        let mut sender = SrSender::new();
        let mut ctx = RecordingContext::default();

        submit(&mut sender, &mut ctx, 7);

        assert_eq!(ctx.sent.len(), 6);
        let seqs: Vec<i32> = ctx.sent.iter().map(|p| p.seqnum).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(sender.window_count(), 6);
        assert_eq!(sender.counters().window_full, 1);
        // only the first send arms the timer
        assert_eq!(ctx.timers_started, vec![(RETRANSMIT_TIMEOUT, 0)]);
    }

    #[test]
    fn base_ack_slides_window() {
        let mut sender = SrSender::new();
        let mut ctx = RecordingContext::default();
        submit(&mut sender, &mut ctx, 3);

        sender.on_packet(&mut ctx, ack(0));

        assert_eq!(sender.window_count(), 2);
        assert_eq!(sender.ack_count(), 0);
        assert_eq!(sender.counters().new_acks, 1);
        assert!(sender.timer_armed());
    }

    #[test]
    fn out_of_order_ack_waits_for_base() {
        let mut sender = SrSender::new();
        let mut ctx = RecordingContext::default();
        submit(&mut sender, &mut ctx, 3);

        sender.on_packet(&mut ctx, ack(1));
        assert_eq!(sender.window_count(), 2);
        assert_eq!(sender.ack_count(), 1);

        // the base ACK subsumes the earlier one in a single slide
        sender.on_packet(&mut ctx, ack(0));
        assert_eq!(sender.window_count(), 1);
        assert_eq!(sender.ack_count(), 0);
        assert_eq!(sender.counters().new_acks, 2);
    }

    #[test]
    fn acked_slots_still_count_against_admission() {
        let mut sender = SrSender::new();
        let mut ctx = RecordingContext::default();
        submit(&mut sender, &mut ctx, 6);

        // acks for everything except the base: nothing slides
        for seq in 1..6 {
            sender.on_packet(&mut ctx, ack(seq));
        }
        assert_eq!(sender.window_count(), 1);
        assert_eq!(sender.ack_count(), 5);

        // window_count + ack_count is still WINDOW_SIZE, so no admission
        sender.on_app_data(&mut ctx, b"rejected");
        assert_eq!(sender.counters().window_full, 1);
        assert_eq!(ctx.sent.len(), 6);
    }

    #[test]
    fn corrupted_ack_changes_nothing() {
        let mut sender = SrSender::new();
        let mut ctx = RecordingContext::default();
        submit(&mut sender, &mut ctx, 3);

        let before = sender.clone();
        let mut corrupt = ack(1);
        corrupt.checksum ^= 0x55;
        sender.on_packet(&mut ctx, corrupt);

        assert_eq!(sender, before);
    }

    #[test]
    fn slid_out_ack_is_ignored() {
        let mut sender = SrSender::new();
        let mut ctx = RecordingContext::default();
        submit(&mut sender, &mut ctx, 2);
        sender.on_packet(&mut ctx, ack(0));

        let before = sender.clone();
        sender.on_packet(&mut ctx, ack(0));

        // only the aggregate receive counter moves
        assert_eq!(sender.counters().total_acks_received, 2);
        assert_eq!(sender.counters().new_acks, before.counters().new_acks);
        assert_eq!(sender.window_count(), before.window_count());
        assert_eq!(sender.ack_count(), before.ack_count());
    }

    #[test]
    fn repeated_ack_for_buffered_slot_is_ignored() {
        let mut sender = SrSender::new();
        let mut ctx = RecordingContext::default();
        submit(&mut sender, &mut ctx, 3);

        sender.on_packet(&mut ctx, ack(2));
        let before = sender.clone();
        sender.on_packet(&mut ctx, ack(2));

        assert_eq!(sender.counters().new_acks, 1);
        assert_eq!(sender.window_count(), before.window_count());
        assert_eq!(sender.ack_count(), before.ack_count());
    }

    #[test]
    fn timeout_resends_only_the_oldest_unacked() {
        let mut sender = SrSender::new();
        let mut ctx = RecordingContext::default();
        submit(&mut sender, &mut ctx, 3);
        sender.on_packet(&mut ctx, ack(1));

        let sent_before = ctx.sent.len();
        sender.on_timer(&mut ctx, 0);

        assert_eq!(ctx.sent.len(), sent_before + 1);
        assert_eq!(ctx.sent.last().map(|p| p.seqnum), Some(0));
        assert_eq!(sender.counters().packets_resent, 1);
        assert!(sender.timer_armed());
    }

    #[test]
    fn timeout_with_empty_window_does_nothing() {
        let mut sender = SrSender::new();
        let mut ctx = RecordingContext::default();

        sender.on_timer(&mut ctx, 0);

        assert!(ctx.sent.is_empty());
        assert!(!sender.timer_armed());
        assert_eq!(sender.counters().packets_resent, 0);
    }

    #[test]
    fn timer_stops_when_window_drains() {
        let mut sender = SrSender::new();
        let mut ctx = RecordingContext::default();
        submit(&mut sender, &mut ctx, 1);

        sender.on_packet(&mut ctx, ack(0));

        assert_eq!(ctx.timers_cancelled, vec![0]);
        assert!(!sender.timer_armed());
        assert_eq!(sender.window_count(), 0);
    }

    #[test]
    fn wrapped_window_classifies_acks_correctly() {
        let mut sender = SrSender::new();
        let mut ctx = RecordingContext::default();

        // advance next_seq to 10 by sending and acking ten messages
        for seq in 0..10 {
            submit(&mut sender, &mut ctx, 1);
            sender.on_packet(&mut ctx, ack(seq));
        }
        // fill the window across the wraparound: seqs 10, 11, 0, 1, 2, 3
        submit(&mut sender, &mut ctx, 6);
        let seqs: Vec<i32> = ctx.sent[10..].iter().map(|p| p.seqnum).collect();
        assert_eq!(seqs, vec![10, 11, 0, 1, 2, 3]);

        // seq 0 sits past the wraparound point but is inside [10, 3]
        let new_acks_before = sender.counters().new_acks;
        sender.on_packet(&mut ctx, ack(0));
        assert_eq!(sender.counters().new_acks, new_acks_before + 1);

        // 4 is outside [10, 3]; it belongs to the previous cycle
        sender.on_packet(&mut ctx, ack(4));
        assert_eq!(sender.counters().new_acks, new_acks_before + 1);

        // acking the base slides past 10, 11 and the buffered 0
        sender.on_packet(&mut ctx, ack(11));
        sender.on_packet(&mut ctx, ack(10));
        assert_eq!(sender.window_count(), 3);
        assert_eq!(sender.ack_count(), 0);
    }

    #[test]
    fn sequence_numbers_wrap_at_seq_space() {
        let mut sender = SrSender::new();
        let mut ctx = RecordingContext::default();

        for seq in 0..SEQ_SPACE + 2 {
            submit(&mut sender, &mut ctx, 1);
            sender.on_packet(&mut ctx, ack(seq % SEQ_SPACE));
        }
        let seqs: Vec<i32> = ctx.sent.iter().map(|p| p.seqnum).collect();
        assert_eq!(&seqs[10..], &[10, 11, 0, 1]);
    }
}
