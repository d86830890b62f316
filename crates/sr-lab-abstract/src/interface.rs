use crate::packet::Packet;

/// The capability provided by the simulator to a protocol engine.
/// Engines call these methods to interact with the channel, the timer
/// service, and the application layer.
pub trait SystemContext {
    /// Hand a packet to the unreliable channel.
    fn send_packet(&mut self, packet: Packet);

    /// Arm a timer that fires after `delay` simulated time units.
    /// `timer_id` identifies the timer; an engine owns one logical timer
    /// per id and must cancel before re-arming.
    fn start_timer(&mut self, delay: u64, timer_id: u32);

    /// Cancel a running timer.
    fn cancel_timer(&mut self, timer_id: u32);

    /// Deliver a reassembled message to the application layer. Must be
    /// called in strictly increasing sequence order, exactly once per
    /// surviving message.
    fn deliver_data(&mut self, data: &[u8]);

    /// Log a message to the simulator's debug output.
    fn log(&mut self, message: &str);

    /// Current simulation time.
    fn now(&self) -> u64;

    /// Record a numeric metric for visualization / grading (e.g., window
    /// occupancy). Default no-op so bare harnesses don't need to care.
    fn record_metric(&mut self, _name: &str, _value: f64) {}
}

/// The event interface a protocol engine implements. Exactly three external
/// event kinds exist; each handler runs to completion before the next event
/// is dispatched.
pub trait TransportProtocol {
    /// Called once before any other handler.
    fn init(&mut self, _ctx: &mut dyn SystemContext) {}

    /// Called when a packet arrives from the channel.
    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet);

    /// Called when an armed timer expires.
    fn on_timer(&mut self, ctx: &mut dyn SystemContext, timer_id: u32);

    /// Called when the application layer has a message ready to send.
    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, data: &[u8]);
}
