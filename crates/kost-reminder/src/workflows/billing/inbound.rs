pub const PING_COMMAND: &str = "!ping";
pub const PING_REPLY: &str = "pong";

/// Canned reply for an inbound chat message, if any.
pub fn auto_reply(body: &str) -> Option<&'static str> {
    (body == PING_COMMAND).then_some(PING_REPLY)
}
