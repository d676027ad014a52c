//! Type-state markers for POP3 client states.
//!
//! RFC 1939 calls these the AUTHORIZATION and TRANSACTION states. The
//! UPDATE state is entered by `quit`, which consumes the client.

/// Greeting received; only authentication commands are valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Connected;

/// Authenticated; the maildrop is locked and can be listed and read.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn _assert_send<T: Send>() {}
    fn _assert_sync<T: Sync>() {}

    #[test]
    fn test_state_markers_are_send_sync() {
        _assert_send::<Connected>();
        _assert_sync::<Connected>();
        _assert_send::<Authenticated>();
        _assert_sync::<Authenticated>();
    }
}
