//! Shared helpers for polyterm-ws integration tests.

pub mod mock_feed;
