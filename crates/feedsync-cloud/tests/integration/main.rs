//! Integration tests for feedsync-cloud
//!
//! Uses wiremock to simulate the Dropbox and Miniflux APIs and verifies
//! end-to-end behavior of the OAuth flow, token refresh, file operations
//! and the aggregator client.

mod common;

mod test_files;
mod test_miniflux;
mod test_oauth;
mod test_sign_in;
mod test_token_refresh;
