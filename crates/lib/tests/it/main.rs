/*! Integration tests for Driftdoc.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - backend: Tests for the Backend trait and the InMemory implementation
 * - codec: Round-trip properties of the wire and storage encodings
 * - crdt: Convergence, tombstone and type-conversion behavior of the document tree
 * - document: Tests for the path-based Document API and listeners
 * - store: Tests for the caching, serialized Store
 * - sync: Tests for the Network coordinator over in-process links
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("driftdoc=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod backend;
mod codec;
mod crdt;
mod document;
mod helpers;
mod store;
mod sync;
