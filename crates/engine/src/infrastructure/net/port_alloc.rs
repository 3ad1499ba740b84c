//! Transient TCP port allocation.

use std::net::Ipv4Addr;

use tokio::net::TcpListener;

use simbench_domain::CoreError;

/// Hand out a TCP port believed to be free at the moment of return.
///
/// Binds an ephemeral listener on loopback, reads the assigned port, and
/// releases it. There is an unavoidable race window between return and reuse
/// by a downstream child; adapters mitigate by starting the child promptly.
pub async fn allocate_port() -> Result<u16, CoreError> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .map_err(CoreError::spawn)?;
    let port = listener.local_addr().map_err(CoreError::spawn)?.port();
    drop(listener);
    Ok(port)
}

/// Allocate the debug-bridge and monitor ports for one session.
pub async fn allocate_port_pair() -> Result<(u16, u16), CoreError> {
    // Hold both listeners before releasing either so the pair is distinct.
    let first = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .map_err(CoreError::spawn)?;
    let second = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .map_err(CoreError::spawn)?;
    let debug = first.local_addr().map_err(CoreError::spawn)?.port();
    let monitor = second.local_addr().map_err(CoreError::spawn)?.port();
    Ok((debug, monitor))
}
