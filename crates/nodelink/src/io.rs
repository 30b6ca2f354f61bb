// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message I/O on established connections.
//!
//! Reads are filtered by port. The check runs after the blocking transport
//! read, so a packet on the wrong channel still consumes one read: it is
//! pulled from the transport, dropped, and reported as
//! [`Error::ChannelMismatch`]. The caller buffer is left untouched.
//!
//! | Side       | Filter                              |
//! |------------|-------------------------------------|
//! | publisher  | `destination_port(conn) == expected` |
//! | subscriber | `source_port(conn) == expected`      |

use crate::address::Port;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::transport::TransportProvider;

/// Which port of the connection a read is filtered on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PortFilter {
    Destination,
    Source,
}

/// Send `data` on the connection.
///
/// Fails without calling the transport if `data` is empty or the connection
/// has no handle.
pub fn send<T>(transport: &T, conn: &Connection<T::Conn>, data: &[u8]) -> Result<()>
where
    T: TransportProvider + ?Sized,
{
    if data.is_empty() {
        return Err(Error::EmptyPayload);
    }
    let handle = conn.handle().ok_or(Error::NullConnection)?;

    transport.send(handle, data).map_err(|e| {
        log::debug!("[io] send of {} bytes failed: {}", data.len(), e);
        Error::from(e)
    })
}

/// Read one packet on an accepted connection, keeping it only if it was
/// addressed to `expected_port`.
///
/// Returns the number of bytes copied into `buf` (at most `buf.len()`).
pub fn publisher_read<T>(
    transport: &T,
    conn: &Connection<T::Conn>,
    buf: &mut [u8],
    expected_port: Port,
) -> Result<usize>
where
    T: TransportProvider + ?Sized,
{
    filtered_read(transport, conn, buf, expected_port, PortFilter::Destination)
}

/// Read one packet on a dialed connection, keeping it only if it came from
/// `expected_port`.
///
/// Returns the number of bytes copied into `buf` (at most `buf.len()`).
pub fn subscriber_read<T>(
    transport: &T,
    conn: &Connection<T::Conn>,
    buf: &mut [u8],
    expected_port: Port,
) -> Result<usize>
where
    T: TransportProvider + ?Sized,
{
    filtered_read(transport, conn, buf, expected_port, PortFilter::Source)
}

fn filtered_read<T>(
    transport: &T,
    conn: &Connection<T::Conn>,
    buf: &mut [u8],
    expected_port: Port,
    filter: PortFilter,
) -> Result<usize>
where
    T: TransportProvider + ?Sized,
{
    let handle = conn.handle().ok_or(Error::NullConnection)?;
    if buf.is_empty() {
        return Err(Error::EmptyBuffer);
    }

    let packet = transport.read(handle, buf.len())?;

    let actual = match filter {
        PortFilter::Destination => transport.destination_port(handle),
        PortFilter::Source => transport.source_port(handle),
    };
    if actual != expected_port {
        log::warn!(
            "[io] dropped {} bytes on port {} (filter {:?} expects {})",
            packet.len(),
            actual,
            filter,
            expected_port
        );
        return Err(Error::ChannelMismatch {
            expected: expected_port,
            actual,
        });
    }

    // Transports truncate to max_len already; guard against ones that don't.
    let len = packet.len().min(buf.len());
    buf[..len].copy_from_slice(&packet[..len]);
    Ok(len)
}
