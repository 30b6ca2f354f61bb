// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scripted transport for contract tests.
//!
//! Every primitive succeeds unless told otherwise and every call is logged,
//! so tests can assert both the outcome and exactly which primitives ran.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use nodelink::transport::TransportResult;
use nodelink::{NodeAddress, Port, TransportError, TransportProvider};
use parking_lot::Mutex;

/// Transport primitive, without arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    CreateSocket,
    Bind,
    Listen,
    Accept,
    Connect,
    Send,
    Read,
    DestinationPort,
    SourcePort,
}

/// One logged call, with the arguments that matter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    CreateSocket,
    Bind { socket: u32, port: Port },
    Listen { socket: u32, backlog: usize },
    Accept { socket: u32 },
    Connect { node: NodeAddress, port: Port },
    Send { conn: u32, data: Vec<u8> },
    Read { conn: u32, max_len: usize },
    DestinationPort { conn: u32 },
    SourcePort { conn: u32 },
}

impl Call {
    pub fn primitive(&self) -> Primitive {
        match self {
            Call::CreateSocket => Primitive::CreateSocket,
            Call::Bind { .. } => Primitive::Bind,
            Call::Listen { .. } => Primitive::Listen,
            Call::Accept { .. } => Primitive::Accept,
            Call::Connect { .. } => Primitive::Connect,
            Call::Send { .. } => Primitive::Send,
            Call::Read { .. } => Primitive::Read,
            Call::DestinationPort { .. } => Primitive::DestinationPort,
            Call::SourcePort { .. } => Primitive::SourcePort,
        }
    }
}

/// Mock transport; socket and connection handles are non-zero ids.
pub struct ScriptedTransport {
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<Primitive, TransportError>>,
    destination_port: Mutex<Port>,
    source_port: Mutex<Port>,
    payload: Mutex<Vec<u8>>,
    next_handle: AtomicU32,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            destination_port: Mutex::new(Port::new(0)),
            source_port: Mutex::new(Port::new(0)),
            payload: Mutex::new(b"A".to_vec()),
            next_handle: AtomicU32::new(1),
        }
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `primitive` fail with `error` from now on.
    pub fn fail(&self, primitive: Primitive, error: TransportError) -> &Self {
        self.failures.lock().insert(primitive, error);
        self
    }

    /// Port reported by `destination_port`.
    pub fn report_destination_port(&self, port: Port) -> &Self {
        *self.destination_port.lock() = port;
        self
    }

    /// Port reported by `source_port`.
    pub fn report_source_port(&self, port: Port) -> &Self {
        *self.source_port.lock() = port;
        self
    }

    /// Packet returned by `read`.
    pub fn deliver(&self, payload: &[u8]) -> &Self {
        *self.payload.lock() = payload.to_vec();
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn primitives(&self) -> Vec<Primitive> {
        self.calls.lock().iter().map(Call::primitive).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: Call) -> TransportResult<()> {
        let primitive = call.primitive();
        self.calls.lock().push(call);
        match self.failures.lock().get(&primitive) {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn handle(&self) -> u32 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }
}

impl TransportProvider for ScriptedTransport {
    type Socket = u32;
    type Conn = u32;

    fn create_socket(&self) -> TransportResult<u32> {
        self.record(Call::CreateSocket)?;
        Ok(self.handle())
    }

    fn bind(&self, socket: &u32, port: Port) -> TransportResult<()> {
        self.record(Call::Bind {
            socket: *socket,
            port,
        })
    }

    fn listen(&self, socket: &u32, backlog: usize) -> TransportResult<()> {
        self.record(Call::Listen {
            socket: *socket,
            backlog,
        })
    }

    fn accept(&self, socket: &u32) -> TransportResult<u32> {
        self.record(Call::Accept { socket: *socket })?;
        Ok(self.handle())
    }

    fn connect(&self, node: NodeAddress, port: Port) -> TransportResult<u32> {
        self.record(Call::Connect { node, port })?;
        Ok(self.handle())
    }

    fn send(&self, conn: &u32, data: &[u8]) -> TransportResult<()> {
        self.record(Call::Send {
            conn: *conn,
            data: data.to_vec(),
        })
    }

    fn read(&self, conn: &u32, max_len: usize) -> TransportResult<Vec<u8>> {
        self.record(Call::Read {
            conn: *conn,
            max_len,
        })?;
        let mut packet = self.payload.lock().clone();
        packet.truncate(max_len);
        Ok(packet)
    }

    fn destination_port(&self, conn: &u32) -> Port {
        self.calls
            .lock()
            .push(Call::DestinationPort { conn: *conn });
        *self.destination_port.lock()
    }

    fn source_port(&self, conn: &u32) -> Port {
        self.calls.lock().push(Call::SourcePort { conn: *conn });
        *self.source_port.lock()
    }
}
