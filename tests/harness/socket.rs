//! Loopback socket helpers.

use std::io::{ErrorKind, Read};
use std::net::{TcpListener, TcpStream};

/// A connected loopback pair, both sides non-blocking.
pub fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let outer = TcpStream::connect(addr).unwrap();
    let (inner, _) = listener.accept().unwrap();
    outer.set_nonblocking(true).unwrap();
    inner.set_nonblocking(true).unwrap();
    outer.set_nodelay(true).unwrap();
    inner.set_nodelay(true).unwrap();
    (outer, inner)
}

/// Append whatever is readable right now to `out`. Returns `false` once the
/// peer has closed its write side.
pub fn read_available(stream: &mut TcpStream, out: &mut Vec<u8>) -> bool {
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return false,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::WouldBlock => return true,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => panic!("read failed: {e}"),
        }
    }
}
