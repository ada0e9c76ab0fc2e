//! Loopback socket helpers for unit tests

use std::net::{TcpListener, TcpStream as StdTcpStream};
use std::time::Duration;

use mio::net::TcpStream;

/// A connected pair: the non-blocking server side and a blocking peer
/// with a short read timeout
pub(crate) fn connected_pair() -> (TcpStream, StdTcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let peer = StdTcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (server_side, _) = listener.accept().unwrap();
    server_side.set_nonblocking(true).unwrap();
    peer.set_read_timeout(Some(Duration::from_millis(300))).unwrap();
    (TcpStream::from_std(server_side), peer)
}

/// Read whatever the peer has received, empty on timeout
pub(crate) fn read_available(peer: &mut StdTcpStream) -> String {
    use std::io::Read;

    let mut buf = [0u8; 4096];
    match peer.read(&mut buf) {
        Ok(n) => String::from_utf8_lossy(&buf[..n]).into_owned(),
        Err(_) => String::new(),
    }
}

/// Close the peer with a zero linger so the other side sees a reset
pub(crate) fn reset(peer: StdTcpStream) {
    socket2::SockRef::from(&peer)
        .set_linger(Some(Duration::ZERO))
        .unwrap();
    drop(peer);
    std::thread::sleep(Duration::from_millis(50));
}
