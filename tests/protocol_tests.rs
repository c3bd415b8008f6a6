//! Frame codec tests over real sockets
//!
//! The unit tests in `src/protocol.rs` cover chunk reassembly against an
//! in-memory reader; these exercise the same codec across an actual TCP
//! connection, where the kernel decides the chunking.

use glance::{read_frame, write_frame};
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

#[test]
fn frame_round_trips_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let echo = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let payload = read_frame(&mut stream).unwrap();
        write_frame(&mut stream, &payload).unwrap();
    });

    let mut stream = TcpStream::connect(addr).unwrap();
    write_frame(&mut stream, b"fn foo() -> bool { 1 }").unwrap();
    let reply = read_frame(&mut stream).unwrap();
    assert_eq!(reply, b"fn foo() -> bool { 1 }");

    echo.join().unwrap();
}

#[test]
fn json_document_round_trips_byte_identical() {
    let document = r#"{"code":"enum Color { Red }","errors":[],"staticQuickInfos":[{"text":"enum Color","start":5,"length":5}]}"#;

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let expected = document.as_bytes().to_vec();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let request = read_frame(&mut stream).unwrap();
        assert_eq!(request, b"snippet");
        write_frame(&mut stream, &expected).unwrap();
    });

    let mut stream = TcpStream::connect(addr).unwrap();
    write_frame(&mut stream, b"snippet").unwrap();
    let reply = read_frame(&mut stream).unwrap();
    assert_eq!(reply, document.as_bytes());

    server.join().unwrap();
}

#[test]
fn reader_tolerates_split_header_and_payload() {
    // Header bytes land in two separate writes: 00 00, then 00 03 68 65 79.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let writer = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(&[0x00, 0x00]).unwrap();
        stream.flush().unwrap();
        thread::sleep(Duration::from_millis(20));
        stream.write_all(&[0x00, 0x03, 0x68, 0x65, 0x79]).unwrap();
    });

    let mut stream = TcpStream::connect(addr).unwrap();
    let payload = read_frame(&mut stream).unwrap();
    assert_eq!(payload, b"hey");

    writer.join().unwrap();
}

#[test]
fn peer_hangup_mid_frame_is_incomplete() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let writer = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        // Declare 100 bytes, send 3, hang up.
        stream.write_all(&[0x00, 0x00, 0x00, 0x64, 1, 2, 3]).unwrap();
    });

    let mut stream = TcpStream::connect(addr).unwrap();
    let err = read_frame(&mut stream).unwrap_err();
    assert!(matches!(err, glance::GlanceError::IncompleteFrame));

    writer.join().unwrap();
}
