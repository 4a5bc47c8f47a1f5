//! Session tests against a scripted daemon.
//!
//! Each test binds a loopback listener and plays the daemon side of
//! the conversation byte by byte, so request encodings are verified
//! exactly and replies exercise the full client stack.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

use bstr::BString;
use remote_sane::{ColorKind, FrameFormat, RasterLayout, SaneError, Session, SessionOptions};

const HANDLE: i32 = 0x2A;

fn options() -> SessionOptions {
    SessionOptions {
        username: Some(BString::from("user")),
    }
}

fn spawn_daemon(
    script: impl FnOnce(&mut TcpStream) + Send + 'static,
) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let daemon = thread::spawn(move || {
        let (mut control, _) = listener.accept().unwrap();
        script(&mut control);
    });

    (addr, daemon)
}

fn expect(stream: &mut TcpStream, expected: &[u8]) {
    let mut actual = vec![0u8; expected.len()];
    stream.read_exact(&mut actual).unwrap();
    assert_eq!(actual, expected, "unexpected request bytes");
}

fn word(value: i32) -> [u8; 4] {
    value.to_be_bytes()
}

fn wire_string(text: &[u8]) -> Vec<u8> {
    if text.is_empty() {
        return word(0).to_vec();
    }

    let mut bytes = word((text.len() + 1) as i32).to_vec();
    bytes.extend(text);
    bytes.push(0);
    bytes
}

fn handshake(control: &mut TcpStream) {
    // Opcode 0, version 1.0.3, username "user".
    expect(
        control,
        &[
            0, 0, 0, 0, 1, 0, 0, 3, 0, 0, 0, 5, b'u', b's', b'e', b'r', 0,
        ],
    );
    control.write_all(&word(0x0100_0003)).unwrap();
    control.write_all(&word(0)).unwrap();
}

fn serve_open(control: &mut TcpStream) {
    let mut request = word(2).to_vec();
    request.extend(wire_string(b"dev0"));
    expect(control, &request);

    control.write_all(&word(0)).unwrap();
    control.write_all(&word(HANDLE)).unwrap();
    control.write_all(&wire_string(b"")).unwrap();
}

fn serve_close(control: &mut TcpStream) {
    expect(control, &[word(3), word(HANDLE)].concat());
    // Dummy word with no defined meaning; a nasty value must not be
    // mistaken for a status.
    control.write_all(&word(0x5555_5555)).unwrap();
}

fn expect_exit(control: &mut TcpStream) {
    expect(control, &word(10));
}

#[allow(clippy::too_many_arguments)]
fn serve_frame(
    control: &mut TcpStream,
    format: i32,
    last_frame: bool,
    bytes_per_line: i32,
    pixels_per_line: i32,
    lines: i32,
    depth: i32,
    byte_order: i32,
    records: &[&[u8]],
) {
    expect(control, &[word(7), word(HANDLE)].concat());

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    control.write_all(&word(0)).unwrap();
    control.write_all(&word(port as i32)).unwrap();
    control.write_all(&word(byte_order)).unwrap();
    control.write_all(&wire_string(b"")).unwrap();

    let (mut data, _) = listener.accept().unwrap();

    expect(control, &[word(6), word(HANDLE)].concat());
    control.write_all(&word(0)).unwrap();
    for value in [
        format,
        last_frame as i32,
        bytes_per_line,
        pixels_per_line,
        lines,
        depth,
    ] {
        control.write_all(&word(value)).unwrap();
    }

    for record in records {
        data.write_all(&(record.len() as u32).to_be_bytes()).unwrap();
        data.write_all(record).unwrap();
    }
    data.write_all(&0xFFFF_FFFFu32.to_be_bytes()).unwrap();
}

#[test]
fn handshake_reports_the_daemon_version() {
    let (addr, daemon) = spawn_daemon(|control| {
        handshake(control);
        expect_exit(control);
    });

    let session = Session::connect_with(addr, options()).unwrap();
    assert_eq!(session.server_version(), (1, 0, 3));

    session.close().unwrap();
    daemon.join().unwrap();
}

#[test]
fn empty_device_list() {
    let (addr, daemon) = spawn_daemon(|control| {
        handshake(control);
        expect(control, &word(1));
        control.write_all(&word(0)).unwrap(); // status
        control.write_all(&word(1)).unwrap(); // count: null terminator only
        control.write_all(&word(0)).unwrap(); // trailing word, left unread
        expect_exit(control);
    });

    let mut session = Session::connect_with(addr, options()).unwrap();
    assert!(session.list_devices().unwrap().is_empty());

    session.close().unwrap();
    daemon.join().unwrap();
}

#[test]
fn one_device_list() {
    let (addr, daemon) = spawn_daemon(|control| {
        handshake(control);
        expect(control, &word(1));
        control.write_all(&word(0)).unwrap();
        control.write_all(&word(2)).unwrap();
        control.write_all(&word(1)).unwrap(); // non-null pointer
        for text in [&b"dev0"[..], b"Acme", b"X1", b"scanner"] {
            control.write_all(&wire_string(text)).unwrap();
        }
        control.write_all(&word(0)).unwrap(); // trailing word
        expect_exit(control);
    });

    let mut session = Session::connect_with(addr, options()).unwrap();

    let devices = session.list_devices().unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].name, "dev0");
    assert_eq!(devices[0].vendor, "Acme");
    assert_eq!(devices[0].model, "X1");
    assert_eq!(devices[0].ty, "scanner");

    session.close().unwrap();
    daemon.join().unwrap();
}

#[test]
fn find_device_by_name_matches_exact_bytes() {
    let (addr, daemon) = spawn_daemon(|control| {
        handshake(control);
        for _ in 0..2 {
            expect(control, &word(1));
            control.write_all(&word(0)).unwrap();
            control.write_all(&word(2)).unwrap();
            control.write_all(&word(1)).unwrap();
            for text in [&b"dev0"[..], b"Acme", b"X1", b"scanner"] {
                control.write_all(&wire_string(text)).unwrap();
            }
            control.write_all(&word(0)).unwrap();
        }
        expect_exit(control);
    });

    let mut session = Session::connect_with(addr, options()).unwrap();

    let found = session.find_device_by_name("dev0").unwrap();
    assert_eq!(found.unwrap().name, "dev0");

    let missing = session.find_device_by_name("dev1").unwrap();
    assert!(missing.is_none());

    session.close().unwrap();
    daemon.join().unwrap();
}

#[test]
fn open_device_returns_a_handle() {
    let (addr, daemon) = spawn_daemon(|control| {
        handshake(control);
        serve_open(control);
        expect_exit(control);
    });

    let mut session = Session::connect_with(addr, options()).unwrap();

    let handle = session.open_device("dev0").unwrap();
    assert_eq!(handle.word().to_i32(), HANDLE);
    assert!(!handle.authorization_required());

    session.close().unwrap();
    daemon.join().unwrap();
}

#[test]
fn gray_acquisition_assembles_the_frame() {
    let (addr, daemon) = spawn_daemon(|control| {
        handshake(control);
        serve_open(control);
        serve_frame(
            control,
            0, // gray
            true,
            4,
            4,
            2,
            8,
            0,
            &[&[0x11, 0x22, 0x33, 0x44], &[0x55, 0x66, 0x77, 0x88]],
        );
        serve_close(control);
        expect_exit(control);
    });

    let mut session = Session::connect_with(addr, options()).unwrap();
    let handle = session.open_device("dev0").unwrap();

    let image = session.acquire_image(&handle).unwrap();
    assert_eq!(image.width(), 4);
    assert_eq!(image.height(), 2);
    assert_eq!(image.depth(), 8);
    assert_eq!(image.frames().len(), 1);
    assert_eq!(image.frames()[0].format(), FrameFormat::Gray);
    assert_eq!(
        image.frames()[0].data(),
        &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]
    );

    let raster = image.into_raster().unwrap();
    assert_eq!(raster.color(), ColorKind::Gray);
    assert_eq!(
        raster.layout(),
        RasterLayout::Interleaved {
            samples_per_pixel: 1,
            bytes_per_pixel: 1,
        }
    );

    session.close_device(handle).unwrap();
    session.close().unwrap();
    daemon.join().unwrap();
}

#[test]
fn rgb_trio_is_assembled_in_canonical_order() {
    let (addr, daemon) = spawn_daemon(|control| {
        handshake(control);
        serve_open(control);
        // The daemon chooses the delivery order; green first here.
        serve_frame(control, 3, false, 2, 2, 2, 8, 0, &[&[0x20; 4]]);
        serve_frame(control, 4, false, 2, 2, 2, 8, 0, &[&[0x30; 4]]);
        serve_frame(control, 2, true, 2, 2, 2, 8, 0, &[&[0x10; 4]]);
        expect_exit(control);
    });

    let mut session = Session::connect_with(addr, options()).unwrap();
    let handle = session.open_device("dev0").unwrap();

    let image = session.acquire_image(&handle).unwrap();
    let formats: Vec<_> = image.frames().iter().map(|f| f.format()).collect();
    assert_eq!(
        formats,
        [FrameFormat::Red, FrameFormat::Green, FrameFormat::Blue]
    );

    let raster = image.into_raster().unwrap();
    assert_eq!(
        raster.layout(),
        RasterLayout::Banded {
            samples_per_pixel: 3
        }
    );
    assert_eq!(raster.planes()[0][0], 0x10);
    assert_eq!(raster.planes()[1][0], 0x20);
    assert_eq!(raster.planes()[2][0], 0x30);

    drop(session);
    daemon.join().unwrap();
}

#[test]
fn little_endian_sixteen_bit_data_is_normalized() {
    let (addr, daemon) = spawn_daemon(|control| {
        handshake(control);
        serve_open(control);
        serve_frame(
            control,
            0,
            true,
            4,
            2,
            1,
            16,
            0x1234,
            &[&[0x34, 0x12, 0x78, 0x56]],
        );
        expect_exit(control);
    });

    let mut session = Session::connect_with(addr, options()).unwrap();
    let handle = session.open_device("dev0").unwrap();

    let image = session.acquire_image(&handle).unwrap();
    assert_eq!(image.frames()[0].data(), &[0x12, 0x34, 0x56, 0x78]);

    drop(session);
    daemon.join().unwrap();
}

#[test]
fn nonzero_status_surfaces_with_its_code() {
    let (addr, daemon) = spawn_daemon(|control| {
        handshake(control);
        let mut request = word(2).to_vec();
        request.extend(wire_string(b"dev0"));
        expect(control, &request);
        control.write_all(&word(11)).unwrap(); // access denied
    });

    let mut session = Session::connect_with(addr, options()).unwrap();
    assert!(matches!(
        session.open_device("dev0"),
        Err(SaneError::ProtocolStatus(11))
    ));

    drop(session);
    daemon.join().unwrap();
}

#[test]
fn nonempty_resource_requires_authentication() {
    let (addr, daemon) = spawn_daemon(|control| {
        handshake(control);
        let mut request = word(2).to_vec();
        request.extend(wire_string(b"dev0"));
        expect(control, &request);
        control.write_all(&word(0)).unwrap();
        control.write_all(&word(HANDLE)).unwrap();
        control.write_all(&wire_string(b"secret")).unwrap();
    });

    let mut session = Session::connect_with(addr, options()).unwrap();
    match session.open_device("dev0") {
        Err(SaneError::AuthRequired(resource)) => assert_eq!(resource, "secret"),
        other => panic!("expected AuthRequired, got {other:?}"),
    }

    drop(session);
    daemon.join().unwrap();
}

#[test]
fn operations_in_the_wrong_state_are_rejected() {
    let (addr, daemon) = spawn_daemon(|control| {
        handshake(control);
        serve_open(control);
        serve_close(control);
        expect_exit(control);
    });

    let mut session = Session::connect_with(addr, options()).unwrap();
    let handle = session.open_device("dev0").unwrap();

    // A second open and a listing are rejected locally while the
    // device is open; nothing reaches the daemon.
    assert!(matches!(
        session.open_device("dev0"),
        Err(SaneError::IllegalState("open_device"))
    ));
    assert!(matches!(
        session.list_devices(),
        Err(SaneError::IllegalState("list_devices"))
    ));

    session.close_device(handle.clone()).unwrap();
    assert!(matches!(
        session.close_device(handle),
        Err(SaneError::IllegalState("close_device"))
    ));

    session.close().unwrap();
    daemon.join().unwrap();
}
