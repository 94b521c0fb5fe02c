//! End-to-end tests against in-process mock terminals
//!
//! The mock speaks just enough of the protocol to drive the client
//! through its real code paths: handshake with and without
//! authentication, chunked bulk reads with frames straddling socket
//! writes, and the live-event push stream.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::time::sleep;

use zklink::{Device, Privilege, User};
use zklink_core::checksum;
use zklink_types::UserPacketSize;

const CMD_CONNECT: u16 = 1000;
const CMD_EXIT: u16 = 1001;
const CMD_ENABLEDEVICE: u16 = 1002;
const CMD_GET_VERSION: u16 = 1100;
const CMD_AUTH: u16 = 1102;
const CMD_PREPARE_DATA: u16 = 1500;
const CMD_DATA: u16 = 1501;
const CMD_FREE_DATA: u16 = 1502;
const CMD_PREPARE_BUFFER: u16 = 1503;
const CMD_READ_BUFFER: u16 = 1504;
const CMD_USERTEMP_RRQ: u16 = 9;
const CMD_ATTLOG_RRQ: u16 = 13;
const CMD_GET_FREE_SIZES: u16 = 50;
const CMD_STARTVERIFY: u16 = 60;
const CMD_CANCELCAPTURE: u16 = 62;
const CMD_REG_EVENT: u16 = 500;
const CMD_ACK_OK: u16 = 2000;
const CMD_ACK_UNAUTH: u16 = 2005;

#[derive(Debug)]
struct Frame {
    code: u16,
    session: u16,
    reply: u16,
    payload: Vec<u8>,
}

fn inner_frame(code: u16, session: u16, reply: u16, payload: &[u8]) -> Vec<u8> {
    let cs = checksum::calculate(code, session, reply, payload);
    let mut frame = Vec::with_capacity(8 + payload.len());
    frame.extend_from_slice(&code.to_le_bytes());
    frame.extend_from_slice(&cs.to_le_bytes());
    frame.extend_from_slice(&session.to_le_bytes());
    frame.extend_from_slice(&reply.to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

fn wire_frame(code: u16, session: u16, reply: u16, payload: &[u8]) -> Vec<u8> {
    let inner = inner_frame(code, session, reply, payload);
    let mut wire = vec![0x50, 0x50, 0x74, 0x82];
    wire.extend_from_slice(&(inner.len() as u32).to_le_bytes());
    wire.extend_from_slice(&inner);
    wire
}

fn parse_inner(frame: &[u8]) -> Frame {
    let code = u16::from_le_bytes([frame[0], frame[1]]);
    let cs = u16::from_le_bytes([frame[2], frame[3]]);
    let session = u16::from_le_bytes([frame[4], frame[5]]);
    let reply = u16::from_le_bytes([frame[6], frame[7]]);
    let payload = frame[8..].to_vec();

    // Every client frame must checksum correctly
    assert!(
        checksum::verify(code, session, reply, &payload, cs),
        "bad checksum on client frame (code {code})"
    );

    Frame {
        code,
        session,
        reply,
        payload,
    }
}

async fn read_frame(sock: &mut TcpStream) -> Frame {
    let mut top = [0u8; 8];
    sock.read_exact(&mut top).await.unwrap();
    assert_eq!(&top[..4], &[0x50, 0x50, 0x74, 0x82], "missing envelope");

    let len = u32::from_le_bytes(top[4..8].try_into().unwrap()) as usize;
    let mut frame = vec![0u8; len];
    sock.read_exact(&mut frame).await.unwrap();
    parse_inner(&frame)
}

async fn ack(sock: &mut TcpStream, session: u16, reply: u16, payload: &[u8]) {
    sock.write_all(&wire_frame(CMD_ACK_OK, session, reply, payload))
        .await
        .unwrap();
}

fn free_sizes_payload(users: u32, fingers: u32, records: u32) -> Vec<u8> {
    let mut payload = vec![0u8; 80];
    payload[16..20].copy_from_slice(&users.to_le_bytes());
    payload[24..28].copy_from_slice(&fingers.to_le_bytes());
    payload[32..36].copy_from_slice(&records.to_le_bytes());
    payload
}

#[tokio::test]
async fn connect_without_auth_reads_firmware() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    const SESSION: u16 = 0x0BB8;

    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();

        let connect = read_frame(&mut sock).await;
        assert_eq!(connect.code, CMD_CONNECT);
        assert_eq!(connect.session, 0);
        // Reply counter starts at 65534 and is bumped before the first
        // command, wrapping past 65535 to 0
        assert_eq!(connect.reply, 0);
        ack(&mut sock, SESSION, connect.reply, &[]).await;

        let version = read_frame(&mut sock).await;
        assert_eq!(version.code, CMD_GET_VERSION);
        assert_eq!(version.session, SESSION);
        assert_eq!(version.reply, 1);
        ack(&mut sock, SESSION, version.reply, b"Ver 6.60 Apr 2016\0").await;

        let exit = read_frame(&mut sock).await;
        assert_eq!(exit.code, CMD_EXIT);
        assert_eq!(exit.reply, 2);
        ack(&mut sock, SESSION, exit.reply, &[]).await;
    });

    let mut device = Device::new("127.0.0.1", addr.port()).with_timeout(Duration::from_secs(5));
    device.connect().await.unwrap();
    assert!(device.is_connected());

    let firmware = device.get_firmware_version().await.unwrap();
    assert_eq!(firmware, "Ver 6.60 Apr 2016");

    device.disconnect().await.unwrap();
    assert!(!device.is_connected());

    server.await.unwrap();
}

#[tokio::test]
async fn connect_with_password_sends_scrambled_key() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    const SESSION: u16 = 0x1234;

    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();

        let connect = read_frame(&mut sock).await;
        assert_eq!(connect.code, CMD_CONNECT);
        sock.write_all(&wire_frame(CMD_ACK_UNAUTH, SESSION, connect.reply, &[]))
            .await
            .unwrap();

        let auth = read_frame(&mut sock).await;
        assert_eq!(auth.code, CMD_AUTH);
        assert_eq!(auth.session, SESSION);
        // make_commkey(123, 0x1234, ticks=50)
        assert_eq!(auth.payload, vec![0x61, 0xA3, 0x32, 0x6B]);
        ack(&mut sock, SESSION, auth.reply, &[]).await;

        let exit = read_frame(&mut sock).await;
        assert_eq!(exit.code, CMD_EXIT);
        ack(&mut sock, SESSION, exit.reply, &[]).await;
    });

    let mut device = Device::new("127.0.0.1", addr.port())
        .with_timeout(Duration::from_secs(5))
        .with_password(123);

    device.connect().await.unwrap();
    assert!(device.is_connected());
    device.disconnect().await.unwrap();

    server.await.unwrap();
}

#[tokio::test]
async fn wrong_password_fails_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();

        let connect = read_frame(&mut sock).await;
        sock.write_all(&wire_frame(CMD_ACK_UNAUTH, 7, connect.reply, &[]))
            .await
            .unwrap();

        let auth = read_frame(&mut sock).await;
        // Reject whatever key arrived
        sock.write_all(&wire_frame(CMD_ACK_UNAUTH, 7, auth.reply, &[]))
            .await
            .unwrap();
    });

    let mut device = Device::new("127.0.0.1", addr.port())
        .with_timeout(Duration::from_secs(5))
        .with_password(999);

    let result = device.connect().await;
    assert!(matches!(result, Err(zklink::Error::AuthenticationFailed)));
    assert!(!device.is_connected());

    server.await.unwrap();
}

#[tokio::test]
async fn bulk_user_read_reassembles_straddled_chunk() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    const SESSION: u16 = 0x0042;

    let alice = User {
        uid: 1,
        privilege: Privilege::Default,
        password: String::new(),
        name: "Alice".into(),
        card: 0,
        group_id: "1".into(),
        user_id: "1001".into(),
    };
    let bob = User {
        uid: 2,
        privilege: Privilege::Admin,
        password: "8888".into(),
        name: "Bob".into(),
        card: 5551234,
        group_id: "1".into(),
        user_id: "1002".into(),
    };

    let mut records = Vec::new();
    records.extend_from_slice(&alice.encode(UserPacketSize::Long));
    records.extend_from_slice(&bob.encode(UserPacketSize::Long));

    // Dataset = total_size word + records
    let mut dataset = (records.len() as u32).to_le_bytes().to_vec();
    dataset.extend_from_slice(&records);
    let dataset_len = dataset.len() as u32;

    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();

        let connect = read_frame(&mut sock).await;
        ack(&mut sock, SESSION, connect.reply, &[]).await;

        let sizes = read_frame(&mut sock).await;
        assert_eq!(sizes.code, CMD_GET_FREE_SIZES);
        ack(&mut sock, SESSION, sizes.reply, &free_sizes_payload(2, 0, 0)).await;

        let prepare = read_frame(&mut sock).await;
        assert_eq!(prepare.code, CMD_PREPARE_BUFFER);
        // 1(8) | sub_command(16) | fct(32) | ext(32)
        assert_eq!(prepare.payload[0], 1);
        assert_eq!(
            u16::from_le_bytes([prepare.payload[1], prepare.payload[2]]),
            CMD_USERTEMP_RRQ
        );
        assert_eq!(
            u32::from_le_bytes(prepare.payload[3..7].try_into().unwrap()),
            5 // FCT_USER
        );
        let mut staged = vec![0u8];
        staged.extend_from_slice(&dataset_len.to_le_bytes());
        sock.write_all(&wire_frame(CMD_PREPARE_DATA, SESSION, prepare.reply, &staged))
            .await
            .unwrap();

        let read = read_frame(&mut sock).await;
        assert_eq!(read.code, CMD_READ_BUFFER);
        assert_eq!(
            u32::from_le_bytes(read.payload[0..4].try_into().unwrap()),
            0
        );
        assert_eq!(
            u32::from_le_bytes(read.payload[4..8].try_into().unwrap()),
            dataset_len
        );

        // Chunk reply: PREPARE_DATA header frame, a DATA frame carrying
        // the bytes, and a 16-byte trailing ACK — written in slices that
        // straddle the frame boundaries
        let mut prep_payload = dataset_len.to_le_bytes().to_vec();
        prep_payload.extend_from_slice(&[0u8; 4]);
        let prep = wire_frame(CMD_PREPARE_DATA, SESSION, read.reply, &prep_payload);
        let data = wire_frame(CMD_DATA, SESSION, read.reply, &dataset);
        let trailer = wire_frame(CMD_ACK_OK, SESSION, read.reply, &[]);

        sock.write_all(&prep).await.unwrap();
        sock.write_all(&data[..60]).await.unwrap();
        sock.flush().await.unwrap();
        sleep(Duration::from_millis(50)).await;

        sock.write_all(&data[60..]).await.unwrap();
        sock.write_all(&trailer[..7]).await.unwrap();
        sock.flush().await.unwrap();
        sleep(Duration::from_millis(50)).await;

        sock.write_all(&trailer[7..]).await.unwrap();

        let free = read_frame(&mut sock).await;
        assert_eq!(free.code, CMD_FREE_DATA);
        ack(&mut sock, SESSION, free.reply, &[]).await;

        let exit = read_frame(&mut sock).await;
        assert_eq!(exit.code, CMD_EXIT);
        ack(&mut sock, SESSION, exit.reply, &[]).await;
    });

    let mut device = Device::new("127.0.0.1", addr.port()).with_timeout(Duration::from_secs(5));
    device.connect().await.unwrap();

    let users = device.get_users().await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0], alice);
    assert_eq!(users[1], bob);

    device.disconnect().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn live_capture_delivers_pushed_events_in_order() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    const SESSION: u16 = 0x0099;
    // The device stamps push frames with its own ids
    const PUSH_SESSION: u16 = 0xBEEF;

    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();

        let connect = read_frame(&mut sock).await;
        ack(&mut sock, SESSION, connect.reply, &[]).await;

        // start_live_capture: user fetch first (empty device)
        let sizes = read_frame(&mut sock).await;
        assert_eq!(sizes.code, CMD_GET_FREE_SIZES);
        ack(&mut sock, SESSION, sizes.reply, &free_sizes_payload(0, 0, 0)).await;

        for expected in [CMD_CANCELCAPTURE, CMD_STARTVERIFY, CMD_ENABLEDEVICE] {
            let frame = read_frame(&mut sock).await;
            assert_eq!(frame.code, expected);
            ack(&mut sock, SESSION, frame.reply, &[]).await;
        }

        let reg = read_frame(&mut sock).await;
        assert_eq!(reg.code, CMD_REG_EVENT);
        assert_eq!(reg.payload, vec![1, 0, 0, 0]); // EF_ATTLOG
        ack(&mut sock, SESSION, reg.reply, &[]).await;

        // Past the client's stale-event drain window, push two 10-byte
        // events concatenated into a single TCP segment
        sleep(Duration::from_millis(400)).await;

        let event_a = [0x05, 0x00, 1, 0, 23, 7, 4, 9, 15, 18];
        let event_b = [0x07, 0x00, 1, 1, 23, 7, 4, 9, 16, 2];
        let mut push = wire_frame(CMD_REG_EVENT, PUSH_SESSION, 77, &event_a);
        push.extend_from_slice(&wire_frame(CMD_REG_EVENT, PUSH_SESSION, 78, &event_b));
        sock.write_all(&push).await.unwrap();

        // Each push frame is acknowledged with the device's own ids
        for expected_reply in [77u16, 78] {
            let ack_frame = read_frame(&mut sock).await;
            assert_eq!(ack_frame.code, CMD_ACK_OK);
            assert_eq!(ack_frame.session, PUSH_SESSION);
            assert_eq!(ack_frame.reply, expected_reply);
        }

        // stop_live_capture unregisters with a zero flag
        let unreg = read_frame(&mut sock).await;
        assert_eq!(unreg.code, CMD_REG_EVENT);
        assert_eq!(unreg.payload, vec![0, 0, 0, 0]);
        ack(&mut sock, SESSION, unreg.reply, &[]).await;
    });

    let mut device = Device::new("127.0.0.1", addr.port()).with_timeout(Duration::from_secs(5));
    device.connect().await.unwrap();

    device
        .start_live_capture(Duration::from_millis(100))
        .await
        .unwrap();
    assert!(device.is_live_capture_active());

    // Let the push arrive, then pull
    sleep(Duration::from_millis(700)).await;

    let first = device.next_live_event().await.unwrap().expect("first event");
    assert_eq!(first.user_id, "5");
    assert_eq!(first.uid, 5);
    assert_eq!(first.status, 1);
    assert_eq!(first.punch, 0);
    assert_eq!(first.timestamp.to_string(), "2023-07-04T09:15:18");

    let second = device.next_live_event().await.unwrap().expect("second event");
    assert_eq!(second.user_id, "7");
    assert_eq!(second.timestamp.to_string(), "2023-07-04T09:16:02");

    // Nothing pending: the poll would block, which reads as empty
    assert!(device.next_live_event().await.unwrap().is_none());

    device.stop_live_capture().await.unwrap();
    assert!(!device.is_live_capture_active());

    server.await.unwrap();
}

#[tokio::test]
async fn udp_session_reads_inline_datasets() {
    let server_sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = server_sock.local_addr().unwrap();
    const SESSION: u16 = 0x0077;

    let user = User {
        uid: 1,
        privilege: Privilege::Default,
        password: String::new(),
        name: "Zoe".into(),
        card: 0,
        group_id: "1".into(),
        user_id: "9001".into(),
    };
    let user_for_server = user.clone();

    let server = tokio::spawn(async move {
        let mut buf = [0u8; 2048];

        loop {
            let (n, from) = server_sock.recv_from(&mut buf).await.unwrap();
            let frame = parse_inner(&buf[..n]);

            let reply: Vec<u8> = match frame.code {
                CMD_CONNECT => inner_frame(CMD_ACK_OK, SESSION, frame.reply, &[]),
                CMD_GET_FREE_SIZES => inner_frame(
                    CMD_ACK_OK,
                    SESSION,
                    frame.reply,
                    &free_sizes_payload(1, 0, 1),
                ),
                CMD_PREPARE_BUFFER => {
                    let sub = u16::from_le_bytes([frame.payload[1], frame.payload[2]]);
                    let dataset = match sub {
                        CMD_USERTEMP_RRQ => {
                            let record = user_for_server.encode(UserPacketSize::Short);
                            let mut d = (record.len() as u32).to_le_bytes().to_vec();
                            d.extend_from_slice(&record);
                            d
                        }
                        CMD_ATTLOG_RRQ => {
                            // One 8-byte row: uid=1, status=0, punch=4
                            let mut d = 8u32.to_le_bytes().to_vec();
                            d.extend_from_slice(&[0x01, 0x00, 0x00]);
                            d.extend_from_slice(&755_601_318u32.to_le_bytes());
                            d.push(4);
                            d
                        }
                        other => panic!("unexpected sub-command {other}"),
                    };
                    inner_frame(CMD_DATA, SESSION, frame.reply, &dataset)
                }
                CMD_EXIT => {
                    let reply = inner_frame(CMD_ACK_OK, SESSION, frame.reply, &[]);
                    server_sock.send_to(&reply, from).await.unwrap();
                    break;
                }
                other => panic!("unexpected command {other}"),
            };

            server_sock.send_to(&reply, from).await.unwrap();
        }
    });

    let mut device = Device::new("127.0.0.1", addr.port())
        .with_timeout(Duration::from_secs(5))
        .with_force_udp(true);

    device.connect().await.unwrap();

    let rows = device.get_attendance().await.unwrap();
    assert_eq!(rows.len(), 1);
    // Joined against the user list: the uid maps back to the user id
    assert_eq!(rows[0].uid, 1);
    assert_eq!(rows[0].user_id, "9001");
    assert_eq!(rows[0].punch, 4);
    assert_eq!(rows[0].timestamp.to_string(), "2023-07-04T09:15:18");

    device.disconnect().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn single_template_fetch_strips_trailing_padding() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    const SESSION: u16 = 0x0021;
    const CMD_GET_USERTEMP: u16 = 88;

    let blob: Vec<u8> = (1u8..=40).collect();

    let blob_for_server = blob.clone();
    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();

        let connect = read_frame(&mut sock).await;
        ack(&mut sock, SESSION, connect.reply, &[]).await;

        let fetch = read_frame(&mut sock).await;
        assert_eq!(fetch.code, CMD_GET_USERTEMP);
        assert_eq!(fetch.payload, vec![0x03, 0x00, 0x06]); // uid=3, finger=6

        // Device ships the blob plus six zero bytes and one spurious
        // trailing byte; the client strips both
        let mut dataset = blob_for_server.clone();
        dataset.extend_from_slice(&[0u8; 6]);
        dataset.push(0xFF);

        let mut prep_payload = (dataset.len() as u32).to_le_bytes().to_vec();
        prep_payload.extend_from_slice(&[0u8; 4]);
        sock.write_all(&wire_frame(CMD_PREPARE_DATA, SESSION, fetch.reply, &prep_payload))
            .await
            .unwrap();
        sock.write_all(&wire_frame(CMD_DATA, SESSION, fetch.reply, &dataset))
            .await
            .unwrap();
        sock.write_all(&wire_frame(CMD_ACK_OK, SESSION, fetch.reply, &[]))
            .await
            .unwrap();

        let exit = read_frame(&mut sock).await;
        assert_eq!(exit.code, CMD_EXIT);
        ack(&mut sock, SESSION, exit.reply, &[]).await;
    });

    let mut device = Device::new("127.0.0.1", addr.port()).with_timeout(Duration::from_secs(5));
    device.connect().await.unwrap();

    let template = device.get_user_template(3, 6).await.unwrap();
    assert_eq!(template.uid, 3);
    assert_eq!(template.finger_id, 6);
    assert_eq!(template.valid, 1);
    assert_eq!(&template.template[..], &blob[..]);

    device.disconnect().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn udp_bulk_read_spans_multiple_chunks() {
    let server_sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = server_sock.local_addr().unwrap();
    const SESSION: u16 = 0x0510;
    const RECORDS: usize = 500;

    // 500 forty-byte rows: larger than the 16 KiB UDP chunk, so the
    // transfer takes one full chunk plus a remainder
    let mut records = Vec::with_capacity(RECORDS * 40);
    for i in 0..RECORDS {
        let mut row = [0u8; 40];
        row[..2].copy_from_slice(&((i % 7) as u16).to_le_bytes());
        let user_id = format!("u{i}");
        row[2..2 + user_id.len()].copy_from_slice(user_id.as_bytes());
        row[26] = 1;
        row[27..31].copy_from_slice(&755_601_318u32.to_le_bytes());
        row[31] = (i % 4) as u8;
        records.extend_from_slice(&row);
    }
    let mut dataset = (records.len() as u32).to_le_bytes().to_vec();
    dataset.extend_from_slice(&records);
    let dataset_for_server = dataset.clone();

    let server = tokio::spawn(async move {
        let mut buf = [0u8; 2048];

        loop {
            let (n, from) = server_sock.recv_from(&mut buf).await.unwrap();
            let frame = parse_inner(&buf[..n]);

            match frame.code {
                CMD_CONNECT => {
                    let reply = inner_frame(CMD_ACK_OK, SESSION, frame.reply, &[]);
                    server_sock.send_to(&reply, from).await.unwrap();
                }
                CMD_GET_FREE_SIZES => {
                    let reply = inner_frame(
                        CMD_ACK_OK,
                        SESSION,
                        frame.reply,
                        &free_sizes_payload(0, 0, RECORDS as u32),
                    );
                    server_sock.send_to(&reply, from).await.unwrap();
                }
                CMD_PREPARE_BUFFER => {
                    let sub = u16::from_le_bytes([frame.payload[1], frame.payload[2]]);
                    assert_eq!(sub, CMD_ATTLOG_RRQ);
                    let mut staged = vec![0u8];
                    staged.extend_from_slice(&(dataset_for_server.len() as u32).to_le_bytes());
                    let reply = inner_frame(CMD_PREPARE_DATA, SESSION, frame.reply, &staged);
                    server_sock.send_to(&reply, from).await.unwrap();
                }
                CMD_READ_BUFFER => {
                    let start =
                        u32::from_le_bytes(frame.payload[0..4].try_into().unwrap()) as usize;
                    let size =
                        u32::from_le_bytes(frame.payload[4..8].try_into().unwrap()) as usize;
                    let chunk = &dataset_for_server[start..start + size];

                    let mut prep = (size as u32).to_le_bytes().to_vec();
                    prep.extend_from_slice(&[0u8; 4]);
                    let reply = inner_frame(CMD_PREPARE_DATA, SESSION, frame.reply, &prep);
                    server_sock.send_to(&reply, from).await.unwrap();

                    for part in chunk.chunks(1024) {
                        let datagram = inner_frame(CMD_DATA, SESSION, frame.reply, part);
                        server_sock.send_to(&datagram, from).await.unwrap();
                    }
                    let done = inner_frame(CMD_ACK_OK, SESSION, frame.reply, &[]);
                    server_sock.send_to(&done, from).await.unwrap();
                }
                CMD_FREE_DATA => {
                    let reply = inner_frame(CMD_ACK_OK, SESSION, frame.reply, &[]);
                    server_sock.send_to(&reply, from).await.unwrap();
                }
                CMD_EXIT => {
                    let reply = inner_frame(CMD_ACK_OK, SESSION, frame.reply, &[]);
                    server_sock.send_to(&reply, from).await.unwrap();
                    break;
                }
                other => panic!("unexpected command {other}"),
            }
        }
    });

    let mut device = Device::new("127.0.0.1", addr.port())
        .with_timeout(Duration::from_secs(5))
        .with_force_udp(true);

    device.connect().await.unwrap();

    let rows = device.get_attendance().await.unwrap();
    assert_eq!(rows.len(), RECORDS);
    assert_eq!(rows[0].user_id, "u0");
    assert_eq!(rows[499].user_id, "u499");
    assert_eq!(rows[499].uid, 499 % 7);
    assert_eq!(rows[123].punch, 123 % 4);

    device.disconnect().await.unwrap();
    server.await.unwrap();
}
