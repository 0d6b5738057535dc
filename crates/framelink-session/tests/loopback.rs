//! End-to-end sessions over loopback TCP.

use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use framelink_frame::{DecodedFrame, FrameTag, WireFormat};
use framelink_session::{
    FixedResult, Receiver, SenderSession, SessionConfig, SessionEnd, SessionError, StopSignal,
};

fn receiver_config(format: WireFormat) -> SessionConfig {
    SessionConfig {
        read_timeout: Some(Duration::from_secs(5)),
        raw_payloads: true,
        ..SessionConfig::new("127.0.0.1", 0).with_format(format)
    }
}

fn sender_config(port: u16, format: WireFormat) -> SessionConfig {
    SessionConfig {
        result_timeout: Duration::from_secs(5),
        ..SessionConfig::new("127.0.0.1", port).with_format(format)
    }
}

#[test]
fn tagged_sessions_exchange_frames_and_result() {
    for format in [WireFormat::Legacy, WireFormat::Compact] {
        let receiver = Receiver::bind(&receiver_config(format)).unwrap();
        let port = receiver.local_addr().port();

        let server = thread::spawn(move || {
            let mut session = receiver.accept().unwrap();
            let mut tags = Vec::new();
            let mut sink = |frame: &DecodedFrame| tags.push((frame.tag, frame.payload.clone()));
            let report = session.run(&mut sink, &mut FixedResult::new("label-1")).unwrap();
            (report, tags)
        });

        let mut sender = SenderSession::connect(&sender_config(port, format)).unwrap();
        let mut source = |tag: FrameTag| Some(Bytes::from(tag.name().to_lowercase()));
        let summary = sender
            .stream_until(&mut source, &StopSignal::new(), Some(2))
            .unwrap();
        let token = sender.finish().unwrap().unwrap();

        let (report, tags) = server.join().unwrap();
        assert_eq!(summary.frames_sent, 4, "{format}");
        assert_eq!(token.to_string(), "label-1");
        assert_eq!(report.end, SessionEnd::Stopped);
        assert_eq!(report.rgb_frames, 2);
        assert_eq!(report.depth_frames, 2);
        assert_eq!(tags[0], (FrameTag::Rgb, Bytes::from_static(b"rgb")));
        assert_eq!(tags[1], (FrameTag::Depth, Bytes::from_static(b"depth")));
    }
}

#[test]
fn large_frames_survive_segmentation() {
    let receiver = Receiver::bind(&receiver_config(WireFormat::Legacy)).unwrap();
    let port = receiver.local_addr().port();
    let payload: Vec<u8> = (0..3 * 1024 * 1024u32).map(|i| (i % 253) as u8).collect();
    let expected = payload.clone();

    let server = thread::spawn(move || {
        let mut session = receiver.accept().unwrap();
        let mut got = Vec::new();
        let mut sink = |frame: &DecodedFrame| got.push(frame.payload.clone());
        session.run(&mut sink, &mut FixedResult::new("0")).unwrap();
        got
    });

    let mut sender = SenderSession::connect(&sender_config(port, WireFormat::Legacy)).unwrap();
    sender.send_frame(FrameTag::Depth, Bytes::from(payload)).unwrap();
    assert_eq!(sender.finish().unwrap().unwrap().as_bytes(), b"0");

    let got = server.join().unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].as_ref(), expected.as_slice());
}

#[test]
fn receiver_accepts_only_one_sender() {
    let receiver = Receiver::bind(&receiver_config(WireFormat::Legacy)).unwrap();
    let addr = receiver.local_addr();

    let server = thread::spawn(move || {
        let mut session = receiver.accept().unwrap();
        session
            .run(&mut framelink_session::NullSink, &mut FixedResult::new("0"))
            .unwrap()
    });

    let mut first = SenderSession::connect(&sender_config(addr.port(), WireFormat::Legacy)).unwrap();
    first.finish().unwrap();
    server.join().unwrap();

    assert!(TcpStream::connect_timeout(&addr, Duration::from_secs(1)).is_err());
}

#[test]
fn connect_refused_is_fatal() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let err = SenderSession::connect(&sender_config(port, WireFormat::Legacy))
        .err()
        .unwrap();
    assert!(err.is_connection_error());
    assert!(matches!(err, SessionError::Transport(_)));
}
