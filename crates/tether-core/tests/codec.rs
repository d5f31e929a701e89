//! Encode/decode through the registry.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::json;

use tether_core::compress::{GzipCompressor, NoneCompressor};
use tether_core::protocol::{
    decode, encode, peek_frame_length, Envelope, MessageKind, Payload, ProtocolVersion, Request,
    Response, ResponseStatus, MAX_FRAME_LENGTH, MIN_FRAME_LEN,
};
use tether_core::serialize::JsonSerializer;
use tether_core::{ComponentRegistry, RpcError};

fn hello_request(id: &str) -> Request {
    Request {
        request_id: id.to_string(),
        target: "demo.Greeter".into(),
        method: "hello".into(),
        param_types: vec!["java.lang.String".into()],
        args: vec![json!("rpc4j")],
    }
}

#[test]
fn header_bytes_follow_layout() {
    let reg = ComponentRegistry::with_defaults();
    let env = Envelope::current_request(JsonSerializer::ID, NoneCompressor::ID, hello_request("a"));
    let frame = encode(&env, &reg).unwrap();

    assert_eq!(&frame[..5], b"rpc4j");
    assert_eq!(frame[5], 0x01);
    assert_eq!(frame[6], JsonSerializer::ID);
    assert_eq!(frame[7], NoneCompressor::ID);
    assert_eq!(frame[8], MessageKind::Request.code());
    assert_eq!(frame[9], ResponseStatus::Success.code());
    assert_eq!(peek_frame_length(&frame), Some(frame.len()));
}

#[test]
fn gzip_request_decodes_to_same_request() {
    let reg = ComponentRegistry::with_defaults();
    let mut req = hello_request("gz");
    req.args = vec![json!("x".repeat(4096))];
    let env = Envelope::current_request(JsonSerializer::ID, GzipCompressor::ID, req.clone());
    let frame = encode(&env, &reg).unwrap();

    // highly repetitive body compresses well below its raw size
    assert!(frame.len() < 1024);
    let back = decode(frame, &reg).unwrap();
    assert_eq!(back.compression, GzipCompressor::ID);
    assert_eq!(back.payload, Payload::Request(req));
}

#[test]
fn failed_response_sets_header_status() {
    let reg = ComponentRegistry::with_defaults();
    let env = Envelope::response(
        0x01,
        JsonSerializer::ID,
        NoneCompressor::ID,
        Response::fail("r", "boom"),
    );
    let frame = encode(&env, &reg).unwrap();
    assert_eq!(frame[9], ResponseStatus::Fail.code());
    let back = decode(frame, &reg).unwrap();
    assert_eq!(back.status, ResponseStatus::Fail);
}

#[test]
fn unregistered_compressor_is_rejected_on_encode() {
    let reg = ComponentRegistry::with_defaults();
    let env = Envelope::current_request(JsonSerializer::ID, 0x42, hello_request("c"));
    assert!(matches!(
        encode(&env, &reg),
        Err(RpcError::UnknownComponentId { id: 0x42, .. })
    ));
}

#[test]
fn oversize_length_field_is_rejected() {
    let reg = ComponentRegistry::with_defaults();
    let mut buf = BytesMut::new();
    buf.put_slice(b"rpc4j");
    buf.put_slice(&[0x01, 0x01, 0x01, 0x01, 0x01]);
    buf.put_u32((MAX_FRAME_LENGTH + 1) as u32);
    assert_eq!(buf.len(), MIN_FRAME_LEN);
    assert!(matches!(
        decode(buf.freeze(), &reg),
        Err(RpcError::FrameTooLarge { .. })
    ));
}

#[test]
fn body_not_matching_kind_is_serialization_error() {
    let reg = ComponentRegistry::with_defaults();
    let body = br#"{"request_id":"r","status":"success"}"#;
    let mut buf = BytesMut::new();
    buf.put_slice(b"rpc4j");
    // kind says request, body is a response
    buf.put_slice(&[0x01, 0x01, 0x01, 0x01, 0x01]);
    buf.put_u32((MIN_FRAME_LEN + body.len()) as u32);
    buf.put_slice(body);
    assert!(matches!(
        decode(buf.freeze(), &reg),
        Err(RpcError::Serialization(_))
    ));
}

#[test]
fn peek_needs_full_header() {
    assert_eq!(peek_frame_length(b"rpc4j\x01"), None);
    assert_eq!(peek_frame_length(&Bytes::from_static(b"rpc4j\x01\x01\x01\x01\x01\x00\x00\x00\x20")), Some(32));
}

#[test]
fn envelopes_survive_encode_decode() {
    let reg = ComponentRegistry::with_defaults();
    for compression in [NoneCompressor::ID, GzipCompressor::ID] {
        let envelopes = [
            Envelope::current_request(JsonSerializer::ID, compression, hello_request("rt-1")),
            Envelope::response(
                ProtocolVersion::CURRENT.code(),
                JsonSerializer::ID,
                compression,
                Response::success("rt-1", json!({"greeting": "hello rpc4j", "n": [1, 2]})),
            ),
            Envelope::response(
                ProtocolVersion::CURRENT.code(),
                JsonSerializer::ID,
                compression,
                Response::fail("rt-2", "service not found: demo.Missing"),
            ),
        ];
        for env in envelopes {
            let back = decode(encode(&env, &reg).unwrap(), &reg).unwrap();
            assert_eq!(back, env, "compression={compression}");
        }
    }
}
