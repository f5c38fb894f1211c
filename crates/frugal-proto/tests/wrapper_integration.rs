use frugal_proto::{Context, ProtocolWrapper};
use frugal_proto::binary::BinaryProtocolFactory;
use frugal_proto::protocol::ProtocolFactory;

#[test]
fn request_headers_round_trip_through_a_wrapper() {
    let mut ctx = Context::new(Some("fixed-cid".to_string()));
    ctx.set_op_id(7);
    ctx.set_request_header("route", "checkout");

    let factory = BinaryProtocolFactory;
    let wrapper = ProtocolWrapper::new(factory.new_writer());
    let header_bytes = wrapper.write_request_headers(&ctx);

    let reader = ProtocolWrapper::new(factory.new_reader(Vec::new()));
    let (decoded, consumed) = reader.read_request_headers(&header_bytes, 0).unwrap();

    assert_eq!(consumed, header_bytes.len());
    assert_eq!(decoded.correlation_id(), "fixed-cid");
    assert_eq!(decoded.op_id(), 7);
    assert_eq!(decoded.request_header("route"), Some("checkout"));
}

#[test]
fn response_headers_update_an_existing_context_in_place() {
    let mut ctx = Context::new(None);
    let mut reply_ctx = Context::new(None);
    reply_ctx.set_response_header("status", "ok");

    let factory = BinaryProtocolFactory;
    let wrapper = ProtocolWrapper::new(factory.new_writer());
    let encoded = wrapper.write_response_headers(&reply_ctx);

    wrapper.read_response_headers(&mut ctx, &encoded, 0).unwrap();
    assert_eq!(ctx.response_header("status"), Some("ok"));
}

#[test]
fn missing_opid_header_is_a_protocol_error() {
    use frugal_proto::header::{encode, Headers};

    let mut headers = Headers::new();
    headers.insert("_cid".to_string(), "x".to_string());
    let encoded = encode(&headers);

    let factory = BinaryProtocolFactory;
    let wrapper = ProtocolWrapper::new(factory.new_reader(Vec::new()));
    let err = wrapper.read_request_headers(&encoded, 0).unwrap_err();
    assert!(matches!(err, frugal_proto::ProtocolError::MissingHeader { key: "_opid" }));
}
