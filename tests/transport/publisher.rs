use std::time::Duration;

use endpoint_transport::bus::{InMemoryBus, Message, PublishError, Subscriber};
use endpoint_transport::codec::{json_encode_request, nop_decode_response};
use endpoint_transport::context::Context;
use endpoint_transport::transport::PublisherTransport;
use endpoint_transport::{BoxError, TransportError};

use crate::support::{DownPublisher, Login, Recorder};

#[test]
fn ping_is_published_verbatim_and_decoded() {
    let bus = InMemoryBus::new();
    let stream = bus.subscribe("ping").unwrap();
    let decoded = Recorder::new();
    let seen = decoded.clone();

    let transport = PublisherTransport::new(
        bus.clone(),
        "ping",
        json_encode_request::<&'static str>,
        move |_ctx: &Context, msg: &Message, res: Option<&PublishError>| {
            seen.push((msg.uuid.clone(), res.is_none()));
            Ok::<_, BoxError>("pong")
        },
    );

    let response = transport.call(&Context::background(), "ping").unwrap();
    assert_eq!(response, "pong");

    let delivered = stream.recv().unwrap();
    assert_eq!(delivered.payload, b"ping".to_vec());
    assert_eq!(decoded.entries(), vec![(delivered.uuid.clone(), true)]);
}

#[test]
fn structured_requests_are_json() {
    let bus = InMemoryBus::new();
    let transport = PublisherTransport::new(
        bus.clone(),
        "user",
        json_encode_request::<Login>,
        nop_decode_response,
    );

    transport
        .call(&Context::background(), Login::new("jax", 7))
        .unwrap();

    let published = bus.published("user");
    assert_eq!(published.len(), 1);
    let login: Login = serde_json::from_slice(&published[0].payload).unwrap();
    assert_eq!(login, Login::new("jax", 7));
}

#[test]
fn publish_failure_skips_decoder() {
    let decodes = Recorder::<()>::new();
    let counter = decodes.clone();
    let transport = PublisherTransport::new(
        DownPublisher,
        "user",
        json_encode_request::<Login>,
        move |_ctx: &Context, _msg: &Message, _res: Option<&PublishError>| -> Result<(), BoxError> {
            counter.push(());
            Ok(())
        },
    );

    let err = transport
        .call(&Context::background(), Login::new("jax", 7))
        .unwrap_err();

    assert!(matches!(
        err,
        TransportError::Publish(PublishError::ConnectionFailed(_))
    ));
    assert_eq!(err.to_string(), "connection failed: broker unreachable");
    assert_eq!(decodes.len(), 0);
}

#[test]
fn encoder_failure_is_returned() {
    let bus = InMemoryBus::new();
    let transport = PublisherTransport::new(
        bus.clone(),
        "user",
        |_ctx: &Context, _msg: &mut Message, _req: Login| -> Result<(), BoxError> {
            Err("unsupported request".into())
        },
        nop_decode_response,
    );

    let err = transport
        .call(&Context::background(), Login::new("jax", 7))
        .unwrap_err();
    assert_eq!(err.to_string(), "encode failed: unsupported request");
    assert!(bus.published("user").is_empty());
}

#[test]
fn decoder_failure_is_returned() {
    let transport = PublisherTransport::new(
        InMemoryBus::new(),
        "user",
        json_encode_request::<Login>,
        |_ctx: &Context, _msg: &Message, _res: Option<&PublishError>| -> Result<(), BoxError> {
            Err("no reply".into())
        },
    );

    let err = transport
        .call(&Context::background(), Login::new("jax", 7))
        .unwrap_err();
    assert!(matches!(err, TransportError::Decode(_)));
}

#[test]
fn before_hooks_run_in_order_and_edit_the_message() {
    let bus = InMemoryBus::new();
    let transport = PublisherTransport::new(
        bus.clone(),
        "user",
        json_encode_request::<Login>,
        |ctx: &Context, _msg: &Message, _res: Option<&PublishError>| {
            Ok::<_, BoxError>(ctx.value("step").and_then(|v| v.as_str().map(String::from)))
        },
    )
    .before(|ctx, msg| {
        msg.metadata.set("trace-id", "123456678");
        ctx.with_value("step", "first")
    })
    .before(|ctx, _msg| {
        let previous = ctx.value("step").and_then(|v| v.as_str().map(String::from));
        assert_eq!(previous.as_deref(), Some("first"));
        ctx.with_value("step", "second")
    });

    let step = transport
        .call(&Context::background(), Login::new("jax", 7))
        .unwrap();

    assert_eq!(step.as_deref(), Some("second"));
    assert_eq!(
        bus.published("user")[0].metadata.get("trace-id"),
        Some("123456678")
    );
}

#[test]
fn after_hooks_see_a_successful_publish() {
    let bus = InMemoryBus::new();
    let outcomes = Recorder::new();
    let seen = outcomes.clone();
    let transport = PublisherTransport::new(
        bus.clone(),
        "user",
        json_encode_request::<Login>,
        nop_decode_response,
    )
    .after(move |ctx, msg, res| {
        seen.push((msg.uuid.clone(), res.is_none()));
        ctx
    });

    transport
        .call(&Context::background(), Login::new("jax", 7))
        .unwrap();

    let uuid = bus.published("user")[0].uuid.clone();
    assert_eq!(outcomes.entries(), vec![(uuid, true)]);
}

#[test]
fn expired_deadline_aborts_the_call() {
    let bus = InMemoryBus::new();
    let transport = PublisherTransport::new(
        bus.clone(),
        "user",
        json_encode_request::<Login>,
        nop_decode_response,
    )
    .timeout(Duration::ZERO);

    let err = transport
        .call(&Context::background(), Login::new("jax", 7))
        .unwrap_err();

    assert_eq!(err.to_string(), "context deadline exceeded");
    assert!(bus.published("user").is_empty());
}

#[test]
fn zero_hooks_match_identity_hooks() {
    let ctx = Context::background().with_value("tenant", "acme");
    fn tenant(
        ctx: &Context,
        _msg: &Message,
        _res: Option<&PublishError>,
    ) -> Result<Option<String>, BoxError> {
        Ok(ctx.value("tenant").and_then(|v| v.as_str().map(String::from)))
    }

    let bare = PublisherTransport::new(
        InMemoryBus::new(),
        "t",
        json_encode_request::<String>,
        tenant,
    );
    let hooked = PublisherTransport::new(
        InMemoryBus::new(),
        "t",
        json_encode_request::<String>,
        tenant,
    )
    .before(|ctx, _msg| ctx)
    .after(|ctx, _msg, _res| ctx);

    assert_eq!(
        bare.call(&ctx, "x".into()).unwrap(),
        hooked.call(&ctx, "x".into()).unwrap()
    );
}
