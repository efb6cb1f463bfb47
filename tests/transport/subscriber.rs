use endpoint_transport::bus::{Disposition, InMemoryBus, Message, Publisher, Subscriber};
use endpoint_transport::codec::{bool_ack_response, json_decode_request};
use endpoint_transport::context::Context;
use endpoint_transport::transport::{
    NopErrorHandler, Outcome, SubscriberTransport, TransportStats, MESSAGE_UUID_KEY,
};
use endpoint_transport::{BoxError, TransportError};

use crate::support::{login_message, Login, Recorder};

/// Subscriber for `Login` requests that records every call and accepts
/// adults only.
fn login_transport(calls: &Recorder<String>) -> SubscriberTransport<Login, bool> {
    let calls = calls.clone();
    SubscriberTransport::new(
        move |_ctx: &Context, login: Login| -> Result<bool, BoxError> {
            calls.push(login.name.clone());
            Ok(login.age >= 18)
        },
        json_decode_request::<Login>,
        bool_ack_response,
    )
}

#[test]
fn successful_response_acks_the_message() {
    let bus = InMemoryBus::new();
    let stream = bus.subscribe("user").unwrap();
    let calls = Recorder::new();
    let transport = login_transport(&calls);

    let msg = login_message("jax", 42);
    bus.publish("user", &msg).unwrap();
    bus.close();

    let stats = transport.serve(stream);

    assert_eq!(
        stats,
        TransportStats {
            handled: 1,
            acked: 1,
            ..Default::default()
        }
    );
    assert_eq!(calls.entries(), vec!["jax".to_string()]);
    assert_eq!(bus.acked(), vec![msg.uuid.clone()]);
    assert!(bus.nacked().is_empty());
}

#[test]
fn false_response_nacks_the_message() {
    let bus = InMemoryBus::new();
    let stream = bus.subscribe("user").unwrap();
    let transport = login_transport(&Recorder::new());

    let msg = login_message("kid", 7);
    bus.publish("user", &msg).unwrap();
    bus.close();

    let stats = transport.serve(stream);

    assert_eq!(stats.nacked, 1);
    assert_eq!(bus.nacked(), vec![msg.uuid.clone()]);
    assert!(bus.acked().is_empty());
}

#[test]
fn decode_failure_skips_only_that_message() {
    let bus = InMemoryBus::new();
    let stream = bus.subscribe("user").unwrap();
    let calls = Recorder::new();
    let errors = Recorder::new();
    let sink = errors.clone();
    let transport = login_transport(&calls)
        .error_handler(move |_ctx: &Context, err: &TransportError| sink.push(err.to_string()));

    bus.publish("user", &login_message("first", 30)).unwrap();
    let broken = Message::with_string_payload("{not json");
    bus.publish("user", &broken).unwrap();
    bus.publish("user", &login_message("third", 30)).unwrap();
    bus.close();

    let stats = transport.serve(stream);

    assert_eq!(calls.entries(), vec!["first".to_string(), "third".to_string()]);
    assert_eq!(errors.len(), 1);
    assert!(errors.entries()[0].starts_with("decode failed"));
    assert_eq!(
        stats,
        TransportStats {
            handled: 3,
            acked: 2,
            nacked: 0,
            failed: 1,
        }
    );
    // No disposition for the broken message; the broker keeps it.
    assert!(!bus.acked().contains(&broken.uuid));
    assert!(!bus.nacked().contains(&broken.uuid));
}

#[test]
fn endpoint_error_skips_acknowledger() {
    let acks = Recorder::<bool>::new();
    let ack_sink = acks.clone();
    let encoded = Recorder::new();
    let error_sink = encoded.clone();

    let transport = SubscriberTransport::new(
        |_ctx: &Context, _login: Login| -> Result<bool, BoxError> {
            Err("user store offline".into())
        },
        json_decode_request::<Login>,
        bool_ack_response,
    )
    .acknowledger(move |_ctx, _msg, ack| {
        ack_sink.push(ack);
        true
    })
    .error_handler(NopErrorHandler)
    .error_encoder(move |_ctx, msg, err| {
        error_sink.push((msg.uuid.clone(), err.to_string()));
    });

    let msg = login_message("jax", 42);
    let outcome = transport.handle(msg.clone());

    assert_eq!(outcome, Outcome::Failed);
    assert_eq!(acks.len(), 0);
    assert_eq!(
        encoded.entries(),
        vec![(msg.uuid.clone(), "endpoint failed: user store offline".to_string())]
    );
}

#[test]
fn response_encoder_failure_is_reported() {
    let transport = SubscriberTransport::new(
        |_ctx: &Context, login: Login| -> Result<Login, BoxError> { Ok(login) },
        json_decode_request::<Login>,
        |_ctx: &Context, _login: Login| -> Result<bool, BoxError> {
            Err("cannot encode".into())
        },
    )
    .error_handler(NopErrorHandler);

    assert_eq!(transport.handle(login_message("jax", 42)), Outcome::Failed);
}

#[test]
fn rejected_ack_is_reported() {
    let bus = InMemoryBus::new();
    let stream = bus.subscribe("user").unwrap();
    bus.fail_acks(true);

    let errors = Recorder::new();
    let sink = errors.clone();
    let transport = login_transport(&Recorder::new())
        .error_handler(move |_ctx: &Context, err: &TransportError| sink.push(err.to_string()));

    let msg = login_message("jax", 42);
    bus.publish("user", &msg).unwrap();
    bus.close();

    let stats = transport.serve(stream);

    assert_eq!(stats.failed, 1);
    assert_eq!(
        errors.entries(),
        vec![format!(
            "acknowledge result is false (message {}, ack = true)",
            msg.uuid
        )]
    );
}

#[test]
fn each_message_gets_one_disposition() {
    let bus = InMemoryBus::new();
    let stream = bus.subscribe("user").unwrap();
    let transport = login_transport(&Recorder::new()).error_handler(NopErrorHandler);

    let messages = vec![
        login_message("a", 20),
        login_message("b", 5),
        Message::with_string_payload("garbage"),
        login_message("c", 30),
    ];
    for msg in &messages {
        bus.publish("user", msg).unwrap();
    }
    bus.close();

    let delivered: Vec<Message> = stream.iter().collect();
    let stats = transport.serve(delivered.clone());

    let dispositions: Vec<Disposition> = delivered.iter().map(Message::disposition).collect();
    assert_eq!(
        dispositions,
        vec![
            Disposition::Acked,
            Disposition::Nacked,
            Disposition::Pending,
            Disposition::Acked,
        ]
    );
    assert_eq!(bus.acked().len() + bus.nacked().len(), 3);
    assert_eq!(stats.handled, 4);

    // A second settle attempt never reaches the broker.
    assert!(!delivered[0].nack());
    assert_eq!(bus.nacked().len(), 1);
}

#[test]
fn hooks_thread_context_into_the_endpoint() {
    let seen = Recorder::new();
    let sink = seen.clone();

    let transport = SubscriberTransport::new(
        move |ctx: &Context, _login: Login| -> Result<bool, BoxError> {
            let tenant = ctx.value("tenant").and_then(|v| v.as_str().map(String::from));
            sink.push(tenant.unwrap_or_default());
            Ok(true)
        },
        json_decode_request::<Login>,
        bool_ack_response,
    )
    .before(|ctx, msg| {
        let tenant = msg.metadata.get("tenant").unwrap_or("none").to_string();
        ctx.with_value("tenant", tenant)
    })
    .before(|ctx, _msg| {
        let tenant = ctx.value("tenant").and_then(|v| v.as_str().map(String::from));
        ctx.with_value("tenant", format!("{}/eu", tenant.unwrap_or_default()))
    })
    .acknowledger(|_ctx, _msg, _ack| true);

    transport.handle(login_message("jax", 42).with_metadata("tenant", "acme"));

    assert_eq!(seen.entries(), vec!["acme/eu".to_string()]);
}

#[test]
fn after_hooks_see_the_message() {
    let stages = Recorder::new();
    let after = stages.clone();
    let ack = stages.clone();

    let transport = login_transport(&Recorder::new())
        .after(move |ctx, msg| {
            after.push(format!("after:{}", msg.metadata.get("stage").unwrap_or("-")));
            msg.metadata.set("stage", "after");
            ctx
        })
        .acknowledger(move |_ctx, msg, _ack| {
            ack.push(format!("ack:{}", msg.metadata.get("stage").unwrap_or("-")));
            true
        });

    transport.handle(login_message("jax", 42));

    assert_eq!(
        stages.entries(),
        vec!["after:-".to_string(), "ack:after".to_string()]
    );
}

#[test]
fn serve_topic_subscribes_and_serves() {
    let bus = InMemoryBus::new();
    let calls = Recorder::new();
    let transport = login_transport(&calls);

    let handle = std::thread::spawn({
        let bus = bus.clone();
        move || transport.serve_topic(&bus, "user")
    });

    while bus.subscriber_count("user") == 0 {
        std::thread::yield_now();
    }
    bus.publish("user", &login_message("jax", 42)).unwrap();
    bus.close();

    let stats = handle.join().unwrap().unwrap();
    assert_eq!(stats.acked, 1);
    assert_eq!(calls.entries(), vec!["jax".to_string()]);
}

#[test]
fn serve_topic_on_closed_bus_fails() {
    let bus = InMemoryBus::new();
    bus.close();

    let err = login_transport(&Recorder::new())
        .serve_topic(&bus, "user")
        .unwrap_err();
    assert_eq!(err.to_string(), "broker closed");
}

#[test]
fn zero_hooks_match_identity_hooks() {
    fn recording_transport(seen: &Recorder<(String, String)>) -> SubscriberTransport<Login, bool> {
        let sink = seen.clone();
        SubscriberTransport::new(
            move |ctx: &Context, login: Login| -> Result<bool, BoxError> {
                let uuid = ctx
                    .value(MESSAGE_UUID_KEY)
                    .and_then(|v| v.as_str().map(String::from))
                    .unwrap_or_default();
                sink.push((uuid, login.name));
                Ok(true)
            },
            json_decode_request::<Login>,
            bool_ack_response,
        )
        .acknowledger(|_ctx, _msg, _ack| true)
    }

    let bare_seen = Recorder::new();
    let hooked_seen = Recorder::new();
    let bare = recording_transport(&bare_seen);
    let hooked = recording_transport(&hooked_seen)
        .before(|ctx, _msg| ctx)
        .after(|ctx, _msg| ctx);

    let msg = login_message("jax", 42);
    assert_eq!(bare.handle(msg.clone()), Outcome::Acked);
    assert_eq!(hooked.handle(msg.clone()), Outcome::Acked);

    assert_eq!(bare_seen.entries(), hooked_seen.entries());
    assert_eq!(bare_seen.entries(), vec![(msg.uuid.clone(), "jax".to_string())]);
}
