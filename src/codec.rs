//! Ready-made encoders and decoders for the transports.
//!
//! Publisher side: `encode(ctx, &mut message, request)` fills a fresh
//! message, `decode(ctx, &message, publish_error)` turns the publish outcome
//! into a response. Subscriber side: `decode(ctx, &message)` produces the
//! request, `encode(ctx, response)` produces the ack decision.

use std::any::Any;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::bus::{Message, PublishError};
use crate::context::Context;
use crate::error::BoxError;

/// Default request encoder.
///
/// Byte requests (`Vec<u8>`, `Box<[u8]>`, `&'static [u8]`) become the
/// payload verbatim, string requests (`String`, `&'static str`) become their
/// UTF-8 bytes, and anything else is serialized to JSON.
///
/// The match is on exact types: a fixed-size array such as `[u8; 4]` is
/// serialized as a JSON array of numbers, so pass `Vec<u8>` or a slice for
/// raw bytes. Borrowed requests must be `'static`; convert shorter-lived
/// strings and slices to `String` / `Vec<u8>` first.
pub fn json_encode_request<Req>(
    _ctx: &Context,
    msg: &mut Message,
    request: Req,
) -> Result<(), BoxError>
where
    Req: Serialize + 'static,
{
    let any = &request as &dyn Any;
    msg.payload = if let Some(bytes) = any.downcast_ref::<Vec<u8>>() {
        bytes.clone()
    } else if let Some(bytes) = any.downcast_ref::<Box<[u8]>>() {
        bytes.to_vec()
    } else if let Some(bytes) = any.downcast_ref::<&'static [u8]>() {
        bytes.to_vec()
    } else if let Some(text) = any.downcast_ref::<String>() {
        text.as_bytes().to_vec()
    } else if let Some(text) = any.downcast_ref::<&'static str>() {
        text.as_bytes().to_vec()
    } else {
        serde_json::to_vec(&request)?
    };
    Ok(())
}

/// Decode a JSON payload into the request type.
pub fn json_decode_request<Req>(_ctx: &Context, msg: &Message) -> Result<Req, BoxError>
where
    Req: DeserializeOwned,
{
    Ok(serde_json::from_slice(&msg.payload)?)
}

/// Encode the request with bitcode (compact binary).
pub fn bitcode_encode_request<Req>(
    _ctx: &Context,
    msg: &mut Message,
    request: Req,
) -> Result<(), BoxError>
where
    Req: Serialize,
{
    msg.payload = bitcode::serialize(&request)?;
    Ok(())
}

/// Decode a bitcode payload into the request type.
pub fn bitcode_decode_request<Req>(_ctx: &Context, msg: &Message) -> Result<Req, BoxError>
where
    Req: DeserializeOwned,
{
    Ok(bitcode::deserialize(&msg.payload)?)
}

/// Response encoder for endpoints answering `bool`: `true` acks, `false` nacks.
pub fn bool_ack_response(_ctx: &Context, response: bool) -> Result<bool, BoxError> {
    Ok(response)
}

/// Publisher decoder that ignores the publish outcome.
pub fn nop_decode_response(
    _ctx: &Context,
    _msg: &Message,
    _publish_result: Option<&PublishError>,
) -> Result<(), BoxError> {
    Ok(())
}

/// Publisher decoder answering with the UUID of the published message.
pub fn uuid_decode_response(
    _ctx: &Context,
    msg: &Message,
    _publish_result: Option<&PublishError>,
) -> Result<String, BoxError> {
    Ok(msg.uuid.clone())
}
