//! Dead-letter error encoder.
//!
//! By default a failed message is left unacknowledged and the broker decides
//! whether and how often to redeliver it. Installing [`dead_letter`] as the
//! error encoder moves failed messages to a separate topic instead.

use tracing::{debug, warn};

use crate::bus::{Message, Publisher};
use crate::context::Context;
use crate::error::TransportError;

/// Topic conventionally used for failed messages.
pub const DEFAULT_DEAD_LETTER_TOPIC: &str = "dlq";

/// Metadata key holding the error that sent a message to the dead-letter topic.
pub const REASON_KEY: &str = "dead_letter.reason";

/// Metadata key holding the UUID of the original message.
pub const ORIGINAL_UUID_KEY: &str = "dead_letter.original_uuid";

/// Error encoder that republishes failed messages to `topic`.
///
/// The copy keeps the payload and metadata of the original and gains
/// [`REASON_KEY`] and [`ORIGINAL_UUID_KEY`]. Once the copy is published the
/// original is acked, so the broker stops redelivering it. If the publish
/// fails, the original stays unacknowledged.
///
/// Acknowledge failures are skipped: the broker already refused a
/// disposition for that message, and acking it again would not help.
///
/// ## Example
///
/// ```ignore
/// let subscriber = SubscriberTransport::new(endpoint, decode, encode)
///     .error_encoder(dead_letter(bus.clone(), DEFAULT_DEAD_LETTER_TOPIC));
/// ```
pub fn dead_letter<P>(
    publisher: P,
    topic: impl Into<String>,
) -> impl Fn(&Context, &Message, &TransportError) + Send + Sync + 'static
where
    P: Publisher + 'static,
{
    let topic = topic.into();
    move |_ctx: &Context, msg: &Message, err: &TransportError| {
        if matches!(err, TransportError::Acknowledge { .. }) {
            return;
        }

        let mut letter = Message::new(msg.payload.clone());
        letter.metadata = msg.metadata.clone();
        letter.metadata.set(REASON_KEY, err.to_string());
        letter.metadata.set(ORIGINAL_UUID_KEY, msg.uuid.clone());

        if let Err(publish_err) = publisher.publish(&topic, &letter) {
            warn!(
                uuid = %msg.uuid,
                topic = %topic,
                error = %publish_err,
                "dead-letter publish failed, message left unacknowledged"
            );
            return;
        }

        if msg.ack() {
            debug!(uuid = %msg.uuid, topic = %topic, "message dead-lettered");
        } else {
            warn!(uuid = %msg.uuid, topic = %topic, "dead-lettered message could not be acked");
        }
    }
}
