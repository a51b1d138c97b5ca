//! Graph description construction.

use tracing::debug;
use url::Url;

use pistreamer_ipc::AudioConfig;

use crate::error::AudioError;
use crate::AudioResult;

/// Sample rate the capture is converted to.
pub const SAMPLE_RATE: u32 = 48000;

/// Constant bitrate of the Opus encoder, in bit/s.
pub const OPUS_BITRATE: u32 = 128_000;

/// Name of the instrumentation element placed after the encoder.
pub const TAP_NAME: &str = "bitrate_tap";

/// Network endpoint of the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

/// Split a `scheme://host:port` address into host and port.
///
/// The scheme is informative only; the sink is always datagram based. A
/// bare `host:port` is accepted as well.
pub fn parse_destination(address: &str) -> AudioResult<Destination> {
    let invalid = |reason: &str| AudioError::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    };

    let url = if address.contains("://") {
        Url::parse(address)
    } else {
        Url::parse(&format!("udp://{address}"))
    }
    .map_err(|e| invalid(&e.to_string()))?;

    if url.scheme() != "udp" {
        debug!(scheme = url.scheme(), "Non-udp scheme, sending datagrams anyway");
    }

    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| invalid("missing host"))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let port = url.port().ok_or_else(|| invalid("missing port"))?;

    Ok(Destination { host, port })
}

/// Encoder element for an encoder name.
fn encoder_element(encoder: &str) -> AudioResult<String> {
    match encoder {
        "opus" => Ok(format!(
            "opusenc bitrate={OPUS_BITRATE} bitrate-type=cbr"
        )),
        other => Err(AudioError::UnsupportedEncoder(other.to_string())),
    }
}

/// Build the textual graph description for `config`.
///
/// capture ! convert ! caps ! encode ! tap ! mux ! sink
pub fn build_description(config: &AudioConfig) -> AudioResult<String> {
    let encoder = encoder_element(&config.encoder)?;
    let destination = parse_destination(&config.address)?;

    Ok([
        format!("alsasrc device=\"{}\"", config.device),
        "audioconvert".to_string(),
        "audioresample".to_string(),
        format!(
            "capsfilter caps=\"audio/x-raw,format={},rate={},channels={}\"",
            config.format, SAMPLE_RATE, config.channels
        ),
        encoder,
        format!("identity name={TAP_NAME} signal-handoffs=true"),
        "mpegtsmux".to_string(),
        format!(
            "udpsink host={} port={}",
            destination.host, destination.port
        ),
    ]
    .join(" ! "))
}
