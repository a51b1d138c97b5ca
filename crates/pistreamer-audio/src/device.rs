//! ALSA capture device enumeration.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument, warn};

use pistreamer_ipc::probe::{capture_output, PROBE_TIMEOUT};
use pistreamer_ipc::AudioDevice;

/// `card 1: Device [USB Audio Device], device 0: USB Audio [USB Audio]`
static CARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"card\s+(\d+):\s+(\S+)\s+\[([^\]]+)\],\s+device\s+(\d+):").unwrap()
});

static BRACKETED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]+)\]").unwrap());

/// Lines after a card line searched for the device name.
const LOOKAHEAD_LINES: usize = 3;

/// Sample formats offered for audio capture.
pub fn audio_formats() -> Vec<String> {
    vec!["S16LE".to_string()]
}

/// Enumerate ALSA capture devices with `arecord -l`.
#[instrument(name = "enumerate_audio_devices")]
pub fn enumerate_audio_devices() -> Vec<AudioDevice> {
    let devices = match capture_output("arecord", &["-l"], PROBE_TIMEOUT) {
        Ok(Some(output)) => parse_device_list(&String::from_utf8_lossy(&output.stdout)),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("Failed to run arecord: {}", e);
            Vec::new()
        }
    };

    debug!(count = devices.len(), "Enumerated audio devices");
    devices
}

/// Interpret `arecord -l` output.
///
/// The device name is the bracketed text following `device N:` on the card
/// line, or failing that the first bracketed text in the next few lines.
pub fn parse_device_list(output: &str) -> Vec<AudioDevice> {
    let lines: Vec<&str> = output.lines().collect();
    let mut devices = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let Some(caps) = CARD_RE.captures(line) else {
            continue;
        };
        let (Some(whole), Some(card), Some(card_id), Some(device)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(4))
        else {
            continue;
        };

        let device_name = BRACKETED_RE
            .captures(&line[whole.end()..])
            .or_else(|| {
                lines
                    .iter()
                    .skip(i + 1)
                    .take(LOOKAHEAD_LINES)
                    .find_map(|next| BRACKETED_RE.captures(next))
            })
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .unwrap_or("Unknown");

        let hw = format!("hw:{},{}", card.as_str(), device.as_str());
        devices.push(AudioDevice {
            label: format!("{}, {} ({})", card_id.as_str(), device_name, hw),
            hw,
        });
    }

    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARECORD: &str = "\
**** List of CAPTURE Hardware Devices ****
card 0: PCH [HDA Intel PCH], device 0: ALC3246 Analog [ALC3246 Analog]
  Subdevices: 1/1
  Subdevice #0: subdevice #0
card 2: Device [USB Audio Device], device 0: USB Audio [USB Audio]
  Subdevices: 1/1
  Subdevice #0: subdevice #0
";

    #[test]
    fn test_parse_device_list() {
        let devices = parse_device_list(ARECORD);

        assert_eq!(
            devices,
            vec![
                AudioDevice {
                    label: "PCH, ALC3246 Analog (hw:0,0)".to_string(),
                    hw: "hw:0,0".to_string(),
                },
                AudioDevice {
                    label: "Device, USB Audio (hw:2,0)".to_string(),
                    hw: "hw:2,0".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_device_name_on_following_line() {
        let output = "card 1: Cam [Webcam], device 3:\n  [Webcam Mic]\n";

        let devices = parse_device_list(output);

        assert_eq!(devices[0].label, "Cam, Webcam Mic (hw:1,3)");
    }

    #[test]
    fn test_missing_device_name() {
        let devices = parse_device_list("card 4: X [Y], device 1:\n  Subdevices: 1/1\n");
        assert_eq!(devices[0].label, "X, Unknown (hw:4,1)");
    }

    #[test]
    fn test_no_devices() {
        assert!(parse_device_list("arecord: device_list:274: no soundcards found...\n").is_empty());
    }

    #[test]
    fn test_audio_formats() {
        assert_eq!(audio_formats(), vec!["S16LE"]);
    }
}
