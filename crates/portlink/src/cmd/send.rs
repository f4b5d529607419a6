use portlink_frame::{Frame, FrameCommander, FrameConfig, PAYLOAD_LEN};

use crate::cmd::{connect_link, parse_duration, SendArgs};
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_ack, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let config = FrameConfig {
        read_timeout: Some(parse_duration(&args.timeout)?),
        attempts: args.attempts,
        retry_backoff: parse_duration(&args.backoff)?,
        ..FrameConfig::default()
    };
    let frame = frame_from_args(&args.payload)?;

    let link = connect_link(&args.link)?;
    let mut commander = FrameCommander::with_config_link(link, config)
        .map_err(|err| frame_error("link setup failed", err))?;

    tracing::debug!(payload = ?frame.payload, "applying frame");
    let ack = commander
        .apply_fresh(&frame)
        .map_err(|err| frame_error("apply failed", err))?;

    print_ack(&ack, format);
    Ok(SUCCESS)
}

fn frame_from_args(payload: &[u8]) -> CliResult<Frame> {
    let payload: [u8; PAYLOAD_LEN] = payload.try_into().map_err(|_| {
        CliError::new(
            USAGE,
            format!("expected {PAYLOAD_LEN} payload bytes, got {}", payload.len()),
        )
    })?;
    Ok(Frame::new(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_from_exactly_four_bytes() {
        let frame = frame_from_args(&[1, 2, 3, 4]).unwrap();
        assert_eq!(frame.payload, [1, 2, 3, 4]);
    }

    #[test]
    fn wrong_length_is_usage_error() {
        let err = frame_from_args(&[1, 2, 3]).unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
