use portlink_frame::{FrameReceiver, OutputPorts};

use crate::cmd::DecodeArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{outcome_label, print_trace, OutputFormat, TraceEvent};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let ports = OutputPorts::new();
    let mut receiver = FrameReceiver::new(ports.clone());

    let events: Vec<TraceEvent> = args
        .bytes
        .iter()
        .enumerate()
        .map(|(offset, &byte)| {
            let ingest = receiver.ingest(byte);
            TraceEvent {
                offset,
                byte,
                outcome: outcome_label(&ingest.outcome),
                echo: ingest.echo,
            }
        })
        .collect();

    print_trace(&events, ports.snapshot(), &receiver.stats(), format);
    Ok(SUCCESS)
}
