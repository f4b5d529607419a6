use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use portlink_frame::{FrameError, LinkResponder, OutputPorts, Outcome};
use portlink_transport::{LinkStream, SerialConfig, SerialLink, UnixDomainSocket};

use crate::cmd::{install_ctrlc_handler, ServeArgs};
use crate::exit::{frame_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_ports, OutputFormat};

/// How often a blocked read wakes up to check for Ctrl-C.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

enum LinkEnd {
    /// The host closed the link; wait for the next one.
    HostGone,
    /// `--count` reached or Ctrl-C.
    Done,
}

struct Session<'a> {
    ports: OutputPorts,
    running: &'a AtomicBool,
    count: Option<usize>,
    applied: usize,
    format: OutputFormat,
}

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut session = Session {
        ports: OutputPorts::new(),
        running: &running,
        count: args.count,
        applied: 0,
        format,
    };

    if args.link.serial {
        let config = SerialConfig {
            baud_rate: args.link.baud,
            ..SerialConfig::default()
        };
        let link = SerialLink::open(&args.link.path, &config)
            .map_err(|err| transport_error("open failed", err))?;
        session.serve(link, &args.link.path)?;
        return Ok(SUCCESS);
    }

    let listener =
        UnixDomainSocket::bind(&args.link.path).map_err(|err| transport_error("bind failed", err))?;

    while running.load(Ordering::SeqCst) {
        let link = listener
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        if let LinkEnd::Done = session.serve(link, &args.link.path)? {
            break;
        }
        tracing::info!("host disconnected, waiting for the next link");
    }

    Ok(SUCCESS)
}

impl Session<'_> {
    fn serve(&mut self, mut link: LinkStream, name: &str) -> CliResult<LinkEnd> {
        link.set_read_timeout(Some(POLL_INTERVAL))
            .map_err(|err| transport_error("link setup failed", err))?;
        tracing::info!(link = name, transport = link.transport_name(), "serving link");

        let mut responder = LinkResponder::new(link, self.ports.clone());
        let mut applied_now = Vec::new();

        while self.running.load(Ordering::SeqCst) {
            let polled = responder.poll(|ingest| match ingest.outcome {
                Outcome::Applied(frame) => applied_now.push(frame),
                Outcome::Rejected { terminator } => {
                    tracing::info!(terminator, "frame rejected: bad terminator")
                }
                _ => {}
            });

            // Frames applied before the host vanished still count.
            for frame in applied_now.drain(..) {
                self.applied += 1;
                print_ports(frame.payload, name, self.applied, self.format);
                if self.count.is_some_and(|count| self.applied >= count) {
                    return Ok(LinkEnd::Done);
                }
            }

            match polled {
                Ok(_) => {}
                Err(FrameError::ConnectionClosed) => return Ok(LinkEnd::HostGone),
                Err(FrameError::Io(err))
                    if matches!(
                        err.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) => {}
                Err(FrameError::Io(err)) if host_left(&err) => return Ok(LinkEnd::HostGone),
                Err(err) => return Err(frame_error("link failed", err)),
            }
        }

        Ok(LinkEnd::Done)
    }
}

fn host_left(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
    )
}

