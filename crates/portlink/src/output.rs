use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use portlink_frame::{Acknowledgement, Outcome, ReceiverStats, PORT_COUNT};
use portlink_transport::PortSummary;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PortsOutput<'a> {
    event: &'static str,
    link: &'a str,
    ports: [u8; PORT_COUNT],
    applied_total: usize,
    timestamp: String,
}

/// Port registers after an applied frame.
pub fn print_ports(ports: [u8; PORT_COUNT], link: &str, applied_total: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PortsOutput {
                event: "frame-applied",
                link,
                ports,
                applied_total,
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["P0", "P1", "P2", "P3", "LINK", "APPLIED"]);
            let mut row: Vec<String> = ports.iter().map(|b| hex(*b)).collect();
            row.push(link.to_string());
            row.push(applied_total.to_string());
            table.add_row(row);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "ports={} link={} applied={}",
                hex_list(&ports),
                link,
                applied_total
            );
        }
        OutputFormat::Raw => print_raw(&ports),
    }
}

#[derive(Serialize)]
struct AckOutput {
    event: &'static str,
    payload: [u8; PORT_COUNT],
    attempts: u32,
}

pub fn print_ack(ack: &Acknowledgement, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&AckOutput {
            event: "frame-acknowledged",
            payload: ack.frame.payload,
            attempts: ack.attempts,
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!(
                "acknowledged payload={} attempts={}",
                hex_list(&ack.frame.payload),
                ack.attempts
            );
        }
        OutputFormat::Raw => print_raw(&ack.frame.payload),
    }
}

/// One decoded byte, for `decode`.
#[derive(Debug, Serialize)]
pub struct TraceEvent {
    pub offset: usize,
    pub byte: u8,
    pub outcome: String,
    pub echo: Option<u8>,
}

#[derive(Serialize)]
struct TraceOutput<'a> {
    events: &'a [TraceEvent],
    echoes: Vec<u8>,
    ports: [u8; PORT_COUNT],
    frames_applied: u64,
    frames_rejected: u64,
    noise_bytes: u64,
}

pub fn print_trace(
    events: &[TraceEvent],
    ports: [u8; PORT_COUNT],
    stats: &ReceiverStats,
    format: OutputFormat,
) {
    let echoes: Vec<u8> = events.iter().filter_map(|e| e.echo).collect();
    match format {
        OutputFormat::Json => print_json(&TraceOutput {
            events,
            echoes,
            ports,
            frames_applied: stats.frames_applied,
            frames_rejected: stats.frames_rejected,
            noise_bytes: stats.noise_bytes,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["OFFSET", "BYTE", "OUTCOME", "ECHO"]);
            for event in events {
                table.add_row(vec![
                    event.offset.to_string(),
                    hex(event.byte),
                    event.outcome.clone(),
                    event.echo.map(hex).unwrap_or_default(),
                ]);
            }
            println!("{table}");
            println!("ports={}", hex_list(&ports));
        }
        OutputFormat::Pretty => {
            for event in events {
                match event.echo {
                    Some(echo) => println!(
                        "{:>4}  {}  {}  echo={}",
                        event.offset,
                        hex(event.byte),
                        event.outcome,
                        hex(echo)
                    ),
                    None => println!("{:>4}  {}  {}", event.offset, hex(event.byte), event.outcome),
                }
            }
            println!(
                "ports={} applied={} rejected={} noise={}",
                hex_list(&ports),
                stats.frames_applied,
                stats.frames_rejected,
                stats.noise_bytes
            );
        }
        OutputFormat::Raw => print_raw(&echoes),
    }
}

#[derive(Serialize)]
struct PortListEntry<'a> {
    name: &'a str,
    kind: &'a str,
    description: Option<&'a str>,
}

pub fn print_port_list(ports: &[PortSummary], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let entries: Vec<PortListEntry<'_>> = ports
                .iter()
                .map(|p| PortListEntry {
                    name: &p.name,
                    kind: p.kind,
                    description: p.description.as_deref(),
                })
                .collect();
            print_json(&entries);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "KIND", "DESCRIPTION"]);
            for p in ports {
                table.add_row(vec![
                    p.name.clone(),
                    p.kind.to_string(),
                    p.description.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for p in ports {
                println!("{}", p.name);
            }
        }
    }
}

pub fn outcome_label(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Ignored => "ignored".to_string(),
        Outcome::Started => "start".to_string(),
        Outcome::Staged { index } => format!("payload[{index}]"),
        Outcome::Applied(_) => "applied".to_string(),
        Outcome::Rejected { terminator } => format!("rejected (terminator {})", hex(*terminator)),
        Outcome::Desync => "desync".to_string(),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn hex(byte: u8) -> String {
    format!("0x{byte:02X}")
}

fn hex_list(bytes: &[u8]) -> String {
    bytes.iter().map(|b| hex(*b)).collect::<Vec<_>>().join(",")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use portlink_frame::Frame;

    #[test]
    fn outcome_labels() {
        assert_eq!(outcome_label(&Outcome::Staged { index: 2 }), "payload[2]");
        assert_eq!(
            outcome_label(&Outcome::Rejected { terminator: 0 }),
            "rejected (terminator 0x00)"
        );
        assert_eq!(
            outcome_label(&Outcome::Applied(Frame::new([0; 4]))),
            "applied"
        );
    }

    #[test]
    fn hex_formatting() {
        assert_eq!(hex_list(&[0xAA, 0x01]), "0xAA,0x01");
    }
}
