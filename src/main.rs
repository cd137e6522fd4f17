use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use tspsimux::pipeline::{pump, CancellationToken, ConsumerList, PacketConsumer, PacketSource, Pipe, ReadOutcome};
use tspsimux::provider::SequentialPidProvider;
use tspsimux::stages::joined_source::{JoinedTsStream, NeverRefill};
use tspsimux::stages::pid_map::PidMap;
use tspsimux::stages::{AutoPidChanger, CcCorrector, MptsToSpts, PidChanger, TableRepeater};
use tspsimux::ts::TSPacket;

#[derive(Parser)]
#[command(name = "tspsimux", about = "Transport Stream packet pipeline tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pass packets through a continuity-counter corrector only.
    Identity(IoArgs),
    /// Remap one or more PIDs, rewriting PAT/PMT references in place.
    Remap {
        #[command(flatten)]
        io: IoArgs,
        /// `source:destination` pairs, e.g. `0x200:0x300`.
        #[arg(long = "map", value_name = "SRC:DST")]
        map: Vec<String>,
    },
    /// Remap every referenced PID automatically, honouring an optional preset.
    AutoRemap {
        #[command(flatten)]
        io: IoArgs,
        /// JSON object of preset `source -> destination` overrides.
        #[arg(long = "preset")]
        preset: Option<String>,
    },
    /// Keep only one service out of a multi-program Transport Stream.
    Spts {
        #[command(flatten)]
        io: IoArgs,
        #[arg(long)]
        service_id: u16,
    },
    /// Re-inject the PSI table on `pid` every `period` packets.
    RepeatTable {
        #[command(flatten)]
        io: IoArgs,
        #[arg(long)]
        pid: u16,
        #[arg(long)]
        period: usize,
    },
    /// Concatenate two or more Transport Stream files through a CC corrector.
    Join {
        #[arg(long = "input", value_name = "PATH", required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
        #[arg(long = "output")]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct IoArgs {
    #[arg(long = "input")]
    input: Option<PathBuf>,
    #[arg(long = "output")]
    output: Option<PathBuf>,
}

fn open_input(path: &Option<PathBuf>) -> Result<Box<dyn Read>> {
    match path {
        Some(p) => Ok(Box::new(BufReader::new(
            File::open(p).with_context(|| format!("opening {}", p.display()))?,
        ))),
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn open_output(path: &Option<PathBuf>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) => Ok(Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("creating {}", p.display()))?,
        ))),
        None => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

/// Reads fixed-size 188-byte Transport Stream packets off a byte stream.
struct ReaderSource<R> {
    reader: R,
}

impl<R: Read> PacketSource for ReaderSource<R> {
    fn read_packet(&mut self, out: &mut Option<TSPacket>) -> tspsimux::pipeline::Result<ReadOutcome> {
        let mut buf = [0u8; tspsimux::ts::TS_PACKET_LENGTH];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => match TSPacket::parse(&buf) {
                Ok(packet) => {
                    *out = Some(packet);
                    Ok(ReadOutcome::Success)
                }
                Err(e) => Err(tspsimux::pipeline::Error::MalformedPacket(e)),
            },
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(ReadOutcome::NoMorePacket),
            Err(e) => Err(tspsimux::pipeline::Error::MalformedPacket(e.into())),
        }
    }
}

/// Writes packets to a byte stream. The flush sentinel is a no-op: the
/// underlying writer is dropped (and flushed) once the pump returns.
struct WriterConsumer<W> {
    writer: W,
}

impl<W: Write> PacketConsumer for WriterConsumer<W> {
    fn send_packet(&mut self, packet: Option<&TSPacket>) -> tspsimux::pipeline::Result<()> {
        if let Some(packet) = packet {
            self.writer
                .write_all(packet.as_bytes())
                .map_err(|e| tspsimux::pipeline::Error::MalformedPacket(e.into()))?;
        }
        Ok(())
    }
}

/// Adapts a single [`PacketConsumer`] (the head of one configured pipe
/// chain) so it can sit in a [`ConsumerList`] as the pump's one downstream.
struct AsConsumerListEntry<'a>(&'a mut dyn PacketConsumer);

impl PacketConsumer for AsConsumerListEntry<'_> {
    fn send_packet(&mut self, packet: Option<&TSPacket>) -> tspsimux::pipeline::Result<()> {
        self.0.send_packet(packet)
    }
}

/// Reads `input` through `stage`, which has already been wired to its
/// downstream writer via `add_consumer`, to completion.
fn drive(input: &Option<PathBuf>, stage: &mut dyn PacketConsumer) -> Result<()> {
    let mut source = ReaderSource {
        reader: open_input(input)?,
    };
    let mut list = ConsumerList::new();
    list.add(Box::new(AsConsumerListEntry(stage)));
    let cancel = CancellationToken::new();
    pump(&mut source, &mut list, &cancel)?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Identity(io) => {
            let output = open_output(&io.output)?;
            let mut cc = CcCorrector::new();
            cc.add_consumer(Box::new(WriterConsumer { writer: output }));
            drive(&io.input, &mut cc)?;
        }
        Command::Remap { io, map } => {
            let output = open_output(&io.output)?;
            let entries = parse_map_args(&map)?;
            let pid_map = PidMap::build(entries)?;
            let mut changer = PidChanger::new(pid_map);
            changer.add_consumer(Box::new(WriterConsumer { writer: output }));
            drive(&io.input, &mut changer)?;
        }
        Command::AutoRemap { io, preset } => {
            let output = open_output(&io.output)?;
            let preset_map: HashMap<u16, u16> = match preset {
                Some(json) => serde_json::from_str(&json).context("parsing --preset as JSON")?,
                None => HashMap::new(),
            };
            let mut changer = AutoPidChanger::new(Box::new(SequentialPidProvider::new()), preset_map);
            changer.add_consumer(Box::new(WriterConsumer { writer: output }));
            drive(&io.input, &mut changer)?;
            info!("final pid map: {:?}", changer.map());
        }
        Command::Spts { io, service_id } => {
            let output = open_output(&io.output)?;
            let mut filter = MptsToSpts::new(service_id);
            filter.add_consumer(Box::new(WriterConsumer { writer: output }));
            drive(&io.input, &mut filter)?;
        }
        Command::RepeatTable { io, pid, period } => {
            let output = open_output(&io.output)?;
            let mut repeater = TableRepeater::new(pid, period);
            repeater.add_consumer(Box::new(WriterConsumer { writer: output }));
            drive(&io.input, &mut repeater)?;
        }
        Command::Join { inputs, output } => {
            let mut sources: VecDeque<Box<dyn PacketSource + Send>> = VecDeque::new();
            for path in &inputs {
                let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
                sources.push_back(Box::new(ReaderSource {
                    reader: BufReader::new(file),
                }));
            }
            let mut joined = JoinedTsStream::new(sources, Box::new(NeverRefill));
            let mut cc = CcCorrector::new();
            cc.add_consumer(Box::new(WriterConsumer {
                writer: open_output(&output)?,
            }));

            let mut list = ConsumerList::new();
            list.add(Box::new(AsConsumerListEntry(&mut cc)));
            let cancel = CancellationToken::new();
            pump(&mut joined, &mut list, &cancel)?;
        }
    }

    Ok(())
}

fn parse_map_args(entries: &[String]) -> Result<Vec<(u16, u16)>> {
    entries
        .iter()
        .map(|entry| {
            let (src, dst) = entry
                .split_once(':')
                .with_context(|| format!("expected SRC:DST, got {}", entry))?;
            Ok((parse_pid(src)?, parse_pid(dst)?))
        })
        .collect()
}

fn parse_pid(s: &str) -> Result<u16> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u16::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse()?)
    }
}
