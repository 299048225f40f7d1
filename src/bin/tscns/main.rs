use anyhow::Context as _;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::ffi::CString;
use tracing::{debug, trace_span};
use tscns::cns::{self, personal};
use tscns::transport::Pcsc;
use tscns::util;

type Result<T> = anyhow::Result<T>;

#[derive(Debug, Parser)]
#[command(name = "tscns", about = "Reads the personal-data file off a TS-CNS card")]
struct Opt {
    /// Zero-indexed reader number, if you have multiple.
    #[arg(short = 'r', long = "reader-num", default_value_t = 0)]
    reader_num: usize,

    /// Every time you -v, it gets noisier (up to -vvv).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbosity: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List all connected readers.
    Readers,
    /// Select, read and decode the personal-data file.
    Read {
        /// Hex-dump the raw record before the decoded fields.
        #[arg(long)]
        dump: bool,
    },
}

impl Command {
    fn exec(&self, opt: &Opt) -> Result<()> {
        match self {
            Self::Readers => cmd_readers(opt),
            Self::Read { dump } => cmd_read(opt, *dump),
        }
    }
}

fn list_readers() -> Result<(pcsc::Context, Vec<CString>)> {
    let span = trace_span!("list_readers");
    let _enter = span.enter();

    debug!("Connecting to PCSC...");
    let ctx = pcsc::Context::establish(pcsc::Scope::User)
        .context("couldn't establish a PCSC context; is pcscd running?")?;

    debug!("Listing readers...");
    let mut buf = vec![0; ctx.list_readers_len()?];
    let readers = ctx.list_readers(&mut buf)?.map(|s| s.into()).collect();
    Ok((ctx, readers))
}

fn cmd_readers(_opt: &Opt) -> Result<()> {
    let (_, readers) = list_readers()?;
    if readers.is_empty() {
        println!("{}", "no readers connected".yellow());
    }
    for (i, reader) in readers.iter().enumerate() {
        println!("{:3}  {:}", i, reader.to_string_lossy());
    }
    Ok(())
}

fn find_card(opt: &Opt) -> Result<pcsc::Card> {
    let (ctx, readers) = list_readers()?;
    let cname = readers
        .get(opt.reader_num)
        .ok_or(pcsc::Error::ReaderUnavailable)
        .with_context(|| format!("no reader number {}", opt.reader_num))?;

    debug!(name = %cname.to_string_lossy(), "Connecting to reader...");
    let card = ctx
        .connect(cname, pcsc::ShareMode::Shared, pcsc::Protocols::ANY)
        .context("couldn't connect to the card; is one inserted?")?;

    // Log the raw ATR, the easiest way to tell cards apart when a read
    // fails on the wrong card profile.
    let mut buf = vec![0; card.get_attribute_len(pcsc::Attribute::AtrString)?];
    let atr = card.get_attribute(pcsc::Attribute::AtrString, &mut buf)?;
    debug!(atr = %util::to_hex(atr), "ATR");

    Ok(card)
}

fn cmd_read(opt: &Opt, dump: bool) -> Result<()> {
    let card = find_card(opt)?;
    // The transport owns the card handle; it disconnects when `transport`
    // goes out of scope, whichever way this function exits.
    let mut transport = Pcsc::new(card, opt.verbosity >= 3);

    cns::select_personal_file(&mut transport)?;
    let record = cns::read_personal_file(&mut transport)?;

    if dump {
        print!("{}", util::dump(&record));
        println!();
    }

    let data = personal::decode(&record)?;
    for (field, value) in data.fields() {
        let label = format!("{:>20}", field.label());
        match value {
            Some(value) => println!("{}: {}", label.cyan(), value.bold()),
            None => println!("{}: {}", label.cyan(), "(not present)".dimmed()),
        }
    }
    Ok(())
}

fn init_logging(opt: &Opt) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(match opt.verbosity {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            })
            .expect("hardcoded filter must parse"),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("couldn't set a global logger: {}", e))?;
    Ok(())
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    init_logging(&opt)?;
    opt.cmd.exec(&opt)
}
