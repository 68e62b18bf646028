use anyhow::Result;
use clap::Parser;
use diskjoin::cli::{Cli, Command, JoinArgs, PartitionArgs};
use diskjoin::codec::{Format, FmtParams};
use diskjoin::config::{JoinOptions, PartitionOptions};
use diskjoin::error::DiskJoinError;
use diskjoin::init_tracing_once;

fn main() {
    init_tracing_once();
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Partition(args) => run_partition(args),
        Command::Join(args) => run_join_cmd(args),
    };

    if let Err(e) = result {
        match e.downcast_ref::<DiskJoinError>() {
            Some(kind) => eprintln!("{}: {kind}", kind.kind()),
            None => eprintln!("error: {e:#}"),
        }
        std::process::exit(1);
    }
}

fn run_partition(args: PartitionArgs) -> Result<()> {
    let format = if args.format == "auto" { None } else { Some(Format::parse(&args.format)?) };
    let fmtparams = FmtParams::parse_pairs(&args.fmtparams)?;

    let mut opts = PartitionOptions::new(args.source, args.dest, args.num_shards)
        .with_fmtparams(fmtparams)
        .with_progress(args.progress)
        .with_read_buffer_bytes(args.read_buffer_bytes)
        .with_sort_workers(args.workers.unwrap_or_else(rayon::current_num_threads));

    if let Some(format) = format {
        opts = opts.with_format(format);
    }
    if let Some(names) = args.fieldnames {
        opts = opts.with_field_names(names);
    }
    opts = match (args.keyindex, args.keyname) {
        (Some(i), _) => opts.with_key_index(i),
        (None, Some(name)) => opts.with_key_name(name),
        (None, None) => opts,
    };

    let skipped = opts.run()?;
    if skipped > 0 {
        tracing::warn!("{skipped} record(s) skipped for missing join keys");
    }
    Ok(())
}

fn run_join_cmd(args: JoinArgs) -> Result<()> {
    let format = Format::parse(&args.format)?;
    let fmtparams = FmtParams::parse_pairs(&args.fmtparams)?;

    let mut opts = JoinOptions::new(args.dest, args.sources)
        .with_format(format)
        .with_fmtparams(fmtparams)
        .with_subs(args.subs)
        .with_progress(args.progress);
    if let Some(select) = args.select {
        opts = opts.with_select(select);
    }
    opts.run()
}
