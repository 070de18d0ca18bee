#![forbid(unsafe_code)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sfs_block::FileByteDevice;
use sfs_core::Volume;
use sfs_journal::{JournalBlock, JournalStream, JOURNAL_COMPAT_NAMES, JOURNAL_INCOMPAT_NAMES};
use sfs_ondisk::{FEATURE_COMPAT_NAMES, FEATURE_INCOMPAT_NAMES, FEATURE_RO_COMPAT_NAMES};
use sfs_types::InodeNumber;
use std::io::Write;
use std::path::PathBuf;

// ── CLI definition ──────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "sfs", about = "SpelunkFS — read-only ext4 image explorer")]
struct Cli {
    /// Path to the ext4 filesystem image.
    #[arg(short = 'f', long = "filepath")]
    filepath: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dump the superblock, feature flags, and block group descriptors.
    Inspect {
        /// Output in JSON format.
        #[arg(long)]
        json: bool,
    },
    /// Walk the directory tree and print every entry.
    Walk {
        /// Inode to start from (defaults to the root directory).
        #[arg(long)]
        start: Option<u32>,
    },
    /// Stream one file's contents to stdout.
    Cat {
        /// Absolute path of the file within the image.
        path: Option<String>,
        /// Read by inode number instead of path.
        #[arg(long, conflicts_with = "path")]
        inode: Option<u32>,
    },
    /// Print the JBD2 journal's blocks in order.
    Journal,
}

// ── Serializable outputs ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct InspectOutput {
    volume_name: String,
    block_size: u32,
    inodes_count: u32,
    blocks_count: u64,
    free_blocks_count: u64,
    free_inodes_count: u32,
    block_groups: u64,
    inode_size: u16,
    is_64bit: bool,
    cleanly_unmounted: bool,
    mkfs_time: u32,
    journal_inode: u32,
    features_compat: Vec<&'static str>,
    features_ro_compat: Vec<&'static str>,
    features_incompat: Vec<&'static str>,
    groups: Vec<GroupOutput>,
}

#[derive(Debug, Serialize)]
struct GroupOutput {
    group: usize,
    block_bitmap: u64,
    inode_bitmap: u64,
    inode_table: u64,
    free_blocks: u32,
    free_inodes: u32,
    checksum: u16,
}

// ── Main ────────────────────────────────────────────────────────────────────

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let dev = FileByteDevice::open(&cli.filepath)
        .with_context(|| format!("failed to open {}", cli.filepath.display()))?;
    let vol = Volume::open(dev)
        .with_context(|| format!("failed to parse {}", cli.filepath.display()))?;

    match cli.command {
        Command::Inspect { json } => inspect(&vol, json),
        Command::Walk { start } => walk(&vol, start),
        Command::Cat { path, inode } => cat(&vol, path.as_deref(), inode),
        Command::Journal => journal(&vol),
    }
}

// ── Subcommands ─────────────────────────────────────────────────────────────

fn inspect(vol: &Volume<FileByteDevice>, json: bool) -> Result<()> {
    let sb = vol.superblock();

    let output = InspectOutput {
        volume_name: sb.volume_name.clone(),
        block_size: sb.block_size,
        inodes_count: sb.inodes_count,
        blocks_count: sb.blocks_count,
        free_blocks_count: sb.free_blocks_count,
        free_inodes_count: sb.free_inodes_count,
        block_groups: sb.block_group_count(),
        inode_size: sb.inode_size,
        is_64bit: sb.is_64bit(),
        cleanly_unmounted: sb.cleanly_unmounted(),
        mkfs_time: sb.mkfs_time,
        journal_inode: sb.journal_inum,
        features_compat: set_features(FEATURE_COMPAT_NAMES, sb.feature_compat),
        features_ro_compat: set_features(FEATURE_RO_COMPAT_NAMES, sb.feature_ro_compat),
        features_incompat: set_features(FEATURE_INCOMPAT_NAMES, sb.feature_incompat),
        groups: vol
            .groups()
            .iter()
            .enumerate()
            .map(|(idx, desc)| GroupOutput {
                group: idx,
                block_bitmap: desc.block_bitmap_block(sb.is_64bit()).0,
                inode_bitmap: desc.inode_bitmap_block(sb.is_64bit()).0,
                inode_table: desc.inode_table_block(sb.is_64bit()).0,
                free_blocks: desc.free_blocks_count(sb.is_64bit()),
                free_inodes: desc.free_inodes_count(sb.is_64bit()),
                checksum: desc.checksum,
            })
            .collect(),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("serialize output")?
        );
        return Ok(());
    }

    print_inspect(&output);
    Ok(())
}

fn print_inspect(output: &InspectOutput) {
    println!("Superblock");
    println!("  volume name:   {}", output.volume_name);
    println!("  block size:    {}", output.block_size);
    println!("  blocks:        {}", output.blocks_count);
    println!("  inodes:        {}", output.inodes_count);
    println!("  free blocks:   {}", output.free_blocks_count);
    println!("  free inodes:   {}", output.free_inodes_count);
    println!("  block groups:  {}", output.block_groups);
    println!("  inode size:    {}", output.inode_size);
    println!("  64-bit:        {}", output.is_64bit);
    println!("  clean:         {}", output.cleanly_unmounted);
    println!("  mkfs time:     {}", output.mkfs_time);
    println!("  journal inode: {}", output.journal_inode);
    println!();
    println!("Features (compatible):    {}", output.features_compat.join(" "));
    println!("Features (ro-compatible): {}", output.features_ro_compat.join(" "));
    println!("Features (incompatible):  {}", output.features_incompat.join(" "));
    println!();
    for group in &output.groups {
        println!(
            "group {}: block_bitmap={} inode_bitmap={} inode_table={} free_blocks={} free_inodes={} checksum={:#06x}",
            group.group,
            group.block_bitmap,
            group.inode_bitmap,
            group.inode_table,
            group.free_blocks,
            group.free_inodes,
            group.checksum
        );
    }
}

fn set_features(table: &[(&'static str, u32)], bits: u32) -> Vec<&'static str> {
    table
        .iter()
        .filter(|(_, bit)| (bits & *bit) != 0)
        .map(|(name, _)| *name)
        .collect()
}

fn walk(vol: &Volume<FileByteDevice>, start: Option<u32>) -> Result<()> {
    let root = start.map_or(InodeNumber::ROOT, InodeNumber);
    let mut walk = vol.walk(root)?;
    while let Some((path, entry)) = walk.next_entry()? {
        let file_type = sfs_core::typed_file_type(&entry)?;
        println!("{path}: inode=({}) type=[{file_type}]", entry.inode);
    }
    Ok(())
}

fn cat(vol: &Volume<FileByteDevice>, path: Option<&str>, inode: Option<u32>) -> Result<()> {
    let inode = match (path, inode) {
        (Some(path), None) => vol
            .resolve_path(path)
            .with_context(|| format!("cannot resolve {path}"))?,
        (None, Some(number)) => vol.inode(InodeNumber(number))?,
        _ => bail!("cat needs a path or --inode"),
    };

    let mut reader = inode.reader();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    std::io::copy(&mut reader, &mut out).context("stream file contents")?;
    out.flush()?;
    Ok(())
}

fn journal(vol: &Volume<FileByteDevice>) -> Result<()> {
    let inode = vol.journal_inode().context("locate journal inode")?;
    let mut stream = JournalStream::new(inode.reader()).context("parse journal superblock")?;

    let sb = stream.superblock();
    println!("Journal superblock");
    println!("  block size: {}", sb.block_size);
    println!("  max len:    {}", sb.max_len);
    println!("  first:      {}", sb.first);
    println!("  sequence:   {}", sb.sequence);
    println!(
        "  compat:     {}",
        set_features(JOURNAL_COMPAT_NAMES, sb.feature_compat).join(" ")
    );
    println!(
        "  incompat:   {}",
        set_features(JOURNAL_INCOMPAT_NAMES, sb.feature_incompat).join(" ")
    );
    println!();

    while let Some(block) = stream.next_block()? {
        println!("{block}");
        if let JournalBlock::Descriptor(desc) = &block {
            for (idx, tag) in desc.tags.iter().enumerate() {
                println!("  tag({idx}): {tag}");
            }
        }
    }
    Ok(())
}
