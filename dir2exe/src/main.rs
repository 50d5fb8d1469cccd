use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{
    crate_authors, crate_description, crate_name, crate_version, App, AppSettings, Arg,
    ErrorKind, SubCommand,
};
use dir2exe::core::ArchiveSrc;
use dir2exe::{build_with_config, read_loader_stub, ArchiveFile, BuildConfig, OnUnreadable};

const LOADER_NAME: &str = "dir2exe-loader";

/// `dir2exe-loader` next to this executable, unless `DIR2EXE_LOADER` says
/// otherwise
fn default_loader() -> Option<PathBuf> {
    if let Some(path) = env::var_os("DIR2EXE_LOADER") {
        return Some(PathBuf::from(path));
    }
    let exe = env::current_exe().ok()?;
    Some(exe.parent()?.join(format!("{}{}", LOADER_NAME, env::consts::EXE_SUFFIX)))
}

fn list(archive_path: &str) -> anyhow::Result<()> {
    let mut archive = ArchiveFile::new(archive_path)?;
    for entry in archive.read_entries()? {
        println!(
            "{}\t{}\t{}\t{}",
            String::from_utf8_lossy(entry.path_bytes()),
            entry.offset(),
            entry.size(),
            if entry.is_executable() { "x" } else { "-" }
        );
    }
    Ok(())
}

#[allow(unknown_lints, dangerous_implicit_autorefs)] // clap 2 `crate_authors!` expansion
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let default_loader = default_loader().map(|path| path.to_string_lossy().into_owned());
    let help_loader = match &default_loader {
        Some(path) => format!("Loader stub to prepend (defaults to '{}')", path),
        None => "Loader stub to prepend".to_string(),
    };

    let mut arg_loader = Arg::with_name("loader")
        .help(&help_loader)
        .short("l")
        .long("loader")
        .takes_value(true)
        .value_name("FILE");
    if let Some(default_loader) = &default_loader {
        arg_loader = arg_loader.default_value(default_loader);
    }

    let app = App::new(crate_name!())
        .author(crate_authors!(", "))
        .about(crate_description!())
        .version(crate_version!())
        .setting(AppSettings::SubcommandsNegateReqs)
        .arg(
            Arg::with_name("directory")
                .help("Directory to pack")
                .required(true)
                .value_name("DIR"),
        )
        .arg(
            Arg::with_name("main")
                .help("Main executable, launched after extraction")
                .required(true)
                .value_name("MAIN"),
        )
        .arg(
            Arg::with_name("output")
                .help("Self-extracting executable to create")
                .required(true)
                .value_name("OUTPUT"),
        )
        .arg(arg_loader)
        .arg(
            Arg::with_name("abort-on-unreadable")
                .help("Fail instead of skipping input files that cannot be read")
                .long("abort-on-unreadable"),
        )
        .arg(
            Arg::with_name("buffer-size")
                .help("Size of the transfer buffer")
                .long("buffer-size")
                .takes_value(true)
                .value_name("BYTES")
                .validator(|value| match value.parse::<usize>() {
                    Ok(size) if size > 0 => Ok(()),
                    _ => Err(format!("'{}' is not a positive number", value)),
                }),
        )
        .subcommand(
            SubCommand::with_name("list")
                .about("List the entries of a self-extracting executable")
                .arg(
                    Arg::with_name("archive")
                        .help("Archive file")
                        .required(true)
                        .value_name("FILE"),
                ),
        );

    let matches = match app.get_matches_safe() {
        Ok(matches) => matches,
        Err(err) if matches!(err.kind, ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("{}", err.message);
            process::exit(1);
        }
    };

    if let Some(matches) = matches.subcommand_matches("list") {
        let archive = matches.value_of("archive").context("missing archive")?;
        return list(archive).with_context(|| format!("Listing {}", archive));
    }

    let (Some(directory), Some(main), Some(output)) = (
        matches.value_of("directory"),
        matches.value_of("main"),
        matches.value_of("output"),
    ) else {
        anyhow::bail!("missing arguments");
    };

    let loader = matches
        .value_of("loader")
        .context("no loader stub given and none found next to dir2exe")?;
    let stub = read_loader_stub(loader).with_context(|| format!("Reading {}", loader))?;

    let mut config = BuildConfig::default();
    if matches.is_present("abort-on-unreadable") {
        config.on_unreadable = OnUnreadable::Abort;
    }
    if let Some(size) = matches.value_of("buffer-size") {
        config.buffer_size = size.parse()?;
    }

    build_with_config(directory, main, stub, output, &config)?;
    println!("Successfully created {}", output);
    Ok(())
}
