// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn global_args() -> Vec<Arg> {
    vec![
        Arg::new("arch")
            .long("arch")
            .value_name("ARCH")
            .global(true)
            .help("Native dpkg architecture (env: ARCH)"),
        Arg::new("chroot")
            .long("chroot")
            .value_name("PATH")
            .global(true)
            .help("Root of the user chroot (env: CHROOT)"),
        Arg::new("scratch_dir")
            .long("scratch-dir")
            .value_name("PATH")
            .global(true)
            .help("Directory holding root-status and user-status (env: TEMPDIR)"),
        Arg::new("data_dir")
            .long("data-dir")
            .value_name("PATH")
            .global(true)
            .help("Directory holding the root-status.old snapshot (env: APPDATA)"),
        Arg::new("chunk_size")
            .long("chunk-size")
            .value_name("BYTES")
            .global(true)
            .default_value("20480")
            .help("Snapshot comparison window in bytes"),
        Arg::new("batch_size")
            .long("batch-size")
            .value_name("N")
            .global(true)
            .default_value("200")
            .help("Stanzas written per batch"),
        Arg::new("verbose")
            .short('v')
            .long("verbose")
            .global(true)
            .action(ArgAction::SetTrue)
            .help("Enable debug logging"),
    ]
}

fn build_cli() -> Command {
    Command::new("status-sync")
        .version(env!("CARGO_PKG_VERSION"))
        .author("status-sync Contributors")
        .about("Overlay a user-scope dpkg status database onto the system one")
        .subcommand_required(false)
        .args(global_args())
        .subcommand(
            Command::new("sync")
                .about("Merge user-owned entries into the user status file (default)")
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Merge even if the system status is unchanged"),
                )
                .arg(
                    Arg::new("dry_run")
                        .short('n')
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Compute the merge without writing anything"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the outcome as JSON"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Report whether the system status changed since the last sync")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the result as JSON"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("status-sync.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
