// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn filter_arg() -> Arg {
    Arg::new("filter")
        .short('f')
        .long("filter")
        .default_value("none")
        .help("Filters, e.g. \"installed;~arch\"")
}

fn ids_arg() -> Arg {
    Arg::new("ids")
        .required(true)
        .num_args(1..)
        .help("Package ids (name;version;arch;repository)")
}

fn build_cli() -> Command {
    Command::new("pkcore")
        .version(env!("CARGO_PKG_VERSION"))
        .author("pkcore Contributors")
        .about("Package query and transaction engine")
        .subcommand_required(false)
        .arg(
            Arg::new("db_path")
                .short('d')
                .long("db-path")
                .value_name("PATH")
                .global(true)
                .env("PKCORE_DB")
                .default_value("/var/lib/pkcore/pkcore.db")
                .help("Database path"),
        )
        .arg(
            Arg::new("arch")
                .long("arch")
                .global(true)
                .env("PKCORE_ARCH")
                .help("Native architecture (defaults to the build target)"),
        )
        .arg(
            Arg::new("core_package")
                .long("core-package")
                .global(true)
                .env("PKCORE_CORE_PACKAGE")
                .help("The package manager's own package, updated before anything else"),
        )
        .subcommand(Command::new("init").about("Initialize the package database"))
        .subcommand(
            Command::new("repo-add")
                .about("Add a repository (a directory holding index.json)")
                .arg(Arg::new("name").required(true).help("Repository name"))
                .arg(Arg::new("url").required(true).help("Repository URL"))
                .arg(
                    Arg::new("priority")
                        .short('p')
                        .long("priority")
                        .default_value("0")
                        .help("Priority (higher = preferred)"),
                )
                .arg(
                    Arg::new("disabled")
                        .long("disabled")
                        .action(ArgAction::SetTrue)
                        .help("Add the repository disabled"),
                ),
        )
        .subcommand(
            Command::new("repo-list").about("List repositories").arg(
                Arg::new("all")
                    .short('a')
                    .long("all")
                    .action(ArgAction::SetTrue)
                    .help("Include disabled repositories"),
            ),
        )
        .subcommand(
            Command::new("repo-remove")
                .about("Remove a repository")
                .arg(Arg::new("name").required(true)),
        )
        .subcommand(
            Command::new("repo-enable")
                .about("Enable a repository")
                .arg(Arg::new("name").required(true)),
        )
        .subcommand(
            Command::new("repo-disable")
                .about("Disable a repository")
                .arg(Arg::new("name").required(true)),
        )
        .subcommand(
            Command::new("refresh")
                .about("Synchronize repository indexes")
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Sync even if the index has not expired"),
                ),
        )
        .subcommand(
            Command::new("get-packages")
                .about("List packages")
                .arg(filter_arg()),
        )
        .subcommand(
            Command::new("search-name")
                .about("Search package names")
                .arg(Arg::new("terms").required(true).num_args(1..))
                .arg(filter_arg()),
        )
        .subcommand(
            Command::new("search-details")
                .about("Search package names and descriptions")
                .arg(Arg::new("terms").required(true).num_args(1..))
                .arg(filter_arg()),
        )
        .subcommand(
            Command::new("resolve")
                .about("Look up packages by exact name")
                .arg(Arg::new("names").required(true).num_args(1..))
                .arg(filter_arg()),
        )
        .subcommand(
            Command::new("get-updates")
                .about("List available updates")
                .arg(filter_arg()),
        )
        .subcommand(
            Command::new("install")
                .about("Install packages by id")
                .arg(ids_arg()),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove packages by id")
                .arg(ids_arg())
                .arg(
                    Arg::new("allow_deps")
                        .long("allow-deps")
                        .action(ArgAction::SetTrue)
                        .help("Also remove packages that depend on them"),
                )
                .arg(
                    Arg::new("autoremove")
                        .long("autoremove")
                        .action(ArgAction::SetTrue)
                        .help("Also remove automatically installed dependencies left unused"),
                ),
        )
        .subcommand(
            Command::new("update")
                .about("Update packages to the newest repository version")
                .arg(ids_arg()),
        )
        .subcommand(Command::new("history").about("Show changeset history"))
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

    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("pkcore.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
