use std::path::PathBuf;

use gallery_tui::app::RunOptions;

enum Action {
    Run(RunOptions),
    Sync(RunOptions),
    Exit(i32),
}

fn main() {
    match parse_args(std::env::args().skip(1)) {
        Action::Exit(code) => std::process::exit(code),
        Action::Sync(opts) => match gallery_tui::app::sync_once(opts) {
            Ok(report) => {
                println!(
                    "Synced {} new post(s), {} skipped, {} cached (index {}).",
                    report.fetched.len(),
                    report.skipped.len(),
                    report.posts.len(),
                    if report.index_version.is_empty() {
                        "unversioned"
                    } else {
                        report.index_version.as_str()
                    }
                );
            }
            Err(err) => {
                eprintln!("error: {err:?}");
                std::process::exit(1);
            }
        },
        Action::Run(opts) => {
            if let Err(err) = gallery_tui::run(opts) {
                eprintln!("error: {err:?}");
                std::process::exit(1);
            }
        }
    }
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Action {
    let mut opts = RunOptions::default();
    let mut sync = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("Gallery-TUI {}", gallery_tui::VERSION);
                return Action::Exit(0);
            }
            "--help" | "-h" => {
                println!(
                    "Gallery-TUI — Browse a synced media gallery from the terminal.\n\n  [#CATEGORY]          Open on a category, e.g. '#anime'\n  --category <NAME>    Same as #NAME\n  --config <PATH>      Use an explicit config file\n  --sync               Download new posts and exit\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message"
                );
                return Action::Exit(0);
            }
            "--sync" => sync = true,
            "--config" => match args.next() {
                Some(path) => opts.config_file = Some(PathBuf::from(path)),
                None => {
                    eprintln!("error: --config requires a path");
                    return Action::Exit(2);
                }
            },
            "--category" => match args.next() {
                Some(name) => opts.fragment = Some(name),
                None => {
                    eprintln!("error: --category requires a name");
                    return Action::Exit(2);
                }
            },
            other if other.starts_with('#') => opts.fragment = Some(other.to_string()),
            other => {
                eprintln!("error: unrecognized argument {other:?} (see --help)");
                return Action::Exit(2);
            }
        }
    }

    if sync {
        Action::Sync(opts)
    } else {
        Action::Run(opts)
    }
}
