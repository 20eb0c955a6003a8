use slog::Drain;
#[macro_use]
extern crate slog;

use std::convert::TryFrom;

pub mod commands;
pub mod helper;

pub enum CLIError {
    Clap(clap::Error),
    OtherMessage(String),
}

fn main() {
    let app = clap::App::new("Bluetooth Mesh CLI")
        .version(clap::crate_version!())
        .about("Bluetooth Mesh provisioner developer tool")
        .arg(
            clap::Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .max_values(5)
                .help("Set the amount of logging from level 0 up to level 5"),
        )
        .subcommand(commands::crypto::sub_command())
        .subcommand(commands::access::sub_command());
    let matches = app.get_matches();

    let log_level = slog::Level::from_usize(
        1 + usize::try_from(matches.occurrences_of("verbose"))
            .expect("verbose usize overflow (how??)"),
    )
    .expect("verbose limit set too low");
    let decorator = slog_term::PlainSyncDecorator::new(std::io::stderr());
    let drain = slog_term::FullFormat::new(decorator)
        .build()
        .filter_level(log_level)
        .fuse();
    let root = slog::Logger::root(drain, o!());
    trace!(root, "main");
    debug!(root, "arg_match"; "sub_command" => matches.subcommand().0);
    if let Err(e) = (|| -> Result<(), CLIError> {
        match matches.subcommand() {
            ("", None) => error!(root, "no command given"),
            ("crypto", Some(crypto_matches)) => {
                commands::crypto::crypto_matches(&root, crypto_matches)?
            }
            ("access", Some(access_matches)) => {
                commands::access::access_matches(&root, access_matches)?
            }
            _ => unreachable!("unhandled sub_command"),
        }
        debug!(root, "matches_done");
        Ok(())
    })() {
        match e {
            CLIError::Clap(error) => eprintln!("{}", &error.message),
            CLIError::OtherMessage(msg) => eprintln!("error: {}", &msg),
        };
        std::process::exit(1);
    }
}
