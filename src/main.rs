use std::process;

use anyhow::Result;
use clap::{
    arg, crate_authors, crate_name, crate_version, value_parser, ArgAction, ArgGroup, ArgMatches,
    Command,
};
use tinyscan::{
    cancel::{self, CancelToken},
    config::ScanConfig,
    error::ScanError,
    logger,
    port::PortSpec,
    scan::{Protocol, ScanEvent, ScanState, Scanner},
};

struct ParsedArgs {
    debug: bool,
    config: ScanConfig,
}

fn command() -> Command {
    Command::new(crate_name!())
        .about(
            "Port scanner checking TCP or UDP reachability of a host.\n\
            Ports are scanned one by one unless threads are requested.",
        )
        .version(crate_version!())
        .arg_required_else_help(true)
        .author(crate_authors!())
        .args([
            // Miscellaneous arguments.
            arg!(-d --debug "Turns on debugging information").action(ArgAction::SetTrue),
            arg!(-p --port <PORT> "Port or range of ports to scan (e.g. 80 or 80-83)")
                .required(true),
            arg!(-n --threads [THREADS] "Threads to scan with, between 2 and 100 (100 if no value)")
                .num_args(0..=1)
                .default_missing_value("100")
                .value_parser(value_parser!(usize)),
            arg!(<host> "Address or hostname to scan"),
        ])
        .args([
            // Protocols.
            arg!(-t --tcp "TCP scan").action(ArgAction::SetTrue),
            arg!(-u --udp "UDP scan").action(ArgAction::SetTrue),
        ])
        .group(
            ArgGroup::new("protocol")
                .args(["tcp", "udp"])
                .required(true),
        )
}

fn value<'a>(matches: &'a ArgMatches, id: &str) -> &'a str {
    matches.get_one::<String>(id).map_or("", String::as_str)
}

fn parse_args(matches: &ArgMatches) -> Result<ParsedArgs, ScanError> {
    let debug = matches.get_flag("debug");

    let protocol = match (matches.get_flag("tcp"), matches.get_flag("udp")) {
        (true, false) => Protocol::Tcp,
        (false, true) => Protocol::Udp,
        _ => return Err(ScanError::MissingProtocol),
    };

    let ports = value(matches, "port").parse::<PortSpec>()?;
    let threads = matches.get_one::<usize>("threads").copied();
    let config = ScanConfig::new(value(matches, "host"), ports, protocol, threads)?;

    Ok(ParsedArgs { debug, config })
}

fn print_event(event: ScanEvent<'_>) {
    match event {
        ScanEvent::Probed(result) => println!("{}", result),
        ScanEvent::Skipped(_, e) => eprintln!("Error: {}", e),
    }
}

fn main() -> Result<()> {
    let arg_matches = command().try_get_matches().unwrap_or_else(|e| {
        let _ = e.print();
        // Usage errors share the exit code of every other configuration error.
        process::exit(if e.use_stderr() { 1 } else { 0 });
    });

    // Extract arguments.
    let parsed = parse_args(&arg_matches)?;

    logger::init(parsed.debug);

    // Ctrl-C stops the scan but still shows what was found.
    let cancel = CancelToken::new();
    cancel::on_interrupt(&cancel);

    // Start scanner.
    let report = Scanner::new(parsed.config, cancel.clone()).run(print_event)?;

    if report.state == ScanState::Aborted {
        if cancel.is_cancelled() {
            eprintln!("\nSignal received. Aborting scan...");
        } else {
            eprintln!("\nScan aborted.");
        }
    }

    // Show result.
    println!("{}", report.open_ports());

    if report.state == ScanState::Aborted {
        process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinyscan::config::Concurrency;

    fn parse(args: &[&str]) -> Result<ParsedArgs, ScanError> {
        let matches = command()
            .try_get_matches_from(std::iter::once("tinyscan").chain(args.iter().copied()))
            .unwrap();
        parse_args(&matches)
    }

    #[test]
    fn threads_flag_without_value_uses_default() {
        let parsed = parse(&["127.0.0.1", "-p", "80", "-t", "-n"]).unwrap();
        assert_eq!(parsed.config.concurrency, Concurrency::Workers(100));
    }

    #[test]
    fn omitted_threads_is_sequential() {
        let parsed = parse(&["127.0.0.1", "-p", "1-10", "-u"]).unwrap();
        assert_eq!(parsed.config.concurrency, Concurrency::Sequential);
        assert_eq!(parsed.config.protocol, Protocol::Udp);
    }

    #[test]
    fn single_thread_is_rejected() {
        assert!(matches!(
            parse(&["127.0.0.1", "-p", "80", "-t", "-n", "1"]),
            Err(ScanError::InvalidThreadCount(1))
        ));
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(matches!(
            parse(&["127.0.0.1", "-p", "80-70", "-t"]),
            Err(ScanError::InvertedRange { start: 80, end: 70 })
        ));
    }

    #[test]
    fn protocol_is_required_and_exclusive() {
        let base = ["tinyscan", "127.0.0.1", "-p", "80"];
        assert!(command().try_get_matches_from(base).is_err());
        assert!(command()
            .try_get_matches_from(base.iter().chain(&["-t", "-u"]))
            .is_err());
    }
}
