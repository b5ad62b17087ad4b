// ============================================================================
// NETBASE - Interface Enumeration Front End
// ============================================================================
//
// Lists every network interface the kernel knows about, with the address
// material a capture tool needs before opening a device: name, flags, MTU,
// hardware address and the most recently reported protocol address.
//
// The data comes straight from routing netlink (two dump requests, one for
// links and one for addresses), not from any libc convenience wrapper.
//
// ============================================================================

#[cfg(not(target_os = "linux"))]
compile_error!("netbase talks routing netlink and only builds on Linux.");

use clap::Parser;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use netbase::{netlink_getifaddrs, InterfaceRecord};

#[derive(Parser, Debug)]
#[command(name = "netbase", version, about = "List network interfaces via routing netlink")]
struct Cli {
    /// Emit the interface list as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Only show interfaces that are administratively up
    #[arg(long)]
    up_only: bool,

    /// Log protocol-level detail (skipped messages, uncorrelated addresses)
    #[arg(short, long)]
    verbose: bool,
}

/// Render one record in the familiar ifconfig shape.
fn print_record(rec: &InterfaceRecord) {
    println!("{}: flags={:#x}<{}> mtu {}", rec.name, rec.flags, rec.flags_string(), rec.mtu);
    if !rec.address.is_empty() {
        if rec.broadcast.is_empty() {
            println!("        inet {} netmask {}", rec.address, rec.netmask);
        } else {
            println!(
                "        inet {} netmask {} broadcast {}",
                rec.address, rec.netmask, rec.broadcast
            );
        }
    }
    if rec.has_hardware_address() {
        println!("        ether {}", rec.hardware_address_string());
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto)
        .expect("logger init");

    // A hard error here means the dump never produced anything: the socket
    // could not be opened or the first request never left the process.
    let dump = match netlink_getifaddrs() {
        Ok(dump) => dump,
        Err(e) => {
            log::error!("interface enumeration failed: {e}");
            std::process::exit(1);
        }
    };

    let interfaces: Vec<&InterfaceRecord> = dump
        .interfaces
        .iter()
        .filter(|rec| !cli.up_only || rec.is_up())
        .collect();

    if cli.json {
        // Pretty JSON, one array of records.
        match serde_json::to_string_pretty(&interfaces) {
            Ok(body) => println!("{body}"),
            Err(e) => {
                log::error!("serialization failed: {e}");
                std::process::exit(1);
            }
        }
    } else {
        for rec in &interfaces {
            print_record(rec);
            println!();
        }
    }

    // Partial results were printed above; still signal the truncation.
    if let Some(e) = dump.error {
        log::warn!("dump ended early, list may be incomplete: {e}");
        std::process::exit(1);
    }
}
