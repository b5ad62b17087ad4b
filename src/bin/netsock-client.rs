// ============================================================================
// NETSOCK CLIENT
// ============================================================================
//
// Counterpart to netsock-server: connects over the raw-syscall layer, prints
// the server's greeting, then sends each stdin line and prints the echoed
// reply tagged with the peer address reported by recvfrom.
//
// ============================================================================

#[cfg(not(target_os = "linux"))]
compile_error!("netsock-client issues raw Linux syscalls and only builds on Linux.");

use std::io::BufRead;
use std::net::{Ipv4Addr, SocketAddrV4};

use clap::Parser;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use netbase::netsock::{net_close, net_connect, net_recvfrom, net_send, net_socket};
use netbase::SockError;

#[derive(Parser, Debug)]
#[command(name = "netsock-client", version, about = "Raw-syscall TCP client")]
struct Cli {
    /// Server address, dotted-quad
    #[arg(long, default_value = "127.0.0.1")]
    addr: Ipv4Addr,

    /// Server port
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

/// Receive one message and print it with its source address.
/// Returns false once the server has closed the connection.
fn recv_and_print(sockfd: i32) -> Result<bool, SockError> {
    let mut buffer = [0_u8; 1024];
    let (received, src) = net_recvfrom(sockfd, &mut buffer)?;
    if received == 0 {
        println!("Server closed the connection.");
        return Ok(false);
    }
    print!(
        "Received from {}:{} => {}",
        src.addr,
        src.port,
        String::from_utf8_lossy(&buffer[..received])
    );
    Ok(true)
}

fn run(cli: &Cli) -> Result<(), SockError> {
    let sockfd = net_socket(libc::AF_INET, libc::SOCK_STREAM, 0)?;

    if let Err(e) = net_connect(sockfd, SocketAddrV4::new(cli.addr, cli.port)) {
        let _ = net_close(sockfd);
        return Err(e);
    }

    // The server speaks first.
    if !recv_and_print(sockfd)? {
        return net_close(sockfd);
    }

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        net_send(sockfd, line.as_bytes())?;
        net_send(sockfd, b"\n")?;
        if !recv_and_print(sockfd)? {
            break;
        }
    }

    net_close(sockfd)
}

fn main() {
    let cli = Cli::parse();
    TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .expect("logger init");

    println!("Running pid {} ...", std::process::id());

    if let Err(e) = run(&cli) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
