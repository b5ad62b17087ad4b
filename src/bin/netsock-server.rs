// ============================================================================
// NETSOCK ECHO SERVER
// ============================================================================
//
// Exercises the raw-syscall socket layer end to end: socket, bind (with its
// descriptor and address validation), listen, accept. Each accepted client is
// handed to a worker thread which greets it and then echoes whatever it sends
// until the peer closes.
//
// ============================================================================

#[cfg(not(target_os = "linux"))]
compile_error!("netsock-server issues raw Linux syscalls and only builds on Linux.");

use clap::Parser;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use threadpool::ThreadPool;

use netbase::netsock::{
    net_accept, net_bind, net_close, net_getsockname, net_listen, net_recvfrom, net_send,
    net_socket,
};

const GREETING: &[u8] = b"Hello from server!\n";

#[derive(Parser, Debug)]
#[command(name = "netsock-server", version, about = "Raw-syscall TCP echo server")]
struct Cli {
    /// Address to bind, dotted-quad
    #[arg(long, default_value = "127.0.0.1")]
    addr: String,

    /// Port to listen on
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Worker threads handling accepted clients
    #[arg(long, default_value_t = 4)]
    workers: usize,
}

/// Serve one client until it closes or errors. Runs on a pool worker.
fn handle_client(client_fd: i32) {
    if let Err(e) = net_send(client_fd, GREETING) {
        log::warn!("fd {client_fd}: greeting failed: {e}");
        let _ = net_close(client_fd);
        return;
    }

    let mut buffer = [0_u8; 1024];
    loop {
        match net_recvfrom(client_fd, &mut buffer) {
            // Zero bytes means orderly shutdown by the peer.
            Ok((0, _)) => {
                log::info!("fd {client_fd}: peer closed");
                break;
            }
            Ok((received, _)) => {
                if let Err(e) = net_send(client_fd, &buffer[..received]) {
                    log::warn!("fd {client_fd}: echo failed: {e}");
                    break;
                }
            }
            Err(e) => {
                log::warn!("fd {client_fd}: recv failed: {e}");
                break;
            }
        }
    }

    let _ = net_close(client_fd);
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

    println!("Running on pid {} ...", std::process::id());

    let server_fd = match net_socket(libc::AF_INET, libc::SOCK_STREAM, 0) {
        Ok(fd) => fd,
        Err(e) => {
            log::error!("socket: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = net_bind(server_fd, &cli.addr, cli.port).and_then(|()| net_listen(server_fd, 10))
    {
        log::error!("bind/listen on {}:{}: {e}", cli.addr, cli.port);
        let _ = net_close(server_fd);
        std::process::exit(1);
    }

    // Report the bound name as the kernel sees it (resolves port 0).
    let name = net_getsockname(server_fd);
    println!("Server listening on {}:{} ...", name.addr, name.port);

    let pool = ThreadPool::new(cli.workers);

    loop {
        match net_accept(server_fd) {
            Ok((client_fd, peer)) => {
                log::info!("accepted fd {client_fd} from {}:{}", peer.addr, peer.port);
                pool.execute(move || handle_client(client_fd));
            }
            Err(e) => {
                // Accept failures are transient; keep serving.
                log::warn!("accept: {e}");
            }
        }
    }
}
