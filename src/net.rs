//! The connection front-end: a thread-per-connection `std::net` server.
//! Each connection gets its own blocking read loop; tokens in, reply bytes
//! out, nothing fancier. Signal installation reaches for `libc::signal` to
//! turn Ctrl-C into a flush-and-exit rather than an abrupt kill.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::dispatch;
use crate::keyspace::Store;
use crate::log::{log, LogLevel};
use crate::persist;

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn request_shutdown(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Installs handlers that flip `SHUTDOWN_REQUESTED` rather than terminating
/// the process directly, so the accept loop gets a chance to flush
/// persistence before exiting.
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, request_shutdown as libc::sighandler_t);
        libc::signal(libc::SIGTERM, request_shutdown as libc::sighandler_t);
    }
}

/// Runs the accept loop until shutdown is requested, flushing persistence
/// on the way out. Returns the process exit code: 0 on normal shutdown,
/// non-zero on socket bind failure.
pub fn serve(store: Arc<Store>, port: u16, db_filename: &str) -> i32 {
    install_signal_handlers();

    let listener = match TcpListener::bind(("0.0.0.0", port)) {
        Ok(l) => l,
        Err(e) => {
            log(LogLevel::Warning, &format!("Fatal error: can't bind TCP port {port}: {e}"));
            return 1;
        }
    };
    if let Err(e) = listener.set_nonblocking(true) {
        log(LogLevel::Warning, &format!("Fatal error: can't set listener non-blocking: {e}"));
        return 1;
    }

    log(LogLevel::Notice, &format!("The server is now ready to accept connections on port {port}"));

    loop {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            persist::save(&store, db_filename);
            log(LogLevel::Notice, "clean shutdown complete");
            return 0;
        }

        match listener.accept() {
            Ok((stream, _addr)) => {
                let store = store.clone();
                thread::spawn(move || handle_client(stream, store));
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(20));
            }
            Err(e) => {
                log(LogLevel::Warning, &format!("accept failed: {e}"));
            }
        }
    }
}

/// One connection, one thread, one blocking read loop. A read error or EOF
/// ends this thread only; it never reaches other connections or the engine.
fn handle_client(stream: TcpStream, store: Arc<Store>) {
    let peer = stream.peer_addr().ok();
    let mut writer = match stream.try_clone() {
        Ok(s) => s,
        Err(_) => return,
    };
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(_) => break,
        }

        let tokens = tokenize(&line);
        if tokens.is_empty() {
            continue; // blank lines are ignored
        }

        let reply = dispatch::dispatch(&store, &tokens);
        if writer.write_all(&reply.to_bytes()).is_err() {
            break;
        }
        if writer.flush().is_err() {
            break;
        }
    }

    if let Some(addr) = peer {
        log(LogLevel::Debug, &format!("connection closed: {addr}"));
    }
}

/// Splits a `\r\n`-terminated line on ASCII whitespace into byte-string
/// tokens. There is no quoting or escaping on the request side.
fn tokenize(line: &[u8]) -> Vec<Vec<u8>> {
    line.split(|b| b.is_ascii_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_vec())
        .collect()
}
