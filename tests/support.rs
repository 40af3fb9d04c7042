use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::process::{Command, Output};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

pub struct ServerHandle {
    pub addr: SocketAddr,
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            drop(handle.join());
        }
    }
}

/// Spawn a keep-alive HTTP/1.1 server answering every GET with `200 OK`.
///
/// # Errors
///
/// Returns an error if the listener cannot be created or configured.
pub fn spawn_http_server() -> Result<ServerHandle, String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("bind test server failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("server addr failed: {}", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| format!("set_nonblocking failed: {}", err))?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    let handle = thread::spawn(move || {
        while !stop_flag.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _)) => {
                    thread::spawn(move || serve_connection(stream));
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(5));
                }
                Err(_) => break,
            }
        }
    });

    Ok(ServerHandle {
        addr,
        stop,
        thread: Some(handle),
    })
}

fn serve_connection(stream: TcpStream) {
    if stream.set_nonblocking(false).is_err() {
        return;
    }
    let Ok(mut writer) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(stream);
    loop {
        // Request line plus headers; GETs carry no body.
        let mut saw_request = false;
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
            if line == "\r\n" || line == "\n" {
                break;
            }
            saw_request = true;
        }
        if !saw_request {
            continue;
        }
        let response = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nContent-Type: text/plain\r\n\r\nOK";
        if writer.write_all(response).is_err() || writer.flush().is_err() {
            return;
        }
    }
}

/// Run the `hstress` binary and capture output.
///
/// # Errors
///
/// Returns an error if the binary cannot be executed.
pub fn run_hstress<I, S>(args: I) -> Result<Output, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = hstress_bin()?;
    Command::new(bin)
        .args(args)
        .env("HSTRESS_LOG", "error")
        .output()
        .map_err(|err| format!("run hstress failed: {}", err))
}

/// Fail with both streams when the process did not exit cleanly.
///
/// # Errors
///
/// Returns the captured streams when the exit status is non-zero.
pub fn require_success(output: &Output) -> Result<(), String> {
    if output.status.success() {
        return Ok(());
    }
    Err(format!(
        "status: {}\nstdout: {}\nstderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    ))
}

/// Parse the tab-separated fields of every stdout line.
///
/// # Errors
///
/// Returns an error when a field is not an integer.
pub fn data_rows(stdout: &[u8]) -> Result<Vec<Vec<i64>>, String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.split('\t')
                .map(|field| {
                    field
                        .parse::<i64>()
                        .map_err(|err| format!("bad field {:?} in {:?}: {}", field, line, err))
                })
                .collect()
        })
        .collect()
}

/// Find `# <label>\t<count>\t<fraction>` in the Final Report.
///
/// # Errors
///
/// Returns an error when the label is missing or malformed.
pub fn report_entry(stderr: &[u8], label: &str) -> Result<(u64, String), String> {
    let text = String::from_utf8_lossy(stderr);
    let prefix = format!("# {}\t", label);
    let line = text
        .lines()
        .find(|line| line.starts_with(&prefix))
        .ok_or_else(|| format!("missing {:?} in stderr:\n{}", label, text))?;
    let mut parts = line.trim_start_matches(&prefix).split('\t');
    let count = parts
        .next()
        .ok_or_else(|| format!("missing count in {:?}", line))?
        .parse::<u64>()
        .map_err(|err| format!("bad count in {:?}: {}", line, err))?;
    let fraction = parts.next().unwrap_or_default().to_owned();
    Ok((count, fraction))
}

fn hstress_bin() -> Result<String, String> {
    option_env!("CARGO_BIN_EXE_hstress").map_or_else(
        || Err("CARGO_BIN_EXE_hstress missing at compile time.".to_owned()),
        |path| Ok(path.to_owned()),
    )
}
