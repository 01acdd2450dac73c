use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Default)]
struct FtpState {
    connections: AtomicUsize,
    commands: Mutex<Vec<String>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
}

/// Minimal in-process FTP server: one user, passive mode, STOR only.
///
/// Sessions are served one at a time on a background thread that lives as long
/// as the test process.
pub struct FakeFtpServer {
    addr: SocketAddr,
    state: Arc<FtpState>,
}

impl FakeFtpServer {
    pub fn start(username: &str, password: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake ftp server");
        let addr = listener.local_addr().expect("fake ftp address");
        let state = Arc::new(FtpState::default());

        let credentials = (username.to_string(), password.to_string());
        let thread_state = state.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                thread_state.connections.fetch_add(1, Ordering::SeqCst);
                let _ = serve_session(stream, &credentials, &thread_state);
            }
        });

        Self { addr, state }
    }

    /// `host:port` string suitable for `FeedConfig::ftp_host`.
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.commands.lock().unwrap().clone()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.files.lock().unwrap().get(path).cloned()
    }
}

fn serve_session(stream: TcpStream, credentials: &(String, String), state: &FtpState) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;
    writer.write_all(b"220 fake ftp ready\r\n")?;

    let mut user: Option<String> = None;
    let mut data_listener: Option<TcpListener> = None;

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }

        let line = line.trim_end();
        let (command, argument) = match line.split_once(' ') {
            Some((command, argument)) => (command.to_ascii_uppercase(), argument.to_string()),
            None => (line.to_ascii_uppercase(), String::new()),
        };
        state.commands.lock().unwrap().push(command.clone());

        match command.as_str() {
            "USER" => {
                user = Some(argument);
                writer.write_all(b"331 password required\r\n")?;
            }
            "PASS" => {
                if user.as_deref() == Some(credentials.0.as_str()) && argument == credentials.1 {
                    writer.write_all(b"230 logged in\r\n")?;
                } else {
                    writer.write_all(b"530 Login incorrect\r\n")?;
                }
            }
            "TYPE" => writer.write_all(b"200 type set\r\n")?,
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0")?;
                let port = listener.local_addr()?.port();
                let reply = format!(
                    "227 Entering Passive Mode (127,0,0,1,{},{})\r\n",
                    port >> 8,
                    port & 0xff
                );
                data_listener = Some(listener);
                writer.write_all(reply.as_bytes())?;
            }
            "EPSV" => {
                let listener = TcpListener::bind("127.0.0.1:0")?;
                let port = listener.local_addr()?.port();
                let reply = format!("229 Entering Extended Passive Mode (|||{}|)\r\n", port);
                data_listener = Some(listener);
                writer.write_all(reply.as_bytes())?;
            }
            "STOR" => match data_listener.take() {
                Some(listener) => {
                    writer.write_all(b"150 ok to send data\r\n")?;
                    let (mut data, _) = listener.accept()?;
                    let mut contents = Vec::new();
                    data.read_to_end(&mut contents)?;
                    state.files.lock().unwrap().insert(argument, contents);
                    writer.write_all(b"226 transfer complete\r\n")?;
                }
                None => writer.write_all(b"425 use PASV first\r\n")?,
            },
            "QUIT" => {
                writer.write_all(b"221 bye\r\n")?;
                return Ok(());
            }
            _ => writer.write_all(b"200 ok\r\n")?,
        }
    }
}
