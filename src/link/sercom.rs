// ASCII sercom protocol implementation
//
// The robot accepts single-letter commands with comma-separated arguments,
// terminated by CR; it answers with the lowercase command letter, the
// values, and CRLF:
//
//   -> D,300,-300\r      set wheel speeds (steps/s)
//   <- d\r\n
//   -> Q\r               read wheel step counters
//   <- q,1205,-40\r\n
//
// The same protocol runs over the bluetooth-serial bridge and the wifi TCP
// bridge; the codec is generic over the byte stream.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, info};

use super::{LinkError, RobotLink};

/// Default serial configuration for the bluetooth bridge
pub const DEFAULT_BAUDRATE: u32 = 115_200;
pub const DEFAULT_TIMEOUT_MS: u64 = 500;

/// Longest reply line we accept before declaring the stream corrupt.
const MAX_REPLY_LEN: usize = 256;

/// Robot connection over a byte stream speaking the sercom protocol.
///
/// Keeps the staged wheel speeds and the most recently refreshed step
/// counters, mirroring the robot-side actuator/sensor state.
pub struct SercomLink<S: Read + Write> {
    stream: S,
    left_speed: i32,
    right_speed: i32,
    left_steps: i32,
    right_steps: i32,
}

pub type SerialLink = SercomLink<Box<dyn SerialPort>>;
pub type TcpLink = SercomLink<TcpStream>;

impl SerialLink {
    /// Opens the robot's serial bridge and probes it.
    pub fn open(port_name: &str) -> Result<Self, LinkError> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self, LinkError> {
        info!("opening robot link on {}", port_name);
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        let mut link = Self::new(port);
        link.handshake()?;
        Ok(link)
    }
}

impl TcpLink {
    /// Connects to the robot's wifi bridge and probes it.
    pub fn connect(addr: &str) -> Result<Self, LinkError> {
        info!("connecting to robot at {}", addr);
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(Duration::from_millis(DEFAULT_TIMEOUT_MS)))?;
        stream.set_nodelay(true)?;

        let mut link = Self::new(stream);
        link.handshake()?;
        Ok(link)
    }
}

impl<S: Read + Write> SercomLink<S> {
    fn new(stream: S) -> Self {
        Self {
            stream,
            left_speed: 0,
            right_speed: 0,
            left_steps: 0,
            right_steps: 0,
        }
    }

    /// Stops the robot and drops the connection.
    pub fn close(mut self) -> Result<(), LinkError> {
        self.stop_all()
    }

    /// Version probe; confirms the peer actually speaks the protocol.
    fn handshake(&mut self) -> Result<(), LinkError> {
        let version = self.command("V")?;
        info!("robot reported {}", version);
        Ok(())
    }

    /// Sends one command line and returns the validated reply.
    fn command(&mut self, request: &str) -> Result<String, LinkError> {
        debug!("-> {}", request);
        self.stream.write_all(request.as_bytes())?;
        self.stream.write_all(b"\r")?;
        self.stream.flush()?;

        let reply = self.read_line()?;
        debug!("<- {}", reply);

        let expected = request.as_bytes()[0].to_ascii_lowercase();
        if reply.as_bytes().first() != Some(&expected) {
            return Err(LinkError::InvalidResponse {
                reason: format!(
                    "expected '{}' reply to {:?}, got {:?}",
                    expected as char, request, reply
                ),
            });
        }
        Ok(reply)
    }

    fn read_line(&mut self) -> Result<String, LinkError> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            self.stream.read_exact(&mut byte)?;
            match byte[0] {
                b'\n' => break,
                b'\r' => {}
                other => line.push(other),
            }
            if line.len() > MAX_REPLY_LEN {
                return Err(LinkError::InvalidResponse {
                    reason: "reply exceeds maximum length".to_string(),
                });
            }
        }
        String::from_utf8(line).map_err(|_| LinkError::InvalidResponse {
            reason: "reply is not valid ascii".to_string(),
        })
    }
}

/// Parses a step counter reply of the form `q,<left>,<right>`.
fn parse_step_reply(reply: &str) -> Result<(i32, i32), LinkError> {
    let mut fields = reply.split(',');
    let _tag = fields.next();
    let left = fields.next().and_then(|v| v.trim().parse::<i32>().ok());
    let right = fields.next().and_then(|v| v.trim().parse::<i32>().ok());

    match (left, right) {
        (Some(left), Some(right)) => Ok((left, right)),
        _ => Err(LinkError::InvalidResponse {
            reason: format!("malformed step counter reply {:?}", reply),
        }),
    }
}

impl<S: Read + Write> RobotLink for SercomLink<S> {
    fn set_commanded_speeds(&mut self, left_steps_s: i32, right_steps_s: i32) {
        self.left_speed = left_steps_s;
        self.right_speed = right_steps_s;
    }

    fn send_command(&mut self) -> Result<(), LinkError> {
        let request = format!("D,{},{}", self.left_speed, self.right_speed);
        self.command(&request)?;
        Ok(())
    }

    fn refresh_sensors(&mut self) -> Result<(), LinkError> {
        let reply = self.command("Q")?;
        let (left, right) = parse_step_reply(&reply)?;
        self.left_steps = left;
        self.right_steps = right;
        Ok(())
    }

    fn left_step_count(&self) -> i32 {
        self.left_steps
    }

    fn right_step_count(&self) -> i32 {
        self.right_steps
    }

    fn stop_all(&mut self) -> Result<(), LinkError> {
        self.left_speed = 0;
        self.right_speed = 0;
        self.send_command()
    }
}
