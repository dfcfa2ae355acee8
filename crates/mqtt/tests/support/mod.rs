//! Scripted MQTT 3.1.1 broker on a loopback socket.
//!
//! Speaks just enough of the protocol for one client: CONNACK with a chosen
//! return code, SUBACK with a chosen reason code, then the scripted QoS 0
//! publishes on the subscribed topic.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Instant};

const CONNECT: u8 = 1;
const SUBSCRIBE: u8 = 8;
const PINGREQ: u8 = 12;
const DISCONNECT: u8 = 14;

pub const SUBACK_FAILURE: u8 = 0x80;

#[derive(Debug, Clone)]
pub struct Script {
    pub connack_code: u8,
    pub suback_code: u8,
    pub messages: Vec<(Duration, Vec<u8>)>,
}

impl Script {
    pub fn silent() -> Self {
        Self { connack_code: 0, suback_code: 0, messages: Vec::new() }
    }

    pub fn publishing<P: Into<Vec<u8>>>(payloads: impl IntoIterator<Item = P>) -> Self {
        Self {
            messages: payloads.into_iter().map(|p| (Duration::ZERO, p.into())).collect(),
            ..Self::silent()
        }
    }

    pub fn delayed<P: Into<Vec<u8>>>(delay: Duration, payload: P) -> Self {
        Self { messages: vec![(delay, payload.into())], ..Self::silent() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    Connected { client_id: String },
    Subscribed { topic: String },
    Disconnected,
    Closed,
}

pub struct FakeBroker {
    pub addr: SocketAddr,
    events: mpsc::UnboundedReceiver<BrokerEvent>,
}

impl FakeBroker {
    pub async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake broker");
        let addr = listener.local_addr().expect("fake broker address");
        let (tx, events) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve_client(stream, script.clone(), tx.clone()));
            }
        });
        Self { addr, events }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub async fn next_event(&mut self, within: Duration) -> Option<BrokerEvent> {
        timeout(within, self.events.recv()).await.ok().flatten()
    }

    /// Waits until a client hangs up, cleanly or not.
    pub async fn wait_for_client_gone(&mut self, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.next_event(left).await {
                Some(BrokerEvent::Disconnected) | Some(BrokerEvent::Closed) => return true,
                Some(_) => continue,
                None => return false,
            }
        }
    }
}

/// A port on loopback with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind probe");
    listener.local_addr().expect("probe address").port()
}

async fn serve_client(mut stream: TcpStream, script: Script, tx: mpsc::UnboundedSender<BrokerEvent>) {
    loop {
        let (header, body) = match read_packet(&mut stream).await {
            Ok(packet) => packet,
            Err(_) => {
                let _ = tx.send(BrokerEvent::Closed);
                return;
            }
        };
        match header >> 4 {
            CONNECT => {
                let _ = tx.send(BrokerEvent::Connected { client_id: connect_client_id(&body) });
                let _ = stream.write_all(&[0x20, 0x02, 0x00, script.connack_code]).await;
                if script.connack_code != 0 {
                    return;
                }
            }
            SUBSCRIBE => {
                let topic_len = u16::from_be_bytes([body[2], body[3]]) as usize;
                let topic = String::from_utf8_lossy(&body[4..4 + topic_len]).into_owned();
                let _ = tx.send(BrokerEvent::Subscribed { topic: topic.clone() });
                let _ = stream.write_all(&[0x90, 0x03, body[0], body[1], script.suback_code]).await;
                if script.suback_code == SUBACK_FAILURE {
                    continue;
                }
                for (delay, payload) in &script.messages {
                    if !delay.is_zero() {
                        sleep(*delay).await;
                    }
                    let _ = stream.write_all(&publish_frame(&topic, payload)).await;
                }
            }
            PINGREQ => {
                let _ = stream.write_all(&[0xD0, 0x00]).await;
            }
            DISCONNECT => {
                let _ = tx.send(BrokerEvent::Disconnected);
                return;
            }
            _ => {}
        }
    }
}

async fn read_packet(stream: &mut TcpStream) -> std::io::Result<(u8, Vec<u8>)> {
    let header = stream.read_u8().await?;
    let mut len = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await?;
        len |= ((byte & 0x7f) as usize) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    Ok((header, body))
}

// Variable header is protocol name (6), level (1), flags (1), keep alive (2)
fn connect_client_id(body: &[u8]) -> String {
    let len = u16::from_be_bytes([body[10], body[11]]) as usize;
    String::from_utf8_lossy(&body[12..12 + len]).into_owned()
}

fn publish_frame(topic: &str, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(2 + topic.len() + payload.len());
    body.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    body.extend_from_slice(topic.as_bytes());
    body.extend_from_slice(payload);

    let mut frame = vec![0x30];
    let mut len = body.len();
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        frame.push(byte);
        if len == 0 {
            break;
        }
    }
    frame.extend_from_slice(&body);
    frame
}
