//! One live TCP connection to the broker, speaking newline-delimited JSON
//! [`Frame`]s. The manager owns reconnection policy; this actor only reports
//! `ConnectionUp` when it starts and `ConnectionDown` when the stream dies.

use actix::prelude::*;
use colored::Color;
use std::collections::VecDeque;
use tokio::io::{split, AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, ReadHalf, WriteHalf};
use tokio::net::TcpStream;

use crate::broker::manager::{BrokerManager, ConnectionDown, ConnectionUp};
use crate::logger::Logger;
use crate::messages::broker_messages::Frame;

/// Extract `host:port` from an endpoint that may carry a scheme and path,
/// e.g. `http://localhost:8080/api/ws`.
fn authority_of(endpoint: &str) -> String {
    let without_scheme = endpoint
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(endpoint);
    let authority = without_scheme
        .split_once('/')
        .map(|(authority, _)| authority)
        .unwrap_or(without_scheme);
    if authority.contains(':') {
        authority.to_string()
    } else {
        format!("{}:80", authority)
    }
}

/// Try to open a TCP stream to the broker endpoint.
pub async fn connect_endpoint(endpoint: &str) -> Option<TcpStream> {
    TcpStream::connect(authority_of(endpoint)).await.ok()
}

pub struct BrokerConnection {
    manager: Addr<BrokerManager>,
    writer: Option<BufWriter<WriteHalf<TcpStream>>>,
    reader: Option<BufReader<ReadHalf<TcpStream>>>,
    queue: VecDeque<Frame>,
    logger: Logger,
}

impl BrokerConnection {
    pub fn new(stream: TcpStream, manager: Addr<BrokerManager>) -> Self {
        let (read_half, write_half) = split(stream);
        Self {
            manager,
            writer: Some(BufWriter::new(write_half)),
            reader: Some(BufReader::new(read_half)),
            queue: VecDeque::new(),
            logger: Logger::new("BrokerConn", Color::Blue),
        }
    }
}

impl Actor for BrokerConnection {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let manager = self.manager.clone();
        let logger = self.logger.clone();
        let reader = self.reader.take();
        if let Some(reader) = reader {
            ctx.spawn(
                async move {
                    let mut lines = reader.lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        match serde_json::from_str::<Frame>(&line) {
                            Ok(frame) => manager.do_send(frame),
                            Err(_) => {
                                logger.warn(format!("dropping unparseable frame: {}", line))
                            }
                        }
                    }
                    manager.do_send(ConnectionDown);
                }
                .into_actor(self),
            );
        }
        self.manager.do_send(ConnectionUp {
            outbound: ctx.address().recipient(),
        });
    }
}

struct ProcessQueue;

impl Message for ProcessQueue {
    type Result = ();
}

impl Handler<Frame> for BrokerConnection {
    type Result = ();

    fn handle(&mut self, msg: Frame, ctx: &mut Self::Context) -> Self::Result {
        self.queue.push_back(msg);
        if self.queue.len() == 1 {
            ctx.notify(ProcessQueue);
        }
    }
}

impl Handler<ProcessQueue> for BrokerConnection {
    type Result = ResponseActFuture<Self, ()>;

    fn handle(&mut self, _msg: ProcessQueue, _ctx: &mut Self::Context) -> Self::Result {
        if let (Some(mut writer), Some(frame)) = (self.writer.take(), self.queue.front().cloned())
        {
            let fut = async move {
                let serialized = match serde_json::to_string(&frame) {
                    Ok(s) => s,
                    Err(e) => return Err(format!("error serializing frame: {:?}", e)),
                };
                let to_send = format!("{}\n", serialized);
                if let Err(e) = writer.write_all(to_send.as_bytes()).await {
                    return Err(format!("error writing to broker socket: {:?}", e));
                }
                if let Err(e) = writer.flush().await {
                    return Err(format!("error flushing broker socket: {:?}", e));
                }
                Ok(writer)
            };

            Box::pin(fut.into_actor(self).map(move |res, act, ctx| match res {
                Ok(writer) => {
                    act.writer = Some(writer);
                    act.queue.pop_front();
                    if !act.queue.is_empty() {
                        ctx.notify(ProcessQueue);
                    }
                }
                Err(err_msg) => {
                    act.logger.error(&err_msg);
                    act.writer = None;
                    act.queue.clear();
                    act.manager.do_send(ConnectionDown);
                    ctx.stop();
                }
            }))
        } else {
            Box::pin(async {}.into_actor(self))
        }
    }
}

/// Close the connection without reporting it as lost; used by the manager's
/// kill switch and teardown.
#[derive(Message)]
#[rtype(result = "()")]
pub struct CloseConnection;

impl Handler<CloseConnection> for BrokerConnection {
    type Result = ();

    fn handle(&mut self, _msg: CloseConnection, ctx: &mut Self::Context) -> Self::Result {
        self.writer = None;
        self.queue.clear();
        ctx.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_strips_scheme_and_path() {
        assert_eq!(authority_of("http://localhost:8080/api/ws"), "localhost:8080");
    }

    #[test]
    fn authority_without_port_gets_default() {
        assert_eq!(authority_of("http://broker.internal/ws"), "broker.internal:80");
    }

    #[test]
    fn bare_authority_passes_through() {
        assert_eq!(authority_of("10.0.0.5:61613"), "10.0.0.5:61613");
    }
}
