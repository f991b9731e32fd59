use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, instrument};

use crate::commands::executable::Executable;
use crate::commands::Command;
use crate::connection::Connection;
use crate::frame::Frame;
use crate::Error;

pub async fn run(host: &str, port: u16) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let listener = TcpListener::bind((host, port)).await?;

    info!("RESP server listening on {}", listener.local_addr()?);

    loop {
        let (socket, client_address) = listener.accept().await?;
        info!("Accepted connection from {:?}", client_address);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, client_address).await {
                error!("Connection error: {}", e);
            }
        });
    }
}

#[instrument(
    name = "connection",
    skip(stream),
    fields(connection_id, client_address)
)]
async fn handle_connection(stream: TcpStream, client_address: SocketAddr) -> Result<(), Error> {
    let mut conn = Connection::new(stream);

    tracing::Span::current()
        .record("connection_id", conn.id.to_string())
        .record("client_address", client_address.to_string());

    while let Some(frame) = conn.read_frame().await? {
        info!("Received frame from client: {:?}", frame);

        // Requests the command layer cannot make sense of (unknown name, bad
        // arity, a frame that is not a command array) get an in-band error
        // reply; only framing and transport failures drop the connection.
        let res = match Command::try_from(frame) {
            Ok(cmd) => cmd.exec()?,
            Err(_) => Frame::Error("ERR unknown command".to_string()),
        };

        info!("Sending response to client: {:?}", res);
        conn.write_frame(&res).await?;
    }

    info!("Connection closed");
    Ok(())
}
