use crate::engine::transport::Transport;
use crate::error::StressError;
use crate::protocol::{decode_event, encode_command, Command, Event};

/// A transport speaking the game protocol: commands out, events in.
pub struct Connection<T> {
    transport: T,
}

impl<T: Transport> Connection<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Encode and send a single command.
    pub async fn send_command(&self, cmd: &Command) -> Result<(), StressError> {
        let payload = encode_command(cmd)?;
        self.transport
            .send(payload)
            .await
            .map_err(|source| StressError::Send {
                command: cmd.command_type(),
                source,
            })
    }

    /// Wait for the next event.
    ///
    /// Returns `Ok(None)` once the connection is closed, whether the server
    /// hung up or we closed it ourselves.
    pub async fn next_event(&self) -> Result<Option<Event>, StressError> {
        match self.transport.receive().await {
            Ok(Some(payload)) => Ok(Some(decode_event(&payload)?)),
            Ok(None) => Ok(None),
            Err(e) if e.is_closed() => Ok(None),
            Err(e) => Err(StressError::Transport(e)),
        }
    }

    pub async fn close(&self) {
        self.transport.close().await;
    }
}
