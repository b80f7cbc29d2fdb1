//! The byte protocol over any pair of streams.
use super::{Connector, StepReply, RESET_BYTE, SENTINEL_BYTE, TERMINATE_BYTE};
use crate::{EnvError, FrameLayout};
use log::trace;
use std::io::{Read, Write};

/// Speaks the protocol over a reader (replies) and a writer (commands).
///
/// Every command is flushed before its reply is read, so there is never more
/// than one outstanding request.
pub struct WireConnector<R, W> {
    reader: R,
    writer: W,
    layout: FrameLayout,
    current: Option<Vec<u8>>,
}

impl<R: Read, W: Write> WireConnector<R, W> {
    /// Creates a connector.
    pub fn new(reader: R, writer: W, layout: FrameLayout) -> Self {
        Self {
            reader,
            writer,
            layout,
            current: None,
        }
    }

    fn send(&mut self, byte: u8) -> Result<(), EnvError> {
        self.writer.write_all(&[byte])?;
        self.writer.flush()?;
        Ok(())
    }

    fn read_i32(&mut self) -> Result<i32, EnvError> {
        let mut buf = [0u8; 4];
        self.reader.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    fn read_frame(&mut self) -> Result<Vec<u8>, EnvError> {
        let mut obs = vec![0u8; self.layout.len()];
        self.reader.read_exact(&mut obs)?;

        let mut sentinel = [0u8; 1];
        self.reader.read_exact(&mut sentinel)?;
        if sentinel[0] != SENTINEL_BYTE {
            return Err(EnvError::ProtocolDesync(format!(
                "frame ends with {:?}, expected {:?}",
                sentinel[0] as char, SENTINEL_BYTE as char
            )));
        }

        self.current = Some(obs.clone());
        Ok(obs)
    }
}

impl<R, W> Connector for WireConnector<R, W>
where
    R: Read + Send,
    W: Write + Send,
{
    fn reset(&mut self) -> Result<Vec<u8>, EnvError> {
        self.send(RESET_BYTE)?;

        let mut echo = [0u8; 1];
        self.reader.read_exact(&mut echo)?;
        if echo[0] != RESET_BYTE {
            return Err(EnvError::ProtocolDesync(format!(
                "reset echoed {:?}",
                echo[0] as char
            )));
        }

        self.read_frame()
    }

    fn step(&mut self, action: u8) -> Result<StepReply, EnvError> {
        self.send(action)?;
        let reward = self.read_i32()?;
        let is_terminal = self.read_i32()? != 0;
        trace!("action={}, reward={}, is_terminal={}", action, reward, is_terminal);
        let obs = self.read_frame()?;

        Ok(StepReply {
            obs,
            reward,
            is_terminal,
        })
    }

    fn current(&self) -> Option<&[u8]> {
        self.current.as_deref()
    }

    fn close(&mut self) -> Result<(), EnvError> {
        self.send(TERMINATE_BYTE)
    }
}
