//! Control channel input.
//!
//! Bytes from a reader (stdin in the binary) are split into command lines by
//! the protocol's [`LineCodec`] on a dedicated thread and handed to the tick
//! loop over a crossbeam channel.

use std::io::{ErrorKind, Read};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use ridsim_cli_protocol::LineCodec;
use tracing::{debug, warn};

use crate::config::{RunnerError, RunnerResult};

const READ_CHUNK: usize = 256;

/// Read command lines from `reader` until end of input.
///
/// A final line without a terminator is still delivered. Fails with
/// [`RunnerError::ChannelClosed`] once nobody listens on `tx`.
pub fn read_lines<R: Read>(mut reader: R, tx: &Sender<String>) -> RunnerResult<()> {
    let mut codec = LineCodec::new();
    let mut buf = [0u8; READ_CHUNK];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if let Err(e) = codec.push(&buf[..n]) {
            warn!("Control: {}", e);
        }
        forward(&mut codec, tx)?;
    }

    if codec.buffered_len() > 0 {
        let _ = codec.push(b"\n");
        forward(&mut codec, tx)?;
    }
    debug!("Control: input closed");
    Ok(())
}

fn forward(codec: &mut LineCodec, tx: &Sender<String>) -> RunnerResult<()> {
    while let Some(line) = codec.decode_line() {
        tx.send(line).map_err(|_| RunnerError::ChannelClosed)?;
    }
    Ok(())
}

/// Spawn a thread feeding lines from `reader` into a new channel.
pub fn spawn_reader<R>(reader: R) -> RunnerResult<(Receiver<String>, JoinHandle<RunnerResult<()>>)>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = unbounded();
    let handle = thread::Builder::new()
        .name("ridsim-control".to_string())
        .spawn(move || read_lines(reader, &tx))?;
    Ok((rx, handle))
}
