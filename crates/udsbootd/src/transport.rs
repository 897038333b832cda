//! Serving loops for the daemon transports
//!
//! The engine is blocking, so every loop here runs on a dedicated thread
//! (`spawn_blocking` in the daemon). Channels are read with a short timeout
//! and [`ShutdownReader`] turns those timeouts back into blocking reads until
//! shutdown is requested.

use std::io::{self, Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};
use udsboot_core::{Bootloader, BootloaderConfig, BootloaderError, FlashDriver};

/// How often blocked reads and accepts check the shutdown flag
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error(transparent)]
    Bootloader(#[from] BootloaderError),
}

/// Read half that waits through channel timeouts until `running` is cleared
pub struct ShutdownReader<R> {
    inner: R,
    running: Arc<AtomicBool>,
}

impl<R> ShutdownReader<R> {
    pub fn new(inner: R, running: Arc<AtomicBool>) -> Self {
        Self { inner, running }
    }
}

impl<R: Read> Read for ShutdownReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.inner.read(buf) {
                Err(e) if is_timeout(&e) && self.running.load(Ordering::SeqCst) => continue,
                result => return result,
            }
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

/// Run one engine over an input/output pair until the input closes.
///
/// The engine borrows `flash`, so programmed data outlives the connection
/// while session and download state start fresh.
pub fn serve_stream<R, W, F>(
    input: R,
    output: W,
    flash: &mut F,
    config: &BootloaderConfig,
) -> Result<(), BootloaderError>
where
    R: Read,
    W: Write,
    F: FlashDriver + ?Sized,
{
    Bootloader::new(input, output, flash, config.clone()).serve()
}

/// Accept testers on `listener` one at a time until `running` is cleared.
pub fn serve_tcp<F>(
    listener: TcpListener,
    flash: &mut F,
    config: &BootloaderConfig,
    running: Arc<AtomicBool>,
) -> Result<(), TransportError>
where
    F: FlashDriver + ?Sized,
{
    listener.set_nonblocking(true)?;
    info!(address = %listener.local_addr()?, "Listening for testers");

    while running.load(Ordering::SeqCst) {
        let (stream, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        info!(%peer, "Tester connected");
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(POLL_INTERVAL))?;

        let input = ShutdownReader::new(stream.try_clone()?, running.clone());
        match serve_stream(input, stream, flash, config) {
            Ok(()) => info!(%peer, "Tester disconnected"),
            Err(_) if !running.load(Ordering::SeqCst) => break,
            Err(e) => warn!(%peer, error = %e, "Connection dropped"),
        }
    }

    info!("TCP transport stopped");
    Ok(())
}

/// Serve the engine on a serial port until `running` is cleared or the
/// port fails.
pub fn serve_serial<F>(
    port: &str,
    baud_rate: u32,
    flash: &mut F,
    config: &BootloaderConfig,
    running: Arc<AtomicBool>,
) -> Result<(), TransportError>
where
    F: FlashDriver + ?Sized,
{
    let output = serialport::new(port, baud_rate)
        .timeout(POLL_INTERVAL)
        .open()?;
    let input = ShutdownReader::new(output.try_clone()?, running.clone());
    info!(port, baud_rate, "Serial port open");

    match serve_stream(input, output, flash, config) {
        Ok(()) => {}
        Err(_) if !running.load(Ordering::SeqCst) => {}
        Err(e) => return Err(e.into()),
    }

    info!(port, "Serial transport stopped");
    Ok(())
}
