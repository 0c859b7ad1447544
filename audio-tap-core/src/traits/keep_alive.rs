use crate::models::error::CaptureError;

/// Silent output stream holding a shared-mode audio engine's graph open.
///
/// Some engines suspend processing, and with it loopback packet delivery,
/// when no renderer is active on the device. A keep-alive sink exists only
/// for loopback sessions: started before the capture stream, stopped after
/// the capture stream has stopped. Implementations should also stop on
/// `Drop` so the stream is released on every exit path.
pub trait KeepAliveSink {
    fn stop(&mut self) -> Result<(), CaptureError>;
}
