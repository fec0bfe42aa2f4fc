//! The translation engine.
//!
//! Control requests are verified, looked up in the [`MappingTable`],
//! translated into device commands and remembered in the
//! [`PendingTracker`]. Device replies are verified and answered for the
//! oldest remembered request.
//!
//! Correlation is by order only: the wire formats carry no request id, so a
//! device reply always belongs to the oldest pending request.

use log::{debug, warn};
use snafu::{ensure, OptionExt, ResultExt, Snafu};

use crate::codec::{
    self, verify_control_frame, verify_device_frame, FrameBytes, CONTROL_MIN_LEN, DEVICE_MIN_LEN,
};
use crate::commands;
use crate::config::{BridgeConfig, TRACKER_CAPACITY};
use crate::mapping::{EntryId, MappingEntry, MappingTable};
use crate::tracker::{self, PendingEntry, PendingTracker};
use crate::types::CommandKey;

/// Why a frame was not translated. The frame is dropped in every case.
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
#[non_exhaustive]
pub enum TranslateError {
    /// Too short, unsolicited or otherwise unusable input.
    #[snafu(display("Invalid packet"))]
    InvalidPacket,
    #[snafu(display("Checksum or framing mismatch"))]
    ChecksumError,
    #[snafu(display("No mapping for command {}", key))]
    UnknownCommand { key: CommandKey },
    #[snafu(display("Too many requests awaiting a response"))]
    QueueFull,
    /// The command's translator or responder failed.
    #[snafu(display("Translation failed: {}", source))]
    Translation { source: commands::Error },
}

/// Translates between the two links for one control/device pair.
#[derive(Debug, Clone)]
pub struct TranslationEngine<const N: usize = TRACKER_CAPACITY> {
    table: MappingTable,
    pending: PendingTracker<N>,
    timeout_ms: u32,
}

impl<const N: usize> TranslationEngine<N> {
    pub fn new(table: MappingTable, timeout_ms: u32) -> Self {
        Self {
            table,
            pending: PendingTracker::new(),
            timeout_ms,
        }
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    pub fn pending(&self) -> &PendingTracker<N> {
        &self.pending
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Translate a complete control request into a device command.
    ///
    /// On success the request is pending until a device reply or expiry
    /// removes it.
    /// # Errors
    /// See [`TranslateError`]; nothing is queued on error.
    pub fn translate_control(
        &mut self,
        request: &[u8],
        now_ms: u32,
    ) -> Result<FrameBytes, TranslateError> {
        ensure!(request.len() >= CONTROL_MIN_LEN, InvalidPacketSnafu);
        ensure!(verify_control_frame(request), ChecksumSnafu);

        let key = codec::command_key(request).context(InvalidPacketSnafu)?;
        let id = self
            .table
            .resolve(request)
            .context(UnknownCommandSnafu { key })?;
        let entry = *self.mapping(id)?;

        let frame = entry
            .translator
            .translate(entry.device_cmd, request)
            .context(TranslationSnafu)?;

        self.pending
            .push(request, entry.tag, id, now_ms)
            .map_err(|e| match e {
                tracker::Error::Full => TranslateError::QueueFull,
                _ => TranslateError::InvalidPacket,
            })?;
        debug!(
            "{} {}: {:02X?} -> {:02X?}",
            key,
            entry.description,
            request,
            frame.as_slice()
        );
        Ok(frame)
    }

    /// Answer the oldest pending request with a complete device reply.
    /// # Errors
    /// [`TranslateError::InvalidPacket`] for a reply nobody waits for. The
    /// pending request is consumed even if its response can't be built.
    pub fn process_device_response(&mut self, reply: &[u8]) -> Result<FrameBytes, TranslateError> {
        ensure!(reply.len() >= DEVICE_MIN_LEN, InvalidPacketSnafu);
        ensure!(verify_device_frame(reply), ChecksumSnafu);

        let pending = self.pending.pop().context(InvalidPacketSnafu)?;
        let entry = *self.mapping(pending.mapping)?;
        let response = entry
            .responder
            .respond(reply, &pending.request)
            .context(TranslationSnafu)?;
        debug!(
            "{}: {:02X?} -> {:02X?}",
            entry.description,
            reply,
            response.as_slice()
        );
        Ok(response)
    }

    /// Evict every pending request older than the command timeout.
    ///
    /// Returns the number of evicted requests.
    pub fn check_timeouts(&mut self, now_ms: u32) -> usize {
        let mut expired = 0;
        while let Some(entry) = self.pending.remove_if_expired(self.timeout_ms, now_ms) {
            if let Some(mapping) = self.table.entry(entry.mapping) {
                warn!("{} timed out", mapping.description);
            }
            expired += 1;
        }
        expired
    }

    /// The oldest pending request.
    pub fn oldest_pending(&self) -> Option<&PendingEntry> {
        self.pending.peek()
    }

    /// Forget every pending request.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    fn mapping(&self, id: EntryId) -> Result<&MappingEntry, TranslateError> {
        self.table.entry(id).context(InvalidPacketSnafu)
    }
}

impl<const N: usize> Default for TranslationEngine<N> {
    /// Engine with the camera's command catalogue and a 1 s timeout.
    fn default() -> Self {
        Self::new(MappingTable::default(), BridgeConfig::new().command_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Error as CommandError;
    use crate::types::{key, CorrelationTag};

    const NUC_REQUEST: [u8; 9] = [0xAA, 0x05, 0x00, 0x16, 0x01, 0x00, 0xC6, 0xEB, 0xAA];
    const DEVICE_ACK: [u8; 6] = [0x55, 0xAA, 0x01, 0x00, 0x01, 0xF0];

    #[test]
    fn test_translate_nuc() {
        let mut engine = TranslationEngine::<16>::default();
        let frame = engine.translate_control(&NUC_REQUEST, 10).unwrap();
        assert_eq!(&frame[..6], &[0x55, 0xAA, 0x07, 0x02, 0x01, 0x08]);
        assert_eq!(engine.pending_count(), 1);
        let pending = engine.oldest_pending().unwrap();
        assert_eq!(pending.request.as_slice(), &NUC_REQUEST);
        assert_eq!(pending.timestamp_ms, 10);
        assert_eq!(pending.tag, CorrelationTag::None);
    }

    #[test]
    fn test_rejects_short_and_corrupt() {
        let mut engine = TranslationEngine::<16>::default();
        assert_eq!(
            engine.translate_control(&NUC_REQUEST[..7], 0),
            Err(TranslateError::InvalidPacket)
        );
        let mut corrupt = NUC_REQUEST;
        corrupt[6] ^= 0x01;
        assert_eq!(
            engine.translate_control(&corrupt, 0),
            Err(TranslateError::ChecksumError)
        );
        assert_eq!(engine.pending_count(), 0);
    }

    #[test]
    fn test_unknown_command() {
        let mut engine = TranslationEngine::<16>::default();
        let request = [0xAA, 0x05, 0x00, 0x99, 0x01, 0x00, 0x49, 0xEB, 0xAA];
        assert_eq!(
            engine.translate_control(&request, 0),
            Err(TranslateError::UnknownCommand { key: key(0x00, 0x99) })
        );
        assert_eq!(engine.pending_count(), 0);
    }

    #[test]
    fn test_translation_failure_queues_nothing() {
        let mut engine = TranslationEngine::<16>::default();
        let zoom = [0xAA, 0x05, 0x00, 0x2A, 0x01, 0x05, 0xDF, 0xEB, 0xAA];
        assert_eq!(
            engine.translate_control(&zoom, 0),
            Err(TranslateError::Translation {
                source: CommandError::UnmappedValue { value: 5 }
            })
        );
        assert_eq!(engine.pending_count(), 0);
    }

    #[test]
    fn test_queue_full() {
        let mut engine = TranslationEngine::<2>::default();
        engine.translate_control(&NUC_REQUEST, 0).unwrap();
        engine.translate_control(&NUC_REQUEST, 0).unwrap();
        assert_eq!(
            engine.translate_control(&NUC_REQUEST, 0),
            Err(TranslateError::QueueFull)
        );
        assert_eq!(engine.pending_count(), 2);
    }

    #[test]
    fn test_response_round_trip() {
        let mut engine = TranslationEngine::<16>::default();
        engine.translate_control(&NUC_REQUEST, 0).unwrap();
        let response = engine.process_device_response(&DEVICE_ACK).unwrap();
        assert_eq!(
            response.as_slice(),
            &[0x55, 0x05, 0x00, 0x16, 0x33, 0x01, 0xA4, 0xEB, 0xAA]
        );
        assert_eq!(engine.pending_count(), 0);
    }

    #[test]
    fn test_unsolicited_response() {
        let mut engine = TranslationEngine::<16>::default();
        assert_eq!(
            engine.process_device_response(&DEVICE_ACK),
            Err(TranslateError::InvalidPacket)
        );
        assert_eq!(
            engine.process_device_response(&DEVICE_ACK[..5]),
            Err(TranslateError::InvalidPacket)
        );
        let mut corrupt = DEVICE_ACK;
        corrupt[4] = 0x02;
        assert_eq!(
            engine.process_device_response(&corrupt),
            Err(TranslateError::ChecksumError)
        );
    }

    #[test]
    fn test_corrupt_reply_keeps_request_pending() {
        let mut engine = TranslationEngine::<16>::default();
        engine.translate_control(&NUC_REQUEST, 0).unwrap();
        let mut corrupt = DEVICE_ACK;
        corrupt[4] = 0x02;
        assert!(engine.process_device_response(&corrupt).is_err());
        assert_eq!(engine.pending_count(), 1);
    }

    #[test]
    fn test_check_timeouts() {
        let mut engine = TranslationEngine::<16>::default();
        engine.translate_control(&NUC_REQUEST, 0).unwrap();
        engine.translate_control(&NUC_REQUEST, 500).unwrap();
        assert_eq!(engine.check_timeouts(999), 0);
        assert_eq!(engine.check_timeouts(1000), 1);
        assert_eq!(engine.check_timeouts(1499), 0);
        assert_eq!(engine.check_timeouts(5000), 1);
        assert_eq!(engine.pending_count(), 0);
    }

    #[test]
    fn test_clear_pending() {
        let mut engine = TranslationEngine::<16>::default();
        engine.translate_control(&NUC_REQUEST, 0).unwrap();
        engine.clear_pending();
        assert_eq!(engine.pending_count(), 0);
        assert_eq!(engine.timeout_ms(), 1000);
        assert!(!engine.table().is_empty());
    }
}
