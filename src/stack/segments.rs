//! Segmented transactions in flight, both directions. Timers are plain deadlines; whoever owns
//! the clock passes `now` in.
use crate::address::{Address, UnicastAddress};
use crate::config::TransportConfig;
use crate::control::SegmentAck;
use crate::lower::{self, BlockAck, SegO, SeqZero};
use crate::mesh::{IVIndex, SequenceNumber};
use crate::net;
use crate::reassembler::{Context, ReassembleError};
use crate::segmenter::{SegmentIterator, Segmenter};
use crate::stack::{IncomingPDU, PreparedMessage};
use crate::upper::UpperPDU;
use std::collections::BTreeMap;
use std::time::Instant;

/// What a Segment Acknowledgement did to an [`OutgoingMessage`].
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum AckOutcome {
    /// Every segment is acked.
    Complete,
    /// These segments are still missing and should be resent.
    Resend(Vec<SegO>),
    /// `BlockAck == 0`. The receiver gave up on the message.
    Cancelled,
    /// Ack for another message (or for an unsegmented one).
    Ignored,
}

/// Sender side of one segmented (or unsegmented) message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutgoingMessage {
    segmenter: Segmenter,
    dst: Address,
    acked: BlockAck,
    retransmits_left: u8,
    next_retransmit: Option<Instant>,
    retransmit_interval: core::time::Duration,
}
impl OutgoingMessage {
    /// Starts tracking a message whose segments were all just sent. Only segmented messages get a
    /// retransmission timer.
    #[must_use]
    pub fn new(
        prepared: PreparedMessage,
        dst: Address,
        config: &TransportConfig,
        now: Instant,
    ) -> Self {
        let segmented = prepared.segmenter.is_segmented();
        Self {
            segmenter: prepared.segmenter,
            dst,
            acked: BlockAck::default(),
            retransmits_left: if segmented { config.max_retransmits } else { 0 },
            next_retransmit: if segmented && config.max_retransmits > 0 {
                Some(now + config.retransmit_interval)
            } else {
                None
            },
            retransmit_interval: config.retransmit_interval,
        }
    }
    #[must_use]
    pub fn is_segmented(&self) -> bool {
        self.segmenter.is_segmented()
    }
    #[must_use]
    pub fn seq_zero(&self) -> SeqZero {
        self.segmenter.seq_zero()
    }
    #[must_use]
    pub fn dst(&self) -> Address {
        self.dst
    }
    #[must_use]
    pub fn acked(&self) -> BlockAck {
        self.acked
    }
    #[must_use]
    pub fn seg_count(&self) -> usize {
        self.segmenter.seg_count()
    }
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.segmenter
            .seg_n()
            .map_or(false, |seg_n| self.acked.all_acked(seg_n))
    }
    /// Segments the peer hasn't acked yet.
    #[must_use]
    pub fn pending_segments(&self) -> SegmentIterator<'_> {
        self.segmenter.iter(self.acked)
    }
    /// # Errors
    /// `BadSegmentHeader` if `seg_o` is past the last segment.
    pub fn segment(&self, seg_o: SegO) -> Result<lower::PDU, lower::LowerError> {
        self.segmenter.segment(seg_o)
    }
    /// Applies a Segment Acknowledgement from the peer.
    pub fn apply_ack(&mut self, ack: &SegmentAck, now: Instant) -> AckOutcome {
        let seg_n = match self.segmenter.seg_n() {
            Some(seg_n) if ack.seq_zero == self.seq_zero() => seg_n,
            _ => return AckOutcome::Ignored,
        };
        if ack.is_cancel() {
            self.next_retransmit = None;
            return AckOutcome::Cancelled;
        }
        self.acked = BlockAck((self.acked.0 | ack.block_ack.0) & BlockAck::full(seg_n).0);
        if self.acked.all_acked(seg_n) {
            self.next_retransmit = None;
            AckOutcome::Complete
        } else {
            if self.next_retransmit.is_some() {
                self.next_retransmit = Some(now + self.retransmit_interval);
            }
            AckOutcome::Resend(self.acked.missing(seg_n).collect())
        }
    }
    /// `true` if the retransmission timer fired. Uses up one retransmission.
    pub fn retransmit_due(&mut self, now: Instant) -> bool {
        match self.next_retransmit {
            Some(deadline) if now >= deadline && !self.is_complete() => {
                self.retransmits_left = self.retransmits_left.saturating_sub(1);
                self.next_retransmit = if self.retransmits_left > 0 {
                    Some(now + self.retransmit_interval)
                } else {
                    None
                };
                true
            }
            _ => false,
        }
    }
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_retransmit
    }
}

/// Result of feeding one segment into [`IncomingSegments`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SegmentOutcome {
    /// Last missing segment arrived. `ack` acknowledges every segment.
    Complete {
        header: net::Header,
        iv_index: IVIndex,
        seq_auth: SequenceNumber,
        upper_pdu: UpperPDU,
        ack: SegmentAck,
    },
    /// Still waiting for segments.
    Pending,
    /// Segment of a message that already completed. The peer lost our ack.
    Duplicate { src: UnicastAddress, ack: SegmentAck },
    /// Segment of a message older than the one being reassembled.
    Stale,
}

#[derive(Clone, Debug)]
struct Reassembly {
    header: net::Header,
    iv_index: IVIndex,
    seq_auth: SequenceNumber,
    context: Context,
    incomplete_deadline: Instant,
    ack_deadline: Option<Instant>,
}
impl Reassembly {
    fn ack(&self) -> SegmentAck {
        SegmentAck::new(self.context.header().seq_zero(), self.context.header().block_ack())
    }
}

/// Receiver side. One reassembly per source address; a newer SeqAuth from the same source
/// replaces the older one.
#[derive(Clone, Debug, Default)]
pub struct IncomingSegments {
    active: BTreeMap<UnicastAddress, Reassembly>,
    completed: BTreeMap<UnicastAddress, (SequenceNumber, SegmentAck)>,
}
impl IncomingSegments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
    /// Stores a segment and (re)starts the incomplete timer. The first missing segment also
    /// starts the acknowledgement timer.
    /// # Errors
    /// `NotSegmented` for unsegmented PDUs, `HeaderMismatch`/`BadSegmentLength` for segments
    /// that don't fit the message they claim to belong to.
    pub fn insert(
        &mut self,
        incoming: &IncomingPDU,
        config: &TransportConfig,
        now: Instant,
    ) -> Result<SegmentOutcome, ReassembleError> {
        let seg_header = *incoming
            .pdu
            .segment_header()
            .ok_or(ReassembleError::NotSegmented)?;
        let src = incoming.header.src;
        let seq_auth = seg_header
            .seq_zero
            .seq_auth(incoming.header.seq)
            .ok_or(ReassembleError::HeaderMismatch)?;
        if let Some(&(done, ack)) = self.completed.get(&src) {
            if done == seq_auth {
                return Ok(SegmentOutcome::Duplicate { src, ack });
            }
            if done > seq_auth {
                return Ok(SegmentOutcome::Stale);
            }
        }
        let current = self.active.get(&src).map(|r| r.seq_auth);
        let fresh = match current {
            Some(current) if current > seq_auth => return Ok(SegmentOutcome::Stale),
            Some(current) if current == seq_auth => match self.active.get_mut(&src) {
                Some(r) => r.context.insert(&incoming.pdu)?,
                None => false,
            },
            _ => {
                let context = Context::new(&incoming.pdu)?;
                self.active.insert(
                    src,
                    Reassembly {
                        header: incoming.header,
                        iv_index: incoming.iv_index,
                        seq_auth,
                        context,
                        incomplete_deadline: now + config.incomplete_timeout,
                        ack_deadline: None,
                    },
                );
                true
            }
        };
        let ready = match self.active.get_mut(&src) {
            Some(r) => {
                if fresh {
                    r.incomplete_deadline = now + config.incomplete_timeout;
                }
                if !r.context.is_ready() && r.ack_deadline.is_none() {
                    r.ack_deadline = Some(now + config.ack_delay_for(incoming.header.ttl));
                }
                r.context.is_ready()
            }
            None => false,
        };
        if !ready {
            return Ok(SegmentOutcome::Pending);
        }
        match self.active.remove(&src) {
            Some(r) => {
                let ack = r.ack();
                self.completed.insert(src, (r.seq_auth, ack));
                Ok(SegmentOutcome::Complete {
                    header: r.header,
                    iv_index: r.iv_index,
                    seq_auth: r.seq_auth,
                    upper_pdu: r.context.finish()?,
                    ack,
                })
            }
            None => Ok(SegmentOutcome::Pending),
        }
    }
    /// Drops every reassembly whose incomplete timer fired and returns their sources.
    pub fn expire(&mut self, now: Instant) -> Vec<UnicastAddress> {
        let expired: Vec<UnicastAddress> = self
            .active
            .iter()
            .filter(|(_, r)| now >= r.incomplete_deadline)
            .map(|(&src, _)| src)
            .collect();
        for src in &expired {
            self.active.remove(src);
        }
        expired
    }
    /// Acks whose timer fired. The timer is re-armed by the next segment.
    pub fn due_acks(&mut self, now: Instant) -> Vec<(UnicastAddress, SegmentAck)> {
        self.active
            .iter_mut()
            .filter(|(_, r)| r.ack_deadline.map_or(false, |d| now >= d))
            .map(|(&src, r)| {
                r.ack_deadline = None;
                (src, r.ack())
            })
            .collect()
    }
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.active
            .values()
            .flat_map(|r| core::iter::once(r.incomplete_deadline).chain(r.ack_deadline))
            .min()
    }
    pub fn clear(&mut self) {
        self.active.clear();
        self.completed.clear();
    }
}
